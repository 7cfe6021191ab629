use ark_ff::PrimeField;
use tracing::debug;

use crate::{
    bits::{self, Word},
    circuit::{ConstraintSystem, Variable},
    error::{Error, Result},
    scalar::{self, COMMITMENT_BITS, COMMITMENT_LOW_BITS},
    vars::{Bit, Byte, Bytes32},
};

struct Params {
    word_bits: usize,
    length_bits: usize,
    rounds: usize,
    iv: [u64; 8],
    k: &'static [u64],
    /// Schedule rotations: (rotr, rotr, shr).
    s0: (usize, usize, usize),
    s1: (usize, usize, usize),
    /// Compression rotations.
    sigma0: (usize, usize, usize),
    sigma1: (usize, usize, usize),
}

impl Params {
    fn block_bits(&self) -> usize {
        16 * self.word_bits
    }

    fn digest_bits(&self) -> usize {
        8 * self.word_bits
    }
}

const SHA256_K: [u64; 64] = [
    0x428a2f98, 0x71374491, 0xb5c0fbcf, 0xe9b5dba5, 0x3956c25b, 0x59f111f1, 0x923f82a4, 0xab1c5ed5,
    0xd807aa98, 0x12835b01, 0x243185be, 0x550c7dc3, 0x72be5d74, 0x80deb1fe, 0x9bdc06a7, 0xc19bf174,
    0xe49b69c1, 0xefbe4786, 0x0fc19dc6, 0x240ca1cc, 0x2de92c6f, 0x4a7484aa, 0x5cb0a9dc, 0x76f988da,
    0x983e5152, 0xa831c66d, 0xb00327c8, 0xbf597fc7, 0xc6e00bf3, 0xd5a79147, 0x06ca6351, 0x14292967,
    0x27b70a85, 0x2e1b2138, 0x4d2c6dfc, 0x53380d13, 0x650a7354, 0x766a0abb, 0x81c2c92e, 0x92722c85,
    0xa2bfe8a1, 0xa81a664b, 0xc24b8b70, 0xc76c51a3, 0xd192e819, 0xd6990624, 0xf40e3585, 0x106aa070,
    0x19a4c116, 0x1e376c08, 0x2748774c, 0x34b0bcb5, 0x391c0cb3, 0x4ed8aa4a, 0x5b9cca4f, 0x682e6ff3,
    0x748f82ee, 0x78a5636f, 0x84c87814, 0x8cc70208, 0x90befffa, 0xa4506ceb, 0xbef9a3f7, 0xc67178f2,
];

const SHA512_K: [u64; 80] = [
    0x428a2f98d728ae22, 0x7137449123ef65cd, 0xb5c0fbcfec4d3b2f, 0xe9b5dba58189dbbc,
    0x3956c25bf348b538, 0x59f111f1b605d019, 0x923f82a4af194f9b, 0xab1c5ed5da6d8118,
    0xd807aa98a3030242, 0x12835b0145706fbe, 0x243185be4ee4b28c, 0x550c7dc3d5ffb4e2,
    0x72be5d74f27b896f, 0x80deb1fe3b1696b1, 0x9bdc06a725c71235, 0xc19bf174cf692694,
    0xe49b69c19ef14ad2, 0xefbe4786384f25e3, 0x0fc19dc68b8cd5b5, 0x240ca1cc77ac9c65,
    0x2de92c6f592b0275, 0x4a7484aa6ea6e483, 0x5cb0a9dcbd41fbd4, 0x76f988da831153b5,
    0x983e5152ee66dfab, 0xa831c66d2db43210, 0xb00327c898fb213f, 0xbf597fc7beef0ee4,
    0xc6e00bf33da88fc2, 0xd5a79147930aa725, 0x06ca6351e003826f, 0x142929670a0e6e70,
    0x27b70a8546d22ffc, 0x2e1b21385c26c926, 0x4d2c6dfc5ac42aed, 0x53380d139d95b3df,
    0x650a73548baf63de, 0x766a0abb3c77b2a8, 0x81c2c92e47edaee6, 0x92722c851482353b,
    0xa2bfe8a14cf10364, 0xa81a664bbc423001, 0xc24b8b70d0f89791, 0xc76c51a30654be30,
    0xd192e819d6ef5218, 0xd69906245565a910, 0xf40e35855771202a, 0x106aa07032bbd1b8,
    0x19a4c116b8d2d0c8, 0x1e376c085141ab53, 0x2748774cdf8eeb99, 0x34b0bcb5e19b48a8,
    0x391c0cb3c5c95a63, 0x4ed8aa4ae3418acb, 0x5b9cca4f7763e373, 0x682e6ff3d6b2b8a3,
    0x748f82ee5defb2fc, 0x78a5636f43172f60, 0x84c87814a1f0ab72, 0x8cc702081a6439ec,
    0x90befffa23631e28, 0xa4506cebde82bde9, 0xbef9a3f7b2c67915, 0xc67178f2e372532b,
    0xca273eceea26619c, 0xd186b8c721c0c207, 0xeada7dd6cde0eb1e, 0xf57d4f7fee6ed178,
    0x06f067aa72176fba, 0x0a637dc5a2c898a6, 0x113f9804bef90dae, 0x1b710b35131c471b,
    0x28db77f523047d84, 0x32caab7b40c72493, 0x3c9ebe0a15c9bebc, 0x431d67c49c100d4c,
    0x4cc5d4becb3e42b6, 0x597f299cfc657e2a, 0x5fcb6fab3ad6faec, 0x6c44198c4a475817,
];

const SHA256: Params = Params {
    word_bits: 32,
    length_bits: 64,
    rounds: 64,
    iv: [
        0x6a09e667, 0xbb67ae85, 0x3c6ef372, 0xa54ff53a, 0x510e527f, 0x9b05688c, 0x1f83d9ab,
        0x5be0cd19,
    ],
    k: &SHA256_K,
    s0: (7, 18, 3),
    s1: (17, 19, 10),
    sigma0: (2, 13, 22),
    sigma1: (6, 11, 25),
};

const SHA512: Params = Params {
    word_bits: 64,
    length_bits: 128,
    rounds: 80,
    iv: [
        0x6a09e667f3bcc908,
        0xbb67ae8584caa73b,
        0x3c6ef372fe94f82b,
        0xa54ff53a5f1d36f1,
        0x510e527fade682d1,
        0x9b05688c2b3e6c1f,
        0x1f83d9abfb41bd6b,
        0x5be0cd19137e2179,
    ],
    k: &SHA512_K,
    s0: (1, 8, 7),
    s1: (19, 61, 6),
    sigma0: (28, 34, 39),
    sigma1: (14, 18, 41),
};

/// `message ‖ 1 ‖ 0* ‖ len` up to a whole number of blocks. The length is static so
/// every padding bit is a constant.
fn pad<F: PrimeField>(params: &Params, message: &[Bit<F>]) -> Vec<Bit<F>> {
    let block = params.block_bits();
    let used = (message.len() + 1 + params.length_bits) % block;
    let zeros = (block - used) % block;

    let mut padded = Vec::with_capacity(message.len() + 1 + zeros + params.length_bits);
    padded.extend_from_slice(message);
    padded.push(Bit::one());
    padded.extend((0..zeros).map(|_| Bit::zero()));
    padded.extend(bits::constant(message.len() as u64, params.length_bits));
    padded
}

fn compress<F: PrimeField>(
    cs: &mut ConstraintSystem<F>,
    params: &Params,
    state: &[Word<F>],
    block: &[Bit<F>],
) -> Result<Vec<Word<F>>> {
    let n = params.word_bits;
    let mut w: Vec<Word<F>> = block.chunks(n).map(<[Bit<F>]>::to_vec).collect();
    for j in 16..params.rounds {
        let (r0, r1, s) = params.s0;
        let s0 = bits::xor3(
            cs,
            &bits::rotate_right(&w[j - 15], r0),
            &bits::rotate_right(&w[j - 15], r1),
            &bits::shr(&w[j - 15], s),
        )?;
        let (r0, r1, s) = params.s1;
        let s1 = bits::xor3(
            cs,
            &bits::rotate_right(&w[j - 2], r0),
            &bits::rotate_right(&w[j - 2], r1),
            &bits::shr(&w[j - 2], s),
        )?;
        let next = bits::add(cs, &[&w[j - 16], &s0, &w[j - 7], &s1])?;
        w.push(next);
    }

    let [mut a, mut b, mut c, mut d, mut e, mut f, mut g, mut h]: [Word<F>; 8] = state
        .to_vec()
        .try_into()
        .map_err(|_| Error::InvariantViolation("sha-2 state must hold 8 words".into()))?;
    for j in 0..params.rounds {
        let (r0, r1, r2) = params.sigma1;
        let sum1 = bits::xor3(
            cs,
            &bits::rotate_right(&e, r0),
            &bits::rotate_right(&e, r1),
            &bits::rotate_right(&e, r2),
        )?;
        let ch = bits::choose(cs, &e, &f, &g)?;
        let k = bits::constant(params.k[j], n);
        let temp1 = bits::add(cs, &[&h, &sum1, &ch, &k, &w[j]])?;

        let (r0, r1, r2) = params.sigma0;
        let sum0 = bits::xor3(
            cs,
            &bits::rotate_right(&a, r0),
            &bits::rotate_right(&a, r1),
            &bits::rotate_right(&a, r2),
        )?;
        let maj = bits::majority(cs, &a, &b, &c)?;
        let temp2 = bits::add(cs, &[&sum0, &maj])?;

        h = g;
        g = f;
        f = e;
        e = bits::add(cs, &[&d, &temp1])?;
        d = c;
        c = b;
        b = a;
        a = bits::add(cs, &[&temp1, &temp2])?;
    }

    state
        .iter()
        .zip([a, b, c, d, e, f, g, h])
        .map(|(prev, next)| bits::add(cs, &[prev, &next]))
        .collect()
}

fn hash<F: PrimeField>(
    cs: &mut ConstraintSystem<F>,
    params: &Params,
    message: &[Bit<F>],
) -> Result<Vec<Bit<F>>> {
    let before = cs.num_constraints();
    let padded = pad(params, message);
    let mut state: Vec<Word<F>> = params
        .iv
        .iter()
        .map(|iv| bits::constant(*iv, params.word_bits))
        .collect();
    for block in padded.chunks(params.block_bits()) {
        state = compress(cs, params, &state, block)?;
    }
    let digest: Vec<Bit<F>> = state.into_iter().flatten().collect();
    if digest.len() != params.digest_bits() {
        return Err(Error::InvariantViolation(format!(
            "digest has {} bits, expected {}",
            digest.len(),
            params.digest_bits()
        )));
    }
    debug!(
        message_bits = message.len(),
        blocks = padded.len() / params.block_bits(),
        constraints = cs.num_constraints() - before,
        "sha-2"
    );
    Ok(digest)
}

pub fn sha256_bits<F: PrimeField>(
    cs: &mut ConstraintSystem<F>,
    message: &[Bit<F>],
) -> Result<Vec<Bit<F>>> {
    hash(cs, &SHA256, message)
}

pub fn sha256<F: PrimeField>(cs: &mut ConstraintSystem<F>, message: &[Byte<F>]) -> Result<Bytes32<F>> {
    let message = bits::bytes_to_bits(cs, message)?;
    let digest = sha256_bits(cs, &message)?;
    Bytes32::from_bytes(bits::bits_to_bytes(&digest)?)
}

pub fn sha512_bits<F: PrimeField>(
    cs: &mut ConstraintSystem<F>,
    message: &[Bit<F>],
) -> Result<Vec<Bit<F>>> {
    hash(cs, &SHA512, message)
}

pub fn sha512<F: PrimeField>(cs: &mut ConstraintSystem<F>, message: &[Byte<F>]) -> Result<Vec<Byte<F>>> {
    let message = bits::bytes_to_bits(cs, message)?;
    let digest = sha512_bits(cs, &message)?;
    bits::bits_to_bytes(&digest)
}

/// The low `nbits` bits of `SHA256(message)`, read big-endian, as one field element.
pub fn sha256_truncated<F: PrimeField>(
    cs: &mut ConstraintSystem<F>,
    message: &[Byte<F>],
    nbits: usize,
) -> Result<Variable<F>> {
    if nbits > 256 || nbits >= F::MODULUS_BIT_SIZE as usize {
        return Err(Error::Range {
            what: "truncated digest width",
            value: nbits.to_string(),
        });
    }
    let message = bits::bytes_to_bits(cs, message)?;
    let digest = sha256_bits(cs, &message)?;
    Ok(Bit::pack_be(&digest[256 - nbits..]))
}

/// Packs the 253 commitment bits, MSB first, into the elements
/// [`scalar::commitment_elements`] produces.
pub fn pack_commitment<F: PrimeField>(bits: &[Bit<F>]) -> Result<Vec<Variable<F>>> {
    if bits.len() != COMMITMENT_BITS {
        return Err(Error::length("commitment bits", COMMITMENT_BITS, bits.len()));
    }
    Ok(match scalar::commitment_limbs::<F>() {
        1 => vec![Bit::pack_be(bits)],
        _ => {
            let (high, low) = bits.split_at(COMMITMENT_BITS - COMMITMENT_LOW_BITS);
            vec![Bit::pack_be(high), Bit::pack_be(low)]
        }
    })
}

pub fn sha256_commitment<F: PrimeField>(
    cs: &mut ConstraintSystem<F>,
    message: &[Byte<F>],
) -> Result<Vec<Variable<F>>> {
    let message = bits::bytes_to_bits(cs, message)?;
    let digest = sha256_bits(cs, &message)?;
    pack_commitment(&digest[256 - COMMITMENT_BITS..])
}

#[cfg(test)]
mod tests {
    use ark_bn254::Fr;
    use proptest::prelude::*;
    use sha2::{Digest, Sha512};

    use super::*;
    use crate::scalar;

    fn alloc_bytes(cs: &mut ConstraintSystem<Fr>, data: &[u8]) -> Vec<Byte<Fr>> {
        data.iter()
            .map(|b| Byte::alloc(cs, Some(*b)).unwrap())
            .collect()
    }

    fn circuit_sha256(data: &[u8]) -> String {
        let mut cs = ConstraintSystem::<Fr>::prove();
        let bytes = alloc_bytes(&mut cs, data);
        let digest = sha256(&mut cs, &bytes).unwrap();
        assert!(cs.is_satisfied().is_ok());
        hex::encode(digest.value().unwrap().unwrap())
    }

    fn circuit_sha512(data: &[u8]) -> String {
        let mut cs = ConstraintSystem::<Fr>::prove();
        let bytes = alloc_bytes(&mut cs, data);
        let digest: Vec<u8> = sha512(&mut cs, &bytes)
            .unwrap()
            .iter()
            .map(|b| b.value_unsafe().unwrap().unwrap())
            .collect();
        assert!(cs.is_satisfied().is_ok());
        hex::encode(digest)
    }

    #[test]
    fn test_sha256() {
        assert_eq!(
            circuit_sha256(b"Succinct Labs"),
            "7fb4acc57b9765e167a716dee0d19c5dce851cfa140dbce7fff42a3e589ab470"
        );
        assert_eq!(
            circuit_sha256(b"i love polynomials"),
            "f9d31346a1b4b014dcdd3d9c700f7c4a017383ac8fb6502257a58596011b598f"
        );
        assert_eq!(
            circuit_sha256(b"jtguibas"),
            "11490498ac6480d6fefe1c01e639875cee3b4ec3f96265eb76701f65da99ea8c"
        );
    }

    #[test]
    fn test_sha256_two_blocks() {
        let data = [0x61u8; 64];
        assert_eq!(circuit_sha256(&data), hex::encode(scalar::sha256(&data)));
    }

    #[test]
    fn test_sha512() {
        assert_eq!(
            circuit_sha512(b""),
            "cf83e1357eefb8bdf1542850d66d8007d620e4050b5715dc83f4a921d36ce9ce47d0d13c5d85f2b0ff8318d2877eec2f63b931bd47417a81a538327af927da3e"
        );
        assert_eq!(
            circuit_sha512(b"Succinct Labs"),
            "503ace098aa03f6feec1b5df0a38aee923f744a775508bc81f2b94ad139be297c2e8cd8c44af527b5d3f017a7fc929892c896604047e52e3f518924f52bff0dc"
        );
    }

    #[test]
    fn test_sha256_truncated_matches_commitment() {
        let data = b"Succinct Labs";
        let mut cs = ConstraintSystem::<Fr>::prove();
        let bytes = alloc_bytes(&mut cs, data);
        let x = sha256_truncated(&mut cs, &bytes, COMMITMENT_BITS).unwrap();
        assert_eq!(vec![x.value().unwrap()], scalar::hash_commitment::<Fr>(data));
        let commitment = sha256_commitment(&mut cs, &bytes).unwrap();
        assert_eq!(commitment.len(), 1);
        assert_eq!(commitment[0].value(), x.value());
        assert!(cs.is_satisfied().is_ok());

        assert!(sha256_truncated(&mut cs, &bytes, 254).is_err());
    }

    #[test]
    fn test_sha256_commitment_splits_on_small_fields() {
        type Ed = ark_ed25519::Fr;
        let mut cs = ConstraintSystem::<Ed>::prove();
        let bytes: Vec<_> = [2u8]
            .iter()
            .map(|b| Byte::alloc(&mut cs, Some(*b)).unwrap())
            .collect();
        let commitment = sha256_commitment(&mut cs, &bytes).unwrap();
        let values: Vec<Ed> = commitment.iter().map(|v| v.value().unwrap()).collect();
        assert_eq!(values, scalar::hash_commitment::<Ed>(&[2]));
        assert!(cs.is_satisfied().is_ok());

        assert!(pack_commitment(&vec![Bit::<Ed>::zero(); 252]).is_err());
    }

    #[test]
    fn test_constant_message_costs_nothing() {
        let mut cs = ConstraintSystem::<Fr>::setup();
        let bytes: Vec<_> = b"abc".iter().map(|b| Byte::constant(*b)).collect();
        let digest = sha256(&mut cs, &bytes).unwrap();
        assert_eq!(cs.num_constraints(), 0);
        assert_eq!(
            digest.value().unwrap().unwrap(),
            scalar::sha256(b"abc")
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))]

        #[test]
        fn prop_sha256_matches_native(data in prop::collection::vec(any::<u8>(), 0..80)) {
            prop_assert_eq!(circuit_sha256(&data), hex::encode(scalar::sha256(&data)));
        }

        #[test]
        fn prop_sha512_matches_native(data in prop::collection::vec(any::<u8>(), 0..140)) {
            prop_assert_eq!(circuit_sha512(&data), hex::encode(Sha512::digest(&data)));
        }
    }
}
