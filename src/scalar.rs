use ark_ff::{BigInteger, PrimeField};
use curve25519_dalek::Scalar;
use num_bigint::BigUint;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Width in bits of a truncated hash commitment, on every backend.
pub const COMMITMENT_BITS: usize = 253;

/// Width of the low half when a commitment is split over two field elements.
pub const COMMITMENT_LOW_BITS: usize = 128;

/// Field elements per commitment: one where 253 bits always fit, else `[high, low]`.
pub fn commitment_limbs<F: PrimeField>() -> usize {
    if F::MODULUS_BIT_SIZE as usize > COMMITMENT_BITS {
        1
    } else {
        2
    }
}

pub fn truncate_digest(digest: [u8; 32], bits: usize) -> [u8; 32] {
    let mut out = digest;
    let drop = 256usize.saturating_sub(bits);
    for (i, byte) in out.iter_mut().enumerate() {
        let start = i * 8;
        if start + 8 <= drop {
            *byte = 0;
        } else if start < drop {
            *byte &= 0xff >> (drop - start);
        }
    }
    out
}

pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// `truncate(SHA256(data), 253)`, big-endian.
pub fn hash_digest(data: &[u8]) -> [u8; 32] {
    truncate_digest(sha256(data), COMMITMENT_BITS)
}

pub fn commitment_elements<F: PrimeField>(digest: &[u8; 32]) -> Vec<F> {
    match commitment_limbs::<F>() {
        1 => vec![F::from_be_bytes_mod_order(digest)],
        _ => {
            let split = 32 - COMMITMENT_LOW_BITS / 8;
            vec![
                F::from_be_bytes_mod_order(&digest[..split]),
                F::from_be_bytes_mod_order(&digest[split..]),
            ]
        }
    }
}

pub fn hash_commitment<F: PrimeField>(data: &[u8]) -> Vec<F> {
    commitment_elements(&hash_digest(data))
}

pub fn to_bytes_be<F: PrimeField>(x: F) -> [u8; 32] {
    let mut out = [0u8; 32];
    let bytes = x.into_bigint().to_bytes_be();
    let offset = 32usize.saturating_sub(bytes.len());
    out[offset..].copy_from_slice(&bytes[bytes.len().saturating_sub(32)..]);
    out
}

/// Parses a canonical big-endian encoding, rejecting values at or above the modulus.
pub fn from_bytes_be<F: PrimeField>(bytes: &[u8]) -> Result<F> {
    let value = BigUint::from_bytes_be(bytes);
    let modulus: BigUint = F::MODULUS.into();
    if value >= modulus {
        return Err(Error::Range {
            what: "field element",
            value: format!("0x{}", hex::encode(bytes)),
        });
    }
    Ok(F::from_be_bytes_mod_order(bytes))
}

pub fn to_biguint<F: PrimeField>(x: F) -> BigUint {
    x.into_bigint().into()
}

pub fn to_dalek<F: PrimeField>(x: F) -> Result<Scalar> {
    let mut bytes = [0u8; 32];
    let le = x.into_bigint().to_bytes_le();
    bytes[..le.len().min(32)].copy_from_slice(&le[..le.len().min(32)]);
    Option::<Scalar>::from(Scalar::from_canonical_bytes(bytes)).ok_or_else(|| Error::Range {
        what: "curve25519 scalar",
        value: to_biguint(x).to_string(),
    })
}

pub fn to_dalek_bytes<F: PrimeField>(x: F) -> Result<[u8; 32]> {
    to_dalek(x).map(|s| s.to_bytes())
}

#[cfg(test)]
mod tests {
    use ark_bn254::Fr;

    use super::*;

    #[test]
    fn test_commitment_limbs() {
        assert_eq!(commitment_limbs::<Fr>(), 1);
        assert_eq!(commitment_limbs::<ark_ed25519::Fr>(), 2);
    }

    #[test]
    fn test_truncate_digest() {
        let digest = [0xff; 32];
        let truncated = truncate_digest(digest, 253);
        assert_eq!(truncated[0], 0x1f);
        assert!(truncated[1..].iter().all(|b| *b == 0xff));

        let truncated = truncate_digest(digest, 244);
        assert_eq!(truncated[0], 0);
        assert_eq!(truncated[1], 0x0f);
    }

    #[test]
    fn test_hash_commitment_fits_field() {
        let input =
            hex::decode("4bf5122f344554c53bde2ebb8cd2b7e3d1600ad631c385a5d7cce23c7785459a")
                .unwrap();
        let digest = sha256(&input);
        let x: Vec<Fr> = hash_commitment(&input);
        let mut expected = digest;
        expected[0] &= 0x1f;
        assert_eq!(x.len(), 1);
        assert_eq!(to_bytes_be(x[0]), expected);
    }

    #[test]
    fn test_commitment_is_the_same_on_both_fields() {
        // the digest of [2] starts 0xdb, so bit 252 is set
        let digest = hash_digest(&[2]);
        assert_eq!(digest[0], 0x1b);

        let pairing: Vec<Fr> = hash_commitment(&[2]);
        let universal: Vec<ark_ed25519::Fr> = hash_commitment(&[2]);
        assert_eq!(universal.len(), 2);
        assert_eq!(to_bytes_be(universal[0])[16..], digest[..16]);
        assert_eq!(to_bytes_be(universal[1])[16..], digest[16..]);

        let recomposed = (to_biguint(universal[0]) << COMMITMENT_LOW_BITS) + to_biguint(universal[1]);
        assert_eq!(recomposed, to_biguint(pairing[0]));
        assert_eq!(recomposed, BigUint::from_bytes_be(&digest));
    }

    #[test]
    fn test_from_bytes_be_rejects_modulus() {
        let modulus = BigUint::from(Fr::MODULUS).to_bytes_be();
        assert!(from_bytes_be::<Fr>(&modulus).is_err());
        assert_eq!(from_bytes_be::<Fr>(&[7]).unwrap(), Fr::from(7u64));
    }

    #[test]
    fn test_to_dalek() {
        let x = ark_ed25519::Fr::from(1234u64);
        assert_eq!(to_dalek(x).unwrap(), Scalar::from(1234u32));
        assert_eq!(to_dalek(-x).unwrap(), -Scalar::from(1234u32));
    }
}
