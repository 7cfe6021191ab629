use std::io::{Read, Write};

use ark_bn254::{Bn254, Fq, Fq2, Fr, G1Affine, G2Affine};
use ark_ec::AffineRepr;
use ark_ff::Zero;
use ark_groth16::{Groth16, Proof, ProvingKey, VerifyingKey};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_snark::SNARK;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{
    config::ProvingSystemKind,
    error::{Error, Result},
    proof::Groth16ProofJson,
    r1cs::{Assignment, ConstraintMatrices, ReplayCircuit},
    scalar, solidity,
    system::ProvingSystem,
};

type ArkGroth16 = Groth16<Bn254>;

/// `abi.encode(uint256[2], uint256[2][2], uint256[2])`
pub const PROOF_BYTES: usize = 8 * 32;

#[derive(Debug, Clone, Copy, Default)]
pub struct Groth16Backend;

/// Verifying key with every coordinate as a decimal string, G2 in `(c1, c0)` order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyingKeyJson {
    pub alpha: [String; 2],
    pub beta: [[String; 2]; 2],
    pub gamma: [[String; 2]; 2],
    pub delta: [[String; 2]; 2],
    pub ic: Vec<[String; 2]>,
}

fn decimal(x: Fq) -> String {
    scalar::to_biguint(x).to_string()
}

fn g1_decimal(p: &G1Affine) -> [String; 2] {
    [decimal(p.x), decimal(p.y)]
}

fn fq2_decimal(x: &Fq2) -> [String; 2] {
    [decimal(x.c1), decimal(x.c0)]
}

fn g2_decimal(p: &G2Affine) -> [[String; 2]; 2] {
    [fq2_decimal(&p.x), fq2_decimal(&p.y)]
}

fn serialization(e: impl ToString) -> Error {
    Error::Serialization(e.to_string())
}

fn g1_from_words(x: &[u8], y: &[u8]) -> Result<G1Affine> {
    let (x, y): (Fq, Fq) = (scalar::from_bytes_be(x)?, scalar::from_bytes_be(y)?);
    if x.is_zero() && y.is_zero() {
        return Ok(G1Affine::zero());
    }
    let p = G1Affine::new_unchecked(x, y);
    if !p.is_on_curve() || !p.is_in_correct_subgroup_assuming_on_curve() {
        return Err(serialization("G1 point is not on the curve"));
    }
    Ok(p)
}

fn g2_from_words(words: &[&[u8]]) -> Result<G2Affine> {
    let coord = |c1: &[u8], c0: &[u8]| -> Result<Fq2> {
        Ok(Fq2::new(scalar::from_bytes_be(c0)?, scalar::from_bytes_be(c1)?))
    };
    let (x, y) = (coord(words[0], words[1])?, coord(words[2], words[3])?);
    if x.is_zero() && y.is_zero() {
        return Ok(G2Affine::zero());
    }
    let p = G2Affine::new_unchecked(x, y);
    if !p.is_on_curve() || !p.is_in_correct_subgroup_assuming_on_curve() {
        return Err(serialization("G2 point is not on the curve"));
    }
    Ok(p)
}

impl Groth16Backend {
    pub fn verifying_key_json(&self, vk: &VerifyingKey<Bn254>) -> VerifyingKeyJson {
        VerifyingKeyJson {
            alpha: g1_decimal(&vk.alpha_g1),
            beta: g2_decimal(&vk.beta_g2),
            gamma: g2_decimal(&vk.gamma_g2),
            delta: g2_decimal(&vk.delta_g2),
            ic: vk.gamma_abc_g1.iter().map(g1_decimal).collect(),
        }
    }

    /// The proof as the 8 words a Solidity verifier decodes.
    pub fn proof_words(&self, proof: &Proof<Bn254>) -> [[u8; 32]; 8] {
        let word = |x: Fq| scalar::to_bytes_be(x);
        [
            word(proof.a.x),
            word(proof.a.y),
            word(proof.b.x.c1),
            word(proof.b.x.c0),
            word(proof.b.y.c1),
            word(proof.b.y.c0),
            word(proof.c.x),
            word(proof.c.y),
        ]
    }
}

impl ProvingSystem for Groth16Backend {
    type Field = Fr;
    type ProvingKey = ProvingKey<Bn254>;
    type VerifyingKey = VerifyingKey<Bn254>;
    type Proof = Proof<Bn254>;

    const KIND: ProvingSystemKind = ProvingSystemKind::Groth16;

    #[instrument(skip_all, name = "groth16_setup")]
    fn setup(
        &self,
        matrices: &ConstraintMatrices<Fr>,
    ) -> Result<(Self::ProvingKey, Self::VerifyingKey)> {
        let mut rng = rand::thread_rng();
        ArkGroth16::circuit_specific_setup(ReplayCircuit::setup(matrices), &mut rng)
            .map_err(|e| Error::Setup(e.to_string()))
    }

    #[instrument(skip_all, name = "groth16_prove")]
    fn prove(
        &self,
        pk: &Self::ProvingKey,
        matrices: &ConstraintMatrices<Fr>,
        assignment: &Assignment<Fr>,
    ) -> Result<Self::Proof> {
        let mut rng = rand::thread_rng();
        ArkGroth16::prove(pk, ReplayCircuit::prove(matrices, assignment), &mut rng)
            .map_err(|e| Error::ProofGeneration(e.to_string()))
    }

    fn verify(
        &self,
        vk: &Self::VerifyingKey,
        proof: &Self::Proof,
        public_inputs: &[Fr],
    ) -> Result<bool> {
        if public_inputs.len() + 1 != vk.gamma_abc_g1.len() {
            return Err(Error::length(
                "public inputs",
                vk.gamma_abc_g1.len().saturating_sub(1),
                public_inputs.len(),
            ));
        }
        let valid = ArkGroth16::verify(vk, public_inputs, proof).map_err(serialization)?;
        debug!(valid, "groth16 verify");
        Ok(valid)
    }

    fn export_verifier(
        &self,
        vk: &Self::VerifyingKey,
        num_public: usize,
        writer: &mut dyn Write,
    ) -> Result<()> {
        let source = solidity::groth16_verifier(&self.verifying_key_json(vk), num_public)?;
        writer.write_all(source.as_bytes()).map_err(serialization)
    }

    fn write_proving_key(&self, pk: &Self::ProvingKey, writer: &mut dyn Write) -> Result<()> {
        pk.serialize_uncompressed(writer).map_err(serialization)
    }

    /// Skips the curve and subgroup checks the verifying key gets. Proving keys are
    /// only read through [`crate::system::CircuitBuild::import`], after the circuit
    /// digest header has matched, and a bad key can only yield proofs that fail.
    fn read_proving_key(&self, reader: &mut dyn Read) -> Result<Self::ProvingKey> {
        ProvingKey::deserialize_uncompressed_unchecked(reader).map_err(serialization)
    }

    fn write_verifying_key(&self, vk: &Self::VerifyingKey, writer: &mut dyn Write) -> Result<()> {
        vk.serialize_uncompressed(writer).map_err(serialization)
    }

    fn read_verifying_key(&self, reader: &mut dyn Read) -> Result<Self::VerifyingKey> {
        VerifyingKey::deserialize_uncompressed(reader).map_err(serialization)
    }

    fn encode_proof(&self, proof: &Self::Proof) -> Result<Vec<u8>> {
        Ok(self.proof_words(proof).concat())
    }

    fn decode_proof(&self, bytes: &[u8]) -> Result<Self::Proof> {
        if bytes.len() != PROOF_BYTES {
            return Err(Error::length("groth16 proof bytes", PROOF_BYTES, bytes.len()));
        }
        let words: Vec<&[u8]> = bytes.chunks(32).collect();
        Ok(Proof {
            a: g1_from_words(words[0], words[1])?,
            b: g2_from_words(&words[2..6])?,
            c: g1_from_words(words[6], words[7])?,
        })
    }

    fn proof_json(
        &self,
        proof: &Self::Proof,
        input: &[u8],
        output: &[u8],
    ) -> Result<serde_json::Value> {
        let json = Groth16ProofJson {
            a: g1_decimal(&proof.a),
            b: g2_decimal(&proof.b),
            c: g1_decimal(&proof.c),
            input: input.to_vec(),
            output: output.to_vec(),
        };
        serde_json::to_value(json).map_err(serialization)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::ConstraintSystem;

    // x * y == z with z public
    fn product_circuit(x: u64, y: u64) -> (ConstraintMatrices<Fr>, Assignment<Fr>) {
        let mut cs = ConstraintSystem::setup();
        let z = cs.alloc_public(Some(Fr::from(x * y)));
        let x = cs.alloc_private(Some(Fr::from(x)));
        let y = cs.alloc_private(Some(Fr::from(y)));
        let xy = cs.mul(&x, &y);
        cs.assert_equal(&xy, &z);
        (cs.matrices().unwrap(), cs.assignment().unwrap())
    }

    #[test]
    fn test_setup_prove_verify() {
        let backend = Groth16Backend;
        let (matrices, assignment) = product_circuit(6, 7);
        let (pk, vk) = backend.setup(&matrices).unwrap();
        let proof = backend.prove(&pk, &matrices, &assignment).unwrap();

        assert!(backend.verify(&vk, &proof, &[Fr::from(42u64)]).unwrap());
        assert!(!backend.verify(&vk, &proof, &[Fr::from(43u64)]).unwrap());
        assert!(matches!(
            backend.verify(&vk, &proof, &[]),
            Err(Error::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_proof_bytes_round_trip() {
        let backend = Groth16Backend;
        let (matrices, assignment) = product_circuit(3, 5);
        let (pk, vk) = backend.setup(&matrices).unwrap();
        let proof = backend.prove(&pk, &matrices, &assignment).unwrap();

        let bytes = backend.encode_proof(&proof).unwrap();
        assert_eq!(bytes.len(), PROOF_BYTES);
        let decoded = backend.decode_proof(&bytes).unwrap();
        assert_eq!(decoded, proof);
        assert!(backend.verify(&vk, &decoded, &[Fr::from(15u64)]).unwrap());

        let mut corrupt = bytes.clone();
        corrupt[63] ^= 1;
        assert!(backend.decode_proof(&corrupt).is_err());
        assert!(backend.decode_proof(&bytes[..255]).is_err());
    }

    #[test]
    fn test_key_serialization() {
        let backend = Groth16Backend;
        let (matrices, _) = product_circuit(3, 5);
        let (pk, vk) = backend.setup(&matrices).unwrap();

        let mut buf = Vec::new();
        backend.write_verifying_key(&vk, &mut buf).unwrap();
        assert_eq!(backend.read_verifying_key(&mut &buf[..]).unwrap(), vk);

        let mut buf = Vec::new();
        backend.write_proving_key(&pk, &mut buf).unwrap();
        assert_eq!(backend.read_proving_key(&mut &buf[..]).unwrap(), pk);
    }

    #[test]
    fn test_json_layout() {
        let backend = Groth16Backend;
        let (matrices, assignment) = product_circuit(3, 5);
        let (pk, vk) = backend.setup(&matrices).unwrap();
        let proof = backend.prove(&pk, &matrices, &assignment).unwrap();

        let json = backend.proof_json(&proof, &[1, 2], &[3]).unwrap();
        assert_eq!(json["input"], "0x0102");
        assert_eq!(json["output"], "0x03");
        assert_eq!(json["b"][0][0], decimal(proof.b.x.c1));

        let vk_json = backend.verifying_key_json(&vk);
        assert_eq!(vk_json.ic.len(), 2);
        assert_eq!(vk_json.alpha[0], decimal(vk.alpha_g1.x));
    }
}
