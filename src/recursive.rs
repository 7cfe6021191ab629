use std::{marker::PhantomData, path::Path};

use ark_ff::PrimeField;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::{
    artifacts::{ArtifactLocation, PROOF_WITH_PUBLIC_INPUTS_FILE, VERIFIER_DATA_FILE},
    circuit::{ConstraintSystem, Synthesize, Variable},
    error::{Error, Result},
    function::alloc_commitment,
    proof::RecursiveProofRecord,
    scalar::{self, COMMITMENT_BITS},
    sha,
    vars::{Bit, Byte},
};

pub const NUM_LIMBS: usize = 64;

#[derive(Debug, Clone)]
pub struct VerifiedProof<F: PrimeField> {
    pub public_inputs: Vec<Variable<F>>,
    pub circuit_digest: Variable<F>,
}

pub trait VerifierChip<F: PrimeField> {
    type Proof: DeserializeOwned;
    type VerifierData: DeserializeOwned;

    fn public_input_limbs(&self, proof: &Self::Proof) -> Vec<F>;

    fn circuit_digest(&self, data: &Self::VerifierData) -> F;

    /// Lays out the verification. `proof` is `None` while compiling.
    fn verify(
        &self,
        cs: &mut ConstraintSystem<F>,
        proof: Option<&Self::Proof>,
        data: &Self::VerifierData,
    ) -> Result<VerifiedProof<F>>;
}

/// Public signals, in column order: `[VerifierDigest, InputHash, OutputHash]`. The
/// hashes take one or two elements each, as in a circuit function.
pub struct RecursiveVerifierCircuit<F: PrimeField, V: VerifierChip<F>> {
    chip: V,
    data: V::VerifierData,
    proof: Option<V::Proof>,
    _field: PhantomData<F>,
}

fn limb_byte<F: PrimeField>(limb: F) -> Result<u8> {
    let value = scalar::to_biguint(limb);
    u8::try_from(&value).map_err(|_| Error::Range {
        what: "public input limb",
        value: value.to_string(),
    })
}

/// The inner proof commits to digests already truncated to the commitment width.
fn limb_digest(bytes: &[u8]) -> Result<[u8; 32]> {
    let digest: [u8; 32] = bytes
        .try_into()
        .map_err(|_| Error::length("digest limbs", 32, bytes.len()))?;
    if scalar::truncate_digest(digest, COMMITMENT_BITS) != digest {
        return Err(Error::Range {
            what: "truncated digest limbs",
            value: format!("0x{}", hex::encode(digest)),
        });
    }
    Ok(digest)
}

/// Packs 32 big-endian byte limbs. Bits above the commitment width must be zero.
fn pack_digest<F: PrimeField>(
    cs: &mut ConstraintSystem<F>,
    limbs: &[Byte<F>],
) -> Result<Vec<Variable<F>>> {
    let mut bits: Vec<Bit<F>> = Vec::with_capacity(256);
    for limb in limbs {
        bits.extend(limb.to_bits_be(cs)?);
    }
    let (dropped, kept) = bits.split_at(bits.len().saturating_sub(COMMITMENT_BITS));
    for bit in dropped {
        bit.assert_equal(cs, &Bit::zero());
    }
    sha::pack_commitment(kept)
}

struct Signals<F: PrimeField> {
    verifier_digest: F,
    input: [u8; 32],
    output: [u8; 32],
}

impl<F: PrimeField> Signals<F> {
    fn public_inputs(&self) -> Vec<F> {
        let mut out = vec![self.verifier_digest];
        out.extend(scalar::commitment_elements::<F>(&self.input));
        out.extend(scalar::commitment_elements::<F>(&self.output));
        out
    }
}

impl<F: PrimeField, V: VerifierChip<F>> RecursiveVerifierCircuit<F, V> {
    pub fn new(chip: V, data: V::VerifierData) -> Self {
        Self {
            chip,
            data,
            proof: None,
            _field: PhantomData,
        }
    }

    pub fn with_proof(chip: V, data: V::VerifierData, proof: V::Proof) -> Self {
        Self {
            chip,
            data,
            proof: Some(proof),
            _field: PhantomData,
        }
    }

    #[instrument(skip_all, fields(dir = %dir.as_ref().display()))]
    pub fn from_dir(chip: V, dir: impl AsRef<Path>) -> Result<Self> {
        let location = ArtifactLocation::new(dir.as_ref());
        let proof = location.read_json(PROOF_WITH_PUBLIC_INPUTS_FILE)?;
        let data = location.read_json(VERIFIER_DATA_FILE)?;
        debug!("loaded inner proof");
        Ok(Self::with_proof(chip, data, proof))
    }

    pub fn proof(&self) -> Option<&V::Proof> {
        self.proof.as_ref()
    }

    pub fn set_proof(&mut self, proof: V::Proof) {
        self.proof = Some(proof);
    }

    fn signals(&self, proof: &V::Proof) -> Result<Signals<F>> {
        let limbs = self.chip.public_input_limbs(proof);
        if limbs.len() != NUM_LIMBS {
            return Err(Error::length("public input limbs", NUM_LIMBS, limbs.len()));
        }
        let bytes = limbs
            .into_iter()
            .map(limb_byte)
            .collect::<Result<Vec<u8>>>()?;
        Ok(Signals {
            verifier_digest: self.chip.circuit_digest(&self.data),
            input: limb_digest(&bytes[..32])?,
            output: limb_digest(&bytes[32..])?,
        })
    }

    pub fn public_inputs(&self) -> Result<Vec<F>> {
        let proof = self.proof.as_ref().ok_or(Error::MissingWitness("inner proof"))?;
        Ok(self.signals(proof)?.public_inputs())
    }

    pub fn record(&self, proof: Vec<u8>) -> Result<RecursiveProofRecord> {
        let inner = self.proof.as_ref().ok_or(Error::MissingWitness("inner proof"))?;
        let signals = self.signals(inner)?;
        Ok(RecursiveProofRecord {
            input_hash: signals.input.to_vec(),
            output_hash: signals.output.to_vec(),
            verifier_digest: scalar::to_bytes_be(signals.verifier_digest).to_vec(),
            proof,
        })
    }
}

impl<F: PrimeField, V: VerifierChip<F>> Synthesize<F> for RecursiveVerifierCircuit<F, V> {
    fn synthesize(&self, cs: &mut ConstraintSystem<F>) -> Result<()> {
        let signals = self.proof.as_ref().map(|p| self.signals(p)).transpose()?;
        let verifier_digest = cs.alloc_public(signals.as_ref().map(|s| s.verifier_digest));
        let input_hash = alloc_commitment(
            cs,
            signals.as_ref().map(|s| scalar::commitment_elements(&s.input)),
        );
        let output_hash = alloc_commitment(
            cs,
            signals.as_ref().map(|s| scalar::commitment_elements(&s.output)),
        );

        let verified = self.chip.verify(cs, self.proof.as_ref(), &self.data)?;
        if verified.public_inputs.len() != NUM_LIMBS {
            return Err(Error::length(
                "public input limbs",
                NUM_LIMBS,
                verified.public_inputs.len(),
            ));
        }
        let limbs = verified
            .public_inputs
            .into_iter()
            .map(|v| Byte::from_variable(cs, v))
            .collect::<Result<Vec<_>>>()?;

        let input_digest = pack_digest(cs, &limbs[..32])?;
        for (digest, public) in input_digest.iter().zip(&input_hash) {
            cs.assert_equal(digest, public);
        }
        let output_digest = pack_digest(cs, &limbs[32..])?;
        for (digest, public) in output_digest.iter().zip(&output_hash) {
            cs.assert_equal(digest, public);
        }
        cs.assert_equal(&verified.circuit_digest, &verifier_digest);
        Ok(())
    }
}
