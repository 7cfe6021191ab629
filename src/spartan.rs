//! Universal backend: Spartan over curve25519 with a transparent setup.
//!
//! Setup derives public generators from the circuit's dimensions and commits to the
//! constraint matrices once. The prover gets the commitment and its decommitment, the
//! verifier only the commitment.

use std::{
    io::{Read, Write},
    sync::Arc,
};

use ark_ed25519::Fr;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use libspartan::{
    ComputationCommitment, ComputationDecommitment, InputsAssignment, SNARKGens,
    VarsAssignment, SNARK,
};
use merlin::Transcript;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::{
    artifacts::{ArtifactLocation, SRS_FILE},
    config::ProvingSystemKind,
    error::{Error, Result},
    proof::ProofResult,
    r1cs::{Assignment, ConstraintMatrices, SpartanR1cs},
    scalar, solidity,
    system::ProvingSystem,
};

const TRANSCRIPT_LABEL: &[u8] = b"SNARK";

/// Circuit dimensions rounded up to powers of two. Stored as `srs.bin`, it bounds
/// the circuits a deployment accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniversalParams {
    pub num_cons: usize,
    pub num_vars: usize,
    pub num_inputs: usize,
    pub num_non_zero_entries: usize,
}

impl UniversalParams {
    pub fn for_circuit(matrices: &ConstraintMatrices<Fr>) -> Self {
        Self {
            num_cons: matrices.num_constraints().max(1).next_power_of_two(),
            num_vars: matrices
                .num_private
                .max(matrices.num_public + 1)
                .next_power_of_two(),
            num_inputs: matrices.num_public,
            num_non_zero_entries: matrices.num_non_zero_entries().max(1).next_power_of_two(),
        }
    }

    /// Whether a circuit with dimensions `other` fits within these.
    pub fn covers(&self, other: &Self) -> bool {
        self.num_cons >= other.num_cons
            && self.num_vars >= other.num_vars
            && self.num_inputs >= other.num_inputs
            && self.num_non_zero_entries >= other.num_non_zero_entries
    }
}

pub fn save_srs(location: &ArtifactLocation, params: &UniversalParams) -> Result<()> {
    location.create()?;
    location.save_bincode(SRS_FILE, params)
}

pub fn load_srs(location: &ArtifactLocation) -> Result<UniversalParams> {
    location.load_bincode(SRS_FILE)
}

pub struct SpartanProvingKey {
    params: UniversalParams,
    matrices: ConstraintMatrices<Fr>,
    r1cs: SpartanR1cs,
    gens: Arc<SNARKGens>,
    comm: Arc<ComputationCommitment>,
    decomm: ComputationDecommitment,
}

impl SpartanProvingKey {
    pub fn params(&self) -> UniversalParams {
        self.params
    }
}

pub struct SpartanVerifyingKey {
    params: UniversalParams,
    matrices: ConstraintMatrices<Fr>,
    gens: Arc<SNARKGens>,
    comm: Arc<ComputationCommitment>,
}

impl SpartanVerifyingKey {
    pub fn params(&self) -> UniversalParams {
        self.params
    }

    pub fn num_inputs(&self) -> usize {
        self.matrices.num_public
    }
}

#[derive(Debug, Clone, Default)]
pub struct SpartanBackend {
    srs: Option<UniversalParams>,
}

fn serialization(e: impl ToString) -> Error {
    Error::Serialization(e.to_string())
}

struct Encoded {
    r1cs: SpartanR1cs,
    gens: SNARKGens,
    comm: ComputationCommitment,
    decomm: ComputationDecommitment,
}

fn encode(matrices: &ConstraintMatrices<Fr>) -> Result<Encoded> {
    let r1cs = matrices.into_spartan()?;
    let gens = SNARKGens::new(
        r1cs.num_consts,
        r1cs.num_vars,
        r1cs.num_inputs,
        r1cs.num_non_zero_entries,
    );
    let (comm, decomm) = SNARK::encode(&r1cs.instance, &gens);
    Ok(Encoded {
        r1cs,
        gens,
        comm,
        decomm,
    })
}

fn write_parts(
    params: &UniversalParams,
    matrices: &ConstraintMatrices<Fr>,
    writer: &mut dyn Write,
) -> Result<()> {
    bincode::serialize_into(&mut *writer, params).map_err(serialization)?;
    matrices.serialize_uncompressed(writer).map_err(serialization)
}

fn read_parts(reader: &mut dyn Read) -> Result<(UniversalParams, ConstraintMatrices<Fr>)> {
    let params: UniversalParams = bincode::deserialize_from(&mut *reader).map_err(serialization)?;
    let matrices = ConstraintMatrices::deserialize_uncompressed(reader).map_err(serialization)?;
    if UniversalParams::for_circuit(&matrices) != params {
        return Err(serialization("key parameters do not match its constraint matrices"));
    }
    Ok((params, matrices))
}

fn scalars(values: &[Fr]) -> Result<Vec<[u8; 32]>> {
    values.iter().map(|x| scalar::to_dalek_bytes(*x)).collect()
}

impl SpartanBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend that refuses circuits larger than `srs`.
    pub fn with_srs(srs: UniversalParams) -> Self {
        Self { srs: Some(srs) }
    }

    pub fn srs(&self) -> Option<&UniversalParams> {
        self.srs.as_ref()
    }

    /// SHA-256 of the serialized verifying key; pinned by the on-chain adapter.
    pub fn verifying_key_hash(&self, vk: &SpartanVerifyingKey) -> Result<[u8; 32]> {
        let mut bytes = Vec::new();
        self.write_verifying_key(vk, &mut bytes)?;
        Ok(scalar::sha256(&bytes))
    }
}

impl ProvingSystem for SpartanBackend {
    type Field = Fr;
    type ProvingKey = SpartanProvingKey;
    type VerifyingKey = SpartanVerifyingKey;
    type Proof = SNARK;

    const KIND: ProvingSystemKind = ProvingSystemKind::Spartan;

    #[instrument(skip_all, name = "spartan_setup")]
    fn setup(
        &self,
        matrices: &ConstraintMatrices<Fr>,
    ) -> Result<(Self::ProvingKey, Self::VerifyingKey)> {
        let params = UniversalParams::for_circuit(matrices);
        match &self.srs {
            Some(srs) if !srs.covers(&params) => {
                return Err(Error::Setup(format!(
                    "circuit needs {params:?}, universal parameters only cover {srs:?}"
                )));
            }
            Some(_) => {}
            None => warn!("no universal parameters loaded, sizing generators to the circuit"),
        }

        let Encoded {
            r1cs,
            gens,
            comm,
            decomm,
        } = encode(matrices)?;
        info!(?params, "committed to constraint matrices");
        let (gens, comm) = (Arc::new(gens), Arc::new(comm));
        let vk = SpartanVerifyingKey {
            params,
            matrices: matrices.clone(),
            gens: Arc::clone(&gens),
            comm: Arc::clone(&comm),
        };
        let pk = SpartanProvingKey {
            params,
            matrices: matrices.clone(),
            r1cs,
            gens,
            comm,
            decomm,
        };
        Ok((pk, vk))
    }

    #[instrument(skip_all, name = "spartan_prove")]
    fn prove(
        &self,
        pk: &Self::ProvingKey,
        _matrices: &ConstraintMatrices<Fr>,
        assignment: &Assignment<Fr>,
    ) -> Result<Self::Proof> {
        let vars = VarsAssignment::new(&scalars(&assignment.private)?)
            .map_err(|e| Error::ProofGeneration(format!("{e:?}")))?;
        let inputs = InputsAssignment::new(&scalars(&assignment.public)?)
            .map_err(|e| Error::ProofGeneration(format!("{e:?}")))?;

        let mut transcript = Transcript::new(TRANSCRIPT_LABEL);
        Ok(SNARK::prove(
            &pk.r1cs.instance,
            &pk.comm,
            &pk.decomm,
            vars,
            &inputs,
            &pk.gens,
            &mut transcript,
        ))
    }

    fn verify(
        &self,
        vk: &Self::VerifyingKey,
        proof: &Self::Proof,
        public_inputs: &[Fr],
    ) -> Result<bool> {
        if public_inputs.len() != vk.num_inputs() {
            return Err(Error::length(
                "public inputs",
                vk.num_inputs(),
                public_inputs.len(),
            ));
        }
        let inputs = InputsAssignment::new(&scalars(public_inputs)?)
            .map_err(|e| Error::Serialization(format!("{e:?}")))?;
        let mut transcript = Transcript::new(TRANSCRIPT_LABEL);
        match proof.verify(&vk.comm, &inputs, &mut transcript, &vk.gens) {
            Ok(()) => Ok(true),
            Err(err) => {
                debug!(?err, "spartan proof rejected");
                Ok(false)
            }
        }
    }

    fn export_verifier(
        &self,
        vk: &Self::VerifyingKey,
        num_public: usize,
        writer: &mut dyn Write,
    ) -> Result<()> {
        let source = solidity::universal_adapter(
            self.verifying_key_hash(vk)?,
            num_public,
            scalar::commitment_limbs::<Fr>(),
        )?;
        writer.write_all(source.as_bytes()).map_err(serialization)
    }

    fn write_proving_key(&self, pk: &Self::ProvingKey, writer: &mut dyn Write) -> Result<()> {
        write_parts(&pk.params, &pk.matrices, writer)
    }

    fn read_proving_key(&self, reader: &mut dyn Read) -> Result<Self::ProvingKey> {
        let (params, matrices) = read_parts(reader)?;
        let Encoded {
            r1cs,
            gens,
            comm,
            decomm,
        } = encode(&matrices)?;
        Ok(SpartanProvingKey {
            params,
            matrices,
            r1cs,
            gens: Arc::new(gens),
            comm: Arc::new(comm),
            decomm,
        })
    }

    fn write_verifying_key(&self, vk: &Self::VerifyingKey, writer: &mut dyn Write) -> Result<()> {
        write_parts(&vk.params, &vk.matrices, writer)
    }

    fn read_verifying_key(&self, reader: &mut dyn Read) -> Result<Self::VerifyingKey> {
        let (params, matrices) = read_parts(reader)?;
        let Encoded { gens, comm, .. } = encode(&matrices)?;
        Ok(SpartanVerifyingKey {
            params,
            matrices,
            gens: Arc::new(gens),
            comm: Arc::new(comm),
        })
    }

    fn encode_proof(&self, proof: &Self::Proof) -> Result<Vec<u8>> {
        bincode::serialize(proof).map_err(serialization)
    }

    fn decode_proof(&self, bytes: &[u8]) -> Result<Self::Proof> {
        bincode::deserialize(bytes).map_err(serialization)
    }

    fn proof_json(
        &self,
        proof: &Self::Proof,
        _input: &[u8],
        output: &[u8],
    ) -> Result<serde_json::Value> {
        let record = ProofResult {
            proof: self.encode_proof(proof)?,
            output: output.to_vec(),
        };
        serde_json::to_value(record).map_err(serialization)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{ConstraintSystem, Variable};

    fn fr(x: u64) -> Fr {
        Fr::from(x)
    }

    // v0 = 30 * i0
    // v1 = v0 * i1
    fn mult_circuit(i0: u64, i1: u64) -> (ConstraintMatrices<Fr>, Assignment<Fr>) {
        let mut cs = ConstraintSystem::setup();
        let i0 = cs.alloc_public(Some(fr(i0)));
        let i1 = cs.alloc_public(Some(fr(i1)));
        let thirty = cs.alloc_private(Some(fr(30)));
        cs.assert_equal(&thirty, &Variable::constant(fr(30)));
        let v0 = cs.mul(&thirty, &i0);
        cs.mul(&v0, &i1);
        (cs.matrices().unwrap(), cs.assignment().unwrap())
    }

    #[test]
    fn test_setup_prove_verify() {
        let backend = SpartanBackend::new();
        let (matrices, assignment) = mult_circuit(5, 6);
        let (pk, vk) = backend.setup(&matrices).unwrap();
        let proof = backend.prove(&pk, &matrices, &assignment).unwrap();

        assert!(backend.verify(&vk, &proof, &[fr(5), fr(6)]).unwrap());
        assert!(!backend.verify(&vk, &proof, &[fr(5), fr(7)]).unwrap());
        assert!(matches!(
            backend.verify(&vk, &proof, &[fr(5)]),
            Err(Error::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_srs_bounds_circuit_size() {
        let (matrices, _) = mult_circuit(5, 6);
        let needed = UniversalParams::for_circuit(&matrices);
        assert_eq!(needed.num_cons, 4);
        assert_eq!(needed.num_vars, 4);
        assert_eq!(needed.num_inputs, 2);

        let small = UniversalParams {
            num_cons: 2,
            ..needed
        };
        assert!(!small.covers(&needed));
        assert!(matches!(
            SpartanBackend::with_srs(small).setup(&matrices),
            Err(Error::Setup(_))
        ));

        let large = UniversalParams {
            num_cons: 1 << 10,
            num_vars: 1 << 10,
            num_inputs: 2,
            num_non_zero_entries: 1 << 10,
        };
        assert!(SpartanBackend::with_srs(large).setup(&matrices).is_ok());
    }

    #[test]
    fn test_keys_and_proof_round_trip() {
        let backend = SpartanBackend::new();
        let (matrices, assignment) = mult_circuit(2, 9);
        let (pk, vk) = backend.setup(&matrices).unwrap();

        let mut pk_bytes = Vec::new();
        backend.write_proving_key(&pk, &mut pk_bytes).unwrap();
        let mut vk_bytes = Vec::new();
        backend.write_verifying_key(&vk, &mut vk_bytes).unwrap();
        let pk = backend.read_proving_key(&mut &pk_bytes[..]).unwrap();
        let vk = backend.read_verifying_key(&mut &vk_bytes[..]).unwrap();

        let proof = backend.prove(&pk, &matrices, &assignment).unwrap();
        let bytes = backend.encode_proof(&proof).unwrap();
        let proof = backend.decode_proof(&bytes).unwrap();
        assert!(backend.verify(&vk, &proof, &[fr(2), fr(9)]).unwrap());

        assert!(backend.decode_proof(&bytes[..bytes.len() / 2]).is_err());
        assert!(backend.read_verifying_key(&mut &vk_bytes[..8]).is_err());
    }

    #[test]
    fn test_srs_file() {
        let dir = tempfile::tempdir().unwrap();
        let location = ArtifactLocation::new(dir.path());
        let (matrices, _) = mult_circuit(1, 1);
        let params = UniversalParams::for_circuit(&matrices);
        save_srs(&location, &params).unwrap();
        assert_eq!(load_srs(&location).unwrap(), params);
    }

    #[test]
    fn test_export_pins_key_hash() {
        let backend = SpartanBackend::new();
        let mut cs = ConstraintSystem::setup();
        let publics: Vec<_> = (0..4).map(|_| cs.alloc_public(None)).collect();
        cs.mul(&publics[0], &publics[1]);
        cs.mul(&publics[2], &publics[3]);
        let (_, vk) = backend.setup(&cs.matrices().unwrap()).unwrap();

        let mut source = Vec::new();
        backend.export_verifier(&vk, 4, &mut source).unwrap();
        let source = String::from_utf8(source).unwrap();
        let hash = hex::encode(backend.verifying_key_hash(&vk).unwrap());
        assert!(source.contains(&format!("0x{hash}")));
        assert!(source.contains("input[3] = uint256(_outputHash) & ((1 << 128) - 1);"));

        assert!(backend.export_verifier(&vk, 2, &mut Vec::new()).is_err());
    }
}
