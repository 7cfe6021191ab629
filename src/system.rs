//! Backend-agnostic build, prove, verify and export.

use std::{
    io::{Read, Write},
    sync::Arc,
};

use ark_ff::PrimeField;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use tracing::{info, instrument};

use crate::{
    artifacts::{
        ArtifactLocation, FIXTURE_FILE, MANIFEST_FILE, PROOF_FILE, PROOF_JSON_FILE,
        PROVING_KEY_FILE, PUBLIC_WITNESS_FILE, R1CS_FILE, VERIFYING_KEY_FILE,
    },
    circuit::{ConstraintSystem, Synthesize},
    config::{BuildManifest, ProvingSystemKind},
    error::{Error, Result},
    proof::{Fixture, PublicWitness},
    r1cs::{Assignment, ConstraintMatrices},
    scalar,
};

mod private {
    pub trait Sealed {}

    impl Sealed for crate::groth16::Groth16Backend {}
    impl Sealed for crate::spartan::SpartanBackend {}
}

/// A proving backend. Implemented by [`crate::groth16::Groth16Backend`] and
/// [`crate::spartan::SpartanBackend`] only.
pub trait ProvingSystem: private::Sealed {
    type Field: PrimeField;
    type ProvingKey: Send + Sync;
    type VerifyingKey: Send + Sync;
    type Proof;

    const KIND: ProvingSystemKind;

    fn setup(
        &self,
        matrices: &ConstraintMatrices<Self::Field>,
    ) -> Result<(Self::ProvingKey, Self::VerifyingKey)>;

    fn prove(
        &self,
        pk: &Self::ProvingKey,
        matrices: &ConstraintMatrices<Self::Field>,
        assignment: &Assignment<Self::Field>,
    ) -> Result<Self::Proof>;

    /// `Ok(false)` for a proof that does not verify against `public_inputs`.
    fn verify(
        &self,
        vk: &Self::VerifyingKey,
        proof: &Self::Proof,
        public_inputs: &[Self::Field],
    ) -> Result<bool>;

    fn export_verifier(
        &self,
        vk: &Self::VerifyingKey,
        num_public: usize,
        writer: &mut dyn Write,
    ) -> Result<()>;

    fn write_proving_key(&self, pk: &Self::ProvingKey, writer: &mut dyn Write) -> Result<()>;

    fn read_proving_key(&self, reader: &mut dyn Read) -> Result<Self::ProvingKey>;

    fn write_verifying_key(&self, vk: &Self::VerifyingKey, writer: &mut dyn Write) -> Result<()>;

    fn read_verifying_key(&self, reader: &mut dyn Read) -> Result<Self::VerifyingKey>;

    fn encode_proof(&self, proof: &Self::Proof) -> Result<Vec<u8>>;

    fn decode_proof(&self, bytes: &[u8]) -> Result<Self::Proof>;

    fn proof_json(
        &self,
        proof: &Self::Proof,
        input: &[u8],
        output: &[u8],
    ) -> Result<serde_json::Value>;
}

fn write_io(writer: &mut dyn Write, bytes: &[u8]) -> Result<()> {
    writer
        .write_all(bytes)
        .map_err(|e| Error::Serialization(e.to_string()))
}

pub struct CircuitBuild<S: ProvingSystem> {
    matrices: Arc<ConstraintMatrices<S::Field>>,
    pk: Arc<S::ProvingKey>,
    vk: Arc<S::VerifyingKey>,
    digest: [u8; 32],
}

impl<S: ProvingSystem> Clone for CircuitBuild<S> {
    fn clone(&self) -> Self {
        Self {
            matrices: Arc::clone(&self.matrices),
            pk: Arc::clone(&self.pk),
            vk: Arc::clone(&self.vk),
            digest: self.digest,
        }
    }
}

impl<S: ProvingSystem> CircuitBuild<S> {
    #[instrument(skip_all, fields(system = %S::KIND))]
    pub fn build(system: &S, circuit: &impl Synthesize<S::Field>) -> Result<Self> {
        let mut cs = ConstraintSystem::setup();
        circuit.synthesize(&mut cs)?;
        let matrices = cs.matrices()?;
        info!(
            constraints = matrices.num_constraints(),
            public = matrices.num_public,
            private = matrices.num_private,
            non_zero = matrices.num_non_zero_entries(),
            "compiled circuit"
        );
        let (pk, vk) = system.setup(&matrices)?;
        let digest = matrices.digest()?;
        info!(digest = %hex::encode(digest), "setup complete");
        Ok(Self {
            matrices: Arc::new(matrices),
            pk: Arc::new(pk),
            vk: Arc::new(vk),
            digest,
        })
    }

    pub fn matrices(&self) -> &ConstraintMatrices<S::Field> {
        &self.matrices
    }

    pub fn proving_key(&self) -> &S::ProvingKey {
        &self.pk
    }

    pub fn verifying_key(&self) -> &S::VerifyingKey {
        &self.vk
    }

    pub fn digest(&self) -> [u8; 32] {
        self.digest
    }

    pub fn num_public(&self) -> usize {
        self.matrices.num_public
    }

    pub fn manifest(&self) -> BuildManifest {
        BuildManifest {
            system: S::KIND,
            circuit_digest: hex::encode(self.digest),
            num_public: self.matrices.num_public,
            num_private: self.matrices.num_private,
            num_constraints: self.matrices.num_constraints(),
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Writes `r1cs.bin`, `pk.bin`, `vk.bin` and `manifest.json`, all or none. Key
    /// files start with the circuit digest they belong to.
    #[instrument(skip_all, fields(dir = %location.dir().display()))]
    pub fn export(&self, system: &S, location: &ArtifactLocation) -> Result<()> {
        location.write_staged(|staging| {
            staging.write_with(R1CS_FILE, |w| {
                self.matrices
                    .serialize_uncompressed(w)
                    .map_err(|e| Error::Serialization(e.to_string()))
            })?;
            staging.write_with(PROVING_KEY_FILE, |w| {
                write_io(w, &self.digest)?;
                system.write_proving_key(&self.pk, w)
            })?;
            staging.write_with(VERIFYING_KEY_FILE, |w| {
                write_io(w, &self.digest)?;
                system.write_verifying_key(&self.vk, w)
            })?;
            staging.write_json(MANIFEST_FILE, &self.manifest())
        })?;
        info!("exported build artifacts");
        Ok(())
    }

    fn read_key<K>(
        location: &ArtifactLocation,
        name: &str,
        digest: &[u8; 32],
        read: impl FnOnce(&mut dyn Read) -> Result<K>,
    ) -> Result<K> {
        location.read_with(name, |r| {
            let mut header = [0u8; 32];
            r.read_exact(&mut header)
                .map_err(|e| Error::Serialization(e.to_string()))?;
            if &header != digest {
                return Err(Error::decode(
                    location.path(name),
                    "key belongs to a different circuit",
                ));
            }
            read(r)
        })
    }

    #[instrument(skip_all, fields(dir = %location.dir().display()))]
    pub fn import(system: &S, location: &ArtifactLocation) -> Result<Self> {
        let manifest: BuildManifest = location.read_json(MANIFEST_FILE)?;
        if manifest.system != S::KIND {
            return Err(Error::BackendMismatch {
                expected: S::KIND.to_string(),
                found: manifest.system.to_string(),
            });
        }

        let matrices = location.read_with(R1CS_FILE, |r| {
            ConstraintMatrices::<S::Field>::deserialize_uncompressed(r)
                .map_err(|e| Error::Serialization(e.to_string()))
        })?;
        let digest = matrices.digest()?;
        if hex::encode(digest) != manifest.circuit_digest {
            return Err(Error::decode(
                location.path(R1CS_FILE),
                "digest does not match manifest",
            ));
        }

        let pk = Self::read_key(location, PROVING_KEY_FILE, &digest, |r| {
            system.read_proving_key(r)
        })?;
        let vk = Self::read_key(location, VERIFYING_KEY_FILE, &digest, |r| {
            system.read_verifying_key(r)
        })?;
        info!(constraints = matrices.num_constraints(), "imported build artifacts");
        Ok(Self {
            matrices: Arc::new(matrices),
            pk: Arc::new(pk),
            vk: Arc::new(vk),
            digest,
        })
    }

    /// Synthesizes `circuit` with its witness, checks the assignment against the
    /// build's own matrices and proves it. Returns the proof and its public inputs.
    #[instrument(skip_all, fields(system = %S::KIND))]
    pub fn prove(
        &self,
        system: &S,
        circuit: &impl Synthesize<S::Field>,
    ) -> Result<(S::Proof, Vec<S::Field>)> {
        let mut cs = ConstraintSystem::prove();
        circuit.synthesize(&mut cs)?;
        let assignment = cs.assignment()?;
        if assignment.public.len() != self.matrices.num_public {
            return Err(Error::length(
                "public inputs",
                self.matrices.num_public,
                assignment.public.len(),
            ));
        }
        if assignment.private.len() != self.matrices.num_private {
            return Err(Error::length(
                "private witnesses",
                self.matrices.num_private,
                assignment.private.len(),
            ));
        }
        self.matrices.is_satisfied(&assignment)?;

        let proof = system.prove(&self.pk, &self.matrices, &assignment)?;
        info!("proof generated");
        Ok((proof, assignment.public))
    }

    pub fn verify(&self, system: &S, proof: &S::Proof, public_inputs: &[S::Field]) -> Result<bool> {
        let valid = system.verify(&self.vk, proof, public_inputs)?;
        info!(valid, "verified proof");
        Ok(valid)
    }

    pub fn export_verifier(&self, system: &S, writer: &mut dyn Write) -> Result<()> {
        system.export_verifier(&self.vk, self.matrices.num_public, writer)
    }
}

pub struct FunctionProof<S: ProvingSystem> {
    pub proof: S::Proof,
    pub public_inputs: Vec<S::Field>,
    pub input: Vec<u8>,
    pub output: Vec<u8>,
}

impl<S: ProvingSystem> FunctionProof<S> {
    pub fn fixture(&self) -> Fixture {
        Fixture {
            input: self.input.clone(),
            output: self.output.clone(),
        }
    }

    pub fn public_witness(&self) -> PublicWitness {
        PublicWitness {
            inputs: self
                .public_inputs
                .iter()
                .map(|x| scalar::to_bytes_be(*x).to_vec())
                .collect(),
        }
    }

    pub fn export(&self, system: &S, location: &ArtifactLocation) -> Result<()> {
        location.write_staged(|staging| {
            staging.write_bytes(PROOF_FILE, &system.encode_proof(&self.proof)?)?;
            staging.write_json(
                PROOF_JSON_FILE,
                &system.proof_json(&self.proof, &self.input, &self.output)?,
            )?;
            staging.write_json(PUBLIC_WITNESS_FILE, &self.public_witness())?;
            staging.write_json(FIXTURE_FILE, &self.fixture())
        })?;
        info!(dir = %location.dir().display(), "exported proof");
        Ok(())
    }

    pub fn import(system: &S, location: &ArtifactLocation) -> Result<Self> {
        let proof = system
            .decode_proof(&location.read_bytes(PROOF_FILE)?)
            .map_err(|e| Error::decode(location.path(PROOF_FILE), e))?;
        let witness: PublicWitness = location.read_json(PUBLIC_WITNESS_FILE)?;
        let public_inputs = witness
            .inputs
            .iter()
            .map(|bytes| scalar::from_bytes_be(bytes))
            .collect::<Result<Vec<_>>>()
            .map_err(|e| Error::decode(location.path(PUBLIC_WITNESS_FILE), e))?;
        let fixture: Fixture = location.read_json(FIXTURE_FILE)?;
        Ok(Self {
            proof,
            public_inputs,
            input: fixture.input,
            output: fixture.output,
        })
    }

    /// Checks the proof and that its public inputs commit to `input` and `output`.
    pub fn verify(&self, system: &S, build: &CircuitBuild<S>) -> Result<bool> {
        let expected = [
            scalar::hash_commitment::<S::Field>(&self.input),
            scalar::hash_commitment::<S::Field>(&self.output),
        ]
        .concat();
        if self.public_inputs != expected {
            return Ok(false);
        }
        build.verify(system, &self.proof, &self.public_inputs)
    }
}
