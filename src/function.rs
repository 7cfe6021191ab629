use std::marker::PhantomData;

use ark_ff::PrimeField;
use tracing::{info, instrument};

use crate::{
    circuit::{ConstraintSystem, Synthesize, Variable},
    error::{Error, Result},
    io::{InputReader, OutputWriter},
    proof::Fixture,
    scalar,
    sha,
    system::{CircuitBuild, FunctionProof, ProvingSystem},
    vars::Byte,
};

/// The computation a circuit function wraps.
///
/// `set_witness` computes the output on the host and stores whatever private values
/// `define` needs; `define` must constrain exactly that computation.
pub trait Circuit<F: PrimeField> {
    fn input_len(&self) -> usize;

    fn output_len(&self) -> usize;

    fn set_witness(&mut self, input: &[u8]) -> Result<Vec<u8>>;

    fn define(
        &self,
        cs: &mut ConstraintSystem<F>,
        input: &mut InputReader<F>,
        output: &mut OutputWriter<F>,
    ) -> Result<()>;
}

pub(crate) fn alloc_commitment<F: PrimeField>(
    cs: &mut ConstraintSystem<F>,
    values: Option<Vec<F>>,
) -> Vec<Variable<F>> {
    (0..scalar::commitment_limbs::<F>())
        .map(|i| cs.alloc_public(values.as_ref().map(|v| v[i])))
        .collect()
}

/// Public signals, in column order: `[InputHash, OutputHash]`, each one or two
/// elements wide.
pub struct CircuitFunction<F: PrimeField, C: Circuit<F>> {
    circuit: C,
    input: Option<Vec<u8>>,
    output: Option<Vec<u8>>,
    _field: PhantomData<F>,
}

impl<F: PrimeField, C: Circuit<F>> CircuitFunction<F, C> {
    pub fn new(circuit: C) -> Self {
        Self {
            circuit,
            input: None,
            output: None,
            _field: PhantomData,
        }
    }

    pub fn circuit(&self) -> &C {
        &self.circuit
    }

    pub fn input(&self) -> Option<&[u8]> {
        self.input.as_deref()
    }

    pub fn output(&self) -> Option<&[u8]> {
        self.output.as_deref()
    }

    pub fn set_witness(&mut self, input: &[u8]) -> Result<()> {
        if input.len() != self.circuit.input_len() {
            return Err(Error::length("function input", self.circuit.input_len(), input.len()));
        }
        let output = self.circuit.set_witness(input)?;
        if output.len() != self.circuit.output_len() {
            return Err(Error::length("function output", self.circuit.output_len(), output.len()));
        }
        self.input = Some(input.to_vec());
        self.output = Some(output);
        Ok(())
    }

    pub fn input_hash(&self) -> Option<Vec<F>> {
        self.input.as_deref().map(scalar::hash_commitment)
    }

    pub fn output_hash(&self) -> Option<Vec<F>> {
        self.output.as_deref().map(scalar::hash_commitment)
    }

    pub fn public_inputs(&self) -> Result<Vec<F>> {
        let input = self.input_hash().ok_or(Error::MissingWitness("input hash"))?;
        let output = self.output_hash().ok_or(Error::MissingWitness("output hash"))?;
        Ok([input, output].concat())
    }


    fn alloc_buffer(
        cs: &mut ConstraintSystem<F>,
        len: usize,
        values: Option<&[u8]>,
    ) -> Result<Vec<Byte<F>>> {
        (0..len)
            .map(|i| Byte::alloc(cs, values.map(|v| v[i])))
            .collect()
    }

    fn synthesize_output(&self, cs: &mut ConstraintSystem<F>) -> Result<Vec<Byte<F>>> {
        let input_hash = alloc_commitment(cs, self.input_hash());
        let output_hash = alloc_commitment(cs, self.output_hash());

        let input = Self::alloc_buffer(cs, self.circuit.input_len(), self.input.as_deref())?;
        let declared = Self::alloc_buffer(cs, self.circuit.output_len(), self.output.as_deref())?;

        let mut reader = InputReader::new(input.clone());
        let mut writer = OutputWriter::new();
        self.circuit.define(cs, &mut reader, &mut writer)?;
        let written = writer.bytes().to_vec();
        writer.close(cs, &declared)?;

        let input_digest = sha::sha256_commitment(cs, &input)?;
        for (digest, public) in input_digest.iter().zip(&input_hash) {
            cs.assert_equal(digest, public);
        }
        let output_digest = sha::sha256_commitment(cs, &declared)?;
        for (digest, public) in output_digest.iter().zip(&output_hash) {
            cs.assert_equal(digest, public);
        }
        Ok(written)
    }

    pub fn fixture(&self) -> Result<Fixture> {
        let input = self.input.clone().ok_or(Error::MissingWitness("function input"))?;
        let mut cs = ConstraintSystem::prove();
        let written = self.synthesize_output(&mut cs)?;
        cs.is_satisfied()?;
        let output = written
            .iter()
            .map(|b| b.value_unsafe()?.ok_or(Error::MissingWitness("output byte")))
            .collect::<Result<Vec<u8>>>()?;
        Ok(Fixture { input, output })
    }

    pub fn build<S>(&self, system: &S) -> Result<CircuitBuild<S>>
    where
        S: ProvingSystem<Field = F>,
    {
        CircuitBuild::build(system, self)
    }

    #[instrument(skip_all, fields(input = %hex::encode(input)))]
    pub fn prove<S>(
        &mut self,
        system: &S,
        build: &CircuitBuild<S>,
        input: &[u8],
    ) -> Result<FunctionProof<S>>
    where
        S: ProvingSystem<Field = F>,
    {
        self.set_witness(input)?;
        let (proof, public_inputs) = build.prove(system, &*self)?;
        let output = self.output.clone().ok_or(Error::MissingWitness("function output"))?;
        info!(output = %hex::encode(&output), "proved circuit function");
        Ok(FunctionProof {
            proof,
            public_inputs,
            input: input.to_vec(),
            output,
        })
    }
}

impl<F: PrimeField, C: Circuit<F>> Synthesize<F> for CircuitFunction<F, C> {
    fn synthesize(&self, cs: &mut ConstraintSystem<F>) -> Result<()> {
        self.synthesize_output(cs).map(|_| ())
    }
}
