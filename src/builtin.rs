use ark_ff::PrimeField;

use crate::{
    circuit::ConstraintSystem,
    error::{Error, Result},
    io::{InputReader, OutputWriter},
    ssz,
    vars::{Bytes32, U64},
};

/// Two big-endian `u64`s in, their wrapping sum out.
#[derive(Debug, Clone, Copy, Default)]
pub struct AddU64;

impl<F: PrimeField> crate::function::Circuit<F> for AddU64 {
    fn input_len(&self) -> usize {
        16
    }

    fn output_len(&self) -> usize {
        8
    }

    fn set_witness(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        if input.len() != 16 {
            return Err(Error::length("add-u64 input", 16, input.len()));
        }
        let sum = input
            .chunks(8)
            .map(|chunk| {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(chunk);
                u64::from_be_bytes(buf)
            })
            .fold(0u64, u64::wrapping_add);
        Ok(sum.to_be_bytes().to_vec())
    }

    fn define(
        &self,
        cs: &mut ConstraintSystem<F>,
        input: &mut InputReader<F>,
        output: &mut OutputWriter<F>,
    ) -> Result<()> {
        let a = input.read_u64()?;
        let b = input.read_u64()?;
        let sum = U64::add(cs, &[a, b])?;
        output.write_u64(cs, &sum)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EchoBytes32;

impl<F: PrimeField> crate::function::Circuit<F> for EchoBytes32 {
    fn input_len(&self) -> usize {
        32
    }

    fn output_len(&self) -> usize {
        32
    }

    fn set_witness(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        Ok(input.to_vec())
    }

    fn define(
        &self,
        _cs: &mut ConstraintSystem<F>,
        input: &mut InputReader<F>,
        output: &mut OutputWriter<F>,
    ) -> Result<()> {
        let word = input.read_bytes32()?;
        output.write_bytes32(&word);
        Ok(())
    }
}

/// SSZ hash tree root of four 32-byte leaves.
#[derive(Debug, Clone, Copy, Default)]
pub struct MerkleRoot4;

impl<F: PrimeField> crate::function::Circuit<F> for MerkleRoot4 {
    fn input_len(&self) -> usize {
        4 * 32
    }

    fn output_len(&self) -> usize {
        32
    }

    fn set_witness(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        if input.len() != 4 * 32 {
            return Err(Error::length("merkle-root4 input", 4 * 32, input.len()));
        }
        let leaves: Vec<[u8; 32]> = input
            .chunks(32)
            .map(|chunk| {
                let mut leaf = [0u8; 32];
                leaf.copy_from_slice(chunk);
                leaf
            })
            .collect();
        Ok(ssz::native::hash_tree_root(&leaves)?.to_vec())
    }

    fn define(
        &self,
        cs: &mut ConstraintSystem<F>,
        input: &mut InputReader<F>,
        output: &mut OutputWriter<F>,
    ) -> Result<()> {
        let leaves = (0..4)
            .map(|_| input.read_bytes32())
            .collect::<Result<Vec<Bytes32<F>>>>()?;
        let root = ssz::hash_tree_root(cs, &leaves)?;
        output.write_bytes32(&root);
        Ok(())
    }
}
