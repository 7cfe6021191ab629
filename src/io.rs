use ark_ff::PrimeField;

use crate::{
    circuit::ConstraintSystem,
    error::{Error, Result},
    vars::{Byte, Bytes32, U64},
};

/// Sequential reader over the range-checked input bytes.
pub struct InputReader<F: PrimeField> {
    bytes: Vec<Byte<F>>,
    position: usize,
}

impl<F: PrimeField> InputReader<F> {
    pub fn new(bytes: Vec<Byte<F>>) -> Self {
        Self { bytes, position: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.position
    }

    pub fn read_byte(&mut self) -> Result<Byte<F>> {
        Ok(self.read_bytes(1)?.remove(0))
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<Vec<Byte<F>>> {
        if n > self.remaining() {
            return Err(Error::length("input bytes", self.position + n, self.bytes.len()));
        }
        let out = self.bytes[self.position..self.position + n].to_vec();
        self.position += n;
        Ok(out)
    }

    pub fn read_bytes32(&mut self) -> Result<Bytes32<F>> {
        Bytes32::from_bytes(self.read_bytes(32)?)
    }

    /// Eight bytes, most significant first.
    pub fn read_u64(&mut self) -> Result<U64<F>> {
        U64::from_bytes_be(&self.read_bytes(8)?)
    }
}

/// Collects output bytes; [`OutputWriter::close`] binds them to the declared output.
#[derive(Default)]
pub struct OutputWriter<F: PrimeField> {
    bytes: Vec<Byte<F>>,
}

impl<F: PrimeField> OutputWriter<F> {
    pub fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn write_byte(&mut self, byte: Byte<F>) {
        self.bytes.push(byte);
    }

    pub fn write_bytes(&mut self, bytes: &[Byte<F>]) {
        self.bytes.extend_from_slice(bytes);
    }

    pub fn write_bytes32(&mut self, bytes: &Bytes32<F>) {
        self.write_bytes(bytes.bytes());
    }

    /// Big-endian bytes of `x`.
    pub fn write_u64(&mut self, cs: &mut ConstraintSystem<F>, x: &U64<F>) -> Result<()> {
        let bytes = x.to_bytes_be(cs)?;
        self.write_bytes(&bytes);
        Ok(())
    }

    pub fn bytes(&self) -> &[Byte<F>] {
        &self.bytes
    }

    pub fn close(self, cs: &mut ConstraintSystem<F>, declared: &[Byte<F>]) -> Result<()> {
        if self.bytes.len() != declared.len() {
            return Err(Error::length("output bytes", declared.len(), self.bytes.len()));
        }
        for (written, expected) in self.bytes.iter().zip(declared) {
            written.assert_equal(cs, expected);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ark_bn254::Fr;

    use super::*;

    fn alloc(cs: &mut ConstraintSystem<Fr>, data: &[u8]) -> Vec<Byte<Fr>> {
        data.iter()
            .map(|b| Byte::alloc(cs, Some(*b)).unwrap())
            .collect()
    }

    #[test]
    fn test_read_u64_big_endian() {
        let mut cs = ConstraintSystem::<Fr>::prove();
        let bytes = alloc(&mut cs, &[0, 0, 0, 0, 0, 0, 1, 0xa4, 0xff]);
        let mut reader = InputReader::new(bytes);
        assert_eq!(reader.read_u64().unwrap().value(), Some(420));
        assert_eq!(reader.remaining(), 1);
        assert_eq!(reader.read_byte().unwrap().value_unsafe().unwrap(), Some(0xff));
        assert!(matches!(
            reader.read_byte(),
            Err(Error::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_read_past_end() {
        let mut cs = ConstraintSystem::<Fr>::prove();
        let mut reader = InputReader::new(alloc(&mut cs, &[1; 31]));
        assert!(reader.read_bytes32().is_err());
        assert_eq!(reader.remaining(), 31);
    }

    #[test]
    fn test_write_u64_and_close() {
        let mut cs = ConstraintSystem::<Fr>::prove();
        let x = U64::alloc(&mut cs, Some(489)).unwrap();
        let mut writer = OutputWriter::new();
        writer.write_u64(&mut cs, &x).unwrap();
        let written: Vec<_> = writer
            .bytes()
            .iter()
            .map(|b| b.value_unsafe().unwrap().unwrap())
            .collect();
        assert_eq!(written, 489u64.to_be_bytes());

        let declared = alloc(&mut cs, &489u64.to_be_bytes());
        writer.close(&mut cs, &declared).unwrap();
        assert!(cs.is_satisfied().is_ok());
    }

    #[test]
    fn test_close_rejects_wrong_count() {
        let mut cs = ConstraintSystem::<Fr>::prove();
        let mut writer = OutputWriter::new();
        writer.write_bytes32(&Bytes32::constant([1; 32]));
        let declared = alloc(&mut cs, &[1; 31]);
        assert!(matches!(
            writer.close(&mut cs, &declared),
            Err(Error::LengthMismatch { expected: 31, actual: 32, .. })
        ));
    }

    #[test]
    fn test_close_rejects_wrong_bytes() {
        let mut cs = ConstraintSystem::<Fr>::prove();
        let mut writer = OutputWriter::new();
        writer.write_byte(Byte::constant(7));
        let declared = alloc(&mut cs, &[8]);
        writer.close(&mut cs, &declared).unwrap();
        assert!(cs.is_satisfied().is_err());
    }
}
