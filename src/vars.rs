use ark_ff::PrimeField;

use crate::{
    circuit::{ConstraintSystem, Variable},
    error::{Error, Result},
};

fn field_bool<F: PrimeField>(b: bool) -> F {
    if b {
        F::one()
    } else {
        F::zero()
    }
}

pub(crate) fn to_u64<F: PrimeField>(x: F) -> Option<u64> {
    let bigint = x.into_bigint();
    let limbs = bigint.as_ref();
    limbs[1..].iter().all(|l| *l == 0).then_some(limbs[0])
}

#[derive(Debug, Clone)]
pub struct Bit<F: PrimeField>(Variable<F>);

impl<F: PrimeField> Bit<F> {
    pub fn constant(b: bool) -> Self {
        Self(Variable::constant(field_bool(b)))
    }

    pub fn zero() -> Self {
        Self::constant(false)
    }

    pub fn one() -> Self {
        Self::constant(true)
    }

    pub fn alloc(cs: &mut ConstraintSystem<F>, value: Option<bool>) -> Self {
        let v = cs.alloc_private(value.map(field_bool));
        cs.assert_boolean(&v);
        Self(v)
    }

    pub fn from_variable(cs: &mut ConstraintSystem<F>, v: Variable<F>) -> Self {
        cs.assert_boolean(&v);
        Self(v)
    }

    pub fn variable(&self) -> &Variable<F> {
        &self.0
    }

    pub fn value(&self) -> Option<bool> {
        self.0.value().map(|v| v.is_one())
    }

    pub fn constant_value(&self) -> Option<bool> {
        self.0.constant_value().map(|v| v.is_one())
    }

    pub fn not(&self) -> Self {
        Self(&Variable::one() - &self.0)
    }

    pub fn xor(&self, cs: &mut ConstraintSystem<F>, other: &Self) -> Self {
        match (self.constant_value(), other.constant_value()) {
            (Some(false), _) => other.clone(),
            (Some(true), _) => other.not(),
            (_, Some(false)) => self.clone(),
            (_, Some(true)) => self.not(),
            (None, None) => {
                // (2a) * b = a + b - r
                let r = cs.alloc_private(
                    self.value()
                        .zip(other.value())
                        .map(|(a, b)| field_bool(a ^ b)),
                );
                let sum = &self.0 + &other.0;
                cs.enforce(
                    (&self.0 * F::from(2u64)).lc().clone(),
                    other.0.lc().clone(),
                    (&sum - &r).lc().clone(),
                );
                Self(r)
            }
        }
    }

    pub fn and(&self, cs: &mut ConstraintSystem<F>, other: &Self) -> Self {
        Self(cs.mul(&self.0, &other.0))
    }

    pub fn select(cs: &mut ConstraintSystem<F>, cond: &Bit<F>, a: &Self, b: &Self) -> Self {
        Self(cs.select(cond, &a.0, &b.0))
    }

    pub fn assert_equal(&self, cs: &mut ConstraintSystem<F>, other: &Self) {
        cs.assert_equal(&self.0, &other.0);
    }

    pub fn pack_le(bits: &[Bit<F>]) -> Variable<F> {
        let mut coeff = F::one();
        let mut terms = Vec::with_capacity(bits.len());
        for bit in bits {
            terms.push((coeff, &bit.0));
            coeff.double_in_place();
        }
        Variable::sum(terms)
    }

    pub fn pack_be(bits: &[Bit<F>]) -> Variable<F> {
        let reversed: Vec<Bit<F>> = bits.iter().rev().cloned().collect();
        Self::pack_le(&reversed)
    }
}

/// A value in `[0, 255]`. Bits are kept MSB-first once known.
#[derive(Debug, Clone)]
pub struct Byte<F: PrimeField> {
    var: Variable<F>,
    bits: Option<Vec<Bit<F>>>,
}

impl<F: PrimeField> Byte<F> {
    pub fn constant(b: u8) -> Self {
        Self {
            var: Variable::constant(F::from(b)),
            bits: Some((0..8).rev().map(|i| Bit::constant((b >> i) & 1 == 1)).collect()),
        }
    }

    pub fn alloc(cs: &mut ConstraintSystem<F>, value: Option<u8>) -> Result<Self> {
        let var = cs.alloc_private(value.map(F::from));
        Self::from_variable(cs, var)
    }

    pub fn from_variable(cs: &mut ConstraintSystem<F>, var: Variable<F>) -> Result<Self> {
        let mut bits = cs.to_bits_le(&var, 8)?;
        bits.reverse();
        Ok(Self {
            var,
            bits: Some(bits),
        })
    }

    pub fn from_bits_be(bits: &[Bit<F>]) -> Result<Self> {
        if bits.len() != 8 {
            return Err(Error::length("byte bits", 8, bits.len()));
        }
        Ok(Self {
            var: Bit::pack_be(bits),
            bits: Some(bits.to_vec()),
        })
    }

    pub fn variable(&self) -> &Variable<F> {
        &self.var
    }

    pub fn to_bits_be(&self, cs: &mut ConstraintSystem<F>) -> Result<Vec<Bit<F>>> {
        match &self.bits {
            Some(bits) => Ok(bits.clone()),
            None => {
                let mut bits = cs.to_bits_le(&self.var, 8)?;
                bits.reverse();
                Ok(bits)
            }
        }
    }

    pub fn value_unsafe(&self) -> Result<Option<u8>> {
        match self.var.value() {
            None => Ok(None),
            Some(v) => match to_u64(v).filter(|v| *v <= 0xff) {
                Some(b) => Ok(Some(b as u8)),
                None => Err(Error::Range {
                    what: "byte",
                    value: v.to_string(),
                }),
            },
        }
    }

    pub fn assert_equal(&self, cs: &mut ConstraintSystem<F>, other: &Self) {
        cs.assert_equal(&self.var, &other.var);
    }

    pub fn select(cs: &mut ConstraintSystem<F>, cond: &Bit<F>, a: &Self, b: &Self) -> Self {
        Self {
            var: cs.select(cond, &a.var, &b.var),
            bits: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct U64<F: PrimeField>(Variable<F>);

impl<F: PrimeField> U64<F> {
    pub fn constant(x: u64) -> Self {
        Self(Variable::constant(F::from(x)))
    }

    pub fn alloc(cs: &mut ConstraintSystem<F>, value: Option<u64>) -> Result<Self> {
        let var = cs.alloc_private(value.map(F::from));
        cs.to_bits_le(&var, 64)?;
        Ok(Self(var))
    }

    pub fn variable(&self) -> &Variable<F> {
        &self.0
    }

    pub fn value(&self) -> Option<u64> {
        self.0.value().and_then(to_u64)
    }

    /// Wrapping sum of all operands: one decomposition of the full field sum into
    /// `64 + ceil(log2 n) + 2` bits, keeping the low 64.
    pub fn add(cs: &mut ConstraintSystem<F>, operands: &[U64<F>]) -> Result<Self> {
        if operands.is_empty() {
            return Err(Error::arity("u64 add", "no operands"));
        }
        let n = operands.len();
        let log2 = (usize::BITS - (n - 1).leading_zeros()) as usize;
        let sum = Variable::sum(operands.iter().map(|x| (F::one(), &x.0)));
        let bits = cs.to_bits_le(&sum, 64 + log2 + 2)?;
        Ok(Self(Bit::pack_le(&bits[..64])))
    }

    pub fn to_bits_le(&self, cs: &mut ConstraintSystem<F>) -> Result<Vec<Bit<F>>> {
        cs.to_bits_le(&self.0, 64)
    }

    pub fn to_bytes_le(&self, cs: &mut ConstraintSystem<F>) -> Result<Vec<Byte<F>>> {
        let bits = self.to_bits_le(cs)?;
        bits.chunks(8)
            .map(|chunk| {
                let be: Vec<Bit<F>> = chunk.iter().rev().cloned().collect();
                Byte::from_bits_be(&be)
            })
            .collect()
    }

    pub fn to_bytes_be(&self, cs: &mut ConstraintSystem<F>) -> Result<Vec<Byte<F>>> {
        let mut bytes = self.to_bytes_le(cs)?;
        bytes.reverse();
        Ok(bytes)
    }

    /// Accumulates 8 bytes, most significant first. No constraints.
    pub fn from_bytes_be(bytes: &[Byte<F>]) -> Result<Self> {
        if bytes.len() != 8 {
            return Err(Error::length("u64 bytes", 8, bytes.len()));
        }
        let mut coeff = F::one();
        let mut terms = Vec::with_capacity(8);
        for byte in bytes.iter().rev() {
            terms.push((coeff, byte.variable()));
            coeff *= F::from(256u64);
        }
        Ok(Self(Variable::sum(terms)))
    }
}

#[derive(Debug, Clone)]
pub struct Bytes32<F: PrimeField>(Vec<Byte<F>>);

impl<F: PrimeField> Bytes32<F> {
    pub fn constant(bytes: [u8; 32]) -> Self {
        Self(bytes.iter().map(|b| Byte::constant(*b)).collect())
    }

    pub fn alloc(cs: &mut ConstraintSystem<F>, value: Option<[u8; 32]>) -> Result<Self> {
        (0..32)
            .map(|i| Byte::alloc(cs, value.map(|v| v[i])))
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }

    pub fn from_bytes(bytes: Vec<Byte<F>>) -> Result<Self> {
        if bytes.len() != 32 {
            return Err(Error::length("bytes32", 32, bytes.len()));
        }
        Ok(Self(bytes))
    }

    pub fn left_pad(data: &[u8]) -> Result<Self> {
        if data.len() > 32 {
            return Err(Error::length("bytes32 padding input", 32, data.len()));
        }
        let mut bytes = [0u8; 32];
        bytes[32 - data.len()..].copy_from_slice(data);
        Ok(Self::constant(bytes))
    }

    pub fn right_pad(data: &[u8]) -> Result<Self> {
        if data.len() > 32 {
            return Err(Error::length("bytes32 padding input", 32, data.len()));
        }
        let mut bytes = [0u8; 32];
        bytes[..data.len()].copy_from_slice(data);
        Ok(Self::constant(bytes))
    }

    pub fn from_u64_le(cs: &mut ConstraintSystem<F>, x: &U64<F>) -> Result<Self> {
        let mut bytes = x.to_bytes_le(cs)?;
        bytes.resize(32, Byte::constant(0));
        Ok(Self(bytes))
    }

    pub fn bytes(&self) -> &[Byte<F>] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<Byte<F>> {
        self.0
    }

    pub fn value(&self) -> Result<Option<[u8; 32]>> {
        let mut out = [0u8; 32];
        for (slot, byte) in out.iter_mut().zip(&self.0) {
            match byte.value_unsafe()? {
                Some(b) => *slot = b,
                None => return Ok(None),
            }
        }
        Ok(Some(out))
    }

    pub fn to_bits_be(&self, cs: &mut ConstraintSystem<F>) -> Result<Vec<Bit<F>>> {
        let mut bits = Vec::with_capacity(256);
        for byte in &self.0 {
            bits.extend(byte.to_bits_be(cs)?);
        }
        Ok(bits)
    }

    pub fn select(cs: &mut ConstraintSystem<F>, cond: &Bit<F>, a: &Self, b: &Self) -> Self {
        Self(
            a.0.iter()
                .zip(&b.0)
                .map(|(x, y)| Byte::select(cs, cond, x, y))
                .collect(),
        )
    }

    /// `(cond ? a : b, cond ? b : a)`. The second side is `a + b - first`, so the
    /// swap costs one select per bit and both sides keep their bits.
    pub fn swap(
        cs: &mut ConstraintSystem<F>,
        cond: &Bit<F>,
        a: &Self,
        b: &Self,
    ) -> Result<(Self, Self)> {
        let a_bits = a.to_bits_be(cs)?;
        let b_bits = b.to_bits_be(cs)?;
        let mut first = Vec::with_capacity(256);
        let mut second = Vec::with_capacity(256);
        for (x, y) in a_bits.iter().zip(&b_bits) {
            let picked = cs.select(cond, &x.0, &y.0);
            second.push(Bit(&(&x.0 + &y.0) - &picked));
            first.push(Bit(picked));
        }
        let pack = |bits: &[Bit<F>]| {
            bits.chunks(8)
                .map(Byte::from_bits_be)
                .collect::<Result<Vec<_>>>()
                .map(Self)
        };
        Ok((pack(&first)?, pack(&second)?))
    }

    pub fn assert_equal(&self, cs: &mut ConstraintSystem<F>, other: &Self) {
        for (a, b) in self.0.iter().zip(&other.0) {
            a.assert_equal(cs, b);
        }
    }
}
