use ark_ff::PrimeField;

use crate::{
    circuit::ConstraintSystem,
    error::{Error, Result},
    vars::{Bit, Byte},
};

pub type Word<F> = Vec<Bit<F>>;

fn check_operands<F: PrimeField>(op: &'static str, operands: &[&[Bit<F>]]) -> Result<usize> {
    if operands.len() < 2 {
        return Err(Error::arity(
            op,
            format!("needs at least 2 operands, got {}", operands.len()),
        ));
    }
    let width = operands[0].len();
    if let Some(bad) = operands.iter().find(|w| w.len() != width) {
        return Err(Error::arity(
            op,
            format!("operand widths differ: {} vs {}", width, bad.len()),
        ));
    }
    Ok(width)
}

fn fold<F: PrimeField>(
    cs: &mut ConstraintSystem<F>,
    op: &'static str,
    operands: &[&[Bit<F>]],
    mut gate: impl FnMut(&mut ConstraintSystem<F>, &[Bit<F>], &[Bit<F>]) -> Result<Word<F>>,
) -> Result<Word<F>> {
    check_operands(op, operands)?;
    let mut acc = operands[0].to_vec();
    for word in &operands[1..] {
        acc = gate(cs, &acc, word)?;
    }
    Ok(acc)
}

pub fn xor<F: PrimeField>(cs: &mut ConstraintSystem<F>, operands: &[&[Bit<F>]]) -> Result<Word<F>> {
    fold(cs, "xor", operands, |cs, a, b| {
        Ok(a.iter().zip(b).map(|(x, y)| x.xor(cs, y)).collect())
    })
}

pub fn and<F: PrimeField>(cs: &mut ConstraintSystem<F>, operands: &[&[Bit<F>]]) -> Result<Word<F>> {
    fold(cs, "and", operands, |cs, a, b| {
        Ok(a.iter().zip(b).map(|(x, y)| x.and(cs, y)).collect())
    })
}

pub fn not<F: PrimeField>(word: &[Bit<F>]) -> Word<F> {
    word.iter().map(Bit::not).collect()
}

/// Ripple-carry addition modulo `2^width`.
pub fn add<F: PrimeField>(cs: &mut ConstraintSystem<F>, operands: &[&[Bit<F>]]) -> Result<Word<F>> {
    fold(cs, "add", operands, |cs, a, b| {
        let mut out = vec![Bit::zero(); a.len()];
        let mut carry = Bit::zero();
        for i in (0..a.len()).rev() {
            let sum = &(a[i].variable() + b[i].variable()) + carry.variable();
            let bits = cs.to_bits_le(&sum, 2)?;
            out[i] = bits[0].clone();
            carry = bits[1].clone();
        }
        Ok(out)
    })
}

pub fn xor3<F: PrimeField>(
    cs: &mut ConstraintSystem<F>,
    a: &[Bit<F>],
    b: &[Bit<F>],
    c: &[Bit<F>],
) -> Result<Word<F>> {
    xor(cs, &[a, b, c])
}

/// Bitwise `e ? f : g`.
pub fn choose<F: PrimeField>(
    cs: &mut ConstraintSystem<F>,
    e: &[Bit<F>],
    f: &[Bit<F>],
    g: &[Bit<F>],
) -> Result<Word<F>> {
    check_operands("choose", &[e, f, g])?;
    Ok(e.iter()
        .zip(f)
        .zip(g)
        .map(|((e, f), g)| Bit::select(cs, e, f, g))
        .collect())
}

/// Bitwise majority, as `a ^ b ? c : a`.
pub fn majority<F: PrimeField>(
    cs: &mut ConstraintSystem<F>,
    a: &[Bit<F>],
    b: &[Bit<F>],
    c: &[Bit<F>],
) -> Result<Word<F>> {
    check_operands("majority", &[a, b, c])?;
    Ok(a.iter()
        .zip(b)
        .zip(c)
        .map(|((a, b), c)| {
            let differ = a.xor(cs, b);
            Bit::select(cs, &differ, c, a)
        })
        .collect())
}

/// `result[(i + k) % n] = word[i]`
pub fn rotate_right<F: PrimeField>(word: &[Bit<F>], k: usize) -> Word<F> {
    let n = word.len();
    let mut out = word.to_vec();
    for (i, bit) in word.iter().enumerate() {
        out[(i + k) % n] = bit.clone();
    }
    out
}

pub fn shr<F: PrimeField>(word: &[Bit<F>], k: usize) -> Word<F> {
    (0..word.len())
        .map(|i| {
            if i < k {
                Bit::zero()
            } else {
                word[i - k].clone()
            }
        })
        .collect()
}

pub fn constant<F: PrimeField>(value: u64, width: usize) -> Word<F> {
    (0..width)
        .rev()
        .map(|i| Bit::constant(i < 64 && (value >> i) & 1 == 1))
        .collect()
}

pub fn value<F: PrimeField>(word: &[Bit<F>]) -> Option<u64> {
    word.iter()
        .try_fold(0u64, |acc, bit| Some((acc << 1) | bit.value()? as u64))
}

pub fn bytes_to_bits<F: PrimeField>(
    cs: &mut ConstraintSystem<F>,
    bytes: &[Byte<F>],
) -> Result<Word<F>> {
    let mut bits = Vec::with_capacity(bytes.len() * 8);
    for byte in bytes {
        bits.extend(byte.to_bits_be(cs)?);
    }
    Ok(bits)
}

pub fn bits_to_bytes<F: PrimeField>(bits: &[Bit<F>]) -> Result<Vec<Byte<F>>> {
    if bits.len() % 8 != 0 {
        return Err(Error::length(
            "bit count (multiple of 8)",
            bits.len().next_multiple_of(8),
            bits.len(),
        ));
    }
    bits.chunks(8).map(Byte::from_bits_be).collect()
}

pub mod native {
    use crate::error::{Error, Result};

    pub fn bytes_to_bits(bytes: &[u8]) -> Vec<bool> {
        bytes
            .iter()
            .flat_map(|b| (0..8).rev().map(move |i| (b >> i) & 1 == 1))
            .collect()
    }

    pub fn bits_to_bytes(bits: &[bool]) -> Result<Vec<u8>> {
        if bits.len() % 8 != 0 {
            return Err(Error::length(
                "bit count (multiple of 8)",
                bits.len().next_multiple_of(8),
                bits.len(),
            ));
        }
        Ok(bits
            .chunks(8)
            .map(|chunk| chunk.iter().fold(0u8, |acc, bit| (acc << 1) | *bit as u8))
            .collect())
    }
}
