use std::ops::{Add, Mul, Neg, Sub};

use ark_ff::{BigInteger, PrimeField};
use rayon::prelude::*;

use crate::{
    error::{Error, Result},
    r1cs::{Assignment, ConstraintMatrices},
    vars::Bit,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Index {
    One,
    Public(usize),
    Private(usize),
}

/// Sparse sum of `coeff * column`, kept sorted by column with no zero coefficients.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinearCombination<F: PrimeField>(Vec<(Index, F)>);

impl<F: PrimeField> LinearCombination<F> {
    pub fn zero() -> Self {
        Self(Vec::new())
    }

    pub fn term(index: Index, coeff: F) -> Self {
        if coeff.is_zero() {
            Self::zero()
        } else {
            Self(vec![(index, coeff)])
        }
    }

    pub fn constant(c: F) -> Self {
        Self::term(Index::One, c)
    }

    pub fn terms(&self) -> &[(Index, F)] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_empty()
    }

    pub fn constant_value(&self) -> Option<F> {
        match self.0.as_slice() {
            [] => Some(F::zero()),
            [(Index::One, c)] => Some(*c),
            _ => None,
        }
    }

    pub fn scale(&self, k: F) -> Self {
        if k.is_zero() {
            return Self::zero();
        }
        Self(self.0.iter().map(|(i, c)| (*i, *c * k)).collect())
    }

    /// `self + k * other`, merging equal columns.
    pub fn combine(&self, other: &Self, k: F) -> Self {
        let mut out = Vec::with_capacity(self.0.len() + other.0.len());
        let (mut lhs, mut rhs) = (self.0.iter().peekable(), other.0.iter().peekable());
        loop {
            match (lhs.peek(), rhs.peek()) {
                (Some((i, a)), Some((j, b))) if i == j => {
                    let c = *a + *b * k;
                    if !c.is_zero() {
                        out.push((*i, c));
                    }
                    lhs.next();
                    rhs.next();
                }
                (Some((i, a)), Some((j, _))) if i < j => {
                    out.push((*i, *a));
                    lhs.next();
                }
                (_, Some((j, b))) => {
                    let c = *b * k;
                    if !c.is_zero() {
                        out.push((*j, c));
                    }
                    rhs.next();
                }
                (Some((i, a)), None) => {
                    out.push((*i, *a));
                    lhs.next();
                }
                (None, None) => break,
            }
        }
        Self(out)
    }

    pub fn evaluate(&self, lookup: impl Fn(Index) -> Option<F>) -> Option<F> {
        self.0
            .iter()
            .try_fold(F::zero(), |acc, (i, c)| Some(acc + lookup(*i)? * c))
    }
}

/// A value inside the circuit: a linear combination of allocated columns and, when
/// known, its assigned value.
#[derive(Debug, Clone)]
pub struct Variable<F: PrimeField> {
    lc: LinearCombination<F>,
    value: Option<F>,
}

impl<F: PrimeField> Variable<F> {
    pub fn constant(c: F) -> Self {
        Self {
            lc: LinearCombination::constant(c),
            value: Some(c),
        }
    }

    pub fn zero() -> Self {
        Self::constant(F::zero())
    }

    pub fn one() -> Self {
        Self::constant(F::one())
    }

    pub fn lc(&self) -> &LinearCombination<F> {
        &self.lc
    }

    pub fn value(&self) -> Option<F> {
        self.value
    }

    pub fn constant_value(&self) -> Option<F> {
        self.lc.constant_value()
    }

    pub fn is_constant(&self) -> bool {
        self.constant_value().is_some()
    }

    pub fn sum<'a>(terms: impl IntoIterator<Item = (F, &'a Variable<F>)>) -> Self {
        terms
            .into_iter()
            .fold(Self::zero(), |acc, (k, v)| acc.combine(v, k))
    }

    fn combine(&self, other: &Self, k: F) -> Self {
        Self {
            lc: self.lc.combine(&other.lc, k),
            value: self.value.zip(other.value).map(|(a, b)| a + b * k),
        }
    }
}

impl<F: PrimeField> Add for &Variable<F> {
    type Output = Variable<F>;

    fn add(self, rhs: Self) -> Variable<F> {
        self.combine(rhs, F::one())
    }
}

impl<F: PrimeField> Sub for &Variable<F> {
    type Output = Variable<F>;

    fn sub(self, rhs: Self) -> Variable<F> {
        self.combine(rhs, -F::one())
    }
}

impl<F: PrimeField> Mul<F> for &Variable<F> {
    type Output = Variable<F>;

    fn mul(self, k: F) -> Variable<F> {
        Variable {
            lc: self.lc.scale(k),
            value: self.value.map(|v| v * k),
        }
    }
}

impl<F: PrimeField> Neg for &Variable<F> {
    type Output = Variable<F>;

    fn neg(self) -> Variable<F> {
        self * -F::one()
    }
}

#[derive(Debug, Clone)]
pub struct Constraint<F: PrimeField> {
    pub a: LinearCombination<F>,
    pub b: LinearCombination<F>,
    pub c: LinearCombination<F>,
}

/// `Setup` records constraints for compilation. `Prove` checks every constraint as
/// it is emitted and keeps only the assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisMode {
    Setup,
    Prove,
}

#[derive(Debug, Clone, Copy)]
enum Violation {
    Unsatisfied(usize),
    Missing,
}

pub trait Synthesize<F: PrimeField> {
    fn synthesize(&self, cs: &mut ConstraintSystem<F>) -> Result<()>;
}

#[derive(Debug)]
pub struct ConstraintSystem<F: PrimeField> {
    mode: SynthesisMode,
    public: Vec<Option<F>>,
    private: Vec<Option<F>>,
    constraints: Vec<Constraint<F>>,
    num_constraints: usize,
    violation: Option<Violation>,
}

impl<F: PrimeField> ConstraintSystem<F> {
    pub fn new(mode: SynthesisMode) -> Self {
        Self {
            mode,
            public: Vec::new(),
            private: Vec::new(),
            constraints: Vec::new(),
            num_constraints: 0,
            violation: None,
        }
    }

    pub fn setup() -> Self {
        Self::new(SynthesisMode::Setup)
    }

    pub fn prove() -> Self {
        Self::new(SynthesisMode::Prove)
    }

    pub fn mode(&self) -> SynthesisMode {
        self.mode
    }

    pub fn num_public(&self) -> usize {
        self.public.len()
    }

    pub fn num_private(&self) -> usize {
        self.private.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.num_constraints
    }

    pub fn alloc_public(&mut self, value: Option<F>) -> Variable<F> {
        self.public.push(value);
        Variable {
            lc: LinearCombination::term(Index::Public(self.public.len() - 1), F::one()),
            value,
        }
    }

    pub fn alloc_private(&mut self, value: Option<F>) -> Variable<F> {
        self.private.push(value);
        Variable {
            lc: LinearCombination::term(Index::Private(self.private.len() - 1), F::one()),
            value,
        }
    }

    fn lookup(&self, index: Index) -> Option<F> {
        match index {
            Index::One => Some(F::one()),
            Index::Public(i) => self.public[i],
            Index::Private(i) => self.private[i],
        }
    }

    pub fn enforce(
        &mut self,
        a: LinearCombination<F>,
        b: LinearCombination<F>,
        c: LinearCombination<F>,
    ) {
        let index = self.num_constraints;
        self.num_constraints += 1;
        match self.mode {
            SynthesisMode::Setup => self.constraints.push(Constraint { a, b, c }),
            SynthesisMode::Prove if self.violation.is_none() => {
                let lookup = |i| self.lookup(i);
                let holds = a
                    .evaluate(lookup)
                    .zip(b.evaluate(lookup))
                    .zip(c.evaluate(lookup))
                    .map(|((a, b), c)| a * b == c);
                self.violation = match holds {
                    Some(true) => None,
                    Some(false) => Some(Violation::Unsatisfied(index)),
                    None => Some(Violation::Missing),
                };
            }
            SynthesisMode::Prove => {}
        }
    }

    pub fn assert_equal(&mut self, a: &Variable<F>, b: &Variable<F>) {
        let diff = a - b;
        if diff.lc.is_zero() {
            return;
        }
        self.enforce(
            diff.lc,
            LinearCombination::constant(F::one()),
            LinearCombination::zero(),
        );
    }

    pub fn assert_boolean(&mut self, v: &Variable<F>) {
        let complement = &Variable::one() - v;
        self.enforce(v.lc.clone(), complement.lc, LinearCombination::zero());
    }

    /// Product of two variables; folds to a linear combination when either side is
    /// constant.
    pub fn mul(&mut self, a: &Variable<F>, b: &Variable<F>) -> Variable<F> {
        if let Some(k) = a.constant_value() {
            return b * k;
        }
        if let Some(k) = b.constant_value() {
            return a * k;
        }
        let out = self.alloc_private(a.value.zip(b.value).map(|(a, b)| a * b));
        self.enforce(a.lc.clone(), b.lc.clone(), out.lc.clone());
        out
    }

    pub fn select(&mut self, cond: &Bit<F>, a: &Variable<F>, b: &Variable<F>) -> Variable<F> {
        match cond.constant_value() {
            Some(true) => a.clone(),
            Some(false) => b.clone(),
            None => {
                let delta = a - b;
                let picked = self.mul(cond.variable(), &delta);
                b + &picked
            }
        }
    }

    /// Binary decomposition of `v` into `n` little-endian bits. Doubles as a range
    /// check: the recomposition is asserted equal to `v`.
    pub fn to_bits_le(&mut self, v: &Variable<F>, n: usize) -> Result<Vec<Bit<F>>> {
        if n >= F::MODULUS_BIT_SIZE as usize {
            return Err(Error::Range {
                what: "decomposition width",
                value: n.to_string(),
            });
        }
        if let Some(c) = v.constant_value() {
            let bits = c.into_bigint();
            if bits.num_bits() as usize > n {
                return Err(Error::Range {
                    what: "constant",
                    value: c.to_string(),
                });
            }
            return Ok((0..n).map(|i| Bit::constant(bits.get_bit(i))).collect());
        }
        let value = v.value.map(|x| x.into_bigint());
        let bits: Vec<Bit<F>> = (0..n)
            .map(|i| Bit::alloc(self, value.map(|b| b.get_bit(i))))
            .collect();
        self.assert_equal(&Bit::pack_le(&bits), v);
        Ok(bits)
    }

    pub fn is_satisfied(&self) -> Result<()> {
        if let Some(violation) = self.violation {
            return Err(match violation {
                Violation::Unsatisfied(index) => Error::Unsatisfied { index },
                Violation::Missing => Error::MissingWitness("constraint operand"),
            });
        }
        if self.mode == SynthesisMode::Prove {
            return Ok(());
        }
        let lookup = |i| self.lookup(i);
        let check = |c: &Constraint<F>| -> Option<bool> {
            Some(c.a.evaluate(lookup)? * c.b.evaluate(lookup)? == c.c.evaluate(lookup)?)
        };
        match self
            .constraints
            .par_iter()
            .position_first(|c| check(c) != Some(true))
        {
            None => Ok(()),
            Some(index) => match check(&self.constraints[index]) {
                None => Err(Error::MissingWitness("constraint operand")),
                Some(_) => Err(Error::Unsatisfied { index }),
            },
        }
    }

    pub fn matrices(&self) -> Result<ConstraintMatrices<F>> {
        if self.mode != SynthesisMode::Setup {
            return Err(Error::InvariantViolation(
                "constraints are only recorded in setup mode".into(),
            ));
        }
        Ok(ConstraintMatrices::from_constraints(
            &self.constraints,
            self.public.len(),
            self.private.len(),
        ))
    }

    /// Full assignment; fails if any value is missing or a constraint was violated.
    pub fn assignment(&self) -> Result<Assignment<F>> {
        self.is_satisfied()?;
        let public = self
            .public
            .iter()
            .copied()
            .collect::<Option<Vec<_>>>()
            .ok_or(Error::MissingWitness("public input"))?;
        let private = self
            .private
            .iter()
            .copied()
            .collect::<Option<Vec<_>>>()
            .ok_or(Error::MissingWitness("private witness"))?;
        Ok(Assignment { public, private })
    }
}
