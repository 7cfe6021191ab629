use ark_ff::PrimeField;
use ark_relations::r1cs::{
    ConstraintSynthesizer, ConstraintSystemRef, LinearCombination as ArkLinearCombination,
    SynthesisError, Variable as ArkVariable,
};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use libspartan::Instance;
use rayon::prelude::*;

use crate::{
    circuit::{Constraint, Index, LinearCombination},
    error::{self, Error},
    scalar,
};

#[derive(Debug, Clone, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct Term<F: PrimeField> {
    pub col: usize,
    pub coeff: F,
}

/// Row-major sparse R1CS. Column 0 is the constant one, columns `1..=num_public` the
/// public inputs, the rest private witnesses.
#[derive(Debug, Clone, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct ConstraintMatrices<F: PrimeField> {
    pub num_public: usize,
    pub num_private: usize,
    pub a: Vec<Vec<Term<F>>>,
    pub b: Vec<Vec<Term<F>>>,
    pub c: Vec<Vec<Term<F>>>,
}

/// Values for every non-constant column, in allocation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment<F: PrimeField> {
    pub public: Vec<F>,
    pub private: Vec<F>,
}

impl<F: PrimeField> Assignment<F> {
    fn column(&self, col: usize) -> F {
        match col {
            0 => F::one(),
            i if i <= self.public.len() => self.public[i - 1],
            i => self.private[i - 1 - self.public.len()],
        }
    }
}

impl<F: PrimeField> ConstraintMatrices<F> {
    pub fn from_constraints(
        constraints: &[Constraint<F>],
        num_public: usize,
        num_private: usize,
    ) -> Self {
        let row = |lc: &LinearCombination<F>| -> Vec<Term<F>> {
            lc.terms()
                .iter()
                .map(|(index, coeff)| Term {
                    col: match *index {
                        Index::One => 0,
                        Index::Public(i) => 1 + i,
                        Index::Private(i) => 1 + num_public + i,
                    },
                    coeff: *coeff,
                })
                .collect()
        };
        Self {
            num_public,
            num_private,
            a: constraints.iter().map(|c| row(&c.a)).collect(),
            b: constraints.iter().map(|c| row(&c.b)).collect(),
            c: constraints.iter().map(|c| row(&c.c)).collect(),
        }
    }

    pub fn num_constraints(&self) -> usize {
        self.a.len()
    }

    pub fn num_columns(&self) -> usize {
        1 + self.num_public + self.num_private
    }

    pub fn num_non_zero_entries(&self) -> usize {
        let nnz = |m: &[Vec<Term<F>>]| m.iter().map(Vec::len).sum::<usize>();
        nnz(&self.a).max(nnz(&self.b)).max(nnz(&self.c))
    }

    pub fn is_satisfied(&self, assignment: &Assignment<F>) -> error::Result<()> {
        if assignment.public.len() != self.num_public {
            return Err(Error::length(
                "public inputs",
                self.num_public,
                assignment.public.len(),
            ));
        }
        if assignment.private.len() != self.num_private {
            return Err(Error::length(
                "private witnesses",
                self.num_private,
                assignment.private.len(),
            ));
        }
        let eval = |row: &[Term<F>]| -> F {
            row.iter()
                .map(|t| assignment.column(t.col) * t.coeff)
                .sum()
        };
        let failed = (0..self.num_constraints())
            .into_par_iter()
            .find_first(|&i| eval(&self.a[i]) * eval(&self.b[i]) != eval(&self.c[i]));
        match failed {
            Some(index) => Err(Error::Unsatisfied { index }),
            None => Ok(()),
        }
    }

    /// SHA-256 of the canonical encoding; identifies the circuit across artifacts.
    pub fn digest(&self) -> error::Result<[u8; 32]> {
        let mut bytes = Vec::with_capacity(self.serialized_size(ark_serialize::Compress::No));
        self.serialize_uncompressed(&mut bytes)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        Ok(scalar::sha256(&bytes))
    }

    /// Spartan orders columns as witnesses, the constant one, then inputs.
    fn spartan_column(&self, col: usize) -> usize {
        match col {
            0 => self.num_private,
            i if i <= self.num_public => self.num_private + i,
            i => i - 1 - self.num_public,
        }
    }

    pub fn into_spartan(&self) -> error::Result<SpartanR1cs> {
        let triplets = |m: &[Vec<Term<F>>]| -> error::Result<Vec<(usize, usize, [u8; 32])>> {
            let mut out = Vec::new();
            for (row, terms) in m.iter().enumerate() {
                for t in terms {
                    out.push((
                        row,
                        self.spartan_column(t.col),
                        scalar::to_dalek_bytes(t.coeff)?,
                    ));
                }
            }
            Ok(out)
        };
        let (a, b, c) = (triplets(&self.a)?, triplets(&self.b)?, triplets(&self.c)?);

        let num_consts = self.num_constraints();
        let instance = Instance::new(num_consts, self.num_private, self.num_public, &a, &b, &c)
            .map_err(|e| Error::Setup(format!("{e:?}")))?;

        Ok(SpartanR1cs {
            num_consts,
            num_vars: self.num_private,
            num_inputs: self.num_public,
            num_non_zero_entries: a.len().max(b.len()).max(c.len()),
            instance,
        })
    }
}

pub struct SpartanR1cs {
    pub num_consts: usize,
    pub num_vars: usize,
    pub num_inputs: usize,
    pub num_non_zero_entries: usize,
    pub instance: Instance,
}

/// Replays recorded matrices into an arkworks constraint system.
pub struct ReplayCircuit<'a, F: PrimeField> {
    matrices: &'a ConstraintMatrices<F>,
    assignment: Option<&'a Assignment<F>>,
}

impl<'a, F: PrimeField> ReplayCircuit<'a, F> {
    pub fn setup(matrices: &'a ConstraintMatrices<F>) -> Self {
        Self {
            matrices,
            assignment: None,
        }
    }

    pub fn prove(matrices: &'a ConstraintMatrices<F>, assignment: &'a Assignment<F>) -> Self {
        Self {
            matrices,
            assignment: Some(assignment),
        }
    }
}

impl<F: PrimeField> ConstraintSynthesizer<F> for ReplayCircuit<'_, F> {
    fn generate_constraints(self, cs: ConstraintSystemRef<F>) -> Result<(), SynthesisError> {
        let mut columns = Vec::with_capacity(self.matrices.num_columns());
        columns.push(ArkVariable::One);
        for i in 0..self.matrices.num_public {
            let value = self.assignment.map(|a| a.public[i]);
            columns.push(cs.new_input_variable(|| value.ok_or(SynthesisError::AssignmentMissing))?);
        }
        for i in 0..self.matrices.num_private {
            let value = self.assignment.map(|a| a.private[i]);
            columns.push(cs.new_witness_variable(|| value.ok_or(SynthesisError::AssignmentMissing))?);
        }

        let lc = |row: &[Term<F>]| {
            ArkLinearCombination(row.iter().map(|t| (t.coeff, columns[t.col])).collect())
        };
        for ((a, b), c) in self
            .matrices
            .a
            .iter()
            .zip(&self.matrices.b)
            .zip(&self.matrices.c)
        {
            cs.enforce_constraint(lc(a), lc(b), lc(c))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ark_ed25519::Fr;
    use curve25519_dalek::Scalar;
    use libspartan::{InputsAssignment, VarsAssignment};

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
        let matrices = cs.matrices().unwrap();
        let assignment = Assignment {
            public: vec![i0.value().unwrap(), i1.value().unwrap()],
            private: vec![fr(30), v0.value().unwrap(), v0.value().unwrap() * i1.value().unwrap()],
        };
        (matrices, assignment)
    }

    #[test]
    fn test_matrices_layout() {
        let (matrices, _) = mult_circuit(5, 6);
        assert_eq!(matrices.num_constraints(), 3);
        assert_eq!(matrices.num_public, 2);
        assert_eq!(matrices.num_private, 3);
        // thirty - 30 == 0
        assert_eq!(
            matrices.a[0],
            vec![
                Term { col: 0, coeff: -fr(30) },
                Term { col: 3, coeff: fr(1) }
            ]
        );
    }

    #[test]
    fn test_is_satisfied() {
        let (matrices, mut assignment) = mult_circuit(5, 6);
        assert!(matrices.is_satisfied(&assignment).is_ok());

        assignment.private[2] += fr(1);
        assert!(matches!(
            matrices.is_satisfied(&assignment),
            Err(Error::Unsatisfied { index: 2 })
        ));

        assignment.private.pop();
        assert!(matches!(
            matrices.is_satisfied(&assignment),
            Err(Error::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_canonical_round_trip_keeps_digest() {
        let (matrices, _) = mult_circuit(5, 6);
        let mut bytes = Vec::new();
        matrices.serialize_uncompressed(&mut bytes).unwrap();
        let restored = ConstraintMatrices::<Fr>::deserialize_uncompressed(&bytes[..]).unwrap();
        assert_eq!(restored, matrices);
        assert_eq!(restored.digest().unwrap(), matrices.digest().unwrap());
    }

    #[test]
    fn test_spartan_instance_is_sat() {
        let (matrices, assignment) = mult_circuit(5, 6);
        let r1cs = matrices.into_spartan().unwrap();
        assert_eq!(r1cs.num_consts, 3);
        assert_eq!(r1cs.num_vars, 3);
        assert_eq!(r1cs.num_inputs, 2);

        // v0 = 30 * 5 = 150
        // v1 = 150 * 6 = 900
        assert_eq!(
            r1cs.instance.is_sat(
                &VarsAssignment::new(&[
                    Scalar::from(30u32).to_bytes(),
                    Scalar::from(150u32).to_bytes(),
                    Scalar::from(900u32).to_bytes()
                ])
                .unwrap(),
                &InputsAssignment::new(&[
                    Scalar::from(5u32).to_bytes(),
                    Scalar::from(6u32).to_bytes()
                ])
                .unwrap()
            ),
            Ok(true)
        );
        assert!(matrices.is_satisfied(&assignment).is_ok());
    }

    #[test]
    fn test_replay_matches_arkworks() {
        use ark_relations::r1cs::ConstraintSystem as ArkConstraintSystem;

        let (matrices, assignment) = mult_circuit(5, 6);
        let cs = ArkConstraintSystem::<Fr>::new_ref();
        ReplayCircuit::prove(&matrices, &assignment)
            .generate_constraints(cs.clone())
            .unwrap();
        assert_eq!(cs.num_constraints(), 3);
        assert_eq!(cs.num_instance_variables(), 3);
        assert!(cs.is_satisfied().unwrap());
    }
}
