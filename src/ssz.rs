//! SSZ Merkle proofs over SHA-256.
//!
//! A generalized index `g` for a node at depth `d` satisfies `2^d <= g < 2^(d+1)`;
//! bit `i` of `g` tells whether the node on level `i` is a right child. Proofs are
//! accepted only when `g` encodes exactly `proof.len()` levels.

use ark_ff::PrimeField;
use tracing::debug;

use crate::{
    circuit::ConstraintSystem,
    error::{Error, Result},
    sha,
    vars::{Bit, Bytes32, U64},
};

fn hash_pair<F: PrimeField>(
    cs: &mut ConstraintSystem<F>,
    left: &Bytes32<F>,
    right: &Bytes32<F>,
) -> Result<Bytes32<F>> {
    let mut message = Vec::with_capacity(64);
    message.extend_from_slice(left.bytes());
    message.extend_from_slice(right.bytes());
    sha::sha256(cs, &message)
}

fn gindex_depth(gindex: u64) -> usize {
    (u64::BITS - gindex.leading_zeros()).saturating_sub(1) as usize
}

fn check_gindex(gindex: u64, depth: usize) -> Result<()> {
    if gindex == 0 || gindex_depth(gindex) != depth {
        return Err(Error::length("gindex depth", depth, gindex_depth(gindex)));
    }
    Ok(())
}

/// Walks `proof` from `leaf` to the root. Sibling order is fixed by the constant
/// `gindex`, so the walk costs only the hashes.
pub fn restore_merkle_root<F: PrimeField>(
    cs: &mut ConstraintSystem<F>,
    leaf: &Bytes32<F>,
    proof: &[Bytes32<F>],
    gindex: u64,
) -> Result<Bytes32<F>> {
    check_gindex(gindex, proof.len())?;
    let mut hash = leaf.clone();
    let mut index = gindex;
    for sibling in proof {
        hash = if index % 2 == 1 {
            hash_pair(cs, sibling, &hash)?
        } else {
            hash_pair(cs, &hash, sibling)?
        };
        index >>= 1;
    }
    Ok(hash)
}

pub fn restore_merkle_root_with_gindex_variable<F: PrimeField>(
    cs: &mut ConstraintSystem<F>,
    leaf: &Bytes32<F>,
    proof: &[Bytes32<F>],
    gindex: &U64<F>,
) -> Result<Bytes32<F>> {
    let depth = proof.len();
    let bits = cs.to_bits_le(gindex.variable(), depth + 1)?;
    bits[depth].assert_equal(cs, &Bit::one());

    let mut hash = leaf.clone();
    for (bit, sibling) in bits.iter().zip(proof) {
        let (left, right) = Bytes32::swap(cs, bit, sibling, &hash)?;
        hash = hash_pair(cs, &left, &right)?;
    }
    Ok(hash)
}

pub fn verify_proof<F: PrimeField>(
    cs: &mut ConstraintSystem<F>,
    root: &Bytes32<F>,
    leaf: &Bytes32<F>,
    proof: &[Bytes32<F>],
    gindex: u64,
) -> Result<()> {
    let restored = restore_merkle_root(cs, leaf, proof, gindex)?;
    restored.assert_equal(cs, root);
    Ok(())
}

pub fn verify_proof_with_gindex_variable<F: PrimeField>(
    cs: &mut ConstraintSystem<F>,
    root: &Bytes32<F>,
    leaf: &Bytes32<F>,
    proof: &[Bytes32<F>],
    gindex: &U64<F>,
) -> Result<()> {
    let restored = restore_merkle_root_with_gindex_variable(cs, leaf, proof, gindex)?;
    restored.assert_equal(cs, root);
    Ok(())
}

pub fn hash_tree_root<F: PrimeField>(
    cs: &mut ConstraintSystem<F>,
    leaves: &[Bytes32<F>],
) -> Result<Bytes32<F>> {
    if !leaves.len().is_power_of_two() {
        return Err(Error::InvalidLeafCount(leaves.len()));
    }
    let mut level = leaves.to_vec();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| hash_pair(cs, &pair[0], &pair[1]))
            .collect::<Result<_>>()?;
    }
    debug!(leaves = leaves.len(), "hash tree root");
    Ok(level.remove(0))
}

/// Host-side versions of the gadgets, for witness generation and checks.
pub mod native {
    use sha2::{Digest, Sha256};

    use super::check_gindex;
    use crate::error::{Error, Result};

    pub fn hash_pair(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
        Sha256::new()
            .chain_update(left)
            .chain_update(right)
            .finalize()
            .into()
    }

    pub fn restore_merkle_root(leaf: [u8; 32], proof: &[[u8; 32]], gindex: u64) -> Result<[u8; 32]> {
        check_gindex(gindex, proof.len())?;
        let mut index = gindex;
        Ok(proof.iter().fold(leaf, |hash, sibling| {
            let next = if index % 2 == 1 {
                hash_pair(sibling, &hash)
            } else {
                hash_pair(&hash, sibling)
            };
            index >>= 1;
            next
        }))
    }

    pub fn verify_proof(root: [u8; 32], leaf: [u8; 32], proof: &[[u8; 32]], gindex: u64) -> Result<bool> {
        Ok(restore_merkle_root(leaf, proof, gindex)? == root)
    }

    pub fn hash_tree_root(leaves: &[[u8; 32]]) -> Result<[u8; 32]> {
        if !leaves.len().is_power_of_two() {
            return Err(Error::InvalidLeafCount(leaves.len()));
        }
        let mut level = leaves.to_vec();
        while level.len() > 1 {
            level = level
                .chunks(2)
                .map(|pair| hash_pair(&pair[0], &pair[1]))
                .collect();
        }
        Ok(level[0])
    }
}

#[cfg(test)]
mod tests {
    use ark_bn254::Fr;

    use super::*;

    struct Vector {
        gindex: u64,
        root: [u8; 32],
        leaf: [u8; 32],
        proof: Vec<[u8; 32]>,
    }

    fn decode(s: &str) -> [u8; 32] {
        hex::decode(s).unwrap().try_into().unwrap()
    }

    // beacon state branch of depth 6
    fn vector() -> Vector {
        Vector {
            gindex: 105,
            root: decode("e81a65c5c0f2a36e40b6872fcfdd62dbb67d47f3d49a6b978c0d4440341e723f"),
            leaf: decode("d85d3181f1178b07e89691aa2bfcd4d88837f011fcda3326b4ce9a68ec6d9e44"),
            proof: [
                "e424020000000000000000000000000000000000000000000000000000000000",
                "75410a8f37f9506fb3f972cce6ece955e381e51037e432ce4ca47479c9cd9158",
                "e6af38835c0ac3c2b0d561dfaec168171d7d77c1c2e8e74ff9b1891cf43faf8d",
                "3e4fb2d12bd835bc6ee23b5ec65a43f4493e32f5ef45d46bd2c38830b17672bb",
                "880548f4df2d4003f7be2fbbde112eb46b8f756b5e33202e04863000e4383f3b",
                "88475251bcec25245a44bddd92b2c36db6c9c48bc6d91b5d0da78af3229ff783",
            ]
            .into_iter()
            .map(decode)
            .collect(),
        }
    }

    fn alloc(cs: &mut ConstraintSystem<Fr>, v: &Vector, root: [u8; 32]) -> (Bytes32<Fr>, Bytes32<Fr>, Vec<Bytes32<Fr>>) {
        let root = Bytes32::alloc(cs, Some(root)).unwrap();
        let leaf = Bytes32::alloc(cs, Some(v.leaf)).unwrap();
        let proof = v
            .proof
            .iter()
            .map(|p| Bytes32::alloc(cs, Some(*p)).unwrap())
            .collect();
        (root, leaf, proof)
    }

    #[test]
    fn test_native_vector() {
        let v = vector();
        assert!(native::verify_proof(v.root, v.leaf, &v.proof, v.gindex).unwrap());
        assert!(!native::verify_proof([0; 32], v.leaf, &v.proof, v.gindex).unwrap());
    }

    #[test]
    fn test_verify_proof() {
        let v = vector();
        let mut cs = ConstraintSystem::<Fr>::prove();
        let (root, leaf, proof) = alloc(&mut cs, &v, v.root);
        verify_proof(&mut cs, &root, &leaf, &proof, v.gindex).unwrap();
        assert!(cs.is_satisfied().is_ok());
    }

    #[test]
    fn test_verify_proof_wrong_root() {
        let v = vector();
        let mut cs = ConstraintSystem::<Fr>::prove();
        let (root, leaf, proof) = alloc(&mut cs, &v, [0; 32]);
        verify_proof(&mut cs, &root, &leaf, &proof, v.gindex).unwrap();
        assert!(matches!(cs.is_satisfied(), Err(Error::Unsatisfied { .. })));
    }

    #[test]
    fn test_gindex_depth_mismatch() {
        let v = vector();
        let mut cs = ConstraintSystem::<Fr>::setup();
        let (root, leaf, proof) = alloc(&mut cs, &v, v.root);
        for gindex in [0, 52, 210] {
            assert!(matches!(
                verify_proof(&mut cs, &root, &leaf, &proof, gindex),
                Err(Error::LengthMismatch { .. })
            ));
        }
        assert!(native::restore_merkle_root(v.leaf, &v.proof, 52).is_err());
    }

    #[test]
    fn test_verify_proof_with_gindex_variable() {
        let v = vector();
        let mut cs = ConstraintSystem::<Fr>::prove();
        let (root, leaf, proof) = alloc(&mut cs, &v, v.root);
        let gindex = U64::alloc(&mut cs, Some(v.gindex)).unwrap();
        verify_proof_with_gindex_variable(&mut cs, &root, &leaf, &proof, &gindex).unwrap();
        assert!(cs.is_satisfied().is_ok());
    }

    #[test]
    fn test_gindex_variable_must_match_depth() {
        // 41 has the same low six bits as 105 but only encodes five levels
        let v = vector();
        let mut cs = ConstraintSystem::<Fr>::prove();
        let (root, leaf, proof) = alloc(&mut cs, &v, v.root);
        let gindex = U64::alloc(&mut cs, Some(41)).unwrap();
        verify_proof_with_gindex_variable(&mut cs, &root, &leaf, &proof, &gindex).unwrap();
        assert!(cs.is_satisfied().is_err());
    }

    #[test]
    fn test_gindex_variable_matches_native() {
        let leaf = [9u8; 32];
        let proof = [[1u8; 32], [2; 32]];
        for g in 4..8u64 {
            let expected = native::restore_merkle_root(leaf, &proof, g).unwrap();
            let mut cs = ConstraintSystem::<Fr>::prove();
            let leaf = Bytes32::alloc(&mut cs, Some(leaf)).unwrap();
            let branch: Vec<_> = proof
                .iter()
                .map(|p| Bytes32::alloc(&mut cs, Some(*p)).unwrap())
                .collect();
            let gindex = U64::alloc(&mut cs, Some(g)).unwrap();
            let root = restore_merkle_root_with_gindex_variable(&mut cs, &leaf, &branch, &gindex).unwrap();
            assert_eq!(root.value().unwrap(), Some(expected), "gindex {g}");
            assert!(cs.is_satisfied().is_ok());
        }
    }

    #[test]
    fn test_gindex_variable_selects_once_per_level() {
        let v = vector();
        let depth = v.proof.len();
        let mut cs = ConstraintSystem::<Fr>::setup();
        let (_, leaf, proof) = alloc(&mut cs, &v, v.root);
        let gindex = U64::alloc(&mut cs, None).unwrap();

        let before = cs.num_constraints();
        restore_merkle_root(&mut cs, &leaf, &proof, v.gindex).unwrap();
        let constant = cs.num_constraints() - before;

        let before = cs.num_constraints();
        restore_merkle_root_with_gindex_variable(&mut cs, &leaf, &proof, &gindex).unwrap();
        let variable = cs.num_constraints() - before;

        // a bitwise select per level plus the gindex decomposition
        assert!(variable - constant <= depth * 256 + 2 * (depth + 2));
    }

    #[test]
    fn test_hash_tree_root() {
        let leaves = [[1u8; 32], [2; 32], [3; 32], [4; 32]];
        let expected = native::hash_pair(
            &native::hash_pair(&leaves[0], &leaves[1]),
            &native::hash_pair(&leaves[2], &leaves[3]),
        );
        assert_eq!(native::hash_tree_root(&leaves).unwrap(), expected);

        let mut cs = ConstraintSystem::<Fr>::prove();
        let vars: Vec<_> = leaves
            .iter()
            .map(|l| Bytes32::alloc(&mut cs, Some(*l)).unwrap())
            .collect();
        let root = hash_tree_root(&mut cs, &vars).unwrap();
        assert_eq!(root.value().unwrap(), Some(expected));
        assert!(cs.is_satisfied().is_ok());
    }

    #[test]
    fn test_hash_tree_root_leaf_count() {
        let mut cs = ConstraintSystem::<Fr>::setup();
        let leaves = vec![Bytes32::<Fr>::constant([0; 32]); 3];
        assert!(matches!(
            hash_tree_root(&mut cs, &leaves),
            Err(Error::InvalidLeafCount(3))
        ));
        assert!(matches!(
            native::hash_tree_root(&[]),
            Err(Error::InvalidLeafCount(0))
        ));
        assert_eq!(native::hash_tree_root(&[[7; 32]]).unwrap(), [7; 32]);
    }
}
