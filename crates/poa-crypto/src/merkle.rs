use poa_core::types::Hash256;

use crate::hash::hash;

/// `transactionsRoot` — Merkle root over transaction hashes, with
/// odd-level duplication: a level with an odd node count duplicates its
/// last node before pairing (§3 "Block").
///
/// `merkleRoot([]) == Hash256::ZERO` by convention (an empty block commits
/// to the zero digest).
pub fn merkle_root(leaves: &[Hash256]) -> Hash256 {
    if leaves.is_empty() {
        return Hash256::ZERO;
    }
    let mut level: Vec<Hash256> = leaves.to_vec();
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            level.push(*level.last().unwrap());
        }
        level = level
            .chunks(2)
            .map(|pair| hash_pair(&pair[0], &pair[1]))
            .collect();
    }
    level[0]
}

fn hash_pair(left: &Hash256, right: &Hash256) -> Hash256 {
    let mut buf = Vec::with_capacity(64);
    buf.extend_from_slice(left.as_bytes());
    buf.extend_from_slice(right.as_bytes());
    hash(&buf)
}

/// One step of an inclusion proof: the sibling hash, and whether the
/// sibling sits to the left of the node being hashed up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MerkleStep {
    pub sibling: Hash256,
    pub sibling_is_left: bool,
}

/// Builds an inclusion proof for `leaves[index]`. Returns `None` if
/// `index` is out of range.
pub fn merkle_proof(leaves: &[Hash256], index: usize) -> Option<Vec<MerkleStep>> {
    if index >= leaves.len() {
        return None;
    }
    let mut proof = Vec::new();
    let mut level: Vec<Hash256> = leaves.to_vec();
    let mut idx = index;
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            level.push(*level.last().unwrap());
        }
        let pair_idx = idx ^ 1;
        let sibling_is_left = pair_idx < idx;
        proof.push(MerkleStep {
            sibling: level[pair_idx],
            sibling_is_left,
        });
        level = level
            .chunks(2)
            .map(|pair| hash_pair(&pair[0], &pair[1]))
            .collect();
        idx /= 2;
    }
    Some(proof)
}

/// Recomputes the root implied by `leaf` and `proof`, and checks it
/// equals `root`.
pub fn verify_merkle_proof(leaf: Hash256, proof: &[MerkleStep], root: Hash256) -> bool {
    let mut current = leaf;
    for step in proof {
        current = if step.sibling_is_left {
            hash_pair(&step.sibling, &current)
        } else {
            hash_pair(&current, &step.sibling)
        };
    }
    current == root
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(n: u8) -> Hash256 {
        hash(&[n])
    }

    #[test]
    fn empty_root_is_zero() {
        assert_eq!(merkle_root(&[]), Hash256::ZERO);
    }

    #[test]
    fn single_leaf_root_is_the_leaf_itself() {
        let l = leaf(1);
        assert_eq!(merkle_root(&[l]), l);
    }

    #[test]
    fn odd_level_duplicates_last_node() {
        let leaves = vec![leaf(1), leaf(2), leaf(3)];
        let expected = {
            let h01 = hash_pair(&leaves[0], &leaves[1]);
            let h22 = hash_pair(&leaves[2], &leaves[2]);
            hash_pair(&h01, &h22)
        };
        assert_eq!(merkle_root(&leaves), expected);
    }

    #[test]
    fn proof_round_trips_for_every_leaf() {
        let leaves: Vec<Hash256> = (0..7).map(leaf).collect();
        let root = merkle_root(&leaves);
        for (i, l) in leaves.iter().enumerate() {
            let proof = merkle_proof(&leaves, i).unwrap();
            assert!(verify_merkle_proof(*l, &proof, root));
        }
    }

    #[test]
    fn proof_rejects_wrong_leaf() {
        let leaves: Vec<Hash256> = (0..4).map(leaf).collect();
        let root = merkle_root(&leaves);
        let proof = merkle_proof(&leaves, 0).unwrap();
        assert!(!verify_merkle_proof(leaf(99), &proof, root));
    }
}
