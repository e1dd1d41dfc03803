//! Padded binary merkle trees.
//!
//! Every tree in the bridge pads its leaf layer to the next power of two
//! with the zero leaf, so a root is a pure function of the occupied leaf
//! set and is reproducible independent of insertion history.

use ethers_core::types::H256;

use crate::accumulator::{hash_concat, MAX_DEPTH, ZERO_HASHES};

/// Number of tree levels above a leaf layer padded to `len` slots
pub fn padded_depth(len: usize) -> usize {
    let width = len.next_power_of_two().max(1);
    width.trailing_zeros() as usize
}

/// Compute the root of a padded binary tree over `leaves`.
///
/// An empty leaf set has the zero root. A single leaf is its own root.
pub fn padded_root(leaves: &[H256]) -> H256 {
    if leaves.is_empty() {
        return H256::zero();
    }
    let depth = padded_depth(leaves.len());
    assert!(depth <= MAX_DEPTH);

    let mut level: Vec<H256> = leaves.to_vec();
    for height in 0..depth {
        let zero = ZERO_HASHES[height];
        if level.len() % 2 == 1 {
            level.push(zero);
        }
        level = level
            .chunks(2)
            .map(|pair| hash_concat(pair[0], pair[1]))
            .collect();
    }
    debug_assert_eq!(level.len(), 1);
    level[0]
}

/// Generate the sibling branch proving `leaves[index]` under `padded_root`.
pub fn padded_branch(leaves: &[H256], index: usize) -> Vec<H256> {
    assert!(index < leaves.len(), "branch index out of range");
    let depth = padded_depth(leaves.len());

    let mut branch = Vec::with_capacity(depth);
    let mut level: Vec<H256> = leaves.to_vec();
    let mut idx = index;
    for height in 0..depth {
        let zero = ZERO_HASHES[height];
        if level.len() % 2 == 1 {
            level.push(zero);
        }
        branch.push(level[idx ^ 1]);
        idx /= 2;
        level = level
            .chunks(2)
            .map(|pair| hash_concat(pair[0], pair[1]))
            .collect();
    }
    branch
}

/// Compute a root hash from a leaf and a merkle branch. The branch length
/// is the tree depth; bit `i` of `index` selects the side at level `i`.
pub fn merkle_root_from_branch(leaf: H256, branch: &[H256], index: usize) -> H256 {
    let mut current = leaf;

    for (i, next) in branch.iter().enumerate() {
        let ith_bit = (index >> i) & 0x01;
        if ith_bit == 1 {
            current = hash_concat(next, current);
        } else {
            current = hash_concat(current, next);
        }
    }

    current
}

/// Verify a merkle branch against an expected root.
pub fn verify_merkle_proof(leaf: H256, branch: &[H256], index: usize, root: H256) -> bool {
    merkle_root_from_branch(leaf, branch, index) == root
}
