use ethers_core::types::{Address, H256};

use crate::accumulator::{
    hash,
    merkle::{padded_branch, padded_depth, padded_root, verify_merkle_proof},
};

/// Leaf hash of one authority address
pub fn authority_leaf(address: &Address) -> H256 {
    hash(address.as_bytes())
}

/// One generation of the bridged chain's validator set, committed as a
/// padded merkle tree over member-address leaves.
///
/// Generation ids strictly increase; a set is rotated atomically and a
/// commitment signed under a retired id is permanently invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AuthoritySet {
    /// Generation id
    pub id: u64,
    /// Padded-tree root over `authority_leaf` of each member, index order
    pub root: H256,
    /// Number of members
    pub len: u32,
}

impl AuthoritySet {
    /// Build a set directly from its member list
    pub fn of_members(id: u64, members: &[Address]) -> Self {
        let leaves: Vec<H256> = members.iter().map(authority_leaf).collect();
        Self {
            id,
            root: padded_root(&leaves),
            len: members.len() as u32,
        }
    }

    /// Votes required to accept a commitment: strictly more than two thirds
    /// of the set, as `2n/3 + 1`
    pub fn threshold(&self) -> u32 {
        self.len * 2 / 3 + 1
    }

    /// Check that `proof` places its address inside this set
    pub fn verify_membership(&self, proof: &AuthorityMembershipProof) -> bool {
        proof.index < self.len
            && proof.branch.len() == padded_depth(self.len as usize)
            && verify_merkle_proof(
                authority_leaf(&proof.address),
                &proof.branch,
                proof.index as usize,
                self.root,
            )
    }
}

/// A compact proof that an address occupies a slot of an authority set
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AuthorityMembershipProof {
    /// The claimed slot
    pub index: u32,
    /// The member address
    pub address: Address,
    /// Sibling branch against the set root
    pub branch: Vec<H256>,
}

impl AuthorityMembershipProof {
    /// Produce the proof for `members[index]`
    pub fn of_members(members: &[Address], index: usize) -> Self {
        let leaves: Vec<H256> = members.iter().map(authority_leaf).collect();
        Self {
            index: index as u32,
            address: members[index],
            branch: padded_branch(&leaves, index),
        }
    }
}
