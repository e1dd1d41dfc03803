//! The chain-level message committer.
//!
//! Each lane's current data hash is a leaf, ordered by lane position. The
//! chain commitment is the padded-tree root over those leaves, so one
//! commitment attests to every lane and a single branch proves any one of
//! them.

use ethers_core::types::H256;
use tracing::debug;

use crate::accumulator::merkle::{padded_branch, padded_root};

/// Committer errors
#[derive(Debug, thiserror::Error)]
pub enum CommitterError {
    /// Requested a proof for a lane position with no recorded root
    #[error("No lane root recorded at position {0}")]
    UnknownLane(u32),
}

/// A membership branch tying one lane's data hash to the chain commitment
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LaneProof {
    /// The lane position (leaf index)
    pub lane_pos: u32,
    /// The sibling branch, leaf-adjacent first
    pub branch: Vec<H256>,
}

/// Aggregates per-lane roots into a single chain commitment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageCommitter {
    leaves: Vec<H256>,
}

impl MessageCommitter {
    /// Record (or refresh) the data hash of the lane at `lane_pos`.
    ///
    /// Positions between the current edge and `lane_pos` are filled with
    /// the zero leaf, keeping leaf order equal to lane-position order.
    pub fn note_lane_root(&mut self, lane_pos: u32, root: H256) {
        let idx = lane_pos as usize;
        if idx >= self.leaves.len() {
            self.leaves.resize(idx + 1, H256::zero());
        }
        self.leaves[idx] = root;
        debug!(lane_pos, ?root, "Noted lane root");
    }

    /// The current chain-level commitment root
    pub fn commitment(&self) -> H256 {
        padded_root(&self.leaves)
    }

    /// Number of lane positions currently tracked
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// True when no lane root has been recorded
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Produce the branch proving the lane at `lane_pos` under the current
    /// commitment
    pub fn prove(&self, lane_pos: u32) -> Result<LaneProof, CommitterError> {
        let idx = lane_pos as usize;
        if idx >= self.leaves.len() {
            return Err(CommitterError::UnknownLane(lane_pos));
        }
        Ok(LaneProof {
            lane_pos,
            branch: padded_branch(&self.leaves, idx),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::accumulator::merkle::verify_merkle_proof;

    #[test]
    fn empty_committer_has_zero_root() {
        assert_eq!(MessageCommitter::default().commitment(), H256::zero());
    }

    #[test]
    fn history_independent_root() {
        let mut a = MessageCommitter::default();
        a.note_lane_root(0, H256::repeat_byte(1));
        a.note_lane_root(2, H256::repeat_byte(3));
        a.note_lane_root(1, H256::repeat_byte(2));

        let mut b = MessageCommitter::default();
        b.note_lane_root(1, H256::repeat_byte(9));
        b.note_lane_root(1, H256::repeat_byte(2));
        b.note_lane_root(2, H256::repeat_byte(3));
        b.note_lane_root(0, H256::repeat_byte(1));

        assert_eq!(a.commitment(), b.commitment());
    }

    #[test]
    fn proves_recorded_lanes() {
        let mut committer = MessageCommitter::default();
        for pos in 0..5u32 {
            committer.note_lane_root(pos, H256::repeat_byte(pos as u8 + 1));
        }
        let root = committer.commitment();
        let proof = committer.prove(3).unwrap();
        assert!(verify_merkle_proof(
            H256::repeat_byte(4),
            &proof.branch,
            proof.lane_pos as usize,
            root
        ));
        assert!(matches!(
            committer.prove(9),
            Err(CommitterError::UnknownLane(9))
        ));
    }
}
