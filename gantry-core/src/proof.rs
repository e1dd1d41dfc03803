//! Seams between the lane state machines and their host chain.
//!
//! Proof verification and message dispatch are capabilities the lanes call
//! through traits: each target chain plugs in its own verifier (committer
//! branches here, storage-trie walkers elsewhere) and its own application
//! dispatch surface.

use ethers_core::types::H256;

use crate::accumulator::{merkle::verify_merkle_proof, LaneProof};
use crate::types::{LaneId, Message};

/// Verifies that a lane snapshot hash is committed under a trust anchor.
///
/// Implementations must be pure checks: no state, no side effects.
pub trait ProofVerifier {
    /// Whether `proof` ties `leaf` (a lane data hash) at `lane_pos` to
    /// `root` (the verified remote message root)
    fn verify_membership(&self, root: H256, lane_pos: u32, leaf: H256, proof: &LaneProof) -> bool;
}

/// Verifier for chains whose message root is the committer tree itself
#[derive(Debug, Clone, Copy, Default)]
pub struct CommitterProofVerifier;

impl ProofVerifier for CommitterProofVerifier {
    fn verify_membership(&self, root: H256, lane_pos: u32, leaf: H256, proof: &LaneProof) -> bool {
        proof.lane_pos == lane_pos
            && verify_merkle_proof(leaf, &proof.branch, lane_pos as usize, root)
    }
}

/// The EVM-side storage proof blob: an account proof plus slot proofs for
/// the lane identity, the lane nonces, and each pending message slot.
///
/// Carried opaquely; walking the trie belongs to the per-chain verifier
/// that consumes this bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StorageProofBundle {
    /// Account inclusion proof nodes
    pub account_proof: Vec<Vec<u8>>,
    /// Proof nodes for the lane identity slot
    pub lane_identity_slot_proof: Vec<Vec<u8>>,
    /// Proof nodes for the lane nonce slot
    pub lane_nonce_slot_proof: Vec<Vec<u8>>,
    /// Proof nodes per pending message slot
    pub lane_message_slot_proofs: Vec<Vec<Vec<u8>>>,
}

/// A failed application dispatch. Non-fatal: the lane records the failure
/// and the nonce is still consumed.
#[derive(Debug, thiserror::Error)]
#[error("Dispatch failed: {reason}")]
pub struct DispatchError {
    /// Application-provided failure description
    pub reason: String,
}

impl DispatchError {
    /// Wrap an application failure description
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Target-application surface for inbound dispatch.
///
/// The bridge treats payloads as opaque bytes; whatever the application
/// returns travels back in the `MessageDispatched` event.
pub trait MessageDispatch {
    /// Dispatch one message within the given budget, returning the
    /// application's return data
    fn dispatch(
        &mut self,
        lane: &LaneId,
        message: &Message,
        budget: u64,
    ) -> Result<Vec<u8>, DispatchError>;
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::accumulator::MessageCommitter;

    #[test]
    fn committer_verifier_checks_position() {
        let mut committer = MessageCommitter::default();
        committer.note_lane_root(0, H256::repeat_byte(1));
        committer.note_lane_root(1, H256::repeat_byte(2));
        let root = committer.commitment();
        let proof = committer.prove(1).unwrap();

        let verifier = CommitterProofVerifier;
        assert!(verifier.verify_membership(root, 1, H256::repeat_byte(2), &proof));
        // right branch, wrong claimed position
        assert!(!verifier.verify_membership(root, 0, H256::repeat_byte(2), &proof));
        // wrong leaf
        assert!(!verifier.verify_membership(root, 1, H256::repeat_byte(3), &proof));
    }
}
