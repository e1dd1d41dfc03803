//! The light-client commitment verifier.
//!
//! Tracks the latest finalized commitment of the bridged chain and the
//! authority set entitled to sign the next one. Imports are all-or-nothing:
//! every check runs before any state is touched, so a failed import leaves
//! the verifier byte-for-byte unchanged.

use std::collections::BTreeSet;

use ethers_core::types::{SignatureError, H256};
use tracing::info;

use crate::types::{AuthorityMembershipProof, AuthoritySet, AuthoritySignature, Commitment};

/// Light client errors
#[derive(Debug, thiserror::Error)]
pub enum VerifierError {
    /// The offered commitment does not supersede the current one
    #[error("Stale commitment: offered ({offered_set}, {offered_block}), current ({current_set}, {current_block})")]
    StaleCommitment {
        /// The offered validator set id
        offered_set: u64,
        /// The offered block number
        offered_block: u32,
        /// The current validator set id
        current_set: u64,
        /// The current block number
        current_block: u32,
    },
    /// The offered set id is neither the active set nor the scheduled next
    #[error("Unknown authority set {offered}, active set is {active}")]
    UnknownAuthoritySet {
        /// The offered validator set id
        offered: u64,
        /// The active set id
        active: u64,
    },
    /// Fewer proven distinct signers than the supermajority threshold
    #[error("Quorum not met: {votes} of {threshold} required votes")]
    QuorumNotMet {
        /// Distinct proven signers
        votes: u32,
        /// The required vote count
        threshold: u32,
    },
    /// Signature recovery error passthrough
    #[error(transparent)]
    SignatureError(#[from] SignatureError),
}

/// Holds the latest verified commitment for the bridged chain and verifies
/// commitments offered by relayers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightClientVerifier {
    current: Commitment,
    authority_set: AuthoritySet,
    next_authority_set: Option<AuthoritySet>,
}

impl LightClientVerifier {
    /// Instantiate from a trusted genesis commitment and its authority set
    pub fn new(genesis: Commitment, authority_set: AuthoritySet) -> Self {
        debug_assert_eq!(genesis.validator_set_id, authority_set.id);
        Self {
            current: genesis,
            authority_set,
            next_authority_set: None,
        }
    }

    /// The latest verified commitment
    pub fn current(&self) -> &Commitment {
        &self.current
    }

    /// The active authority set
    pub fn authority_set(&self) -> &AuthoritySet {
        &self.authority_set
    }

    /// The trust anchor for lane proofs until superseded
    pub fn message_root(&self) -> H256 {
        self.current.payload.message_root
    }

    /// The attested remote state root
    pub fn state_root(&self) -> H256 {
        self.current.payload.state_root
    }

    /// Schedule the handoff set. Rotation is strictly sequential; a set
    /// that skips a generation is rejected.
    pub fn schedule_authority_set(&mut self, set: AuthoritySet) -> Result<(), VerifierError> {
        if set.id != self.authority_set.id + 1 {
            return Err(VerifierError::UnknownAuthoritySet {
                offered: set.id,
                active: self.authority_set.id,
            });
        }
        self.next_authority_set = Some(set);
        Ok(())
    }

    /// Import a commitment offered by a relayer.
    ///
    /// A vote counts only when the signature recovers to an address whose
    /// membership proof places it at the claimed slot of the signing set.
    /// Distinct signers must reach the set's supermajority threshold. On
    /// success the commitment becomes current and, if it was signed by the
    /// scheduled next set, the previous set retires.
    pub fn import_commitment(
        &mut self,
        commitment: &Commitment,
        membership_proofs: &[AuthorityMembershipProof],
        signature_proof: &[AuthoritySignature],
    ) -> Result<u32, VerifierError> {
        let stale = commitment.validator_set_id < self.authority_set.id
            || (commitment.validator_set_id == self.authority_set.id
                && commitment.block_number <= self.current.block_number);
        if stale {
            return Err(VerifierError::StaleCommitment {
                offered_set: commitment.validator_set_id,
                offered_block: commitment.block_number,
                current_set: self.authority_set.id,
                current_block: self.current.block_number,
            });
        }

        let signing_set = if commitment.validator_set_id == self.authority_set.id {
            &self.authority_set
        } else {
            match &self.next_authority_set {
                Some(next) if next.id == commitment.validator_set_id => next,
                _ => {
                    return Err(VerifierError::UnknownAuthoritySet {
                        offered: commitment.validator_set_id,
                        active: self.authority_set.id,
                    })
                }
            }
        };

        let signing_hash = commitment.signing_hash();
        let mut voters = BTreeSet::new();
        for entry in signature_proof {
            let recovered = entry.signature.recover(signing_hash)?;
            let proven = membership_proofs
                .iter()
                .find(|p| p.index == entry.signer_index)
                .map(|p| p.address == recovered && signing_set.verify_membership(p))
                .unwrap_or(false);
            if proven {
                voters.insert(recovered);
            }
        }

        let votes = voters.len() as u32;
        let threshold = signing_set.threshold();
        if votes < threshold {
            return Err(VerifierError::QuorumNotMet { votes, threshold });
        }

        if commitment.validator_set_id != self.authority_set.id {
            let next = self.next_authority_set.take().expect("checked above");
            info!(retired = self.authority_set.id, active = next.id, "Authority set rotated");
            self.authority_set = next;
        }
        self.current = *commitment;
        info!(
            block = commitment.block_number,
            set = commitment.validator_set_id,
            "Commitment imported"
        );
        Ok(commitment.block_number)
    }
}
