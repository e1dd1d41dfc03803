//! The ordered message-lane protocol.
//!
//! Each lane is a directional channel with a single writer per chain: the
//! outbound lane owns `(latest_received_nonce, latest_generated_nonce]` on
//! the sending chain, the inbound lane owns `(last_confirmed_nonce,
//! last_delivered_nonce]` on the receiving chain. Confirmation flows only
//! through the outbound lane's delivery-proof call; the inbound lane has no
//! confirm entry point by design.

mod inbound;
mod outbound;

pub use inbound::InboundLane;
pub use outbound::OutboundLane;

use ethers_core::types::Address;

use crate::fee_market::FeeMarketError;

/// Lane errors
#[derive(Debug, thiserror::Error)]
pub enum LaneError {
    /// Caller lacks the send capability
    #[error("Unauthorized caller: {0}")]
    Unauthorized(Address),
    /// The lane's nonce space is exhausted
    #[error("Lane nonce space exhausted")]
    Overflow,
    /// The lane holds the maximum number of unconfirmed messages
    #[error("Lane full: {pending} unconfirmed messages")]
    LaneFull {
        /// Messages currently awaiting delivery confirmation
        pending: u64,
    },
    /// A snapshot did not verify against the trusted remote commitment, or
    /// was internally inconsistent
    #[error("Invalid lane proof")]
    InvalidProof,
    /// A snapshot implies messages this lane never saw
    #[error("Nonce gap: snapshot generated up to {snapshot_latest}, lane delivered up to {delivered}")]
    NonceGap {
        /// The snapshot's latest generated nonce
        snapshot_latest: u64,
        /// This lane's last delivered nonce
        delivered: u64,
    },
    /// Fee market failure surfaced through a lane call
    #[error(transparent)]
    FeeMarket(#[from] FeeMarketError),
}
