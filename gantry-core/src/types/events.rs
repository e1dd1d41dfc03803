use ethers_core::types::{H256, U256};

use crate::types::LaneId;

/// Emitted by an outbound lane when a message is accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageAccepted {
    /// The assigned nonce
    pub nonce: u64,
    /// The accepted payload bytes
    pub payload: Vec<u8>,
}

/// Emitted by an inbound lane once per processed nonce
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDispatched {
    /// The lane the message traveled on
    pub lane: LaneId,
    /// The processed nonce
    pub nonce: u64,
    /// The target application
    pub target: H256,
    /// Whether the application dispatch succeeded
    pub dispatched: bool,
    /// Bytes returned by the application, empty on failure
    pub return_data: Vec<u8>,
}

/// Emitted by an outbound lane when a delivery proof confirms a range.
///
/// An idempotent re-confirmation yields the empty range `begin = end + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessagesDelivered {
    /// First confirmed nonce
    pub begin: u64,
    /// Last confirmed nonce
    pub end: u64,
    /// Bit `i` is the dispatch outcome of nonce `begin + i`
    pub results_bitmap: U256,
}

impl MessagesDelivered {
    /// Whether this confirmation covered any nonce
    pub fn is_empty(&self) -> bool {
        self.begin > self.end
    }
}
