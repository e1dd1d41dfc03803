/// Authority sets and membership proofs
pub mod authority;
/// Finality commitments and their signatures
pub mod commitment;
/// Events emitted by lane operations
pub mod events;
/// Lane identity and lane data snapshots
pub mod lane_data;
/// Messages and their wire stubs
pub mod message;

pub use authority::{authority_leaf, AuthorityMembershipProof, AuthoritySet};
pub use commitment::{
    signature_from_bytes, AuthoritySignature, Commitment, CommitmentBundle, CommitmentPayload,
    SignedCommitment,
};
pub use events::{MessageAccepted, MessageDispatched, MessagesDelivered};
pub use lane_data::{
    DeliveredMessages, InboundLaneData, LaneId, OutboundLaneData, MAX_PENDING_MESSAGES,
};
pub use message::{Message, MessageStub};
