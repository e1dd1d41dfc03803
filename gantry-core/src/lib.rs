//! Gantry. Ordered message lanes between chains.
//!
//! This crate contains core primitives, traits, and in-process models of the
//! on-chain objects that make up the bridge: the lane state machines, the
//! commitment light client, the chain committer, and the relayer fee market.

#![warn(missing_docs)]
#![warn(unused_extern_crates)]
#![forbid(unsafe_code)]

/// Merkle accumulator machinery and the chain-level message committer
pub mod accumulator;

/// Traits for canonical binary representations
pub mod encode;

/// The relayer fee market
pub mod fee_market;

/// Outbound and inbound lane state machines
pub mod lanes;

/// Proof-verifier and dispatch seams between the lanes and their host chain
pub mod proof;

/// Canonical types shared across components
pub mod types;

/// Utilities to match on-chain hashing conventions
pub mod utils;

/// The light-client commitment verifier
pub mod verifier;

pub use encode::{CodecError, Decode, Encode};
pub use fee_market::{
    FeeMarket, FeeMarketConfig, FeeMarketError, Order, SettlementOutcome, SettlementReport,
};
pub use lanes::{InboundLane, LaneError, OutboundLane};
pub use proof::{DispatchError, MessageDispatch, ProofVerifier};
pub use types::*;
pub use verifier::{LightClientVerifier, VerifierError};
