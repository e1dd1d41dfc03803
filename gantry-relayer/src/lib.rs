//! The commitment relayer agent.
//!
//! Polls a finality source on the bridged chain for signed commitments and
//! submits any that supersede the home chain's light client. The source and
//! sink are traits so deployments can plug in their own chain endpoints.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(unused_extern_crates)]

mod relayer;
mod settings;

pub use relayer::{CommitmentRelayer, CommitmentSink, CommitmentSource};
pub use settings::Settings;

/// Install the process-wide tracing subscriber
pub fn init_logging() {
    tracing_subscriber::fmt::init();
}
