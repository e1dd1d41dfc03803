//! Configuration

use config::{Config, ConfigError, Environment, File};
use ethers_core::types::H256;
use gantry_core::utils::{parse_h256, HexParseError};

/// Relayer settings.
///
/// Layered from `config/default`, then `config/{RUN_MODE}`, then
/// `GANTRY_RELAYER_`-prefixed environment variables. E.g.
/// `GANTRY_RELAYER_POLLING_INTERVAL=5` sets the `polling_interval` key.
#[derive(Debug, serde::Deserialize)]
pub struct Settings {
    /// Seconds between source polls
    pub polling_interval: u64,
    /// Message root the sink's verifier is expected to hold at startup,
    /// hex with optional 0x prefix. Guards against pointing the relayer at
    /// the wrong verifier deployment.
    pub trusted_root: Option<String>,
}

impl Settings {
    /// Load the layered configuration
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(Environment::with_prefix("GANTRY_RELAYER"))
            .build()?
            .try_deserialize()
    }

    /// The parsed trusted root, if one is configured
    pub fn expected_root(&self) -> Result<Option<H256>, HexParseError> {
        self.trusted_root.as_deref().map(parse_h256).transpose()
    }
}
