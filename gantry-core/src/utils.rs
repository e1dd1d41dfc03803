use ethers_core::types::H256;

/// Strips the '0x' prefix off of hex string so it can be deserialized.
pub fn strip_0x_prefix(s: &str) -> &str {
    if s.len() < 2 || &s[..2] != "0x" {
        s
    } else {
        &s[2..]
    }
}

/// Hex parsing errors
#[derive(thiserror::Error, Debug)]
pub enum HexParseError {
    /// Wrong number of hex characters for the target width
    #[error("Expected {expected} hex characters, got {actual}")]
    BadLength {
        /// expected character count
        expected: usize,
        /// actual character count
        actual: usize,
    },
    /// Provided string was not hex
    #[error("The provided string is not hex: {0:?}")]
    NotHex(String),
}

/// Parse a 32-byte hash from a hex string. Tolerates 0x prefixing, as
/// trusted roots appear prefixed in configuration files.
pub fn parse_h256(candidate: &str) -> Result<H256, HexParseError> {
    let s = strip_0x_prefix(candidate);
    if s.len() != 64 {
        return Err(HexParseError::BadLength {
            expected: 64,
            actual: s.len(),
        });
    }
    let bytes = hex::decode(s).map_err(|_| HexParseError::NotHex(s.to_owned()))?;
    Ok(H256::from_slice(&bytes))
}
