//! Canonical binary representations.
//!
//! Every hashed or signed structure in the bridge serializes through these
//! traits: fixed-width fields in big-endian order, length-prefixed
//! sequences. Canonical hashes are keccak over the `Encode` bytes.

use ethers_core::types::SignatureError;

/// Codec errors
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// IO error from Read/Write usage
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    /// Signature parsing error passthrough
    #[error(transparent)]
    SignatureError(#[from] SignatureError),
    /// A length prefix that cannot be satisfied by the remaining input
    #[error("Bad length prefix: {0}")]
    BadLength(u64),
}

/// Simple trait for types with a canonical encoding
pub trait Encode {
    /// Write the canonical encoding to the writer, returning bytes written
    fn write_to<W>(&self, writer: &mut W) -> std::io::Result<usize>
    where
        W: std::io::Write;

    /// Serialize to an owned buffer
    fn to_vec(&self) -> Vec<u8> {
        let mut buf = vec![];
        self.write_to(&mut buf).expect("!alloc");
        buf
    }
}

/// Simple trait for types with a canonical decoding
pub trait Decode {
    /// Try to read from some source
    fn read_from<R>(reader: &mut R) -> Result<Self, CodecError>
    where
        R: std::io::Read,
        Self: Sized;
}

impl Encode for ethers_core::types::Signature {
    fn write_to<W>(&self, writer: &mut W) -> std::io::Result<usize>
    where
        W: std::io::Write,
    {
        writer.write_all(&self.to_vec())?;
        Ok(65)
    }
}

impl Decode for ethers_core::types::Signature {
    fn read_from<R>(reader: &mut R) -> Result<Self, CodecError>
    where
        R: std::io::Read,
    {
        let mut buf = [0u8; 65];
        reader.read_exact(&mut buf)?;
        crate::types::signature_from_bytes(&buf)
    }
}

pub(crate) fn read_h256<R: std::io::Read>(
    reader: &mut R,
) -> Result<ethers_core::types::H256, CodecError> {
    let mut h = ethers_core::types::H256::zero();
    reader.read_exact(h.as_mut())?;
    Ok(h)
}

pub(crate) fn read_u64<R: std::io::Read>(reader: &mut R) -> Result<u64, CodecError> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_be_bytes(buf))
}

pub(crate) fn read_u32<R: std::io::Read>(reader: &mut R) -> Result<u32, CodecError> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}
