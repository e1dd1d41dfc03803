use ethers_core::types::H256;

use crate::{
    accumulator::hash,
    encode::{read_h256, read_u64, CodecError, Decode, Encode},
};

/// A message accepted by an outbound lane.
///
/// Owned by the generating lane until pruned on delivery confirmation; never
/// mutated in place. The payload is opaque to the bridge and is handed to
/// the `target` application verbatim on dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Position of this message in its lane
    pub nonce: u64,
    /// The application the payload is dispatched to on the bridged chain
    pub target: H256,
    /// Opaque application payload
    pub encoded_payload: Vec<u8>,
}

impl Message {
    /// Keccak hash of the payload bytes
    pub fn payload_hash(&self) -> H256 {
        hash(&self.encoded_payload)
    }

    /// The wire form carried inside lane snapshots
    pub fn to_stub(&self) -> MessageStub {
        MessageStub {
            nonce: self.nonce,
            target: self.target,
            payload_hash: self.payload_hash(),
        }
    }
}

/// The fixed-size commitment to a message carried inside lane snapshots.
///
/// Full payload bytes travel next to the snapshot on delivery and must
/// hash-match `payload_hash`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MessageStub {
    /// Position of this message in its lane
    pub nonce: u64,
    /// The target application
    pub target: H256,
    /// Keccak hash of the payload bytes
    pub payload_hash: H256,
}

impl Encode for MessageStub {
    fn write_to<W>(&self, writer: &mut W) -> std::io::Result<usize>
    where
        W: std::io::Write,
    {
        writer.write_all(&self.nonce.to_be_bytes())?;
        writer.write_all(self.target.as_ref())?;
        writer.write_all(self.payload_hash.as_ref())?;
        Ok(8 + 32 + 32)
    }
}

impl Decode for MessageStub {
    fn read_from<R>(reader: &mut R) -> Result<Self, CodecError>
    where
        R: std::io::Read,
    {
        Ok(Self {
            nonce: read_u64(reader)?,
            target: read_h256(reader)?,
            payload_hash: read_h256(reader)?,
        })
    }
}
