use ethers_core::types::{Address, H256};

use crate::{
    accumulator::hash,
    encode::{read_u32, read_u64, CodecError, Decode, Encode},
    types::MessageStub,
};

/// Most messages a lane keeps in flight at once.
///
/// Bounds snapshot size on the wire and keeps every delivery outcome of a
/// confirmed range within one 256-bit results bitmap.
pub const MAX_PENDING_MESSAGES: u64 = 256;

/// A directional, ordered channel between two chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct LaneId {
    /// Position of the sending chain
    pub this_chain_pos: u32,
    /// Position of this lane on the sending chain
    pub this_lane_pos: u32,
    /// Position of the receiving chain
    pub bridged_chain_pos: u32,
    /// Position of the paired lane on the receiving chain
    pub bridged_lane_pos: u32,
}

impl std::fmt::Display for LaneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}->{}:{}",
            self.this_chain_pos, self.this_lane_pos, self.bridged_chain_pos, self.bridged_lane_pos
        )
    }
}

impl Encode for LaneId {
    fn write_to<W>(&self, writer: &mut W) -> std::io::Result<usize>
    where
        W: std::io::Write,
    {
        writer.write_all(&self.this_chain_pos.to_be_bytes())?;
        writer.write_all(&self.this_lane_pos.to_be_bytes())?;
        writer.write_all(&self.bridged_chain_pos.to_be_bytes())?;
        writer.write_all(&self.bridged_lane_pos.to_be_bytes())?;
        Ok(16)
    }
}

/// Snapshot of an outbound lane: the nonce window and the stubs of every
/// message still awaiting delivery confirmation.
///
/// The open interval `(latest_received_nonce, latest_generated_nonce]` is
/// the range in flight.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct OutboundLaneData {
    /// Highest nonce confirmed delivered by the bridged chain
    pub latest_received_nonce: u64,
    /// Highest nonce generated on this lane
    pub latest_generated_nonce: u64,
    /// Stubs for nonces in `(latest_received_nonce, latest_generated_nonce]`
    pub messages: Vec<MessageStub>,
}

impl OutboundLaneData {
    /// Canonical hash of this snapshot; the lane's committer leaf
    pub fn hash(&self) -> H256 {
        hash(self.to_vec())
    }
}

impl Encode for OutboundLaneData {
    fn write_to<W>(&self, writer: &mut W) -> std::io::Result<usize>
    where
        W: std::io::Write,
    {
        let mut written = 16;
        writer.write_all(&self.latest_received_nonce.to_be_bytes())?;
        writer.write_all(&self.latest_generated_nonce.to_be_bytes())?;
        writer.write_all(&(self.messages.len() as u32).to_be_bytes())?;
        written += 4;
        for stub in &self.messages {
            written += stub.write_to(writer)?;
        }
        Ok(written)
    }
}

impl Decode for OutboundLaneData {
    fn read_from<R>(reader: &mut R) -> Result<Self, CodecError>
    where
        R: std::io::Read,
    {
        let latest_received_nonce = read_u64(reader)?;
        let latest_generated_nonce = read_u64(reader)?;
        let len = read_u32(reader)?;
        if u64::from(len) > MAX_PENDING_MESSAGES {
            return Err(CodecError::BadLength(u64::from(len)));
        }
        let mut messages = Vec::with_capacity(len as usize);
        for _ in 0..len {
            messages.push(MessageStub::read_from(reader)?);
        }
        Ok(Self {
            latest_received_nonce,
            latest_generated_nonce,
            messages,
        })
    }
}

/// One relayer's contiguous run of deliveries, kept by the inbound lane
/// until the sending side confirms them.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DeliveredMessages {
    /// The relayer that submitted the delivery proof
    pub relayer: Address,
    /// First nonce in the run
    pub begin: u64,
    /// Last nonce in the run
    pub end: u64,
    /// Dispatch outcome per nonce, `begin` first
    pub dispatch_results: Vec<bool>,
}

impl DeliveredMessages {
    /// Whether `nonce` falls inside this run
    pub fn contains(&self, nonce: u64) -> bool {
        self.begin <= nonce && nonce <= self.end
    }

    /// Dispatch outcome for `nonce`, if it falls inside this run
    pub fn result_of(&self, nonce: u64) -> Option<bool> {
        if !self.contains(nonce) {
            return None;
        }
        self.dispatch_results.get((nonce - self.begin) as usize).copied()
    }
}

impl Encode for DeliveredMessages {
    fn write_to<W>(&self, writer: &mut W) -> std::io::Result<usize>
    where
        W: std::io::Write,
    {
        writer.write_all(self.relayer.as_ref())?;
        writer.write_all(&self.begin.to_be_bytes())?;
        writer.write_all(&self.end.to_be_bytes())?;
        writer.write_all(&(self.dispatch_results.len() as u32).to_be_bytes())?;
        for result in &self.dispatch_results {
            writer.write_all(&[*result as u8])?;
        }
        Ok(20 + 8 + 8 + 4 + self.dispatch_results.len())
    }
}

impl Decode for DeliveredMessages {
    fn read_from<R>(reader: &mut R) -> Result<Self, CodecError>
    where
        R: std::io::Read,
    {
        let mut relayer = Address::zero();
        reader.read_exact(relayer.as_mut())?;
        let begin = read_u64(reader)?;
        let end = read_u64(reader)?;
        let len = read_u32(reader)?;
        if u64::from(len) > MAX_PENDING_MESSAGES {
            return Err(CodecError::BadLength(u64::from(len)));
        }
        let mut dispatch_results = Vec::with_capacity(len as usize);
        for _ in 0..len {
            let mut byte = [0u8];
            reader.read_exact(&mut byte)?;
            dispatch_results.push(byte[0] != 0);
        }
        Ok(Self {
            relayer,
            begin,
            end,
            dispatch_results,
        })
    }
}

/// Snapshot of an inbound lane: the nonce window plus the per-relayer
/// delivery records that have not been confirmed back to the sender yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct InboundLaneData {
    /// Highest nonce known to be confirmed on the sending side
    pub last_confirmed_nonce: u64,
    /// Highest nonce dispatched on this lane
    pub last_delivered_nonce: u64,
    /// Unconfirmed delivery runs, ascending and contiguous by nonce
    pub relayers: Vec<DeliveredMessages>,
}

impl InboundLaneData {
    /// Canonical hash of this snapshot; the lane's committer leaf
    pub fn hash(&self) -> H256 {
        hash(self.to_vec())
    }

    /// Dispatch outcome and delivering relayer for `nonce`, if recorded
    pub fn delivery_of(&self, nonce: u64) -> Option<(Address, bool)> {
        self.relayers
            .iter()
            .find(|run| run.contains(nonce))
            .and_then(|run| run.result_of(nonce).map(|ok| (run.relayer, ok)))
    }
}

impl Encode for InboundLaneData {
    fn write_to<W>(&self, writer: &mut W) -> std::io::Result<usize>
    where
        W: std::io::Write,
    {
        let mut written = 16 + 4;
        writer.write_all(&self.last_confirmed_nonce.to_be_bytes())?;
        writer.write_all(&self.last_delivered_nonce.to_be_bytes())?;
        writer.write_all(&(self.relayers.len() as u32).to_be_bytes())?;
        for run in &self.relayers {
            written += run.write_to(writer)?;
        }
        Ok(written)
    }
}

impl Decode for InboundLaneData {
    fn read_from<R>(reader: &mut R) -> Result<Self, CodecError>
    where
        R: std::io::Read,
    {
        let last_confirmed_nonce = read_u64(reader)?;
        let last_delivered_nonce = read_u64(reader)?;
        let len = read_u32(reader)?;
        if u64::from(len) > MAX_PENDING_MESSAGES {
            return Err(CodecError::BadLength(u64::from(len)));
        }
        let mut relayers = Vec::with_capacity(len as usize);
        for _ in 0..len {
            relayers.push(DeliveredMessages::read_from(reader)?);
        }
        Ok(Self {
            last_confirmed_nonce,
            last_delivered_nonce,
            relayers,
        })
    }
}
