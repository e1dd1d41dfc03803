use ethers_core::types::{Signature, H256};

use crate::{
    accumulator::hash,
    encode::{read_h256, read_u32, read_u64, CodecError, Decode, Encode},
    types::AuthorityMembershipProof,
};

/// The roots a finality commitment attests to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CommitmentPayload {
    /// The bridged chain's state root at the committed height
    pub state_root: H256,
    /// The bridged chain's message-committer root at the committed height
    pub message_root: H256,
}

/// One finality round of the bridged chain, signed by its authority set.
///
/// Commitments are totally ordered by `(validator_set_id, block_number)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Commitment {
    /// The attested roots
    pub payload: CommitmentPayload,
    /// The finalized block height
    pub block_number: u32,
    /// Generation id of the signing authority set
    pub validator_set_id: u64,
}

impl Commitment {
    /// The hash authorities sign. Raw keccak of the canonical encoding;
    /// signatures recover over this hash directly, with no EIP-191 prefix.
    pub fn signing_hash(&self) -> H256 {
        hash(self.to_vec())
    }

    /// Whether this commitment strictly supersedes `other` in the
    /// `(validator_set_id, block_number)` order
    pub fn supersedes(&self, other: &Commitment) -> bool {
        (self.validator_set_id, self.block_number) > (other.validator_set_id, other.block_number)
    }
}

impl Encode for Commitment {
    fn write_to<W>(&self, writer: &mut W) -> std::io::Result<usize>
    where
        W: std::io::Write,
    {
        writer.write_all(self.payload.state_root.as_ref())?;
        writer.write_all(self.payload.message_root.as_ref())?;
        writer.write_all(&self.block_number.to_be_bytes())?;
        writer.write_all(&self.validator_set_id.to_be_bytes())?;
        Ok(32 + 32 + 4 + 8)
    }
}

impl Decode for Commitment {
    fn read_from<R>(reader: &mut R) -> Result<Self, CodecError>
    where
        R: std::io::Read,
    {
        Ok(Self {
            payload: CommitmentPayload {
                state_root: read_h256(reader)?,
                message_root: read_h256(reader)?,
            },
            block_number: read_u32(reader)?,
            validator_set_id: read_u64(reader)?,
        })
    }
}

/// A recoverable signature attributed to an authority-set slot
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AuthoritySignature {
    /// Index of the claimed signer within the authority set
    pub signer_index: u32,
    /// Recoverable signature over the commitment's signing hash
    pub signature: Signature,
}

/// A commitment together with its signature proof
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SignedCommitment {
    /// The commitment
    pub commitment: Commitment,
    /// Signatures by claimed authority-set slot
    pub signatures: Vec<AuthoritySignature>,
}

/// Everything a relayer submits to import a commitment: the signed
/// commitment plus membership proofs for the claimed signers.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CommitmentBundle {
    /// The signed commitment
    pub signed: SignedCommitment,
    /// Membership proofs, one per claimed signer slot
    pub membership_proofs: Vec<AuthorityMembershipProof>,
}

/// Parse a 65-byte recoverable signature from the wire.
///
/// The recovery id sits in the low byte and is normalized to the `{27,28}`
/// convention before use.
pub fn signature_from_bytes(raw: &[u8; 65]) -> Result<Signature, CodecError> {
    let mut signature = Signature::try_from(&raw[..])?;
    if signature.v < 27 {
        signature.v += 27;
    }
    Ok(signature)
}
