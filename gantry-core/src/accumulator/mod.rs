pub mod committer;
pub mod merkle;

pub use committer::{CommitterError, LaneProof, MessageCommitter};

use ethers_core::types::H256;
use lazy_static::lazy_static;
use sha3::{digest::Update, Digest, Keccak256};

/// Maximum depth of any accumulator tree in the bridge
pub const MAX_DEPTH: usize = 32;

pub(crate) fn hash(preimage: impl AsRef<[u8]>) -> H256 {
    H256::from_slice(Keccak256::digest(preimage.as_ref()).as_slice())
}

pub(crate) fn hash_concat(left: impl AsRef<[u8]>, right: impl AsRef<[u8]>) -> H256 {
    H256::from_slice(
        Keccak256::new()
            .chain(left.as_ref())
            .chain(right.as_ref())
            .finalize()
            .as_slice(),
    )
}

lazy_static! {
    /// The root of an all-zero subtree at each height. `ZERO_HASHES[0]` is
    /// the zero leaf itself.
    pub static ref ZERO_HASHES: [H256; MAX_DEPTH + 1] = {
        let mut hashes = [H256::zero(); MAX_DEPTH + 1];
        for i in 0..MAX_DEPTH {
            hashes[i + 1] = hash_concat(hashes[i], hashes[i]);
        }
        hashes
    };
}
