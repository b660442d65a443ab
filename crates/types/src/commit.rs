//! Commits: the pre-commit votes that finalize a block.

use serde::{Deserialize, Serialize};

use crate::{Address, Hash, Height};

/// A single validator's pre-commit signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSig {
    /// Address of the signing validator.
    pub validator: Address,
    /// Raw Ed25519 signature over the canonical vote bytes.
    pub signature: Vec<u8>,
}

/// The set of pre-commit votes for one block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// Height the votes are for.
    pub height: Height,
    /// Block id the votes are for.
    pub block_id: Hash,
    /// The individual signatures.
    pub signatures: Vec<CommitSig>,
}

impl Commit {
    /// Create a commit.
    pub fn new(height: Height, block_id: Hash, signatures: Vec<CommitSig>) -> Self {
        Self {
            height,
            block_id,
            signatures,
        }
    }

    /// Number of signatures present.
    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    /// Whether the commit carries no signatures.
    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}

/// The canonical byte string a validator signs for a pre-commit vote.
///
/// Fixed layout: a domain tag, the chain id length-prefixed so that chain
/// ids cannot collide across the field boundary, the block id, and the
/// height big-endian. Every signer and every verifier must agree on these
/// bytes exactly.
pub fn vote_sign_bytes(chain_id: &str, block_id: &Hash, height: Height) -> Vec<u8> {
    let chain = chain_id.as_bytes();
    let mut bytes = Vec::with_capacity(16 + chain.len() + block_id.len());
    bytes.extend_from_slice(b"kestrel/precommit");
    bytes.extend_from_slice(&(chain.len() as u32).to_be_bytes());
    bytes.extend_from_slice(chain);
    bytes.extend_from_slice(block_id);
    bytes.extend_from_slice(&height.to_be_bytes());
    bytes
}
