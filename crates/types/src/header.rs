//! Block headers and signed headers.

use kestrel_crypto::Hasher;
use serde::{Deserialize, Serialize};

use crate::{Address, Commit, Error, Hash, Height, Result};

/// A block header as consensus produced it.
///
/// The header commits to the validator set that signs this block
/// (`validators_hash`) and to the set allowed to sign the next one
/// (`next_validators_hash`). Every validator-set change is therefore
/// approved by inclusion in a signed header, which is what lets a light
/// client follow arbitrary changes to the set without trusting any single
/// peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Chain identifier, prevents cross-chain replay.
    pub chain_id: String,
    /// Block height, positive and strictly increasing.
    pub height: Height,
    /// Block time as Unix seconds.
    pub time: u64,
    /// Id of the previous block.
    pub last_block_id: Hash,
    /// Application state root after the previous block.
    pub app_hash: Hash,
    /// Hash of the validator set that signs this block.
    pub validators_hash: Hash,
    /// Hash of the validator set allowed to sign the next block.
    pub next_validators_hash: Hash,
    /// Address of the proposing validator.
    pub proposer: Address,
}

impl Header {
    /// Compute the block id of this header.
    ///
    /// Defined as the Keccak256 digest over the canonical field order, so
    /// it is stable across serializations.
    pub fn hash(&self) -> Hash {
        let mut hasher = Hasher::new();
        hasher.update(self.chain_id.as_bytes());
        hasher.update(&self.height.to_be_bytes());
        hasher.update(&self.time.to_be_bytes());
        hasher.update(&self.last_block_id);
        hasher.update(&self.app_hash);
        hasher.update(&self.validators_hash);
        hasher.update(&self.next_validators_hash);
        hasher.update(&self.proposer);
        hasher.finalize()
    }

    /// The block id as a `0x`-prefixed hex string, for logs and errors.
    pub fn hash_hex(&self) -> String {
        format!("0x{}", hex::encode(self.hash()))
    }
}

/// A header together with the commit that finalized it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedHeader {
    /// The block header.
    pub header: Header,
    /// Pre-commit votes for the header.
    pub commit: Commit,
}

impl SignedHeader {
    /// Create a signed header.
    pub fn new(header: Header, commit: Commit) -> Self {
        Self { header, commit }
    }

    /// Chain id of the header.
    pub fn chain_id(&self) -> &str {
        &self.header.chain_id
    }

    /// Height of the header.
    pub fn height(&self) -> Height {
        self.header.height
    }

    /// Block time as Unix seconds.
    pub fn time(&self) -> u64 {
        self.header.time
    }

    /// Block id of the header.
    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    /// Check the structural rules that do not require a validator set.
    ///
    /// The commit must be for this header: same chain, same height, block
    /// id equal to the header hash, and at least one signature present.
    pub fn validate_basic(&self, chain_id: &str) -> Result<()> {
        if self.header.chain_id != chain_id {
            return Err(Error::ChainIdMismatch {
                expected: chain_id.to_string(),
                got: self.header.chain_id.clone(),
            });
        }
        if self.header.height == 0 {
            return Err(Error::InvalidHeader("height must be positive".into()));
        }
        if self.commit.height != self.header.height {
            return Err(Error::InvalidCommit(format!(
                "commit height {} does not match header height {}",
                self.commit.height, self.header.height
            )));
        }
        if self.commit.block_id != self.header.hash() {
            return Err(Error::InvalidCommit(
                "commit block id does not match header hash".into(),
            ));
        }
        if self.commit.signatures.is_empty() {
            return Err(Error::InvalidCommit("commit has no signatures".into()));
        }
        Ok(())
    }
}
