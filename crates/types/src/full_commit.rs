//! Full commits: the atomic unit of light-client trust.

use serde::{Deserialize, Serialize};

use crate::{Error, Hash, Height, Result, SignedHeader, ValidatorSet};

/// A signed header together with the validator set that signed it and the
/// set allowed to sign the next height.
///
/// A full commit is assembled unverified by a source and only becomes
/// trustworthy once [`FullCommit::validate_full`] has passed and a verifier
/// has accepted it against prior trust. Stored full commits are immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullCommit {
    /// The signed header.
    pub signed_header: SignedHeader,
    /// Validator set bound to `signed_header.header.validators_hash`.
    pub validators: ValidatorSet,
    /// Validator set bound to `signed_header.header.next_validators_hash`.
    pub next_validators: ValidatorSet,
}

impl FullCommit {
    /// Assemble a full commit from its parts.
    pub fn new(
        signed_header: SignedHeader,
        validators: ValidatorSet,
        next_validators: ValidatorSet,
    ) -> Self {
        Self {
            signed_header,
            validators,
            next_validators,
        }
    }

    /// Height of the underlying header.
    pub fn height(&self) -> Height {
        self.signed_header.height()
    }

    /// Chain id of the underlying header.
    pub fn chain_id(&self) -> &str {
        self.signed_header.chain_id()
    }

    /// Block id of the underlying header.
    pub fn block_id(&self) -> Hash {
        self.signed_header.hash()
    }

    /// Check that the full commit is self-consistent and fully signed.
    ///
    /// Verifies the structural header rules, that both validator sets hash
    /// to what the header commits to, and that `validators` signed the
    /// commit with more than 2/3 of its power. This establishes internal
    /// consistency only; whether the commit extends *trusted* state is the
    /// verifier's decision.
    pub fn validate_full(&self, chain_id: &str) -> Result<()> {
        self.signed_header.validate_basic(chain_id)?;

        let validators_hash = self.validators.hash();
        if validators_hash != self.signed_header.header.validators_hash {
            return Err(Error::ValidatorsHashMismatch {
                got: hex::encode(validators_hash),
                want: hex::encode(self.signed_header.header.validators_hash),
            });
        }
        let next_hash = self.next_validators.hash();
        if next_hash != self.signed_header.header.next_validators_hash {
            return Err(Error::ValidatorsHashMismatch {
                got: hex::encode(next_hash),
                want: hex::encode(self.signed_header.header.next_validators_hash),
            });
        }

        self.validators.verify_commit(
            chain_id,
            &self.signed_header.commit.block_id,
            self.signed_header.height(),
            &self.signed_header.commit,
        )
    }
}
