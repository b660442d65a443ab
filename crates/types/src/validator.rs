//! Validators, validator sets, and commit verification.

use std::collections::HashMap;

use kestrel_crypto::{verify_signature, Hasher};
use serde::{Deserialize, Serialize};

use crate::{vote_sign_bytes, Address, Commit, Error, Hash, Height, Power, Result};

/// One consensus validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    /// Stable account address.
    pub address: Address,
    /// Raw Ed25519 public key.
    pub pub_key: Vec<u8>,
    /// Voting power, strictly positive.
    pub voting_power: Power,
}

impl Validator {
    /// Create a validator.
    pub fn new(address: Address, pub_key: Vec<u8>, voting_power: Power) -> Self {
        Self {
            address,
            pub_key,
            voting_power,
        }
    }
}

/// The minimum voting-power ratio a trusted validator set must have signed
/// a new commit with for skip-verification to accept it.
///
/// Expressed as an exact fraction; the ratio must lie within [1/3, 1].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustThreshold {
    /// Numerator of the ratio.
    pub numerator: u64,
    /// Denominator of the ratio.
    pub denominator: u64,
}

impl TrustThreshold {
    /// The default threshold of 1/3.
    pub const ONE_THIRD: Self = Self {
        numerator: 1,
        denominator: 3,
    };

    /// Create a threshold, rejecting ratios outside [1/3, 1].
    pub fn new(numerator: u64, denominator: u64) -> Result<Self> {
        if denominator == 0
            || numerator > denominator
            || u128::from(numerator) * 3 < u128::from(denominator)
        {
            return Err(Error::InvalidValidatorSet(format!(
                "trust threshold {numerator}/{denominator} outside [1/3, 1]"
            )));
        }
        Ok(Self {
            numerator,
            denominator,
        })
    }
}

impl Default for TrustThreshold {
    fn default() -> Self {
        Self::ONE_THIRD
    }
}

impl std::fmt::Display for TrustThreshold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// An ordered set of validators with fast lookup by address.
///
/// Construction sorts by address and rejects duplicates and zero power, so
/// the set hash is canonical no matter the order validators arrived in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorSet {
    /// The validators, ordered by address.
    validators: Vec<Validator>,
    /// Sum of all voting power.
    total_power: Power,
    /// Address to index, rebuilt after deserialization.
    #[serde(skip)]
    index: HashMap<Address, usize>,
}

impl ValidatorSet {
    /// Create a validator set from an unordered list.
    pub fn new(mut validators: Vec<Validator>) -> Result<Self> {
        if validators.is_empty() {
            return Err(Error::InvalidValidatorSet("empty validator set".into()));
        }
        validators.sort_by(|a, b| a.address.cmp(&b.address));
        for pair in validators.windows(2) {
            if pair[0].address == pair[1].address {
                return Err(Error::InvalidValidatorSet(format!(
                    "duplicate validator address 0x{}",
                    hex::encode(pair[0].address)
                )));
            }
        }
        let mut total_power: Power = 0;
        for validator in &validators {
            if validator.voting_power == 0 {
                return Err(Error::InvalidValidatorSet(format!(
                    "validator 0x{} has zero voting power",
                    hex::encode(validator.address)
                )));
            }
            total_power = total_power.checked_add(validator.voting_power).ok_or_else(|| {
                Error::InvalidValidatorSet("total voting power overflows u64".into())
            })?;
        }
        let index = Self::build_index(&validators);
        Ok(Self {
            validators,
            total_power,
            index,
        })
    }

    fn build_index(validators: &[Validator]) -> HashMap<Address, usize> {
        validators
            .iter()
            .enumerate()
            .map(|(i, v)| (v.address, i))
            .collect()
    }

    /// Rebuild the address index. Required after deserialization, which
    /// skips the index field.
    pub fn rebuild_index(&mut self) {
        self.index = Self::build_index(&self.validators);
    }

    /// The validators in canonical order.
    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    /// Number of validators in the set.
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    /// Whether the set is empty. Constructed sets never are.
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Total voting power of the set.
    pub fn total_power(&self) -> Power {
        self.total_power
    }

    /// Look up a validator by address.
    pub fn get_by_address(&self, address: &Address) -> Option<&Validator> {
        self.index
            .get(address)
            .and_then(|&i| self.validators.get(i))
    }

    /// The canonical hash of the set.
    ///
    /// Keccak256 over the ordered `(address, pub_key, power)` triples, with
    /// the key length-prefixed so field boundaries cannot be confused.
    pub fn hash(&self) -> Hash {
        let mut hasher = Hasher::new();
        for validator in &self.validators {
            hasher.update(&validator.address);
            hasher.update(&(validator.pub_key.len() as u32).to_be_bytes());
            hasher.update(&validator.pub_key);
            hasher.update(&validator.voting_power.to_be_bytes());
        }
        hasher.finalize()
    }

    /// The set hash as a `0x`-prefixed hex string.
    pub fn hash_hex(&self) -> String {
        format!("0x{}", hex::encode(self.hash()))
    }

    /// Verify that this set finalized the given commit.
    ///
    /// Every signature must come from a member of this set, no member may
    /// sign twice, every signature must verify, and the signers' combined
    /// power must exceed 2/3 of the set's total.
    pub fn verify_commit(
        &self,
        chain_id: &str,
        block_id: &Hash,
        height: Height,
        commit: &Commit,
    ) -> Result<()> {
        self.check_commit_shape(block_id, height, commit)?;

        let sign_bytes = vote_sign_bytes(chain_id, block_id, height);
        let mut signed_power: Power = 0;
        let mut seen: Vec<Address> = Vec::with_capacity(commit.signatures.len());

        for sig in &commit.signatures {
            if seen.contains(&sig.validator) {
                return Err(Error::DuplicateSigner(sig.validator));
            }
            seen.push(sig.validator);

            let validator = self
                .get_by_address(&sig.validator)
                .ok_or(Error::UnknownSigner(sig.validator))?;
            verify_signature(&validator.pub_key, &sign_bytes, &sig.signature)
                .map_err(|_| Error::SignatureInvalid(sig.validator))?;
            signed_power += validator.voting_power;
        }

        // Strictly more than 2/3 of total power must have signed.
        if u128::from(signed_power) * 3 <= u128::from(self.total_power) * 2 {
            return Err(Error::InsufficientVotingPower {
                have: signed_power,
                need: (u128::from(self.total_power) * 2 / 3) as Power,
                total: self.total_power,
            });
        }
        Ok(())
    }

    /// Verify a commit produced by a possibly different validator set,
    /// counting only the power of signers this set knows.
    ///
    /// This is the skip-verification gate: signers absent from this set are
    /// skipped rather than rejected, signatures from known signers must
    /// still verify, and the known signers' combined power must exceed
    /// `threshold` of this set's total.
    pub fn verify_commit_trusting(
        &self,
        chain_id: &str,
        block_id: &Hash,
        height: Height,
        commit: &Commit,
        threshold: TrustThreshold,
    ) -> Result<()> {
        self.check_commit_shape(block_id, height, commit)?;

        let sign_bytes = vote_sign_bytes(chain_id, block_id, height);
        let mut trusted_power: Power = 0;
        let mut seen: Vec<Address> = Vec::with_capacity(commit.signatures.len());

        for sig in &commit.signatures {
            if seen.contains(&sig.validator) {
                return Err(Error::DuplicateSigner(sig.validator));
            }
            seen.push(sig.validator);

            let Some(validator) = self.get_by_address(&sig.validator) else {
                continue;
            };
            verify_signature(&validator.pub_key, &sign_bytes, &sig.signature)
                .map_err(|_| Error::SignatureInvalid(sig.validator))?;
            trusted_power += validator.voting_power;
        }

        let have = u128::from(trusted_power) * u128::from(threshold.denominator);
        let need = u128::from(self.total_power) * u128::from(threshold.numerator);
        if have <= need {
            return Err(Error::InsufficientVotingPower {
                have: trusted_power,
                need: (u128::from(self.total_power) * u128::from(threshold.numerator)
                    / u128::from(threshold.denominator)) as Power,
                total: self.total_power,
            });
        }
        Ok(())
    }

    fn check_commit_shape(&self, block_id: &Hash, height: Height, commit: &Commit) -> Result<()> {
        if commit.height != height {
            return Err(Error::InvalidCommit(format!(
                "commit is for height {}, expected {}",
                commit.height, height
            )));
        }
        if commit.block_id != *block_id {
            return Err(Error::InvalidCommit(
                "commit is for a different block id".into(),
            ));
        }
        if commit.signatures.is_empty() {
            return Err(Error::InvalidCommit("commit has no signatures".into()));
        }
        Ok(())
    }
}

// Equality ignores the derived index so that a decoded set compares equal
// to the one that was encoded.
impl PartialEq for ValidatorSet {
    fn eq(&self, other: &Self) -> bool {
        self.validators == other.validators && self.total_power == other.total_power
    }
}

impl Eq for ValidatorSet {}
