//! Tests for validator sets and commit verification

use kestrel_crypto::Keypair;
use kestrel_types::{
    vote_sign_bytes, Commit, CommitSig, Error, Hash, TrustThreshold, Validator, ValidatorSet,
};

fn keypair(id: u8) -> Keypair {
    Keypair::from_seed([id; 32])
}

fn validator(id: u8, power: u64) -> Validator {
    let kp = keypair(id);
    Validator::new(kp.address(), kp.public_key(), power)
}

fn set_of(ids: &[(u8, u64)]) -> ValidatorSet {
    ValidatorSet::new(ids.iter().map(|&(id, p)| validator(id, p)).collect()).unwrap()
}

/// Sign a commit for `(chain_id, block_id, height)` with the given key ids.
fn signed_commit(chain_id: &str, block_id: Hash, height: u64, ids: &[u8]) -> Commit {
    let sign_bytes = vote_sign_bytes(chain_id, &block_id, height);
    let signatures = ids
        .iter()
        .map(|&id| {
            let kp = keypair(id);
            CommitSig {
                validator: kp.address(),
                signature: kp.sign(&sign_bytes),
            }
        })
        .collect();
    Commit::new(height, block_id, signatures)
}

#[test]
fn construction_rejects_duplicates() {
    let v = validator(1, 10);
    let result = ValidatorSet::new(vec![v.clone(), v]);
    assert!(matches!(result, Err(Error::InvalidValidatorSet(_))));
}

#[test]
fn construction_rejects_zero_power() {
    let result = ValidatorSet::new(vec![validator(1, 0)]);
    assert!(matches!(result, Err(Error::InvalidValidatorSet(_))));
}

#[test]
fn construction_rejects_empty_set() {
    let result = ValidatorSet::new(vec![]);
    assert!(matches!(result, Err(Error::InvalidValidatorSet(_))));
}

#[test]
fn hash_is_order_independent() {
    let a = ValidatorSet::new(vec![validator(1, 10), validator(2, 20)]).unwrap();
    let b = ValidatorSet::new(vec![validator(2, 20), validator(1, 10)]).unwrap();
    assert_eq!(a.hash(), b.hash());
    assert_eq!(a, b);
}

#[test]
fn hash_binds_power() {
    let a = set_of(&[(1, 10), (2, 20)]);
    let b = set_of(&[(1, 10), (2, 21)]);
    assert_ne!(a.hash(), b.hash());
}

#[test]
fn lookup_by_address() {
    let set = set_of(&[(1, 10), (2, 20), (3, 30)]);
    let address = keypair(2).address();

    let found = set.get_by_address(&address).unwrap();
    assert_eq!(found.voting_power, 20);
    assert!(set.get_by_address(&keypair(9).address()).is_none());
    assert_eq!(set.total_power(), 60);
}

#[test]
fn verify_commit_accepts_two_thirds_plus() {
    let set = set_of(&[(1, 1), (2, 1), (3, 1)]);
    let block_id = [7u8; 32];
    let commit = signed_commit("test", block_id, 5, &[1, 2, 3]);

    set.verify_commit("test", &block_id, 5, &commit).unwrap();
}

#[test]
fn verify_commit_rejects_exactly_two_thirds() {
    let set = set_of(&[(1, 1), (2, 1), (3, 1)]);
    let block_id = [7u8; 32];
    // 2 of 3 is exactly 2/3: not strictly more.
    let commit = signed_commit("test", block_id, 5, &[1, 2]);

    let result = set.verify_commit("test", &block_id, 5, &commit);
    assert!(matches!(
        result,
        Err(Error::InsufficientVotingPower { have: 2, total: 3, .. })
    ));
}

#[test]
fn verify_commit_rejects_unknown_signer() {
    let set = set_of(&[(1, 1), (2, 1), (3, 1)]);
    let block_id = [7u8; 32];
    let commit = signed_commit("test", block_id, 5, &[1, 2, 9]);

    let result = set.verify_commit("test", &block_id, 5, &commit);
    assert!(matches!(result, Err(Error::UnknownSigner(_))));
}

#[test]
fn verify_commit_rejects_duplicate_signer() {
    let set = set_of(&[(1, 1), (2, 1), (3, 1)]);
    let block_id = [7u8; 32];
    let commit = signed_commit("test", block_id, 5, &[1, 1, 2]);

    let result = set.verify_commit("test", &block_id, 5, &commit);
    assert!(matches!(result, Err(Error::DuplicateSigner(_))));
}

#[test]
fn verify_commit_rejects_tampered_signature() {
    let set = set_of(&[(1, 1), (2, 1), (3, 1)]);
    let block_id = [7u8; 32];
    let mut commit = signed_commit("test", block_id, 5, &[1, 2, 3]);
    commit.signatures[0].signature[0] ^= 0xff;

    let result = set.verify_commit("test", &block_id, 5, &commit);
    assert!(matches!(result, Err(Error::SignatureInvalid(_))));
}

#[test]
fn verify_commit_rejects_wrong_chain_signature() {
    let set = set_of(&[(1, 1), (2, 1), (3, 1)]);
    let block_id = [7u8; 32];
    // Votes were signed for a different chain id.
    let commit = signed_commit("mainnet", block_id, 5, &[1, 2, 3]);

    let result = set.verify_commit("test", &block_id, 5, &commit);
    assert!(matches!(result, Err(Error::SignatureInvalid(_))));
}

#[test]
fn trusting_skips_unknown_signers() {
    // Trusted set knows validators 1-3; the commit is signed by 1-6 of a
    // newer, larger set. Only the overlap counts toward the threshold.
    let trusted = set_of(&[(1, 1), (2, 1), (3, 1)]);
    let block_id = [9u8; 32];
    let commit = signed_commit("test", block_id, 10, &[1, 2, 3, 4, 5, 6]);

    trusted
        .verify_commit_trusting("test", &block_id, 10, &commit, TrustThreshold::ONE_THIRD)
        .unwrap();
}

#[test]
fn trusting_rejects_insufficient_overlap() {
    let trusted = set_of(&[(1, 1), (2, 1), (3, 1)]);
    let block_id = [9u8; 32];
    // Only validator 1 overlaps: exactly 1/3, not strictly more.
    let commit = signed_commit("test", block_id, 10, &[1, 4, 5, 6]);

    let result =
        trusted.verify_commit_trusting("test", &block_id, 10, &commit, TrustThreshold::ONE_THIRD);
    assert!(matches!(result, Err(Error::InsufficientVotingPower { .. })));
}

#[test]
fn trusting_honors_higher_thresholds() {
    let trusted = set_of(&[(1, 1), (2, 1), (3, 1), (4, 1)]);
    let block_id = [9u8; 32];
    let commit = signed_commit("test", block_id, 10, &[1, 2, 5, 6]);

    // 2 of 4 clears 1/3...
    trusted
        .verify_commit_trusting("test", &block_id, 10, &commit, TrustThreshold::ONE_THIRD)
        .unwrap();
    // ...but not 2/3.
    let result = trusted.verify_commit_trusting(
        "test",
        &block_id,
        10,
        &commit,
        TrustThreshold::new(2, 3).unwrap(),
    );
    assert!(matches!(result, Err(Error::InsufficientVotingPower { .. })));
}

#[test]
fn trusting_still_rejects_bad_signature_from_known_validator() {
    let trusted = set_of(&[(1, 1), (2, 1), (3, 1)]);
    let block_id = [9u8; 32];
    let mut commit = signed_commit("test", block_id, 10, &[1, 2, 3]);
    commit.signatures[1].signature[10] ^= 0x01;

    let result =
        trusted.verify_commit_trusting("test", &block_id, 10, &commit, TrustThreshold::ONE_THIRD);
    assert!(matches!(result, Err(Error::SignatureInvalid(_))));
}

#[test]
fn trust_threshold_bounds() {
    assert!(TrustThreshold::new(1, 3).is_ok());
    assert!(TrustThreshold::new(2, 3).is_ok());
    assert!(TrustThreshold::new(1, 1).is_ok());
    assert!(TrustThreshold::new(1, 4).is_err());
    assert!(TrustThreshold::new(4, 3).is_err());
    assert!(TrustThreshold::new(1, 0).is_err());
}

#[test]
fn commit_shape_checked_before_signatures() {
    let set = set_of(&[(1, 1), (2, 1), (3, 1)]);
    let block_id = [7u8; 32];
    let commit = signed_commit("test", block_id, 5, &[1, 2, 3]);

    let result = set.verify_commit("test", &block_id, 6, &commit);
    assert!(matches!(result, Err(Error::InvalidCommit(_))));

    let result = set.verify_commit("test", &[8u8; 32], 5, &commit);
    assert!(matches!(result, Err(Error::InvalidCommit(_))));
}
