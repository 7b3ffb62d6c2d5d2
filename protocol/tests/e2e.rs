//! End-to-end integration tests for the Countersign workflow.
//!
//! These exercise the full path a real deployment takes: two-step TOTP
//! enrollment, transaction creation with share distribution, signature
//! collection under the coordinator, audit trail accumulation, expiry,
//! and secret reconstruction — against the sled-backed stores, so the
//! persistence layer is part of what's being proven.
//!
//! Each test stands alone with its own temporary database. No shared
//! state, no ordering dependencies, no flaky failures.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use countersign_protocol::audit::AuditAction;
use countersign_protocol::coordinator::ApprovalCoordinator;
use countersign_protocol::crypto::sharing::Share;
use countersign_protocol::crypto::totp::code_at;
use countersign_protocol::error::ApprovalError;
use countersign_protocol::identity::{Identity, Role};
use countersign_protocol::store::SledStores;
use countersign_protocol::transaction::{
    Amount, ClosedReason, Currency, SignerDecision, TransactionRequest, TransactionStatus,
};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

type Coordinator = ApprovalCoordinator<SledStores, SledStores, SledStores>;

struct TestBench {
    coordinator: Arc<Coordinator>,
    stores: Arc<SledStores>,
    initiator: Identity,
    signers: Vec<Identity>,
}

fn now() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

fn code_for(identity: &Identity, at: DateTime<Utc>) -> String {
    code_at(&identity.totp_secret, at).expect("enrolled secrets always decode")
}

/// Enrolls one initiator and `signer_count` signers through the real
/// two-step flow, over a temporary sled database shared by all three
/// store roles.
fn bench(signer_count: usize) -> TestBench {
    let stores = Arc::new(SledStores::open_temporary().expect("temp db"));
    let coordinator = Arc::new(ApprovalCoordinator::new(
        Arc::clone(&stores),
        Arc::clone(&stores),
        Arc::clone(&stores),
    ));

    let enroll = |username: &str, role: Role| -> Identity {
        let ticket = coordinator.enroll(username, role).expect("enroll");
        let code = code_at(&ticket.secret.base32, now()).unwrap();
        coordinator
            .confirm_enrollment(&ticket, &code, now())
            .expect("confirm enrollment")
    };

    let initiator = enroll("initiator1", Role::Initiator);
    let signers = (1..=signer_count)
        .map(|i| enroll(&format!("signer{i}"), Role::Signer))
        .collect();

    TestBench {
        coordinator,
        stores,
        initiator,
        signers,
    }
}

/// The reference transaction used throughout: $150,000 to Acme Corp Ltd,
/// K-of-N over the bench's signers.
fn acme_request(bench: &TestBench, k: u32) -> TransactionRequest {
    TransactionRequest::new(
        Amount::new(15_000_000, Currency::USD),
        "Acme Corp Ltd",
        bench.initiator.id.clone(),
    )
    .purpose("Equipment purchase")
    .signers(bench.signers.iter().map(|s| s.id.clone()))
    .required_signatures(k)
}

fn sign(
    bench: &TestBench,
    tx_id: &str,
    signer: &Identity,
    decision: SignerDecision,
    at: DateTime<Utc>,
) -> Result<countersign_protocol::DecisionOutcome, ApprovalError> {
    bench
        .coordinator
        .submit_decision(tx_id, &signer.id, &code_for(signer, at), decision, at)
}

// ---------------------------------------------------------------------------
// Full Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn full_lifecycle_enroll_create_approve_reconstruct() {
    let bench = bench(5);
    let created = bench
        .coordinator
        .create_transaction(acme_request(&bench, 3), now())
        .expect("create");
    let tx = &created.transaction;

    assert_eq!(tx.status, TransactionStatus::Pending);
    assert_eq!(tx.signatures.len(), 5);
    assert_eq!(created.shares.len(), 5);

    // Two signatures: still pending.
    sign(&bench, &tx.id, &bench.signers[1], SignerDecision::Signed, now()).unwrap();
    let outcome =
        sign(&bench, &tx.id, &bench.signers[2], SignerDecision::Signed, now()).unwrap();
    assert_eq!(outcome.transaction.status, TransactionStatus::Pending);
    assert_eq!(outcome.transaction.signed_count(), 2);
    assert!(!outcome.quorum_reached);

    // Third signature flips it.
    let outcome =
        sign(&bench, &tx.id, &bench.signers[3], SignerDecision::Signed, now()).unwrap();
    assert!(outcome.quorum_reached);
    assert_eq!(outcome.transaction.status, TransactionStatus::Approved);

    // The quorum can now reconstruct the per-transaction secret, and
    // disjoint K-subsets agree on it.
    let shares: Vec<Share> = created.shares.iter().map(|s| s.share.clone()).collect();
    let first = bench
        .coordinator
        .reconstruct_secret(&tx.id, &shares[0..3])
        .expect("quorum combines");
    let second = bench
        .coordinator
        .reconstruct_secret(
            &tx.id,
            &[shares[1].clone(), shares[3].clone(), shares[4].clone()],
        )
        .expect("disjoint quorum combines");
    assert_eq!(first, second);

    // Audit: creation + three signatures, in order, nothing else.
    let trail = bench.stores.audit_for(&tx.id).unwrap();
    assert_eq!(trail.len(), 4);
    assert_eq!(trail[0].action, AuditAction::TransactionCreated);
    assert_eq!(trail[0].actor_id, bench.initiator.id);
    for entry in &trail[1..] {
        assert_eq!(entry.action, AuditAction::SignatureAdded);
    }
    assert!(trail[3].details.contains("3 of 3"));
}

#[test]
fn late_signature_after_approval_is_closed_with_no_audit() {
    let bench = bench(5);
    let created = bench
        .coordinator
        .create_transaction(acme_request(&bench, 3), now())
        .unwrap();
    let tx_id = created.transaction.id.clone();

    for signer in &bench.signers[0..3] {
        sign(&bench, &tx_id, signer, SignerDecision::Signed, now()).unwrap();
    }

    let result = sign(&bench, &tx_id, &bench.signers[4], SignerDecision::Signed, now());
    assert!(matches!(
        result,
        Err(ApprovalError::TransactionClosed {
            reason: ClosedReason::AlreadyApproved
        })
    ));
    assert_eq!(bench.stores.audit_for(&tx_id).unwrap().len(), 4);
}

#[test]
fn single_rejection_closes_everything() {
    let bench = bench(5);
    let created = bench
        .coordinator
        .create_transaction(acme_request(&bench, 3), now())
        .unwrap();
    let tx_id = created.transaction.id.clone();

    sign(&bench, &tx_id, &bench.signers[0], SignerDecision::Signed, now()).unwrap();
    let outcome =
        sign(&bench, &tx_id, &bench.signers[1], SignerDecision::Rejected, now()).unwrap();
    assert_eq!(outcome.transaction.status, TransactionStatus::Rejected);

    // Everyone else is locked out.
    let result = sign(&bench, &tx_id, &bench.signers[2], SignerDecision::Signed, now());
    assert!(matches!(
        result,
        Err(ApprovalError::TransactionClosed {
            reason: ClosedReason::AlreadyRejected
        })
    ));

    let trail = bench.stores.audit_for(&tx_id).unwrap();
    assert_eq!(trail.len(), 3);
    assert_eq!(trail[2].action, AuditAction::SignatureRejected);
}

#[test]
fn double_signing_is_already_decided() {
    let bench = bench(3);
    let created = bench
        .coordinator
        .create_transaction(acme_request(&bench, 2), now())
        .unwrap();
    let tx_id = created.transaction.id.clone();

    sign(&bench, &tx_id, &bench.signers[0], SignerDecision::Signed, now()).unwrap();
    let result = sign(&bench, &tx_id, &bench.signers[0], SignerDecision::Rejected, now());
    assert!(matches!(result, Err(ApprovalError::AlreadyDecided { .. })));
}

// ---------------------------------------------------------------------------
// Enrollment Edge Cases
// ---------------------------------------------------------------------------

#[test]
fn enrollment_requires_a_working_authenticator() {
    let stores = Arc::new(SledStores::open_temporary().unwrap());
    let coordinator = ApprovalCoordinator::new(
        Arc::clone(&stores),
        Arc::clone(&stores),
        Arc::clone(&stores),
    );

    let ticket = coordinator.enroll("newsigner", Role::Signer).unwrap();
    assert!(ticket
        .secret
        .provisioning_uri
        .starts_with("otpauth://totp/Countersign:"));

    // A bogus first code means no identity is created at all.
    let result = coordinator.confirm_enrollment(&ticket, "000000", now());
    assert!(matches!(result, Err(ApprovalError::InvalidCode)));
    assert!(find_identity(&stores, "newsigner").is_none());

    // The real code works, once.
    let code = code_at(&ticket.secret.base32, now()).unwrap();
    let identity = coordinator.confirm_enrollment(&ticket, &code, now()).unwrap();
    assert_eq!(identity.username, "newsigner");
}

fn find_identity(stores: &SledStores, username: &str) -> Option<Identity> {
    use countersign_protocol::store::IdentityStore;
    stores.find_by_username(username).unwrap()
}

// ---------------------------------------------------------------------------
// Expiry
// ---------------------------------------------------------------------------

#[test]
fn expiry_sweep_beats_the_last_moment_signature_cleanly() {
    let bench = bench(2);
    let created = bench
        .coordinator
        .create_transaction(
            acme_request(&bench, 2).expires_at(now() + Duration::hours(1)),
            now(),
        )
        .unwrap();
    let tx_id = created.transaction.id.clone();

    // One signature lands in time.
    sign(&bench, &tx_id, &bench.signers[0], SignerDecision::Signed, now()).unwrap();

    // Deadline passes; the sweep closes it.
    let late = now() + Duration::hours(2);
    assert_eq!(bench.coordinator.expire_pending(late).unwrap(), 1);
    assert_eq!(bench.coordinator.expire_pending(late).unwrap(), 0, "idempotent");

    // The would-be second signer is told the deadline passed... via the
    // terminal status, since the sweep already moved it to rejected.
    let result = sign(&bench, &tx_id, &bench.signers[1], SignerDecision::Signed, late);
    assert!(matches!(
        result,
        Err(ApprovalError::TransactionClosed { .. })
    ));

    let trail = bench.stores.audit_for(&tx_id).unwrap();
    assert_eq!(trail.len(), 3); // created + signature + expired
    assert_eq!(trail[2].action, AuditAction::TransactionExpired);
}

#[test]
fn signature_record_counts_always_sum_to_n() {
    let bench = bench(4);
    let created = bench
        .coordinator
        .create_transaction(acme_request(&bench, 3), now())
        .unwrap();
    let tx_id = created.transaction.id.clone();

    let check = |tx: &countersign_protocol::transaction::Transaction| {
        assert_eq!(
            tx.signed_count() + tx.pending_count() + tx.rejected_count(),
            4
        );
    };
    check(&created.transaction);

    let o = sign(&bench, &tx_id, &bench.signers[0], SignerDecision::Signed, now()).unwrap();
    check(&o.transaction);
    let o = sign(&bench, &tx_id, &bench.signers[1], SignerDecision::Rejected, now()).unwrap();
    check(&o.transaction);
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[test]
fn concurrent_signers_on_one_transaction_serialize_correctly() {
    let bench = bench(5);
    let created = bench
        .coordinator
        .create_transaction(acme_request(&bench, 5), now())
        .unwrap();
    let tx_id = created.transaction.id.clone();

    // All five signers race. Every submission must succeed exactly once
    // and the final state must be approved with 5 of 5.
    let handles: Vec<_> = bench
        .signers
        .iter()
        .cloned()
        .map(|signer| {
            let coordinator = Arc::clone(&bench.coordinator);
            let tx_id = tx_id.clone();
            std::thread::spawn(move || {
                coordinator.submit_decision(
                    &tx_id,
                    &signer.id,
                    &code_for(&signer, now()),
                    SignerDecision::Signed,
                    now(),
                )
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap().expect("each distinct signer succeeds");
    }

    use countersign_protocol::store::TransactionStore;
    let final_tx = bench.stores.load(&tx_id).unwrap().unwrap();
    assert_eq!(final_tx.status, TransactionStatus::Approved);
    assert_eq!(final_tx.signed_count(), 5);

    // Creation + five signatures, no duplicates, no gaps.
    assert_eq!(bench.stores.audit_for(&tx_id).unwrap().len(), 6);
}

#[test]
fn independent_transactions_do_not_interfere() {
    let bench = bench(2);

    let first = bench
        .coordinator
        .create_transaction(acme_request(&bench, 2), now())
        .unwrap();
    let second = bench
        .coordinator
        .create_transaction(
            TransactionRequest::new(
                Amount::new(7_500_000, Currency::USD),
                "Tech Solutions Inc",
                bench.initiator.id.clone(),
            )
            .purpose("Software license")
            .signers(bench.signers.iter().map(|s| s.id.clone()))
            .required_signatures(2),
            now(),
        )
        .unwrap();

    // Rejecting the first leaves the second untouched.
    sign(
        &bench,
        &first.transaction.id,
        &bench.signers[0],
        SignerDecision::Rejected,
        now(),
    )
    .unwrap();

    for signer in &bench.signers {
        sign(
            &bench,
            &second.transaction.id,
            signer,
            SignerDecision::Signed,
            now(),
        )
        .unwrap();
    }

    use countersign_protocol::store::TransactionStore;
    assert_eq!(
        bench.stores.load(&first.transaction.id).unwrap().unwrap().status,
        TransactionStatus::Rejected
    );
    assert_eq!(
        bench.stores.load(&second.transaction.id).unwrap().unwrap().status,
        TransactionStatus::Approved
    );
}
