//! Walkthrough of the full approval workflow, in memory.
//!
//! Run with: `cargo run --example demo -p countersign-protocol`

use std::sync::Arc;

use chrono::Utc;

use countersign_protocol::audit::MemoryAuditLog;
use countersign_protocol::coordinator::ApprovalCoordinator;
use countersign_protocol::crypto::totp::code_at;
use countersign_protocol::identity::Role;
use countersign_protocol::store::{MemoryIdentityStore, MemoryTransactionStore};
use countersign_protocol::transaction::{Amount, Currency, SignerDecision, TransactionRequest};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let identities = Arc::new(MemoryIdentityStore::new());
    let transactions = Arc::new(MemoryTransactionStore::new());
    let audit = Arc::new(MemoryAuditLog::new());
    let coordinator = ApprovalCoordinator::new(identities, transactions, Arc::clone(&audit));

    let now = Utc::now();

    // --- Enrollment: one initiator, five signers -------------------------
    println!("== Enrollment ==");
    let enroll = |username: &str, role: Role| {
        let ticket = coordinator.enroll(username, role).expect("enroll");
        // In production the applicant scans the QR; here we play both sides.
        let code = code_at(&ticket.secret.base32, now).unwrap();
        let identity = coordinator.confirm_enrollment(&ticket, &code, now).unwrap();
        println!("  {} enrolled as {}", identity.username, identity.role);
        identity
    };

    let initiator = enroll("initiator1", Role::Initiator);
    let signers: Vec<_> = (1..=5)
        .map(|i| enroll(&format!("signer{i}"), Role::Signer))
        .collect();

    // --- Create a 3-of-5 transaction --------------------------------------
    println!("\n== Creation ==");
    let created = coordinator.create_transaction(
        TransactionRequest::new(
            Amount::new(15_000_000, Currency::USD),
            "Acme Corp Ltd",
            initiator.id.clone(),
        )
        .purpose("Equipment purchase")
        .signers(signers.iter().map(|s| s.id.clone()))
        .required_signatures(3),
        now,
    )?;
    let tx_id = created.transaction.id.clone();
    println!(
        "  transaction {} for {} — {} shares issued, threshold {}",
        tx_id,
        created.transaction.amount,
        created.shares.len(),
        created.transaction.required_signatures
    );

    // --- Collect signatures -----------------------------------------------
    println!("\n== Signatures ==");
    for signer in &signers[0..3] {
        let code = code_at(&signer.totp_secret, now).unwrap();
        let outcome =
            coordinator.submit_decision(&tx_id, &signer.id, &code, SignerDecision::Signed, now)?;
        println!(
            "  {} signed — status {}, {} of {}",
            signer.username,
            outcome.transaction.status,
            outcome.transaction.signed_count(),
            outcome.transaction.required_signatures
        );
        if outcome.quorum_reached {
            println!("  quorum reached: shares are now combinable");
        }
    }

    // --- Reconstruct the per-transaction secret ---------------------------
    let shares: Vec<_> = created.shares[0..3]
        .iter()
        .map(|s| s.share.clone())
        .collect();
    let secret = coordinator.reconstruct_secret(&tx_id, &shares)?;
    println!("\n== Reconstruction ==\n  secret recovered ({} bytes)", secret.len());

    // --- The audit trail ---------------------------------------------------
    println!("\n== Audit trail ==");
    for entry in audit.entries_for(&tx_id) {
        println!("  [{}] {} — {}", entry.timestamp, entry.action, entry.details);
    }

    Ok(())
}
