//! # Approval Coordinator
//!
//! The glue that turns the pure pieces — TOTP verification, secret
//! sharing, the transaction state machine — into an end-to-end workflow
//! over injected stores. Everything stateful funnels through here:
//!
//! 1. **Enrollment** — issue a TOTP secret, and only persist the identity
//!    once the applicant proves their authenticator works.
//! 2. **Creation** — validate the initiator, resolve every selected
//!    signer, split a fresh per-transaction secret into one share per
//!    signer, persist, audit.
//! 3. **Decision** — verify the signer is active, re-verify TOTP, then
//!    apply the state machine under the per-transaction lock and audit
//!    the transition.
//! 4. **Expiry** — a sweep that closes overdue transactions using the
//!    same locks, so it can never race a last-moment signature.
//!
//! ## Concurrency
//!
//! A `DashMap` of per-transaction mutexes serializes every load-mutate-
//! save on one transaction while leaving different transactions fully
//! parallel. Two simultaneous submissions by the same signer therefore
//! resolve to exactly one success and one `AlreadyDecided`. The store's
//! compare-and-swap versioning backs this up at the persistence layer.
//!
//! ## Errors
//!
//! The coordinator invents no error kinds. Whatever the engines and
//! stores report is what the caller sees, as the most specific variant
//! available.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::audit::{AuditAction, AuditEntry, AuditSink};
use crate::config;
use crate::crypto::hash::sha256_hex;
use crate::crypto::sharing::{self, Share};
use crate::crypto::totp::{self, TotpParams};
use crate::error::ApprovalError;
use crate::identity::{
    begin_enrollment, confirm_enrollment, EnrollmentTicket, Identity, Role,
};
use crate::store::{IdentityStore, TransactionStore};
use crate::transaction::{
    SignerDecision, Transaction, TransactionRequest, TransactionStatus,
};

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// One signer's share of a transaction secret, ready for distribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerShare {
    /// The signer this share belongs to.
    pub signer_id: String,
    /// The share itself.
    pub share: Share,
}

/// A freshly created transaction plus the shares to hand out.
///
/// The secret the shares came from lived on the stack of
/// [`ApprovalCoordinator::create_transaction`] and is already gone; only
/// the shares (and their fingerprints on the signer identities) survive.
#[derive(Debug, Clone)]
pub struct CreatedTransaction {
    /// The persisted transaction.
    pub transaction: Transaction,
    /// One share per selected signer, in selection order.
    pub shares: Vec<SignerShare>,
}

/// The outcome of one signer's decision.
#[derive(Debug, Clone)]
pub struct DecisionOutcome {
    /// The transaction after the decision was applied and persisted.
    pub transaction: Transaction,
    /// True exactly when this decision was the K-th approval — the
    /// moment the signers' shares become combinable.
    pub quorum_reached: bool,
}

// ---------------------------------------------------------------------------
// ApprovalCoordinator
// ---------------------------------------------------------------------------

/// Orchestrates the approval workflow over injected collaborators.
pub struct ApprovalCoordinator<I, T, A>
where
    I: IdentityStore,
    T: TransactionStore,
    A: AuditSink,
{
    identities: Arc<I>,
    transactions: Arc<T>,
    audit: Arc<A>,
    /// Per-transaction serialization points. Entries are created on first
    /// touch and live for the process lifetime — a mutex is 8 bytes and
    /// transactions number in the thousands, not the billions.
    locks: DashMap<String, Arc<Mutex<()>>>,
    totp: TotpParams,
}

impl<I, T, A> ApprovalCoordinator<I, T, A>
where
    I: IdentityStore,
    T: TransactionStore,
    A: AuditSink,
{
    /// Build a coordinator with default TOTP parameters.
    pub fn new(identities: Arc<I>, transactions: Arc<T>, audit: Arc<A>) -> Self {
        Self::with_totp_params(identities, transactions, audit, TotpParams::default())
    }

    /// Build a coordinator with explicit TOTP parameters (tests mostly).
    pub fn with_totp_params(
        identities: Arc<I>,
        transactions: Arc<T>,
        audit: Arc<A>,
        totp: TotpParams,
    ) -> Self {
        Self {
            identities,
            transactions,
            audit,
            locks: DashMap::new(),
            totp,
        }
    }

    fn lock_for(&self, transaction_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(transaction_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    // -----------------------------------------------------------------------
    // Enrollment
    // -----------------------------------------------------------------------

    /// Start enrolling a new participant: mint a TOTP secret and
    /// provisioning URI.
    ///
    /// Fails with [`ApprovalError::Validation`] if the username is
    /// already taken (checked again, atomically, at confirmation).
    pub fn enroll(
        &self,
        username: &str,
        role: Role,
    ) -> Result<EnrollmentTicket, ApprovalError> {
        if username.trim().is_empty() {
            return Err(ApprovalError::Validation(
                "username must not be blank".into(),
            ));
        }
        if self.identities.find_by_username(username)?.is_some() {
            return Err(ApprovalError::Validation(format!(
                "username already taken: {username}"
            )));
        }
        Ok(begin_enrollment(username, role))
    }

    /// Complete an enrollment: verify the applicant's first code and
    /// persist the new identity.
    pub fn confirm_enrollment(
        &self,
        ticket: &EnrollmentTicket,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Identity, ApprovalError> {
        let identity = confirm_enrollment(ticket, code, now)?;
        self.identities.save(&identity)?;
        tracing::info!(
            identity_id = %identity.id,
            username = %identity.username,
            role = %identity.role,
            "identity enrolled"
        );
        Ok(identity)
    }

    // -----------------------------------------------------------------------
    // Transaction creation
    // -----------------------------------------------------------------------

    /// Create a transaction: validate the request, resolve all parties,
    /// split a fresh secret across the signers, persist, audit.
    ///
    /// The returned [`SignerShare`]s are the only copies of the share
    /// material — the caller is responsible for delivering each to its
    /// signer. Only SHA-256 fingerprints are retained, on the signer
    /// identities.
    pub fn create_transaction(
        &self,
        request: TransactionRequest,
        now: DateTime<Utc>,
    ) -> Result<CreatedTransaction, ApprovalError> {
        let mut tx = request.create(now)?;

        let creator = self
            .identities
            .find_by_id(&tx.creator_id)?
            .ok_or_else(|| ApprovalError::NotFound(format!("creator {}", tx.creator_id)))?;
        if creator.role != Role::Initiator {
            return Err(ApprovalError::Unauthorized(format!(
                "{} is not an initiator",
                creator.username
            )));
        }
        if !creator.is_active() {
            return Err(ApprovalError::Unauthorized(format!(
                "initiator {} is suspended",
                creator.username
            )));
        }

        let mut signers = Vec::with_capacity(tx.selected_signers.len());
        for signer_id in &tx.selected_signers {
            let signer = self.identities.find_by_id(signer_id)?.ok_or_else(|| {
                ApprovalError::Validation(format!("unknown signer id: {signer_id}"))
            })?;
            if signer.role != Role::Signer {
                return Err(ApprovalError::Validation(format!(
                    "{} is not a signer",
                    signer.username
                )));
            }
            if !signer.is_active() {
                return Err(ApprovalError::Validation(format!(
                    "signer {} is suspended",
                    signer.username
                )));
            }
            signers.push(signer);
        }

        // Fresh ephemeral secret, split K-of-N across the signers. The
        // clear secret never leaves this stack frame.
        let mut secret = [0u8; config::TRANSACTION_SECRET_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut secret);
        let raw_shares = sharing::split(
            &secret,
            tx.selected_signers.len() as u32,
            tx.required_signatures,
        )?;

        let shares: Vec<SignerShare> = tx
            .selected_signers
            .iter()
            .zip(raw_shares)
            .map(|(signer_id, share)| SignerShare {
                signer_id: signer_id.clone(),
                share,
            })
            .collect();

        for (signer, signer_share) in signers.iter_mut().zip(&shares) {
            signer.key_share_hash = Some(sha256_hex(&signer_share.share.data));
            self.identities.save(signer)?;
        }

        tx.version = self.transactions.save(&tx)?;

        self.audit.append(AuditEntry::new(
            tx.id.clone(),
            AuditAction::TransactionCreated,
            creator.id.clone(),
            creator.username.clone(),
            now,
            format!(
                "Transaction {} created for {} ({}-of-{})",
                tx.id,
                tx.amount,
                tx.required_signatures,
                tx.selected_signers.len()
            ),
        ));
        tracing::info!(
            transaction_id = %tx.id,
            amount = %tx.amount,
            signers = tx.selected_signers.len(),
            threshold = tx.required_signatures,
            "transaction created"
        );

        Ok(CreatedTransaction {
            transaction: tx,
            shares,
        })
    }

    // -----------------------------------------------------------------------
    // Decisions
    // -----------------------------------------------------------------------

    /// Apply one signer's decision to a transaction.
    ///
    /// Verification order is deliberate: identity and TOTP checks happen
    /// *before* the per-transaction lock is taken, so a flood of bad
    /// codes cannot serialize behind legitimate signatures. The state
    /// machine transition, save, and audit all happen under the lock.
    pub fn submit_decision(
        &self,
        transaction_id: &str,
        signer_id: &str,
        code: &str,
        decision: SignerDecision,
        now: DateTime<Utc>,
    ) -> Result<DecisionOutcome, ApprovalError> {
        let signer = self
            .identities
            .find_by_id(signer_id)?
            .ok_or_else(|| ApprovalError::NotFound(format!("signer {signer_id}")))?;
        if signer.role != Role::Signer {
            return Err(ApprovalError::Unauthorized(format!(
                "{} is not a signer",
                signer.username
            )));
        }
        if !signer.is_active() {
            return Err(ApprovalError::Unauthorized(format!(
                "signer {} is suspended",
                signer.username
            )));
        }
        if !totp::verify_code_with(&self.totp, &signer.totp_secret, code, now) {
            return Err(ApprovalError::InvalidCode);
        }

        let lock = self.lock_for(transaction_id);
        let _guard = lock.lock();

        let mut tx = self
            .transactions
            .load(transaction_id)?
            .ok_or_else(|| ApprovalError::NotFound(format!("transaction {transaction_id}")))?;

        let was_pending = tx.status == TransactionStatus::Pending;
        tx.record_signature(signer_id, decision, now)?;
        tx.version = self.transactions.save(&tx)?;

        let quorum_reached = was_pending && tx.status == TransactionStatus::Approved;

        let (action, details) = match decision {
            SignerDecision::Signed => (
                AuditAction::SignatureAdded,
                format!(
                    "Signature {} of {} added",
                    tx.signed_count(),
                    tx.required_signatures
                ),
            ),
            SignerDecision::Rejected => (
                AuditAction::SignatureRejected,
                format!("Transaction rejected by {}", signer.username),
            ),
        };
        self.audit.append(AuditEntry::new(
            tx.id.clone(),
            action,
            signer.id.clone(),
            signer.username.clone(),
            now,
            details,
        ));
        tracing::info!(
            transaction_id = %tx.id,
            signer = %signer.username,
            decision = %decision,
            status = %tx.status,
            "decision recorded"
        );

        Ok(DecisionOutcome {
            transaction: tx,
            quorum_reached,
        })
    }

    // -----------------------------------------------------------------------
    // Expiry sweep
    // -----------------------------------------------------------------------

    /// Close every pending transaction whose deadline has passed.
    ///
    /// Takes the same per-transaction lock as [`submit_decision`] and
    /// re-loads each candidate under it, so a signature landing between
    /// the listing and the sweep wins or loses cleanly — never both.
    /// Idempotent: already-closed transactions are skipped without audit
    /// noise. Returns the number of transactions closed.
    pub fn expire_pending(&self, now: DateTime<Utc>) -> Result<usize, ApprovalError> {
        let candidates = self.transactions.list_pending()?;
        let mut closed = 0usize;

        for candidate in candidates {
            let lock = self.lock_for(&candidate.id);
            let _guard = lock.lock();

            let Some(mut tx) = self.transactions.load(&candidate.id)? else {
                continue;
            };
            if !tx.expire(now) {
                continue;
            }
            tx.version = self.transactions.save(&tx)?;

            self.audit.append(AuditEntry::new(
                tx.id.clone(),
                AuditAction::TransactionExpired,
                "system",
                "system",
                now,
                format!("Transaction {} expired (deadline {})", tx.id, tx.expires_at),
            ));
            tracing::info!(transaction_id = %tx.id, "transaction expired");
            closed += 1;
        }

        Ok(closed)
    }

    // -----------------------------------------------------------------------
    // Reconstruction
    // -----------------------------------------------------------------------

    /// Combine a quorum's shares back into the transaction secret.
    ///
    /// Eligibility is coupled to the state machine: shares only become
    /// combinable once the transaction is `Approved`. Below-quorum or
    /// malformed batches surface the sharing engine's own errors.
    pub fn reconstruct_secret(
        &self,
        transaction_id: &str,
        shares: &[Share],
    ) -> Result<Vec<u8>, ApprovalError> {
        let tx = self
            .transactions
            .load(transaction_id)?
            .ok_or_else(|| ApprovalError::NotFound(format!("transaction {transaction_id}")))?;
        if tx.status != TransactionStatus::Approved {
            return Err(ApprovalError::Validation(format!(
                "transaction {} is {}; shares are combinable only after approval",
                tx.id, tx.status
            )));
        }
        Ok(sharing::combine(shares)?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
