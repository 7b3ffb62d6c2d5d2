//! The approval state machine.
//!
//! All status transitions live in this file, as methods on
//! [`Transaction`]: recording a signer's decision and closing an expired
//! transaction. Both mutate the value in place and leave persistence,
//! locking, and audit emission to the coordinator — which is what makes
//! the machine testable with nothing but a clock.
//!
//! ## Transition rules
//!
//! ```text
//!             signed count ≥ K
//!   Pending ────────────────────▶ Approved   (terminal)
//!      │
//!      │  any single rejection, or deadline passed
//!      └────────────────────────▶ Rejected   (terminal)
//! ```
//!
//! The rejection rule is deliberately fail-fast: one veto closes the
//! whole transaction. A majority-reject policy would also be coherent,
//! but for irreversible transfers the conservative rule is the only
//! defensible default, so that is the documented behavior here.

use chrono::{DateTime, Utc};

use super::builder::Transaction;
use super::types::{ClosedReason, SignatureState, SignerDecision, TransactionStatus};
use crate::error::ApprovalError;

impl Transaction {
    /// Number of signers who have approved.
    pub fn signed_count(&self) -> usize {
        self.count_state(SignatureState::Signed)
    }

    /// Number of signers who have rejected.
    pub fn rejected_count(&self) -> usize {
        self.count_state(SignatureState::Rejected)
    }

    /// Number of signers yet to decide.
    pub fn pending_count(&self) -> usize {
        self.count_state(SignatureState::Pending)
    }

    fn count_state(&self, state: SignatureState) -> usize {
        self.signatures.values().filter(|r| r.state == state).count()
    }

    /// True once the transaction is in a terminal status.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// True when the deadline has passed at instant `at`.
    pub fn is_expired(&self, at: DateTime<Utc>) -> bool {
        at > self.expires_at
    }

    /// Record one signer's decision and recompute the aggregate status.
    ///
    /// On success exactly one [`SignatureRecord`](super::SignatureRecord)
    /// moves out of `Pending`, then the status is recomputed in the same
    /// call — there is no observable moment where the counts and the
    /// status disagree.
    ///
    /// # Errors
    ///
    /// - [`ApprovalError::TransactionClosed`] when the status is already
    ///   terminal, or the deadline passed while the transaction was still
    ///   pending. Nothing is mutated.
    /// - [`ApprovalError::Unauthorized`] when `signer_id` is not one of
    ///   the selected signers.
    /// - [`ApprovalError::AlreadyDecided`] when this signer's record is
    ///   no longer pending — a second submission is an error the caller
    ///   hears about, never a silent no-op, regardless of which decision
    ///   it carries.
    pub fn record_signature(
        &mut self,
        signer_id: &str,
        decision: SignerDecision,
        at: DateTime<Utc>,
    ) -> Result<(), ApprovalError> {
        match self.status {
            TransactionStatus::Approved => {
                return Err(ApprovalError::TransactionClosed {
                    reason: ClosedReason::AlreadyApproved,
                })
            }
            TransactionStatus::Rejected => {
                return Err(ApprovalError::TransactionClosed {
                    reason: ClosedReason::AlreadyRejected,
                })
            }
            TransactionStatus::Pending => {}
        }
        if self.is_expired(at) {
            return Err(ApprovalError::TransactionClosed {
                reason: ClosedReason::DeadlinePassed,
            });
        }

        let record = self.signatures.get_mut(signer_id).ok_or_else(|| {
            ApprovalError::Unauthorized(format!(
                "signer {signer_id} is not selected for this transaction"
            ))
        })?;
        if record.state != SignatureState::Pending {
            return Err(ApprovalError::AlreadyDecided {
                signer_id: signer_id.to_string(),
            });
        }

        record.state = match decision {
            SignerDecision::Signed => SignatureState::Signed,
            SignerDecision::Rejected => SignatureState::Rejected,
        };
        record.decided_at = Some(at);

        self.recompute_status();
        Ok(())
    }

    /// Close the transaction if its deadline has passed.
    ///
    /// Returns `true` when this call performed the `Pending → Rejected`
    /// transition, `false` otherwise — already-terminal transactions and
    /// not-yet-expired ones are untouched, which makes repeated sweeps
    /// idempotent and tells the caller whether an audit entry is due.
    pub fn expire(&mut self, at: DateTime<Utc>) -> bool {
        if self.status != TransactionStatus::Pending || !self.is_expired(at) {
            return false;
        }
        self.status = TransactionStatus::Rejected;
        true
    }

    /// Recompute aggregate status from the signature records.
    ///
    /// Rejection wins: a single veto closes the transaction even if the
    /// signed count has simultaneously reached the threshold (which can
    /// only happen if both were recorded before this recomputation —
    /// i.e., never, since recording is one-at-a-time).
    fn recompute_status(&mut self) {
        if self.rejected_count() > 0 {
            self.status = TransactionStatus::Rejected;
        } else if self.signed_count() >= self.required_signatures as usize {
            self.status = TransactionStatus::Approved;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
