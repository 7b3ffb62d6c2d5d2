//! # Error Taxonomy
//!
//! One enum, [`ApprovalError`], covers every way the approval workflow can
//! refuse to do what it was asked. Callers branch on the variant, not on
//! message strings — the transport layer maps variants to HTTP status
//! codes, tests match on them, and nothing ever parses an error message.
//!
//! Two deliberate asymmetries:
//!
//! - [`ApprovalError::InvalidCode`] carries no detail at all. Telling a
//!   caller *why* a TOTP code failed (wrong code vs. undecodable secret)
//!   is an oracle; "invalid code" is all anyone outside gets.
//! - Engine-specific failures ([`ShareError`], [`StoreError`]) are wrapped
//!   rather than flattened, so the caller can still see exactly which
//!   precondition broke while the coordinator stays free of error kinds of
//!   its own.

use thiserror::Error;

use crate::crypto::sharing::ShareError;
use crate::store::StoreError;
use crate::transaction::ClosedReason;

/// Errors surfaced by the approval workflow.
///
/// Nothing here is retried internally — validation and conflict errors are
/// the caller's to resolve, and expiry sweeps are idempotent by design.
#[derive(Debug, Error)]
pub enum ApprovalError {
    /// Malformed input: bad amounts, empty signer sets, K > N, oversized
    /// fields, unresolvable signer ids. The caller's fault; never retried.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The acting identity exists but is not allowed to do this: wrong
    /// role, suspended, or not among the transaction's selected signers.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// An id did not resolve to anything.
    #[error("not found: {0}")]
    NotFound(String),

    /// This signer has already signed or rejected this transaction.
    /// Reported as an error, never silently ignored — the caller needs to
    /// know their submission did not count a second time.
    #[error("signer {signer_id} has already decided on this transaction")]
    AlreadyDecided {
        /// The signer whose record is no longer pending.
        signer_id: String,
    },

    /// The transaction no longer accepts signatures: it reached a terminal
    /// status, or its deadline passed while it was still pending.
    #[error("transaction is closed ({reason}) and accepts no further signatures")]
    TransactionClosed {
        /// Why the transaction is closed.
        reason: ClosedReason,
    },

    /// TOTP verification failed. Deliberately detail-free.
    #[error("invalid code")]
    InvalidCode,

    /// Secret sharing precondition violated (threshold misconfiguration,
    /// too few shares, malformed or mixed shares).
    #[error(transparent)]
    Share(#[from] ShareError),

    /// The backing store refused the operation.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApprovalError {
    /// True for errors caused by the caller's input rather than system
    /// state — useful for logging noise control at the transport layer.
    pub fn is_caller_fault(&self) -> bool {
        matches!(
            self,
            ApprovalError::Validation(_)
                | ApprovalError::InvalidCode
                | ApprovalError::Share(ShareError::InvalidThreshold { .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_code_leaks_nothing() {
        // The whole point of this variant: one fixed string, no detail.
        assert_eq!(ApprovalError::InvalidCode.to_string(), "invalid code");
    }

    #[test]
    fn share_errors_pass_through_transparently() {
        let err: ApprovalError = ShareError::InsufficientShares { got: 2, need: 3 }.into();
        assert!(err.to_string().contains("insufficient shares"));
        assert!(matches!(err, ApprovalError::Share(_)));
    }

    #[test]
    fn caller_fault_classification() {
        assert!(ApprovalError::Validation("amount must be positive".into()).is_caller_fault());
        assert!(ApprovalError::InvalidCode.is_caller_fault());
        assert!(!ApprovalError::NotFound("tx-1".into()).is_caller_fault());
    }
}
