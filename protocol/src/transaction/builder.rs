//! Transaction construction via the builder pattern.
//!
//! [`TransactionRequest`] collects the initiator's intent; `create()`
//! validates everything up front and produces a [`Transaction`] with one
//! pending [`SignatureRecord`](super::types::SignatureRecord) per
//! selected signer and a replay-guarding nonce. Construction does not
//! touch storage — resolving signer ids against real identities is the
//! coordinator's job, because only it holds a store.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;

use super::types::{Amount, SignatureRecord, TransactionStatus};
use crate::config;
use crate::error::ApprovalError;

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// A multi-party approval transaction.
///
/// The invariants the rest of the workflow leans on:
///
/// - `required_signatures ≤ selected_signers.len()`, both ≥ 1;
/// - `signatures` has exactly one entry per selected signer, created at
///   birth — the key set never changes afterwards;
/// - `nonce` is unique across all transactions (the store enforces it);
/// - `status` only ever moves forward (see
///   [`record_signature`](Transaction::record_signature)).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction id (UUID v4).
    pub id: String,
    /// Transfer amount; strictly positive.
    pub amount: Amount,
    /// Receiving party.
    pub beneficiary: String,
    /// Free-text business justification.
    pub purpose: String,
    /// The initiator who proposed this transfer.
    pub creator_id: String,
    /// Approval threshold K.
    pub required_signatures: u32,
    /// The selected signers, in selection order (N ≥ K, no duplicates).
    pub selected_signers: Vec<String>,
    /// One signature slot per selected signer, keyed by signer id.
    pub signatures: BTreeMap<String, SignatureRecord>,
    /// Replay/duplicate-submission guard; unique across all transactions.
    pub nonce: String,
    /// Aggregate lifecycle status.
    pub status: TransactionStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Deadline after which no new signatures are accepted.
    pub expires_at: DateTime<Utc>,
    /// Optimistic-concurrency counter, bumped by the store on every save.
    pub version: u64,
}

// ---------------------------------------------------------------------------
// TransactionRequest
// ---------------------------------------------------------------------------

/// Fluent builder for new transactions.
///
/// # Usage
///
/// ```
/// use chrono::Utc;
/// use countersign_protocol::transaction::{Amount, Currency, TransactionRequest};
///
/// let tx = TransactionRequest::new(
///     Amount::new(15_000_000, Currency::USD),
///     "Acme Corp Ltd",
///     "initiator-1",
/// )
/// .purpose("Equipment purchase")
/// .signers(["s1", "s2", "s3", "s4", "s5"].map(String::from))
/// .required_signatures(3)
/// .create(Utc::now())
/// .unwrap();
///
/// assert_eq!(tx.signatures.len(), 5);
/// ```
#[derive(Debug, Clone)]
pub struct TransactionRequest {
    amount: Amount,
    beneficiary: String,
    purpose: String,
    creator_id: String,
    selected_signers: Vec<String>,
    required_signatures: u32,
    expires_at: Option<DateTime<Utc>>,
}

impl TransactionRequest {
    /// Starts a request with the three fields that have no sane default.
    pub fn new(
        amount: Amount,
        beneficiary: impl Into<String>,
        creator_id: impl Into<String>,
    ) -> Self {
        Self {
            amount,
            beneficiary: beneficiary.into(),
            purpose: String::new(),
            creator_id: creator_id.into(),
            selected_signers: Vec::new(),
            required_signatures: 1,
            expires_at: None,
        }
    }

    /// Sets the business justification.
    pub fn purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = purpose.into();
        self
    }

    /// Adds a single signer to the selection.
    pub fn signer(mut self, signer_id: impl Into<String>) -> Self {
        self.selected_signers.push(signer_id.into());
        self
    }

    /// Adds a batch of signers, preserving order.
    pub fn signers(mut self, signer_ids: impl IntoIterator<Item = String>) -> Self {
        self.selected_signers.extend(signer_ids);
        self
    }

    /// Sets the approval threshold K.
    pub fn required_signatures(mut self, k: u32) -> Self {
        self.required_signatures = k;
        self
    }

    /// Sets an explicit deadline. Defaults to
    /// [`config::DEFAULT_EXPIRY_SECS`] after creation when not called.
    pub fn expires_at(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }

    /// Validates the request and produces a pending [`Transaction`].
    ///
    /// # Errors
    ///
    /// [`ApprovalError::Validation`] on: zero amount, blank or oversized
    /// beneficiary, oversized purpose, empty signer set, duplicate
    /// signers, the creator selecting themselves, `K < 1`, `K > N`, or a
    /// deadline not in the future.
    pub fn create(self, now: DateTime<Utc>) -> Result<Transaction, ApprovalError> {
        if self.amount.is_zero() {
            return Err(ApprovalError::Validation(
                "amount must be positive".into(),
            ));
        }
        if self.beneficiary.trim().is_empty() {
            return Err(ApprovalError::Validation(
                "beneficiary must not be blank".into(),
            ));
        }
        if self.beneficiary.chars().count() > config::MAX_BENEFICIARY_LENGTH {
            return Err(ApprovalError::Validation(format!(
                "beneficiary exceeds {} characters",
                config::MAX_BENEFICIARY_LENGTH
            )));
        }
        if self.purpose.chars().count() > config::MAX_PURPOSE_LENGTH {
            return Err(ApprovalError::Validation(format!(
                "purpose exceeds {} characters",
                config::MAX_PURPOSE_LENGTH
            )));
        }

        let n = self.selected_signers.len();
        if n == 0 {
            return Err(ApprovalError::Validation(
                "at least one signer must be selected".into(),
            ));
        }
        let distinct: HashSet<&String> = self.selected_signers.iter().collect();
        if distinct.len() != n {
            return Err(ApprovalError::Validation(
                "selected signers contain duplicates".into(),
            ));
        }
        if self.selected_signers.iter().any(|s| *s == self.creator_id) {
            return Err(ApprovalError::Validation(
                "the initiator cannot be one of the signers".into(),
            ));
        }
        if self.required_signatures < 1 || self.required_signatures as usize > n {
            return Err(ApprovalError::Validation(format!(
                "required signatures must be between 1 and {} (got {})",
                n, self.required_signatures
            )));
        }

        let expires_at = self
            .expires_at
            .unwrap_or_else(|| now + Duration::seconds(config::DEFAULT_EXPIRY_SECS));
        if expires_at <= now {
            return Err(ApprovalError::Validation(
                "expiry deadline must be in the future".into(),
            ));
        }

        // One pending slot per signer, created eagerly: an undecided
        // signer is a visible record, not an absence.
        let signatures: BTreeMap<String, SignatureRecord> = self
            .selected_signers
            .iter()
            .map(|id| (id.clone(), SignatureRecord::pending(id.clone())))
            .collect();

        Ok(Transaction {
            id: Uuid::new_v4().to_string(),
            amount: self.amount,
            beneficiary: self.beneficiary,
            purpose: self.purpose,
            creator_id: self.creator_id,
            required_signatures: self.required_signatures,
            selected_signers: self.selected_signers,
            signatures,
            nonce: format!("{}-{}", now.timestamp_millis(), Uuid::new_v4()),
            status: TransactionStatus::Pending,
            created_at: now,
            expires_at,
            version: 0,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
