//! # Audit Trail
//!
//! Append-only records of every state transition the workflow performs.
//! One entry per successful transition — creation, each signature, each
//! rejection, each expiry — and exactly zero entries for refused
//! operations. Entries are never mutated or deleted; the audit log is the
//! part of the system you show the regulator.
//!
//! The core writes through the [`AuditSink`] trait and treats delivery as
//! fire-and-forget: whatever durability the sink provides is the sink's
//! concern, and a slow sink must never block a signature.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// AuditAction
// ---------------------------------------------------------------------------

/// The kinds of transition an audit entry can describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// A transaction was created.
    TransactionCreated,
    /// A signer approved.
    SignatureAdded,
    /// A signer rejected (closing the transaction).
    SignatureRejected,
    /// The expiry sweep closed a pending transaction.
    TransactionExpired,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditAction::TransactionCreated => write!(f, "Transaction Created"),
            AuditAction::SignatureAdded => write!(f, "Signature Added"),
            AuditAction::SignatureRejected => write!(f, "Signature Rejected"),
            AuditAction::TransactionExpired => write!(f, "Transaction Expired"),
        }
    }
}

// ---------------------------------------------------------------------------
// AuditEntry
// ---------------------------------------------------------------------------

/// One immutable audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique entry id (UUID v4).
    pub id: String,
    /// The transaction this entry belongs to.
    pub transaction_id: String,
    /// What happened.
    pub action: AuditAction,
    /// Who did it — a participant id, or `"system"` for sweep actions.
    pub actor_id: String,
    /// The actor's username at the time of the action, denormalized so
    /// the trail stays readable even if identities are later renamed.
    pub actor_username: String,
    /// When it happened.
    pub timestamp: DateTime<Utc>,
    /// Human-readable summary, e.g. `"Signature 2 of 3 added"`.
    pub details: String,
}

impl AuditEntry {
    /// Build a new entry with a fresh id.
    pub fn new(
        transaction_id: impl Into<String>,
        action: AuditAction,
        actor_id: impl Into<String>,
        actor_username: impl Into<String>,
        timestamp: DateTime<Utc>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            transaction_id: transaction_id.into(),
            action,
            actor_id: actor_id.into(),
            actor_username: actor_username.into(),
            timestamp,
            details: details.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// AuditSink
// ---------------------------------------------------------------------------

/// Destination for audit entries.
///
/// Infallible by design: the workflow has nothing sensible to do with an
/// audit-delivery error mid-signature, so sinks swallow and report their
/// own failures (log, retry, dead-letter — their call).
pub trait AuditSink: Send + Sync {
    /// Append one entry. Must not block on slow downstream delivery.
    fn append(&self, entry: AuditEntry);
}

// ---------------------------------------------------------------------------
// MemoryAuditLog
// ---------------------------------------------------------------------------

/// In-memory audit sink: a growing `Vec` behind a lock.
///
/// The default sink for tests and embedded use. Entries are retained in
/// append order for the life of the process.
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    entries: RwLock<Vec<AuditEntry>>,
}

impl MemoryAuditLog {
    /// An empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of entries appended so far.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// True when nothing has been appended.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All entries for one transaction, in append order.
    pub fn entries_for(&self, transaction_id: &str) -> Vec<AuditEntry> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.transaction_id == transaction_id)
            .cloned()
            .collect()
    }

    /// A snapshot of the whole log, in append order.
    pub fn snapshot(&self) -> Vec<AuditEntry> {
        self.entries.read().clone()
    }
}

impl AuditSink for MemoryAuditLog {
    fn append(&self, entry: AuditEntry) {
        self.entries.write().push(entry);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
