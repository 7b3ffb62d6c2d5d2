//! # Store Abstractions
//!
//! The core never owns persistence. It reads and writes through the two
//! narrow traits here — [`IdentityStore`] and [`TransactionStore`] — plus
//! the [`AuditSink`](crate::audit::AuditSink) from the audit module. That
//! keeps the state machine and coordinator testable against the in-memory
//! implementations with no database anywhere near the tests.
//!
//! ## Implementations
//!
//! ```text
//! memory.rs     — HashMaps behind parking_lot locks; tests & embedding
//! sled_store.rs — sled trees with bincode values; the service binary
//! ```
//!
//! ## Concurrency contract
//!
//! [`TransactionStore::save`] is compare-and-swap: the caller passes the
//! version it loaded, and the store refuses the write with
//! [`StoreError::VersionConflict`] if someone else got there first. The
//! coordinator's per-transaction locks make conflicts rare; the CAS makes
//! them harmless.

pub mod memory;
pub mod sled_store;

pub use memory::{MemoryIdentityStore, MemoryTransactionStore};
pub use sled_store::SledStores;

use thiserror::Error;

use crate::identity::Identity;
use crate::transaction::Transaction;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from the storage layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The record being updated does not exist.
    #[error("record not found: {0}")]
    NotFound(String),

    /// Optimistic-concurrency check failed: someone saved a newer version
    /// between this caller's load and save.
    #[error("version conflict on {id}: expected {expected}, found {found}")]
    VersionConflict {
        /// The contested record.
        id: String,
        /// Version the caller loaded.
        expected: u64,
        /// Version actually in the store.
        found: u64,
    },

    /// A transaction with this nonce already exists — replay or duplicate
    /// submission.
    #[error("duplicate nonce: {0}")]
    DuplicateNonce(String),

    /// Another identity already holds this username.
    #[error("username already taken: {0}")]
    DuplicateUsername(String),

    /// The backing engine failed (I/O, corruption, serialization).
    #[error("storage backend error: {0}")]
    Backend(String),
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Read/write access to enrolled identities.
pub trait IdentityStore: Send + Sync {
    /// Look up an identity by its stable id.
    fn find_by_id(&self, id: &str) -> Result<Option<Identity>, StoreError>;

    /// Look up an identity by username.
    fn find_by_username(&self, username: &str) -> Result<Option<Identity>, StoreError>;

    /// Insert or update an identity.
    ///
    /// Fails with [`StoreError::DuplicateUsername`] when a *different*
    /// identity already holds the username — updates to an existing
    /// identity keep their name without conflict.
    fn save(&self, identity: &Identity) -> Result<(), StoreError>;
}

/// Read/write access to transactions, with compare-and-swap saves.
pub trait TransactionStore: Send + Sync {
    /// Load a transaction by id.
    fn load(&self, id: &str) -> Result<Option<Transaction>, StoreError>;

    /// Persist a transaction, checking `tx.version` against the stored
    /// version. Returns the new stored version on success.
    ///
    /// - First save (no stored record): `tx.version` must be 0, and the
    ///   nonce must be globally unused ([`StoreError::DuplicateNonce`]).
    /// - Update: `tx.version` must equal the stored version, else
    ///   [`StoreError::VersionConflict`].
    fn save(&self, tx: &Transaction) -> Result<u64, StoreError>;

    /// All transactions currently in `Pending` status, for the expiry
    /// sweep and the operator's queue view.
    fn list_pending(&self) -> Result<Vec<Transaction>, StoreError>;
}
