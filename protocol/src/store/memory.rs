//! In-memory store implementations.
//!
//! `HashMap`s behind `parking_lot` locks — the reference implementation
//! of the store contracts and the workhorse of the test suite. Writes
//! take the lock for the whole check-then-insert so the uniqueness and
//! version rules hold under concurrent callers too.

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

use super::{IdentityStore, StoreError, TransactionStore};
use crate::identity::Identity;
use crate::transaction::{Transaction, TransactionStatus};

// ---------------------------------------------------------------------------
// MemoryIdentityStore
// ---------------------------------------------------------------------------

/// Identities in a map keyed by id, with username uniqueness enforced on
/// insert.
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    inner: RwLock<HashMap<String, Identity>>,
}

impl MemoryIdentityStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of identities held.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// True when no identities are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn find_by_id(&self, id: &str) -> Result<Option<Identity>, StoreError> {
        Ok(self.inner.read().get(id).cloned())
    }

    fn find_by_username(&self, username: &str) -> Result<Option<Identity>, StoreError> {
        Ok(self
            .inner
            .read()
            .values()
            .find(|i| i.username == username)
            .cloned())
    }

    fn save(&self, identity: &Identity) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let taken = inner
            .values()
            .any(|existing| existing.username == identity.username && existing.id != identity.id);
        if taken {
            return Err(StoreError::DuplicateUsername(identity.username.clone()));
        }
        inner.insert(identity.id.clone(), identity.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryTransactionStore
// ---------------------------------------------------------------------------

/// Transactions in a map keyed by id, with CAS versioning and a nonce
/// set for the replay guard.
#[derive(Debug, Default)]
pub struct MemoryTransactionStore {
    inner: RwLock<MemoryTransactionState>,
}

#[derive(Debug, Default)]
struct MemoryTransactionState {
    transactions: HashMap<String, Transaction>,
    nonces: HashSet<String>,
}

impl MemoryTransactionStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of transactions held (any status).
    pub fn len(&self) -> usize {
        self.inner.read().transactions.len()
    }

    /// True when no transactions are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TransactionStore for MemoryTransactionStore {
    fn load(&self, id: &str) -> Result<Option<Transaction>, StoreError> {
        Ok(self.inner.read().transactions.get(id).cloned())
    }

    fn save(&self, tx: &Transaction) -> Result<u64, StoreError> {
        let mut state = self.inner.write();

        let new_version = match state.transactions.get(&tx.id) {
            None => {
                if tx.version != 0 {
                    return Err(StoreError::VersionConflict {
                        id: tx.id.clone(),
                        expected: tx.version,
                        found: 0,
                    });
                }
                if !state.nonces.insert(tx.nonce.clone()) {
                    return Err(StoreError::DuplicateNonce(tx.nonce.clone()));
                }
                1
            }
            Some(existing) => {
                if existing.version != tx.version {
                    return Err(StoreError::VersionConflict {
                        id: tx.id.clone(),
                        expected: tx.version,
                        found: existing.version,
                    });
                }
                existing.version + 1
            }
        };

        let mut stored = tx.clone();
        stored.version = new_version;
        state.transactions.insert(stored.id.clone(), stored);
        Ok(new_version)
    }

    fn list_pending(&self) -> Result<Vec<Transaction>, StoreError> {
        let mut pending: Vec<Transaction> = self
            .inner
            .read()
            .transactions
            .values()
            .filter(|t| t.status == TransactionStatus::Pending)
            .cloned()
            .collect();
        // Oldest first: the sweep and the operator queue both want that.
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(pending)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
