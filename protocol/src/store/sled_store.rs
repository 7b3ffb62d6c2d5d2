//! # Sled-backed stores
//!
//! Persistent implementations of all three store contracts on top of
//! sled's embedded key-value engine. This is what `countersign-node`
//! runs on; the in-memory stores remain the test workhorses.
//!
//! ## Tree layout
//!
//! | Tree           | Key                          | Value                  |
//! |----------------|------------------------------|------------------------|
//! | `identities`   | identity id (UTF-8)          | `bincode(Identity)`    |
//! | `usernames`    | username (UTF-8)             | identity id (UTF-8)    |
//! | `transactions` | transaction id (UTF-8)       | `bincode(Transaction)` |
//! | `nonces`       | nonce (UTF-8)                | transaction id (UTF-8) |
//! | `audit`        | tx id ++ 0x00 ++ seq (8B BE) | `bincode(AuditEntry)`  |
//!
//! Audit keys embed a monotonically increasing sequence number from
//! `Db::generate_id`, so a prefix scan returns a transaction's trail in
//! append order with no sorting.
//!
//! ## Atomicity
//!
//! The username and nonce uniqueness claims go through sled's
//! `compare_and_swap`, as does every transaction save (checked against
//! the version the caller loaded). sled trees support lock-free
//! concurrent readers and serialized writers, so `SledStores` is shared
//! across threads as a plain `Arc` with no extra locking.

use sled::{Db, Tree};
use std::path::Path;

use super::{IdentityStore, StoreError, TransactionStore};
use crate::audit::{AuditEntry, AuditSink};
use crate::identity::Identity;
use crate::transaction::{Transaction, TransactionStatus};

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// All Countersign persistence in one sled database.
///
/// Implements [`IdentityStore`], [`TransactionStore`], and
/// [`AuditSink`], so a single `Arc<SledStores>` can serve as every
/// collaborator the coordinator needs.
#[derive(Debug, Clone)]
pub struct SledStores {
    /// Underlying database handle (owns the trees, issues sequence ids).
    db: Db,
    /// Identities by id.
    identities: Tree,
    /// Username -> identity id uniqueness index.
    usernames: Tree,
    /// Transactions by id.
    transactions: Tree,
    /// Nonce -> transaction id replay guard.
    nonces: Tree,
    /// Audit entries, keyed for in-order prefix scans per transaction.
    audit: Tree,
}

impl SledStores {
    /// Open (or create) a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Self::from_db(sled::open(path)?)
    }

    /// Open a temporary database that vanishes on drop. For tests.
    pub fn open_temporary() -> Result<Self, StoreError> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: Db) -> Result<Self, StoreError> {
        Ok(Self {
            identities: db.open_tree("identities")?,
            usernames: db.open_tree("usernames")?,
            transactions: db.open_tree("transactions")?,
            nonces: db.open_tree("nonces")?,
            audit: db.open_tree("audit")?,
            db,
        })
    }

    /// A transaction's audit trail in append order.
    pub fn audit_for(&self, transaction_id: &str) -> Result<Vec<AuditEntry>, StoreError> {
        let mut prefix = Vec::with_capacity(transaction_id.len() + 1);
        prefix.extend_from_slice(transaction_id.as_bytes());
        prefix.push(0x00);

        let mut entries = Vec::new();
        for item in self.audit.scan_prefix(&prefix) {
            let (_, value) = item?;
            entries.push(decode(&value)?);
        }
        Ok(entries)
    }

    /// Flush all dirty buffers to disk. The node calls this on shutdown;
    /// sled also flushes on its own cadence.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    bincode::serialize(value).map_err(|e| StoreError::Backend(format!("serialize: {e}")))
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    bincode::deserialize(bytes).map_err(|e| StoreError::Backend(format!("deserialize: {e}")))
}

// ---------------------------------------------------------------------------
// IdentityStore
// ---------------------------------------------------------------------------

impl IdentityStore for SledStores {
    fn find_by_id(&self, id: &str) -> Result<Option<Identity>, StoreError> {
        match self.identities.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn find_by_username(&self, username: &str) -> Result<Option<Identity>, StoreError> {
        match self.usernames.get(username.as_bytes())? {
            Some(id_bytes) => {
                let id = String::from_utf8_lossy(&id_bytes).into_owned();
                self.find_by_id(&id)
            }
            None => Ok(None),
        }
    }

    fn save(&self, identity: &Identity) -> Result<(), StoreError> {
        // Claim the username atomically; losing the race to a different
        // identity is a DuplicateUsername, re-claiming our own is fine.
        let claim = self.usernames.compare_and_swap(
            identity.username.as_bytes(),
            None::<&[u8]>,
            Some(identity.id.as_bytes()),
        )?;
        if let Err(cas) = claim {
            let owner = cas.current.unwrap_or_default();
            if &owner[..] != identity.id.as_bytes() {
                return Err(StoreError::DuplicateUsername(identity.username.clone()));
            }
        }

        self.identities
            .insert(identity.id.as_bytes(), encode(identity)?)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TransactionStore
// ---------------------------------------------------------------------------

impl TransactionStore for SledStores {
    fn load(&self, id: &str) -> Result<Option<Transaction>, StoreError> {
        match self.transactions.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn save(&self, tx: &Transaction) -> Result<u64, StoreError> {
        let key = tx.id.as_bytes();

        match self.transactions.get(key)? {
            None => {
                if tx.version != 0 {
                    return Err(StoreError::VersionConflict {
                        id: tx.id.clone(),
                        expected: tx.version,
                        found: 0,
                    });
                }

                // Claim the nonce before the record exists anywhere.
                let claim = self.nonces.compare_and_swap(
                    tx.nonce.as_bytes(),
                    None::<&[u8]>,
                    Some(key),
                )?;
                if claim.is_err() {
                    return Err(StoreError::DuplicateNonce(tx.nonce.clone()));
                }

                let mut stored = tx.clone();
                stored.version = 1;
                let inserted = self.transactions.compare_and_swap(
                    key,
                    None::<&[u8]>,
                    Some(encode(&stored)?),
                )?;
                match inserted {
                    Ok(()) => Ok(1),
                    Err(cas) => {
                        // Lost a creation race for the same id.
                        let found = cas
                            .current
                            .as_deref()
                            .map(decode::<Transaction>)
                            .transpose()?
                            .map(|t| t.version)
                            .unwrap_or(0);
                        Err(StoreError::VersionConflict {
                            id: tx.id.clone(),
                            expected: 0,
                            found,
                        })
                    }
                }
            }
            Some(current_bytes) => {
                let existing: Transaction = decode(&current_bytes)?;
                if existing.version != tx.version {
                    return Err(StoreError::VersionConflict {
                        id: tx.id.clone(),
                        expected: tx.version,
                        found: existing.version,
                    });
                }

                let mut stored = tx.clone();
                stored.version = existing.version + 1;
                let swapped = self.transactions.compare_and_swap(
                    key,
                    Some(&current_bytes),
                    Some(encode(&stored)?),
                )?;
                match swapped {
                    Ok(()) => Ok(stored.version),
                    Err(cas) => {
                        let found = cas
                            .current
                            .as_deref()
                            .map(decode::<Transaction>)
                            .transpose()?
                            .map(|t| t.version)
                            .unwrap_or(0);
                        Err(StoreError::VersionConflict {
                            id: tx.id.clone(),
                            expected: tx.version,
                            found,
                        })
                    }
                }
            }
        }
    }

    fn list_pending(&self) -> Result<Vec<Transaction>, StoreError> {
        let mut pending = Vec::new();
        for item in self.transactions.iter() {
            let (_, bytes) = item?;
            let tx: Transaction = decode(&bytes)?;
            if tx.status == TransactionStatus::Pending {
                pending.push(tx);
            }
        }
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(pending)
    }
}

// ---------------------------------------------------------------------------
// AuditSink
// ---------------------------------------------------------------------------

impl AuditSink for SledStores {
    fn append(&self, entry: AuditEntry) {
        let result: Result<(), StoreError> = (|| {
            let seq = self.db.generate_id()?;
            let mut key = Vec::with_capacity(entry.transaction_id.len() + 9);
            key.extend_from_slice(entry.transaction_id.as_bytes());
            key.push(0x00);
            key.extend_from_slice(&seq.to_be_bytes());

            self.audit.insert(key, encode(&entry)?)?;
            Ok(())
        })();

        // Fire-and-forget contract: a failed append is reported, never
        // allowed to fail the transition that produced it.
        if let Err(err) = result {
            tracing::warn!(
                transaction_id = %entry.transaction_id,
                action = %entry.action,
                "audit append failed: {err}"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditAction;
    use crate::identity::Role;
    use crate::transaction::{Amount, Currency, SignerDecision, TransactionRequest};
    use chrono::{TimeZone, Utc};

    fn now() -> chrono::DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn sample_tx() -> Transaction {
        TransactionRequest::new(Amount::new(100_00, Currency::USD), "Acme Corp Ltd", "init-1")
            .signers((1..=3).map(|i| format!("signer-{i}")))
            .required_signatures(2)
            .create(now())
            .unwrap()
    }

    // SledStores implements both store traits, so `save` needs the trait
    // spelled out.
    fn save_identity(stores: &SledStores, identity: &Identity) -> Result<(), StoreError> {
        IdentityStore::save(stores, identity)
    }

    fn save_tx(stores: &SledStores, tx: &Transaction) -> Result<u64, StoreError> {
        TransactionStore::save(stores, tx)
    }

    #[test]
    fn identity_roundtrip_and_username_index() {
        let stores = SledStores::open_temporary().unwrap();
        let identity = Identity::new("signer1", Role::Signer, "SECRET", now());
        save_identity(&stores, &identity).unwrap();

        assert_eq!(stores.find_by_id(&identity.id).unwrap().unwrap(), identity);
        assert_eq!(
            stores.find_by_username("signer1").unwrap().unwrap(),
            identity
        );
    }

    #[test]
    fn username_collision_is_refused() {
        let stores = SledStores::open_temporary().unwrap();
        save_identity(&stores, &Identity::new("taken", Role::Signer, "A", now())).unwrap();

        let result = save_identity(&stores, &Identity::new("taken", Role::Signer, "B", now()));
        assert!(matches!(result, Err(StoreError::DuplicateUsername(_))));
    }

    #[test]
    fn identity_update_keeps_username() {
        let stores = SledStores::open_temporary().unwrap();
        let mut identity = Identity::new("stable", Role::Signer, "A", now());
        save_identity(&stores, &identity).unwrap();

        identity.key_share_hash = Some("deadbeef".into());
        save_identity(&stores, &identity).unwrap();

        assert_eq!(
            stores
                .find_by_id(&identity.id)
                .unwrap()
                .unwrap()
                .key_share_hash,
            Some("deadbeef".into())
        );
    }

    #[test]
    fn transaction_save_versions_like_the_contract_says() {
        let stores = SledStores::open_temporary().unwrap();
        let tx = sample_tx();

        assert_eq!(save_tx(&stores, &tx).unwrap(), 1);

        let mut loaded = stores.load(&tx.id).unwrap().unwrap();
        assert_eq!(loaded.version, 1);
        loaded
            .record_signature("signer-1", SignerDecision::Signed, now())
            .unwrap();
        assert_eq!(save_tx(&stores, &loaded).unwrap(), 2);

        // Saving the stale version 1 copy again must conflict.
        let mut stale = tx.clone();
        stale.version = 1;
        assert!(matches!(
            save_tx(&stores, &stale),
            Err(StoreError::VersionConflict { found: 2, .. })
        ));
    }

    #[test]
    fn nonce_replay_is_refused() {
        let stores = SledStores::open_temporary().unwrap();
        let tx = sample_tx();
        save_tx(&stores, &tx).unwrap();

        let mut replay = sample_tx();
        replay.nonce = tx.nonce.clone();
        assert!(matches!(
            save_tx(&stores, &replay),
            Err(StoreError::DuplicateNonce(_))
        ));
    }

    #[test]
    fn list_pending_survives_reopen_semantics() {
        let stores = SledStores::open_temporary().unwrap();
        let tx = sample_tx();
        save_tx(&stores, &tx).unwrap();

        let pending = stores.list_pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, tx.id);
    }

    #[test]
    fn audit_trail_scans_in_append_order() {
        let stores = SledStores::open_temporary().unwrap();

        for (i, action) in [
            AuditAction::TransactionCreated,
            AuditAction::SignatureAdded,
            AuditAction::SignatureAdded,
        ]
        .into_iter()
        .enumerate()
        {
            stores.append(AuditEntry::new(
                "tx-1",
                action,
                format!("actor-{i}"),
                format!("user-{i}"),
                now(),
                format!("step {i}"),
            ));
        }
        stores.append(AuditEntry::new(
            "tx-2",
            AuditAction::TransactionCreated,
            "actor-x",
            "user-x",
            now(),
            "other transaction",
        ));

        let trail = stores.audit_for("tx-1").unwrap();
        assert_eq!(trail.len(), 3);
        assert_eq!(trail[0].action, AuditAction::TransactionCreated);
        assert_eq!(trail[0].details, "step 0");
        assert_eq!(trail[2].details, "step 2");
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db");

        let tx = sample_tx();
        {
            let stores = SledStores::open(&path).unwrap();
            save_tx(&stores, &tx).unwrap();
            stores.flush().unwrap();
        }

        let reopened = SledStores::open(&path).unwrap();
        assert_eq!(reopened.load(&tx.id).unwrap().unwrap().id, tx.id);
    }
}
