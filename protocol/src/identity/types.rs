//! Core identity types: roles, lifecycle status, and the identity record
//! itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// What a participant is allowed to do.
///
/// Fixed at enrollment and never changed afterwards. Separation of duties
/// is structural here, not a policy check sprinkled across call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Proposes transactions. Cannot sign them — not even their own.
    Initiator,
    /// Approves or rejects transactions they were selected for.
    Signer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Initiator => write!(f, "initiator"),
            Role::Signer => write!(f, "signer"),
        }
    }
}

// ---------------------------------------------------------------------------
// IdentityStatus
// ---------------------------------------------------------------------------

/// Whether an identity may currently act.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityStatus {
    /// Enrolled and allowed to act.
    Active,
    /// Administratively frozen. Suspended signers keep their pending
    /// signature slots (the records stay visible) but every action they
    /// attempt is refused.
    Suspended,
}

impl fmt::Display for IdentityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityStatus::Active => write!(f, "active"),
            IdentityStatus::Suspended => write!(f, "suspended"),
        }
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// An enrolled participant.
///
/// `id` is the stable join key everything else references — signer
/// assignments, signature records, audit entries. Usernames are for
/// humans and login; ids are for the data model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Globally unique, stable identifier (UUID v4).
    pub id: String,
    /// Human-facing name, unique per store.
    pub username: String,
    /// Fixed at enrollment.
    pub role: Role,
    /// Base32-encoded TOTP secret confirmed during enrollment.
    ///
    /// Never serialized out through the transport layer — response DTOs
    /// carry everything *except* this field.
    pub totp_secret: String,
    /// Hex SHA-256 fingerprint of this signer's most recent secret share.
    /// `None` until the signer is first selected for a transaction.
    pub key_share_hash: Option<String>,
    /// Current lifecycle status.
    pub status: IdentityStatus,
    /// Enrollment timestamp.
    pub created_at: DateTime<Utc>,
}

impl Identity {
    /// Construct a new active identity with a fresh UUID.
    pub fn new(
        username: impl Into<String>,
        role: Role,
        totp_secret: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            username: username.into(),
            role,
            totp_secret: totp_secret.into(),
            key_share_hash: None,
            status: IdentityStatus::Active,
            created_at,
        }
    }

    /// True when the identity is allowed to act right now.
    pub fn is_active(&self) -> bool {
        self.status == IdentityStatus::Active
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
