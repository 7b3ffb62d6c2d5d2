//! Two-step TOTP enrollment.
//!
//! Step one ([`begin_enrollment`]) issues a fresh secret and provisioning
//! URI. Step two ([`confirm_enrollment`]) accepts a code from the
//! applicant's authenticator and, only if it verifies, produces the
//! [`Identity`] the caller may persist. An unconfirmed secret never
//! reaches a store — if the applicant fat-fingered the QR scan, they
//! simply start over with a new secret.

use chrono::{DateTime, Utc};

use super::types::{Identity, Role};
use crate::crypto::totp::{self, EnrolledSecret};
use crate::error::ApprovalError;

/// An in-flight enrollment: username, role, and the secret the applicant
/// is expected to prove possession of.
///
/// The ticket is held by the caller (or echoed through the transport
/// layer) between the two steps; the core keeps no state about it.
#[derive(Debug, Clone)]
pub struct EnrollmentTicket {
    /// Requested username.
    pub username: String,
    /// Requested role, fixed once the identity exists.
    pub role: Role,
    /// The secret and provisioning URI issued in step one.
    pub secret: EnrolledSecret,
}

/// Start an enrollment: mint a secret and provisioning URI for the
/// applicant to load into their authenticator.
///
/// Pure — nothing is persisted, nothing is reserved. Username-uniqueness
/// is checked at confirmation time by whoever saves the identity.
pub fn begin_enrollment(username: impl Into<String>, role: Role) -> EnrollmentTicket {
    let username = username.into();
    let secret = totp::enroll_secret(&username);
    EnrollmentTicket {
        username,
        role,
        secret,
    }
}

/// Complete an enrollment by verifying a code from the applicant's
/// authenticator.
///
/// On success returns the new [`Identity`] (active, fresh UUID) for the
/// caller to persist. On failure returns [`ApprovalError::InvalidCode`] —
/// with no hint as to whether the code was stale, mistyped, or the secret
/// never made it into the app.
pub fn confirm_enrollment(
    ticket: &EnrollmentTicket,
    code: &str,
    now: DateTime<Utc>,
) -> Result<Identity, ApprovalError> {
    if !totp::verify_code(&ticket.secret.base32, code, now) {
        return Err(ApprovalError::InvalidCode);
    }
    Ok(Identity::new(
        ticket.username.clone(),
        ticket.role,
        ticket.secret.base32.clone(),
        now,
    ))
}
