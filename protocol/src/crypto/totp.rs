//! # TOTP Engine
//!
//! Time-based one-time passwords per RFC 6238, built on HOTP (RFC 4226)
//! with HMAC-SHA-1 — the algorithm every mainstream authenticator app
//! actually implements, whatever the RFC's successors may wish.
//!
//! Two operations, both pure:
//!
//! - [`enroll_secret`] — mint a fresh 160-bit secret and the
//!   `otpauth://` provisioning URI an authenticator app scans.
//! - [`verify_code`] — check a submitted code against a secret at a given
//!   instant, tolerating bounded clock drift between the signer's device
//!   and the server.
//!
//! ## Failure posture
//!
//! Verification never panics and never returns an error: malformed codes,
//! undecodable secrets, and pre-epoch timestamps all verify as `false`.
//! Distinguishing "wrong code" from "garbage secret" at the API surface
//! would hand an attacker an oracle, so we don't.
//!
//! ## Drift window
//!
//! The window is a parameter of [`TotpParams`], not a constant buried in a
//! call site. The default (±2 steps = ±60 s) is deliberate: one step of
//! tolerance strands signers with slow phones, four invites replay.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha1::Sha1;

use crate::config;

type HmacSha1 = Hmac<Sha1>;

const BASE32: base32::Alphabet = base32::Alphabet::Rfc4648 { padding: false };

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Tunable TOTP parameters.
///
/// The defaults come from [`crate::config`] and match what authenticator
/// apps assume. Override only when both sides of the exchange agree —
/// which, outside of tests, they rarely do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TotpParams {
    /// Length of one time step in seconds.
    pub step_secs: u64,
    /// Number of decimal digits in a code.
    pub digits: u32,
    /// Accepted drift, in steps, on each side of the current counter.
    pub drift_steps: u64,
}

impl Default for TotpParams {
    fn default() -> Self {
        Self {
            step_secs: config::TOTP_STEP_SECS,
            digits: config::TOTP_DIGITS,
            drift_steps: config::TOTP_DRIFT_STEPS,
        }
    }
}

// ---------------------------------------------------------------------------
// Enrollment
// ---------------------------------------------------------------------------

/// A freshly generated TOTP secret, ready for an authenticator app.
///
/// The caller is responsible for persisting `base32` on the identity it
/// belongs to (and for showing `provisioning_uri` exactly once). This
/// module generates; it does not store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrolledSecret {
    /// The shared secret, base32-encoded (RFC 4648, no padding).
    pub base32: String,
    /// `otpauth://totp/...` URI embedding issuer and account label,
    /// suitable for QR rendering.
    pub provisioning_uri: String,
}

/// Generate a new TOTP secret for the given account label.
///
/// Pulls [`config::TOTP_SECRET_BYTES`] (160 bits) from the OS CSPRNG.
/// Pure generation — no side effects, no persistence.
pub fn enroll_secret(account_label: &str) -> EnrolledSecret {
    let mut raw = [0u8; config::TOTP_SECRET_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut raw);

    let secret = base32::encode(BASE32, &raw);
    let provisioning_uri = provisioning_uri(&secret, account_label);
    EnrolledSecret {
        base32: secret,
        provisioning_uri,
    }
}

/// Format the `otpauth://` provisioning URI for a secret and label.
///
/// Embeds issuer, algorithm, digits, and period explicitly so apps that
/// honor those fields don't fall back to guessing. Public so transport
/// layers can rebuild an [`EnrolledSecret`] from a stored base32 string.
pub fn provisioning_uri(secret_base32: &str, account_label: &str) -> String {
    let issuer = config::TOTP_ISSUER;
    format!(
        "otpauth://totp/{issuer}:{label}?secret={secret}&issuer={issuer}&algorithm=SHA1&digits={digits}&period={period}",
        issuer = issuer,
        label = percent_encode(account_label),
        secret = secret_base32,
        digits = config::TOTP_DIGITS,
        period = config::TOTP_STEP_SECS,
    )
}

/// Minimal percent-encoding for URI label components.
///
/// Account labels are usernames, so this only has to cover the occasional
/// space or separator — unreserved characters pass through untouched.
fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            other => out.push_str(&format!("%{:02X}", other)),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

/// Verify a submitted code against a secret at instant `at`, using the
/// default [`TotpParams`].
pub fn verify_code(secret_base32: &str, code: &str, at: DateTime<Utc>) -> bool {
    verify_code_with(&TotpParams::default(), secret_base32, code, at)
}

/// Verify a submitted code with explicit parameters.
///
/// Accepts the code if it matches the HOTP value for the time-step counter
/// at `at`, or any counter within `drift_steps` on either side. Returns
/// `false` — never an error, never a panic — for codes of the wrong length
/// or containing non-digits, for secrets that don't decode as base32, and
/// for timestamps before the Unix epoch.
pub fn verify_code_with(
    params: &TotpParams,
    secret_base32: &str,
    code: &str,
    at: DateTime<Utc>,
) -> bool {
    if code.len() != params.digits as usize || !code.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let Some(key) = decode_secret(secret_base32) else {
        return false;
    };
    let Some(counter) = counter_at(params, at) else {
        return false;
    };

    let earliest = counter.saturating_sub(params.drift_steps);
    let latest = counter.saturating_add(params.drift_steps);
    (earliest..=latest).any(|c| hotp(&key, c, params.digits) == code)
}

/// Compute the code a correctly configured authenticator would display at
/// instant `at`, using the default parameters.
///
/// Used by the enrollment confirmation flow and by tests. Returns `None`
/// if the secret does not decode or `at` predates the epoch.
pub fn code_at(secret_base32: &str, at: DateTime<Utc>) -> Option<String> {
    code_at_with(&TotpParams::default(), secret_base32, at)
}

/// [`code_at`] with explicit parameters.
pub fn code_at_with(
    params: &TotpParams,
    secret_base32: &str,
    at: DateTime<Utc>,
) -> Option<String> {
    let key = decode_secret(secret_base32)?;
    let counter = counter_at(params, at)?;
    Some(hotp(&key, counter, params.digits))
}

/// Decode a base32 secret, tolerating lowercase input and trailing
/// padding. `None` if the input is not valid base32.
fn decode_secret(secret_base32: &str) -> Option<Vec<u8>> {
    let normalized = secret_base32.trim_end_matches('=').to_ascii_uppercase();
    base32::decode(BASE32, &normalized)
}

/// The time-step counter for instant `at`. `None` before the epoch.
fn counter_at(params: &TotpParams, at: DateTime<Utc>) -> Option<u64> {
    let ts = at.timestamp();
    if ts < 0 {
        return None;
    }
    Some(ts as u64 / params.step_secs)
}

/// RFC 4226 HOTP: HMAC-SHA-1 over the big-endian counter, dynamic
/// truncation, then reduction to `digits` decimal digits.
fn hotp(key: &[u8], counter: u64, digits: u32) -> String {
    let mut mac = HmacSha1::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    // Dynamic truncation: the low nibble of the last byte picks a 4-byte
    // window; the top bit of that window is masked off.
    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = ((u32::from(digest[offset]) & 0x7f) << 24)
        | (u32::from(digest[offset + 1]) << 16)
        | (u32::from(digest[offset + 2]) << 8)
        | u32::from(digest[offset + 3]);

    let code = binary % 10u32.pow(digits);
    format!("{:01$}", code, digits as usize)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
