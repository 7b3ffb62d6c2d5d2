//! # Protocol Configuration & Constants
//!
//! Every magic number in Countersign lives here. If you find yourself
//! hardcoding a time step or a length limit somewhere else, stop, move it
//! here, and thank yourself during the next security review.
//!
//! Most of these values are part of the operational contract with
//! authenticator apps and with signers' expectations about deadlines, so
//! changing them after deployment needs more thought than a version bump.

// ---------------------------------------------------------------------------
// TOTP Parameters
// ---------------------------------------------------------------------------

/// Time step for TOTP counters, per RFC 6238. 30 seconds is what every
/// authenticator app on the planet assumes; do not get creative here.
pub const TOTP_STEP_SECS: u64 = 30;

/// Number of digits in a TOTP code. Six is the authenticator-app default.
pub const TOTP_DIGITS: u32 = 6;

/// Default drift window in time steps, applied on both sides of "now".
/// ±2 steps = ±60 seconds of tolerated clock skew between a signer's
/// phone and the server. Wider windows are friendlier and weaker; callers
/// that need a different tradeoff override it via
/// [`crate::crypto::totp::TotpParams`] instead of hardcoding their own.
pub const TOTP_DRIFT_STEPS: u64 = 2;

/// Length of a freshly generated TOTP secret in bytes. 20 bytes = 160 bits
/// of entropy, the RFC 4226 recommended minimum for HMAC-SHA-1.
pub const TOTP_SECRET_BYTES: usize = 20;

/// Issuer embedded in provisioning URIs so authenticator apps can label
/// the account sensibly.
pub const TOTP_ISSUER: &str = "Countersign";

// ---------------------------------------------------------------------------
// Secret Sharing Parameters
// ---------------------------------------------------------------------------

/// Length of the ephemeral per-transaction secret that gets split across
/// the selected signers. 32 bytes, same as a symmetric key — enough that
/// reconstructing it actually proves quorum participation.
pub const TRANSACTION_SECRET_BYTES: usize = 32;

/// Upper bound on the number of shares a secret can be split into.
/// Share x-coordinates are nonzero bytes in GF(256), so 255 is a hard
/// mathematical ceiling, not a tunable.
pub const MAX_SHARES: u32 = 255;

// ---------------------------------------------------------------------------
// Transaction Limits
// ---------------------------------------------------------------------------

/// Default lifetime of a pending transaction. After this, the expiry
/// sweep closes it regardless of how many signatures it has collected.
/// 24 hours: long enough for signers across time zones, short enough
/// that stale transfer requests don't linger.
pub const DEFAULT_EXPIRY_SECS: i64 = 24 * 60 * 60;

/// Maximum beneficiary name length in characters.
pub const MAX_BENEFICIARY_LENGTH: usize = 100;

/// Maximum purpose/description length in characters.
pub const MAX_PURPOSE_LENGTH: usize = 500;

// ---------------------------------------------------------------------------
// Service Defaults
// ---------------------------------------------------------------------------

/// Default HTTP API port for `countersign-node`.
pub const DEFAULT_API_PORT: u16 = 8470;

/// Default Prometheus metrics port.
pub const DEFAULT_METRICS_PORT: u16 = 8471;

/// How often the background sweep checks pending transactions for expiry.
pub const EXPIRY_SWEEP_INTERVAL_SECS: u64 = 60;

/// Protocol version string, assembled at compile time.
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");
