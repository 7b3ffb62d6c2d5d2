//! # Hashing Utilities
//!
//! SHA-256 wrappers used across the workflow: share fingerprints stored on
//! signer identities, and anywhere else a stable digest of some bytes is
//! needed. One hash function, used plainly. If you are tempted to add a
//! second one "for speed", measure first — these inputs are tens of bytes.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 digest of `data` as a fixed-size array.
///
/// # Example
///
/// ```
/// use countersign_protocol::crypto::sha256;
///
/// let digest = sha256(b"countersign");
/// assert_eq!(digest.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// Compute the SHA-256 digest of `data`, hex-encoded.
///
/// This is the form persisted as a signer's `key_share_hash`: the share
/// itself goes to the signer, only its fingerprint is retained.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}
