//! # Cryptographic Primitives for Countersign
//!
//! The two engines that give the approval workflow its teeth, plus the
//! hashing glue between them:
//!
//! - **totp** — RFC 6238 one-time codes. Gates enrollment and every
//!   approval a signer submits.
//! - **sharing** — Shamir's Secret Sharing over GF(256). Binds a fresh
//!   per-transaction secret to the selected signers so that reconstructing
//!   it requires a genuine quorum.
//! - **hash** — SHA-256 helpers for share fingerprints and nonce material.
//!
//! Everything in this module is pure and stateless: no storage, no clocks
//! it didn't receive as arguments, no shared mutable state. That is a load-
//! bearing property — the same TOTP verifier runs during enrollment and on
//! every signature submission, concurrently, without locks.

pub mod hash;
pub mod sharing;
pub mod totp;

pub use hash::{sha256, sha256_hex};
pub use sharing::{combine, split, Share, ShareError};
pub use totp::{enroll_secret, verify_code, EnrolledSecret, TotpParams};
