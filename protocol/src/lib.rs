// Copyright (c) 2026 Countersign Team. MIT License.
// See LICENSE for details.

//! # Countersign — Core Library
//!
//! Multi-party approval for transactions that are too large, too
//! irreversible, or too interesting for any single person to wave
//! through. An initiator proposes a transfer, a selected set of signers
//! each approve or veto it, and nothing moves until a quorum agrees.
//!
//! Countersign takes a pragmatic stance on the cryptography: TOTP
//! (RFC 6238) because that is what lives in everyone's authenticator app,
//! and Shamir's Secret Sharing over GF(256) because threshold secrecy
//! with an information-theoretic guarantee beats clever protocols nobody
//! can audit. Threshold *approval* here is a counting problem with a
//! state machine, not a distributed-signing ceremony — if you need real
//! threshold ECDSA, you need a different (and much larger) system.
//!
//! ## Architecture
//!
//! The crate mirrors the actual concerns of an approval service:
//!
//! - **crypto** — TOTP codes, Shamir secret sharing, hash helpers.
//! - **identity** — Participants, roles, and two-step TOTP enrollment.
//! - **transaction** — The approval state machine: creation, signatures,
//!   expiry. All the invariants live here.
//! - **coordinator** — Glue: verifies identities, serializes concurrent
//!   decisions per transaction, persists, audits.
//! - **audit** — Append-only trail of every state transition.
//! - **store** — Injected persistence seams (in-memory and sled).
//! - **config** — Protocol constants and operational defaults.
//! - **error** — The one error taxonomy callers branch on.
//!
//! ## Design Philosophy
//!
//! 1. State transitions are pure methods on loaded values; storage and
//!    locking wrap around them, never inside them.
//! 2. Every refused operation is a typed error. Silent no-ops hide bugs.
//! 3. If it touches money, it has tests. Plural.

pub mod audit;
pub mod config;
pub mod coordinator;
pub mod crypto;
pub mod error;
pub mod identity;
pub mod store;
pub mod transaction;

pub use coordinator::{ApprovalCoordinator, CreatedTransaction, DecisionOutcome, SignerShare};
pub use error::ApprovalError;
