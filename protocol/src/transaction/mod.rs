//! # Transaction Module
//!
//! Construction, validation, and lifecycle of approval transactions —
//! the state machine at the center of the workflow.
//!
//! ## Architecture
//!
//! ```text
//! types.rs     — Amount, Currency, statuses, decisions, SignatureRecord
//! builder.rs   — TransactionRequest → validated pending Transaction
//! lifecycle.rs — record_signature / expire: every status transition
//! ```
//!
//! ## Lifecycle
//!
//! 1. **Create** — an initiator's [`TransactionRequest`] is validated and
//!    becomes a `Pending` [`Transaction`] with one pending signature slot
//!    per selected signer and a unique nonce.
//! 2. **Decide** — each selected signer calls
//!    [`record_signature`](Transaction::record_signature) exactly once.
//!    K approvals → `Approved`; one rejection → `Rejected`.
//! 3. **Expire** — a background sweep closes pending transactions whose
//!    deadline passed.
//!
//! ## Design Decisions
//!
//! - Signature slots are a `signer_id → SignatureRecord` map created at
//!   birth, so the K/N invariants and duplicate-submission checks are
//!   structural — no re-deriving from an array on every call.
//! - The state machine never touches storage; it mutates a loaded value
//!   and the coordinator persists it under a per-transaction lock.
//! - Rejection is fail-fast: one veto closes the transaction.

pub mod builder;
pub mod lifecycle;
pub mod types;

pub use builder::{Transaction, TransactionRequest};
pub use types::{
    Amount, ClosedReason, Currency, SignatureRecord, SignatureState, SignerDecision,
    TransactionStatus,
};
