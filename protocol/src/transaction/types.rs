//! Core type definitions for approval transactions.
//!
//! These are the vocabulary of the whole workflow: monetary amounts,
//! lifecycle statuses, signer decisions, and the per-signer signature
//! record. Kept small and serde-friendly — every one of these crosses the
//! store and transport boundaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Currency & Amount
// ---------------------------------------------------------------------------

/// Supported currency denominations.
///
/// The workflow moves corporate-treasury money, so the fiat majors are
/// first-class and anything exotic rides in [`Currency::Custom`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    /// United States Dollar (smallest unit: cent).
    USD,
    /// Euro (smallest unit: cent).
    EUR,
    /// Pound Sterling (smallest unit: penny).
    GBP,
    /// Arbitrary ticker for non-standard denominations.
    Custom(String),
}

impl Currency {
    /// Decimal places for display formatting. The protocol itself only
    /// ever handles integer minor units.
    pub fn decimals(&self) -> u32 {
        match self {
            Currency::USD | Currency::EUR | Currency::GBP => 2,
            Currency::Custom(_) => 2,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Currency::USD => write!(f, "USD"),
            Currency::EUR => write!(f, "EUR"),
            Currency::GBP => write!(f, "GBP"),
            Currency::Custom(ticker) => write!(f, "{}", ticker),
        }
    }
}

/// A monetary amount in the smallest indivisible unit of its currency.
///
/// `minor_units` is always an integer — no floating point anywhere near
/// money. `Amount::new(15_000_000, Currency::USD)` is $150,000.00.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amount {
    /// Value in minor units (cents, pennies, ...).
    pub minor_units: u64,
    /// The denomination.
    pub currency: Currency,
}

impl Amount {
    /// Creates a new amount.
    pub fn new(minor_units: u64, currency: Currency) -> Self {
        Self {
            minor_units,
            currency,
        }
    }

    /// True when the amount is zero — which no transaction may be.
    pub fn is_zero(&self) -> bool {
        self.minor_units == 0
    }

    /// Human-readable decimal rendering, e.g. `"150000.00 USD"`.
    pub fn display_decimal(&self) -> String {
        let decimals = self.currency.decimals();
        let divisor = 10u64.pow(decimals);
        format!(
            "{}.{:0>width$} {}",
            self.minor_units / divisor,
            self.minor_units % divisor,
            self.currency,
            width = decimals as usize
        )
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_decimal())
    }
}

// ---------------------------------------------------------------------------
// TransactionStatus
// ---------------------------------------------------------------------------

/// Aggregate lifecycle state of a transaction.
///
/// Strictly forward-moving: `Pending → Approved` when the signed count
/// reaches the threshold, `Pending → Rejected` on the first rejection or
/// on expiry. `Approved` and `Rejected` are terminal — nothing mutates a
/// closed transaction, ever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Collecting signatures.
    Pending,
    /// Threshold reached; the transfer may proceed.
    Approved,
    /// Rejected by a signer, or expired.
    Rejected,
}

impl TransactionStatus {
    /// True for states that accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionStatus::Pending => write!(f, "pending"),
            TransactionStatus::Approved => write!(f, "approved"),
            TransactionStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// Why a transaction stopped accepting signatures.
///
/// Carried inside [`crate::error::ApprovalError::TransactionClosed`] so
/// callers can distinguish "someone beat you to the decision" from "the
/// deadline passed" without string matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosedReason {
    /// The quorum was already reached.
    AlreadyApproved,
    /// A signer already rejected it (or an expiry sweep closed it).
    AlreadyRejected,
    /// `expires_at` has passed while the transaction was still pending.
    DeadlinePassed,
}

impl fmt::Display for ClosedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClosedReason::AlreadyApproved => write!(f, "already approved"),
            ClosedReason::AlreadyRejected => write!(f, "already rejected"),
            ClosedReason::DeadlinePassed => write!(f, "deadline passed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Signer decisions & records
// ---------------------------------------------------------------------------

/// A signer's verdict on a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignerDecision {
    /// Approve the transfer.
    Signed,
    /// Veto it. One rejection closes the whole transaction (fail-fast).
    Rejected,
}

impl fmt::Display for SignerDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignerDecision::Signed => write!(f, "signed"),
            SignerDecision::Rejected => write!(f, "rejected"),
        }
    }
}

/// State of one signer's signature slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureState {
    /// Slot created, decision not yet made.
    Pending,
    /// Signer approved.
    Signed,
    /// Signer rejected.
    Rejected,
}

impl fmt::Display for SignatureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureState::Pending => write!(f, "pending"),
            SignatureState::Signed => write!(f, "signed"),
            SignatureState::Rejected => write!(f, "rejected"),
        }
    }
}

/// One signer's slot on a transaction.
///
/// Created eagerly — one per selected signer at transaction creation —
/// so "hasn't decided yet" is a visible record, distinct from "was never
/// asked". Mutated exactly once, from `Pending` to a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRecord {
    /// The signer this slot belongs to.
    pub signer_id: String,
    /// Current state of the slot.
    pub state: SignatureState,
    /// When the signer decided; `None` while pending.
    pub decided_at: Option<DateTime<Utc>>,
}

impl SignatureRecord {
    /// A fresh, undecided slot for `signer_id`.
    pub fn pending(signer_id: impl Into<String>) -> Self {
        Self {
            signer_id: signer_id.into(),
            state: SignatureState::Pending,
            decided_at: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_display_decimal() {
        let amount = Amount::new(15_000_000, Currency::USD);
        assert_eq!(amount.display_decimal(), "150000.00 USD");

        let pennies = Amount::new(1050, Currency::GBP);
        assert_eq!(pennies.display_decimal(), "10.50 GBP");
    }

    #[test]
    fn amount_zero_detection() {
        assert!(Amount::new(0, Currency::USD).is_zero());
        assert!(!Amount::new(1, Currency::USD).is_zero());
    }

    #[test]
    fn only_pending_is_non_terminal() {
        assert!(!TransactionStatus::Pending.is_terminal());
        assert!(TransactionStatus::Approved.is_terminal());
        assert!(TransactionStatus::Rejected.is_terminal());
    }

    #[test]
    fn statuses_serialize_lowercase() {
        assert_eq!(
            serde_json::to_string(&TransactionStatus::Approved).unwrap(),
            "\"approved\""
        );
        assert_eq!(
            serde_json::to_string(&SignerDecision::Rejected).unwrap(),
            "\"rejected\""
        );
    }

    #[test]
    fn pending_record_has_no_decision_time() {
        let record = SignatureRecord::pending("signer-1");
        assert_eq!(record.state, SignatureState::Pending);
        assert!(record.decided_at.is_none());
    }

    #[test]
    fn currency_serde_roundtrip() {
        for currency in [
            Currency::USD,
            Currency::EUR,
            Currency::GBP,
            Currency::Custom("CHF".into()),
        ] {
            let json = serde_json::to_string(&currency).unwrap();
            let back: Currency = serde_json::from_str(&json).unwrap();
            assert_eq!(currency, back);
        }
    }
}
