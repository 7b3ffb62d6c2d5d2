//! # Secret Sharing Engine
//!
//! Shamir's Secret Sharing over GF(256): a secret is split into `n` shares
//! with a reconstruction threshold of `k`. Any `k` shares recover the
//! secret byte-for-byte; any `k - 1` reveal nothing about it at all. That
//! is an information-theoretic statement, not a computational one — the
//! below-threshold shares are statistically independent of the secret.
//!
//! The workflow uses this to bind a fresh per-transaction secret to the
//! selected signers: each signer holds one share, and only an approving
//! quorum can put the secret back together.
//!
//! ## Field arithmetic
//!
//! All math happens in GF(2^8) reduced by the AES polynomial
//! `x^8 + x^4 + x^3 + x + 1` (0x11B). Multiplication is a shift-and-reduce
//! loop; inversion goes through Fermat (`a^254`). For secrets measured in
//! tens of bytes, table-free arithmetic is plenty fast and keeps the code
//! auditable end to end.
//!
//! ## Mixing detection
//!
//! Shamir alone cannot tell shares from two different splits apart — the
//! math happily interpolates garbage. Every split therefore stamps its
//! shares with a random `split_id`, and [`combine`] refuses mixed batches
//! with [`ShareError::InvalidShare`] instead of returning nonsense.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from splitting or combining shares.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShareError {
    /// The (k, n) configuration is unusable: k < 1, k > n, or n beyond
    /// what GF(256) x-coordinates can address.
    #[error("invalid threshold: {required} of {total}")]
    InvalidThreshold {
        /// Requested reconstruction threshold (k).
        required: u32,
        /// Requested total share count (n).
        total: u32,
    },

    /// Fewer shares than the threshold recorded in the shares themselves.
    #[error("insufficient shares: got {got}, need {need}")]
    InsufficientShares {
        /// Number of shares supplied.
        got: usize,
        /// Threshold required for reconstruction.
        need: usize,
    },

    /// Shares are malformed or inconsistent: empty input, duplicate or
    /// zero indices, mismatched lengths, or shares mixed from different
    /// splits.
    #[error("invalid share: {0}")]
    InvalidShare(String),
}

// ---------------------------------------------------------------------------
// Share
// ---------------------------------------------------------------------------

/// One share of a split secret.
///
/// A share on its own is uniformly random noise. The metadata (`index`,
/// `threshold`, `split_id`) exists so [`combine`] can validate a batch
/// before doing any arithmetic on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Share {
    /// The x-coordinate this share was evaluated at (1-based; x = 0 is
    /// the secret itself and never handed out).
    pub index: u8,
    /// Reconstruction threshold of the split that produced this share.
    pub threshold: u8,
    /// Random identifier stamped on every share of one split, used to
    /// reject accidental mixing across splits.
    pub split_id: String,
    /// Share payload — one byte per byte of the original secret.
    pub data: Vec<u8>,
}

// ---------------------------------------------------------------------------
// GF(256) arithmetic
// ---------------------------------------------------------------------------

mod gf256 {
    /// The AES reduction polynomial, x^8 + x^4 + x^3 + x + 1.
    const POLY: u16 = 0x11B;

    /// Addition and subtraction are both XOR in characteristic 2.
    #[inline]
    pub fn add(a: u8, b: u8) -> u8 {
        a ^ b
    }

    /// Multiply via shift-and-reduce (Russian peasant multiplication).
    pub fn mul(a: u8, b: u8) -> u8 {
        let mut a = u16::from(a);
        let mut b = u16::from(b);
        let mut acc: u16 = 0;
        while b != 0 {
            if b & 1 != 0 {
                acc ^= a;
            }
            a <<= 1;
            if a & 0x100 != 0 {
                a ^= POLY;
            }
            b >>= 1;
        }
        acc as u8
    }

    /// Multiplicative inverse via Fermat: a^(2^8 - 2) = a^254.
    ///
    /// Callers must not pass zero — zero has no inverse, and the share
    /// layout guarantees nonzero denominators (distinct nonzero x's).
    pub fn inv(a: u8) -> u8 {
        debug_assert!(a != 0, "zero has no inverse in GF(256)");
        let mut result = 1u8;
        let mut base = a;
        let mut exp = 254u32;
        while exp != 0 {
            if exp & 1 != 0 {
                result = mul(result, base);
            }
            base = mul(base, base);
            exp >>= 1;
        }
        result
    }

    /// Evaluate a polynomial (constant term first) at `x`, Horner style.
    pub fn poly_eval(coeffs: &[u8], x: u8) -> u8 {
        coeffs
            .iter()
            .rev()
            .fold(0u8, |acc, &c| add(mul(acc, x), c))
    }

    /// Lagrange interpolation at x = 0: recovers the constant term of the
    /// unique degree-(n-1) polynomial through the given points.
    pub fn interpolate_at_zero(points: &[(u8, u8)]) -> u8 {
        let mut secret = 0u8;
        for (i, &(xi, yi)) in points.iter().enumerate() {
            let mut weight = 1u8;
            for (j, &(xj, _)) in points.iter().enumerate() {
                if i == j {
                    continue;
                }
                // L_i(0) accumulates x_j / (x_i ^ x_j); negation is a
                // no-op in characteristic 2.
                weight = mul(weight, mul(xj, inv(add(xi, xj))));
            }
            secret = add(secret, mul(yi, weight));
        }
        secret
    }

}

// ---------------------------------------------------------------------------
// Split / Combine
// ---------------------------------------------------------------------------

/// Split `secret` into `total` shares with reconstruction threshold
/// `threshold`.
///
/// For each secret byte, a random polynomial of degree `threshold - 1`
/// with the secret byte as constant term is sampled from the OS CSPRNG
/// and evaluated at x = 1..=total. Every invocation draws fresh
/// randomness: two splits of the same secret share nothing but the
/// secret, and their shares are not linkable.
///
/// # Errors
///
/// - [`ShareError::InvalidThreshold`] when `threshold < 1`,
///   `threshold > total`, or `total` exceeds [`config::MAX_SHARES`].
/// - [`ShareError::InvalidShare`] when `secret` is empty.
pub fn split(secret: &[u8], total: u32, threshold: u32) -> Result<Vec<Share>, ShareError> {
    if threshold < 1 || threshold > total || total > config::MAX_SHARES {
        return Err(ShareError::InvalidThreshold {
            required: threshold,
            total,
        });
    }
    if secret.is_empty() {
        return Err(ShareError::InvalidShare("secret must not be empty".into()));
    }

    let split_id = Uuid::new_v4().to_string();
    let mut shares: Vec<Share> = (1..=total)
        .map(|x| Share {
            index: x as u8,
            threshold: threshold as u8,
            split_id: split_id.clone(),
            data: Vec::with_capacity(secret.len()),
        })
        .collect();

    let mut rng = rand::rngs::OsRng;
    let mut coeffs = vec![0u8; threshold as usize];

    for &secret_byte in secret {
        coeffs[0] = secret_byte;
        rng.fill_bytes(&mut coeffs[1..]);

        for share in shares.iter_mut() {
            share.data.push(gf256::poly_eval(&coeffs, share.index));
        }
    }

    Ok(shares)
}

/// Reconstruct a secret from at least `threshold` shares of one split.
///
/// Validates the batch before touching the field arithmetic, so a caller
/// holding garbage gets a typed refusal instead of a plausible-looking
/// wrong secret:
///
/// - empty input, duplicate or zero indices, mismatched data lengths, or
///   shares from different splits → [`ShareError::InvalidShare`];
/// - fewer shares than the threshold the shares themselves declare →
///   [`ShareError::InsufficientShares`].
///
/// Any valid subset of size ≥ threshold reconstructs the original secret
/// exactly.
pub fn combine(shares: &[Share]) -> Result<Vec<u8>, ShareError> {
    let first = shares
        .first()
        .ok_or_else(|| ShareError::InvalidShare("no shares supplied".into()))?;

    let need = first.threshold as usize;
    for share in shares {
        if share.split_id != first.split_id {
            return Err(ShareError::InvalidShare(
                "shares come from different splits".into(),
            ));
        }
        if share.threshold != first.threshold {
            return Err(ShareError::InvalidShare(
                "shares disagree on the threshold".into(),
            ));
        }
        if share.data.len() != first.data.len() {
            return Err(ShareError::InvalidShare(format!(
                "share {} has length {}, expected {}",
                share.index,
                share.data.len(),
                first.data.len()
            )));
        }
    }

    let mut seen = [false; 256];
    for share in shares {
        if share.index == 0 {
            return Err(ShareError::InvalidShare("share index 0 is reserved".into()));
        }
        if seen[share.index as usize] {
            return Err(ShareError::InvalidShare(format!(
                "duplicate share index {}",
                share.index
            )));
        }
        seen[share.index as usize] = true;
    }

    if shares.len() < need {
        return Err(ShareError::InsufficientShares {
            got: shares.len(),
            need,
        });
    }

    // Interpolate with exactly `need` shares — extras are redundant and
    // using a fixed-size subset keeps reconstruction O(k^2) per byte.
    let subset = &shares[..need];
    let mut secret = Vec::with_capacity(first.data.len());
    for byte_idx in 0..first.data.len() {
        let points: Vec<(u8, u8)> = subset
            .iter()
            .map(|s| (s.index, s.data[byte_idx]))
            .collect();
        secret.push(gf256::interpolate_at_zero(&points));
    }

    Ok(secret)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"per-transaction secret material!";

    #[test]
    fn every_3_of_5_subset_reconstructs() {
        let shares = split(SECRET, 5, 3).unwrap();
        assert_eq!(shares.len(), 5);

        for a in 0..5 {
            for b in (a + 1)..5 {
                for c in (b + 1)..5 {
                    let subset = vec![shares[a].clone(), shares[b].clone(), shares[c].clone()];
                    let recovered = combine(&subset).unwrap();
                    assert_eq!(recovered, SECRET, "subset ({a},{b},{c})");
                }
            }
        }
    }

    #[test]
    fn disjoint_quorums_agree() {
        // Shares {1,2,3} and {2,4,5} must reconstruct the same secret.
        let shares = split(SECRET, 5, 3).unwrap();

        let first = combine(&shares[0..3]).unwrap();
        let second = combine(&[shares[1].clone(), shares[3].clone(), shares[4].clone()]).unwrap();
        assert_eq!(first, SECRET);
        assert_eq!(second, SECRET);
    }

    #[test]
    fn below_threshold_fails_loudly() {
        let shares = split(SECRET, 5, 3).unwrap();

        for take in 1..3usize {
            match combine(&shares[..take]) {
                Err(ShareError::InsufficientShares { got, need }) => {
                    assert_eq!(got, take);
                    assert_eq!(need, 3);
                }
                other => panic!("expected InsufficientShares, got {other:?}"),
            }
        }
    }

    #[test]
    fn threshold_of_one_means_any_share_suffices() {
        // k = 1 is legal: every share IS the secret. Degenerate but valid.
        let shares = split(SECRET, 3, 1).unwrap();
        for share in &shares {
            assert_eq!(combine(std::slice::from_ref(share)).unwrap(), SECRET);
        }
    }

    #[test]
    fn full_threshold_requires_everyone() {
        let shares = split(SECRET, 4, 4).unwrap();
        assert_eq!(combine(&shares).unwrap(), SECRET);
        assert!(matches!(
            combine(&shares[..3]),
            Err(ShareError::InsufficientShares { got: 3, need: 4 })
        ));
    }

    #[test]
    fn invalid_thresholds_are_rejected() {
        assert!(matches!(
            split(SECRET, 5, 0),
            Err(ShareError::InvalidThreshold { required: 0, total: 5 })
        ));
        assert!(matches!(
            split(SECRET, 3, 5),
            Err(ShareError::InvalidThreshold { required: 5, total: 3 })
        ));
        assert!(matches!(
            split(SECRET, 300, 2),
            Err(ShareError::InvalidThreshold { .. })
        ));
    }

    #[test]
    fn empty_secret_is_rejected() {
        assert!(matches!(split(&[], 3, 2), Err(ShareError::InvalidShare(_))));
    }

    #[test]
    fn mixed_splits_are_detected() {
        // Same secret split twice: indices and lengths line up perfectly,
        // only the split_id gives the mixing away.
        let first = split(SECRET, 3, 2).unwrap();
        let second = split(SECRET, 3, 2).unwrap();

        let mixed = vec![first[0].clone(), second[1].clone()];
        assert!(matches!(combine(&mixed), Err(ShareError::InvalidShare(_))));
    }

    #[test]
    fn duplicate_indices_are_detected() {
        let shares = split(SECRET, 3, 2).unwrap();
        let dupes = vec![shares[0].clone(), shares[0].clone()];
        assert!(matches!(combine(&dupes), Err(ShareError::InvalidShare(_))));
    }

    #[test]
    fn mismatched_lengths_are_detected() {
        let mut shares = split(SECRET, 3, 2).unwrap();
        shares[1].data.pop();
        assert!(matches!(
            combine(&shares[..2]),
            Err(ShareError::InvalidShare(_))
        ));
    }

    #[test]
    fn empty_batch_is_rejected() {
        assert!(matches!(combine(&[]), Err(ShareError::InvalidShare(_))));
    }

    #[test]
    fn fresh_randomness_per_split() {
        // Two splits of one secret must not produce linkable shares.
        let a = split(SECRET, 5, 3).unwrap();
        let b = split(SECRET, 5, 3).unwrap();
        assert_ne!(a[0].data, b[0].data);
        assert_ne!(a[0].split_id, b[0].split_id);
    }

    #[test]
    fn extra_shares_beyond_threshold_are_harmless() {
        let shares = split(SECRET, 5, 2).unwrap();
        assert_eq!(combine(&shares).unwrap(), SECRET);
    }

    #[test]
    fn single_byte_secret_roundtrips() {
        let shares = split(&[0xC3], 4, 2).unwrap();
        assert_eq!(combine(&shares[1..3]).unwrap(), vec![0xC3]);
    }

    #[test]
    fn all_zero_and_all_ones_secrets_roundtrip() {
        for secret in [[0u8; 32], [0xFF; 32]] {
            let shares = split(&secret, 5, 3).unwrap();
            assert_eq!(combine(&shares[2..5]).unwrap(), secret.to_vec());
        }
    }

    #[test]
    fn share_serde_roundtrip() {
        let shares = split(SECRET, 3, 2).unwrap();
        let json = serde_json::to_string(&shares).unwrap();
        let back: Vec<Share> = serde_json::from_str(&json).unwrap();
        assert_eq!(combine(&back[..2]).unwrap(), SECRET);
    }
}
