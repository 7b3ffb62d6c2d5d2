//! # Prometheus Metrics
//!
//! Operational metrics for the approval service, scraped from the
//! `/metrics` endpoint on the dedicated metrics port.
//!
//! All metrics live in their own [`prometheus::Registry`] with the
//! `countersign` namespace, so nothing collides with a host process that
//! also uses the default global registry.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

/// All Prometheus handles for the service. Handles are internally
/// reference-counted, so this is cheap to clone and share.
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Registry owning every metric below.
    registry: Registry,
    /// Transactions created since startup.
    pub transactions_created_total: IntCounter,
    /// Signer decisions accepted (signed or rejected) since startup.
    pub decisions_recorded_total: IntCounter,
    /// Transactions that reached the approval quorum.
    pub approvals_total: IntCounter,
    /// Transactions closed by a rejection.
    pub rejections_total: IntCounter,
    /// Transactions closed by the expiry sweep.
    pub expirations_total: IntCounter,
    /// Transactions currently pending (updated by the sweep).
    pub pending_transactions: IntGauge,
    /// Latency of decision submissions, in seconds.
    pub decision_latency_seconds: Histogram,
}

impl ServiceMetrics {
    /// Create and register all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("countersign".into()), None)
            .expect("failed to create prometheus registry");

        fn counter(registry: &Registry, name: &str, help: &str) -> IntCounter {
            let c = IntCounter::new(name, help).expect("metric creation");
            registry.register(Box::new(c.clone())).expect("metric registration");
            c
        }

        let transactions_created_total = counter(
            &registry,
            "transactions_created_total",
            "Transactions created since startup",
        );
        let decisions_recorded_total = counter(
            &registry,
            "decisions_recorded_total",
            "Signer decisions accepted since startup",
        );
        let approvals_total = counter(
            &registry,
            "approvals_total",
            "Transactions that reached their approval quorum",
        );
        let rejections_total = counter(
            &registry,
            "rejections_total",
            "Transactions closed by a signer rejection",
        );
        let expirations_total = counter(
            &registry,
            "expirations_total",
            "Transactions closed by the expiry sweep",
        );

        let pending_transactions =
            IntGauge::new("pending_transactions", "Transactions currently pending")
                .expect("metric creation");
        registry
            .register(Box::new(pending_transactions.clone()))
            .expect("metric registration");

        let decision_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "decision_latency_seconds",
                "End-to-end latency of decision submissions in seconds",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        )
        .expect("metric creation");
        registry
            .register(Box::new(decision_latency_seconds.clone()))
            .expect("metric registration");

        Self {
            registry,
            transactions_created_total,
            decisions_recorded_total,
            approvals_total,
            rejections_total,
            expirations_total,
            pending_transactions,
            decision_latency_seconds,
        }
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer).expect("prometheus output is valid utf-8"))
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared metrics handle passed into axum handlers.
pub type SharedMetrics = Arc<ServiceMetrics>;

/// Axum handler serving `/metrics` in Prometheus text format.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_show_up_in_encoded_output() {
        let metrics = ServiceMetrics::new();
        metrics.transactions_created_total.inc();
        metrics.decisions_recorded_total.inc_by(3);
        metrics.pending_transactions.set(7);

        let text = metrics.encode().unwrap();
        assert!(text.contains("countersign_transactions_created_total 1"));
        assert!(text.contains("countersign_decisions_recorded_total 3"));
        assert!(text.contains("countersign_pending_transactions 7"));
    }
}
