//! # Structured Logging
//!
//! Sets up the `tracing` subscriber for the approval service: pretty
//! output for humans at a terminal, JSON lines for log aggregation, both
//! filterable through `RUST_LOG`.
//!
//! Everything goes to stderr; stdout stays clean for command output.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, colored. For development and interactive use.
    Pretty,
    /// JSON lines. For production log pipelines.
    Json,
}

impl LogFormat {
    /// Parse a format string: "json" means JSON, anything else means
    /// pretty. Lenient on purpose — a typo in an env var should not take
    /// the service down.
    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Initialize the global tracing subscriber. Call exactly once, first
/// thing in `main()` — a second call panics.
///
/// `default_level` applies when `RUST_LOG` is unset; the env var wins
/// otherwise, with full `EnvFilter` directive syntax, e.g.
/// `RUST_LOG=countersign_node=debug,countersign_protocol=info`.
pub fn init_logging(default_level: &str, format: LogFormat) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_target(true))
                .init();
        }
    }

    tracing::info!("logging initialized (format={:?})", format);
}
