//! # CLI Interface
//!
//! Command-line argument structure for `countersign-node`, via `clap`
//! derive. Three subcommands: `run`, `init`, and `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use countersign_protocol::config;

/// Countersign approval service.
///
/// Hosts the multi-party transaction-approval workflow: TOTP enrollment,
/// transaction creation, signature collection, audit trail, and the
/// expiry sweep, all over HTTP.
#[derive(Parser, Debug)]
#[command(
    name = "countersign-node",
    about = "Countersign approval service",
    version,
    propagate_version = true
)]
pub struct CountersignCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the approval service.
    Run(RunArgs),
    /// Initialize the data directory without starting the service.
    Init(InitArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Data directory for the sled database.
    #[arg(long, short = 'd', env = "COUNTERSIGN_DATA_DIR", default_value = "~/.countersign")]
    pub data_dir: PathBuf,

    /// Port for the HTTP API.
    #[arg(long, env = "COUNTERSIGN_API_PORT", default_value_t = config::DEFAULT_API_PORT)]
    pub api_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "COUNTERSIGN_METRICS_PORT", default_value_t = config::DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Log output format: "pretty" or "json".
    #[arg(long, env = "COUNTERSIGN_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

/// Arguments for the `init` subcommand.
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Data directory to create and initialize.
    #[arg(long, short = 'd', env = "COUNTERSIGN_DATA_DIR", default_value = "~/.countersign")]
    pub data_dir: PathBuf,
}
