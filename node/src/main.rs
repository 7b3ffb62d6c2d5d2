// Copyright (c) 2026 Countersign Team. MIT License.
// See LICENSE for details.

//! # Countersign Approval Service
//!
//! Entry point for the `countersign-node` binary. Parses CLI arguments,
//! initializes logging and metrics, opens the sled-backed stores, and
//! serves the HTTP API plus a background expiry sweep.
//!
//! Subcommands:
//!
//! - `run`     — start the approval service
//! - `init`    — create the data directory without starting
//! - `version` — print build version information

mod api;
mod cli;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;

use countersign_protocol::config;
use countersign_protocol::coordinator::ApprovalCoordinator;
use countersign_protocol::store::SledStores;

use cli::{Commands, CountersignCli};
use logging::LogFormat;
use metrics::ServiceMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CountersignCli::parse();

    match cli.command {
        Commands::Run(args) => run_service(args).await,
        Commands::Init(args) => init_service(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the full approval service: HTTP API, metrics endpoint, and the
/// periodic expiry sweep.
async fn run_service(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(
        "countersign_node=info,countersign_protocol=info,tower_http=debug",
        LogFormat::from_str_lossy(&args.log_format),
    );

    tracing::info!(
        api_port = args.api_port,
        metrics_port = args.metrics_port,
        data_dir = %args.data_dir.display(),
        "starting countersign-node"
    );

    // --- Persistent storage ---
    let db_path = args.data_dir.join("db");
    std::fs::create_dir_all(&db_path)
        .with_context(|| format!("failed to create database directory: {}", db_path.display()))?;

    let stores = Arc::new(
        SledStores::open(&db_path)
            .with_context(|| format!("failed to open database at {}", db_path.display()))?,
    );
    tracing::info!(path = %db_path.display(), "database opened");

    // --- Coordinator ---
    let coordinator = Arc::new(ApprovalCoordinator::new(
        Arc::clone(&stores),
        Arc::clone(&stores),
        Arc::clone(&stores),
    ));

    // --- Metrics ---
    let service_metrics = Arc::new(ServiceMetrics::new());

    // --- Application state ---
    let app_state = api::AppState {
        version: format!(
            "{} (protocol {})",
            env!("CARGO_PKG_VERSION"),
            config::PROTOCOL_VERSION,
        ),
        coordinator: Arc::clone(&coordinator),
        stores: Arc::clone(&stores),
        metrics: Arc::clone(&service_metrics),
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.api_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&service_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Expiry sweep ---
    // Pending transactions whose deadline passed get closed here, under
    // the same per-transaction locks as live signature submissions.
    let sweep_coordinator = Arc::clone(&coordinator);
    let sweep_metrics = Arc::clone(&service_metrics);
    let sweep = tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(
            config::EXPIRY_SWEEP_INTERVAL_SECS,
        ));
        loop {
            interval.tick().await;
            match sweep_coordinator.expire_pending(chrono::Utc::now()) {
                Ok(0) => {}
                Ok(closed) => {
                    sweep_metrics.expirations_total.inc_by(closed as u64);
                    tracing::info!(closed, "expiry sweep closed overdue transactions");
                }
                Err(e) => tracing::error!("expiry sweep failed: {}", e),
            }
        }
    });

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    sweep.abort();
    if let Err(e) = stores.flush() {
        tracing::warn!("final flush failed: {}", e);
    }
    tracing::info!("countersign-node stopped");
    Ok(())
}

/// Creates the data directory and opens the database once, so the first
/// `run` starts against a healthy store.
fn init_service(args: cli::InitArgs) -> Result<()> {
    logging::init_logging("countersign_node=info", LogFormat::Pretty);

    let data_dir = &args.data_dir;
    tracing::info!(data_dir = %data_dir.display(), "initializing data directory");

    let db_path = data_dir.join("db");
    std::fs::create_dir_all(&db_path)
        .with_context(|| format!("failed to create data directory: {}", db_path.display()))?;

    let stores = SledStores::open(&db_path)
        .with_context(|| format!("failed to initialize database at {}", db_path.display()))?;
    stores
        .flush()
        .context("failed to flush freshly initialized database")?;

    println!("Data directory initialized.");
    println!("  Data directory : {}", data_dir.display());
    println!("  Database       : {}", db_path.display());

    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("countersign-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol         {}", config::PROTOCOL_VERSION);
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
