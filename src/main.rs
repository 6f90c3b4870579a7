//! Remediation gate daemon.
//!
//! # Architecture Overview
//!
//! ```text
//!   test runner ──failure/success──▶ admin API ──▶ Escalator
//!                                                   │
//!                  ┌────────────────────────────────┼──────────────────────────┐
//!                  ▼                                ▼                          ▼
//!          FailureCounter                   ApprovalManager            NotificationChannel
//!        (per subject+signature)        (pending → terminal, expiry)   ThreadProvider
//!                  │                                ▲                          ▲
//!                  └── limit reached ──▶ human-judgment signal ────────────────┘
//!
//!   background: ExpirySweeper (interval) · ConfigWatcher (hot reload) · Prometheus exporter
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use remediation_gate::admin::{setup_admin_router, AdminState};
use remediation_gate::config::{load_config, ConfigWatcher, GateConfig};
use remediation_gate::escalation::{Escalator, ExpirySweeper};
use remediation_gate::lifecycle::{shutdown_signal, Shutdown};
use remediation_gate::notify::LogChannel;
use remediation_gate::observability::{init_logging, init_metrics};

#[derive(Parser)]
#[command(name = "remediation-gate")]
#[command(about = "Human-in-the-loop gate for automated test remediation", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GateConfig::default(),
    };

    init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "remediation-gate starting");
    tracing::info!(
        failure_limit = config.escalation.failure_limit,
        window_secs = config.approval.window_secs,
        max_attempts = config.retries.max_attempts,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let sink = Arc::new(LogChannel::new());
    let escalator = Arc::new(Escalator::builder(sink.clone(), sink).config(config.clone()).build());
    let shutdown = Shutdown::new();
    let mut tasks = Vec::new();

    let sweeper = ExpirySweeper::new(
        escalator.clone(),
        Duration::from_secs(config.approval.sweep_interval_secs),
    );
    tasks.push(tokio::spawn(sweeper.run(shutdown.subscribe())));

    // Dropping the watcher handle stops file events, so it lives until exit.
    let _watcher = match &args.config {
        Some(path) => {
            let (watcher, mut updates) = ConfigWatcher::new(path, config.clone());
            let handle = watcher.run()?;
            let escalator = escalator.clone();
            let mut stop = shutdown.subscribe();
            tasks.push(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        Some(new_config) = updates.recv() => escalator.apply_config(&new_config),
                        _ = stop.recv() => break,
                    }
                }
            }));
            Some(handle)
        }
        None => None,
    };

    if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        tracing::info!(address = %listener.local_addr()?, "Admin API listening");
        let app = setup_admin_router(AdminState::new(escalator.clone(), &config.admin.api_key));
        let mut stop = shutdown.subscribe();
        tasks.push(tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = stop.recv().await;
                })
                .await;
            if let Err(e) = served {
                tracing::error!(error = %e, "Admin API stopped with error");
            }
        }));
    }

    shutdown_signal().await;
    if !shutdown.drain(Duration::from_secs(10)).await {
        tracing::warn!("Forcing exit with tasks still running");
    }
    for task in tasks {
        task.abort();
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
