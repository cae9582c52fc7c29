//! sitewatchd — the SiteWatch daemon.
//!
//! Single binary that assembles the monitor core:
//! - State store (redb)
//! - Probe client + cycle orchestrator
//! - Interval trigger loops for monitor cycles and event retention
//!
//! # Usage
//!
//! ```text
//! sitewatchd run --data-dir /var/lib/sitewatch --seed endpoints.toml
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Deserialize;
use tokio::sync::watch;
use tracing::{info, warn};

use sitewatch_monitor::{LogNotifier, Monitor, MonitorError, Prober, TextTemplate};
use sitewatch_state::{Endpoint, StateStore};

#[derive(Parser)]
#[command(name = "sitewatchd", about = "SiteWatch endpoint monitor daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the monitor loops.
    Run {
        /// Data directory for persistent state.
        #[arg(long, default_value = "/var/lib/sitewatch")]
        data_dir: PathBuf,

        /// Seconds between monitor cycles.
        #[arg(long, default_value = "60")]
        check_interval: u64,

        /// Seconds between retention purges.
        #[arg(long, default_value = "3600")]
        purge_interval: u64,

        /// Event retention age in hours.
        #[arg(long, default_value = "168")]
        purge_age_hours: u64,

        /// Per-probe request timeout in seconds.
        #[arg(long, default_value = "60")]
        request_timeout: u64,

        /// TOML file of endpoint definitions to upsert at startup.
        #[arg(long)]
        seed: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sitewatchd=debug,sitewatch=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            data_dir,
            check_interval,
            purge_interval,
            purge_age_hours,
            request_timeout,
            seed,
        } => {
            run(
                data_dir,
                check_interval,
                purge_interval,
                purge_age_hours,
                request_timeout,
                seed,
            )
            .await
        }
    }
}

async fn run(
    data_dir: PathBuf,
    check_interval: u64,
    purge_interval: u64,
    purge_age_hours: u64,
    request_timeout: u64,
    seed: Option<PathBuf>,
) -> anyhow::Result<()> {
    info!("SiteWatch daemon starting");

    std::fs::create_dir_all(&data_dir)?;
    let db_path = data_dir.join("sitewatch.redb");

    let state = StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");

    if let Some(path) = seed {
        let count = seed_endpoints(&state, &path)?;
        info!(count, path = ?path, "endpoints seeded");
    }

    let prober = Prober::new(Duration::from_secs(request_timeout))?;
    let monitor = Arc::new(Monitor::new(
        state,
        prober,
        Arc::new(LogNotifier),
        Arc::new(TextTemplate),
    ));
    info!(check_interval, purge_interval, "monitor initialized");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let purge_age = Duration::from_secs(purge_age_hours * 60 * 60);

    // Monitor cycle loop.
    let cycle_handle = {
        let monitor = monitor.clone();
        let mut shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(check_interval)) => {
                        match monitor.run_monitor_cycle().await {
                            Ok(summary) => {
                                info!(
                                    probed = summary.probed,
                                    alerts = summary.alerts,
                                    errors = summary.errors,
                                    "cycle complete"
                                );
                            }
                            Err(MonitorError::CycleInFlight) => {
                                warn!("previous cycle still running, trigger dropped");
                            }
                            Err(e) => {
                                tracing::error!(error = %e, "monitor cycle failed");
                            }
                        }
                    }
                    _ = shutdown.changed() => {
                        info!("monitor loop shutting down");
                        break;
                    }
                }
            }
        })
    };

    // Retention purge loop.
    let purge_handle = {
        let monitor = monitor.clone();
        let mut shutdown = shutdown_rx;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(purge_interval)) => {
                        if let Err(e) = monitor.purge_older_than(purge_age).await {
                            tracing::error!(error = %e, "event purge failed");
                        }
                    }
                    _ = shutdown.changed() => {
                        info!("purge loop shutting down");
                        break;
                    }
                }
            }
        })
    };

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    let _ = shutdown_tx.send(true);
    let _ = cycle_handle.await;
    let _ = purge_handle.await;

    info!("SiteWatch daemon stopped");
    Ok(())
}

// ── Endpoint seeding ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SeedFile {
    #[serde(default)]
    endpoints: Vec<SeedEndpoint>,
}

#[derive(Debug, Deserialize)]
struct SeedEndpoint {
    id: String,
    name: String,
    url: String,
    #[serde(default)]
    assert_text: Option<String>,
    #[serde(default = "default_active")]
    active: bool,
    #[serde(default = "default_threshold")]
    failure_threshold: u32,
    #[serde(default)]
    notify: String,
}

fn default_active() -> bool {
    true
}

fn default_threshold() -> u32 {
    1
}

/// Upsert endpoint definitions from a TOML file. Configuration fields are
/// replaced; runtime state (status, failures, notification marker) of an
/// existing endpoint is preserved.
fn seed_endpoints(state: &StateStore, path: &std::path::Path) -> anyhow::Result<usize> {
    let raw = std::fs::read_to_string(path)?;
    let file: SeedFile = toml::from_str(&raw)?;

    for def in &file.endpoints {
        let mut endpoint = state
            .get_endpoint(&def.id)?
            .unwrap_or_else(|| Endpoint::new(def.id.clone(), def.name.clone(), def.url.clone()));
        endpoint.name = def.name.clone();
        endpoint.url = def.url.clone();
        endpoint.assert_text = def.assert_text.clone();
        endpoint.active = def.active;
        endpoint.failure_threshold = def.failure_threshold.max(1);
        endpoint.notify = def.notify.clone();
        state.put_endpoint(&endpoint)?;
    }

    Ok(file.endpoints.len())
}
