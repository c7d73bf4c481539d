use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;

use steward_core::paths::{inbox_dir, seen_ledger_path, templates_dir};
use steward_core::{AuditLog, KeyLedger, StewardConfig, Vault};
use steward_renderer::Renderer;
use steward_watch::{poll_once, FileDropWatcher, Watcher};

use crate::engine::CommandEngine;
use crate::error::{io_err, DaemonError};
use crate::orchestrator::Orchestrator;

/// Start the orchestrator loop and block the current thread until it exits.
pub fn start_blocking(vault: &Path, config: StewardConfig, once: bool) -> Result<(), DaemonError> {
    init_tracing();
    build_runtime()?.block_on(run(vault.to_path_buf(), config, once))
}

/// Start the file-drop watcher loop and block the current thread until it exits.
pub fn watch_blocking(vault: &Path, config: StewardConfig, once: bool) -> Result<(), DaemonError> {
    init_tracing();
    build_runtime()?.block_on(run_watcher(vault.to_path_buf(), config, once))
}

fn build_runtime() -> Result<tokio::runtime::Runtime, DaemonError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))
}

/// Run the orchestrator until ctrl-c (or exactly once).
pub async fn run(vault: PathBuf, config: StewardConfig, once: bool) -> Result<(), DaemonError> {
    let (shutdown_tx, _) = broadcast::channel::<()>(4);
    let signal_handle = spawn_signal_handler(shutdown_tx.clone());
    let result = run_until_shutdown(vault, config, once, shutdown_tx.clone()).await;
    let _ = shutdown_tx.send(());
    join_signal_handler(signal_handle).await?;
    result
}

/// Orchestrator loop driven by an external shutdown channel.
pub async fn run_until_shutdown(
    vault: PathBuf,
    config: StewardConfig,
    once: bool,
    shutdown: broadcast::Sender<()>,
) -> Result<(), DaemonError> {
    let vault = Vault::open(vault)?;
    let root = vault.root().to_path_buf();
    let engine = CommandEngine::new(
        &root,
        config.engine.command.clone(),
        config.engine.args.clone(),
        config.engine_timeout(),
    );
    let renderer = Renderer::with_overrides(&templates_dir(&root))?;
    let mut orchestrator = Orchestrator::new(
        &root,
        vault.store(),
        engine,
        renderer,
        config.dashboard.recent_events,
    )?
    .with_claim_retention(chrono::Duration::days(i64::from(config.claim_retention_days)));

    tracing::info!(
        vault = %root.display(),
        engine = %config.engine.command,
        interval_secs = config.check_interval().as_secs(),
        once,
        "orchestrator started"
    );
    cycle_loop(
        "orchestrator",
        config.check_interval(),
        once,
        shutdown,
        || orchestrator.run_cycle(Utc::now()).map(|_| ()),
    )
    .await;
    tracing::info!("orchestrator stopped");
    Ok(())
}

/// Run the file-drop watcher until ctrl-c (or exactly once).
pub async fn run_watcher(
    vault: PathBuf,
    config: StewardConfig,
    once: bool,
) -> Result<(), DaemonError> {
    let (shutdown_tx, _) = broadcast::channel::<()>(4);
    let signal_handle = spawn_signal_handler(shutdown_tx.clone());
    let result = watch_until_shutdown(vault, config, once, shutdown_tx.clone()).await;
    let _ = shutdown_tx.send(());
    join_signal_handler(signal_handle).await?;
    result
}

pub async fn watch_until_shutdown(
    vault: PathBuf,
    config: StewardConfig,
    once: bool,
    shutdown: broadcast::Sender<()>,
) -> Result<(), DaemonError> {
    let vault = Vault::open(vault)?;
    let root = vault.root().to_path_buf();
    let inbox = inbox_dir(&root, &config.watch.inbox);
    std::fs::create_dir_all(&inbox).map_err(|e| io_err(&inbox, e))?;

    let store = vault.store();
    let audit = AuditLog::for_vault(&root);
    let watcher = FileDropWatcher::new(&inbox, Renderer::with_overrides(&templates_dir(&root))?);
    let mut ledger = KeyLedger::load(seen_ledger_path(&root, watcher.name()))?;

    tracing::info!(inbox = %inbox.display(), seen = ledger.len(), once, "watcher started");
    cycle_loop("watcher", config.watch_interval(), once, shutdown, || {
        poll_once(&watcher, &store, &mut ledger, &audit, Utc::now())
            .map(|_| ())
            .map_err(DaemonError::from)
    })
    .await;
    tracing::info!("watcher stopped");
    Ok(())
}

/// Run `cycle` back to back, `interval` apart, until shutdown is observed.
/// A failed cycle is logged and the loop carries on.
async fn cycle_loop<F>(
    name: &'static str,
    interval: Duration,
    once: bool,
    shutdown: broadcast::Sender<()>,
    mut cycle: F,
) where
    F: FnMut() -> Result<(), DaemonError>,
{
    let mut shutdown_rx = shutdown.subscribe();
    // Let the signal handler register before the first (blocking) cycle.
    tokio::task::yield_now().await;

    loop {
        if let Err(err) = cycle() {
            tracing::error!(loop_name = name, error = %err, "cycle failed");
        }
        if once {
            break;
        }
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

fn spawn_signal_handler(
    shutdown: broadcast::Sender<()>,
) -> tokio::task::JoinHandle<Result<(), DaemonError>> {
    tokio::spawn(async move {
        let mut shutdown_rx = shutdown.subscribe();
        tokio::select! {
            _ = shutdown_rx.recv() => Ok(()),
            signal = tokio::signal::ctrl_c() => {
                match signal {
                    Ok(()) => {
                        tracing::info!("received ctrl-c, shutting down");
                        let _ = shutdown.send(());
                        Ok(())
                    }
                    Err(err) => Err(DaemonError::Signal(err.to_string())),
                }
            }
        }
    })
}

async fn join_signal_handler(
    handle: tokio::task::JoinHandle<Result<(), DaemonError>>,
) -> Result<(), DaemonError> {
    match handle.await {
        Ok(result) => result,
        Err(err) => Err(DaemonError::Signal(format!("signal task join error: {err}"))),
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}
