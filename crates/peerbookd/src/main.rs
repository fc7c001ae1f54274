//! peerbookd — keeps the UID ↔ address peer book on disk up to date.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use anyhow::{Context, Result};

use peerbook_core::config::PeerbookConfig;
use peerbook_services::{load, JsonRecordStore, KeyValueExtractor, LogScanner, Registry, Syncer};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = PeerbookConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let mut config = PeerbookConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        PeerbookConfig::default()
    });

    // Optional first argument overrides the log directory.
    if let Some(dir) = std::env::args().nth(1) {
        config.scanner.log_dir = dir.into();
    }
    tracing::info!(
        store = %config.store.path.display(),
        log_dir = %config.scanner.log_dir.display(),
        "peerbookd starting"
    );

    // ── Shared state ─────────────────────────────────────────────────────────
    let registry = Registry::shared();
    let syncer = Arc::new(Syncer::new(
        registry.clone(),
        Arc::new(JsonRecordStore::new()),
        config.store.path.clone(),
    ));

    let outcome = {
        let syncer = syncer.clone();
        tokio::task::spawn_blocking(move || load(&syncer))
            .await
            .context("peer loader panicked")?
    };
    tracing::info!(count = outcome.count(), "peer book ready");

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    // Subscribe before anything can send, so an early Ctrl-C reaches both.
    let syncer_shutdown = shutdown_tx.subscribe();
    let mut shutdown_rx = shutdown_tx.subscribe();

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    // ── Spawn tasks ──────────────────────────────────────────────────────────
    let syncer_task = tokio::spawn(
        syncer
            .clone()
            .run(config.sync.interval(), syncer_shutdown),
    );

    if config.scanner.scan_on_start {
        let scanner = LogScanner::new(
            config.scanner.log_dir.clone(),
            &config.scanner.extension,
            KeyValueExtractor,
        );
        tracing::info!(dir = %scanner.dir().display(), "startup sweep");
        let registry = registry.clone();
        match tokio::task::spawn_blocking(move || scanner.sweep(&registry)).await {
            Ok(Ok(report)) => tracing::info!(
                files = report.files,
                updated = report.updated,
                "startup sweep complete"
            ),
            Ok(Err(e)) => tracing::warn!(error = %e, "startup sweep failed"),
            Err(e) => tracing::error!(error = %e, "startup sweep panicked"),
        }
    }

    // ── Wait for exit ────────────────────────────────────────────────────────
    wait_for_exit(&mut shutdown_rx, syncer_task).await;

    tracing::info!(
        peers = registry.len(),
        unsaved = registry.dirty_count(),
        "peerbookd stopped"
    );
    Ok(())
}

/// Block until shutdown is requested or the syncer dies on its own.
///
/// On shutdown the syncer has seen the same signal; wait for its last
/// save. Returns false if the syncer exited without being asked to.
async fn wait_for_exit(
    shutdown_rx: &mut broadcast::Receiver<()>,
    mut syncer_task: JoinHandle<()>,
) -> bool {
    tokio::select! {
        // A pending shutdown wins over a syncer that already finished because of it.
        biased;
        _ = shutdown_rx.recv() => {}
        r = &mut syncer_task => {
            tracing::error!("peer syncer exited: {:?}", r);
            return false;
        }
    }

    tracing::info!("shutting down");
    if let Err(e) = syncer_task.await {
        tracing::error!(error = %e, "peer syncer failed during shutdown");
    }
    true
}
