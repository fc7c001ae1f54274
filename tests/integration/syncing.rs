use std::time::Duration;

use anyhow::{bail, Context, Result};
use peerbook_core::Uid;
use peerbook_services::{JsonRecordStore, KeyValueExtractor, LogScanner, RecordStore};

use crate::*;

// ══════════════════════════════════════════════════════════════════════════════
//  Sweep + background syncer
// ══════════════════════════════════════════════════════════════════════════════

/// Poll until the registry has nothing left to save.
async fn wait_until_clean(syncer: &Syncer, attempts: u32) -> Result<()> {
    for _ in 0..attempts {
        tokio::time::sleep(Duration::from_millis(20)).await;
        if !syncer.registry().has_dirty() {
            return Ok(());
        }
    }
    bail!(
        "syncer never cleared dirty peers ({} still dirty)",
        syncer.registry().dirty_count()
    )
}

/// A sweep feeds the registry and the running syncer persists it within
/// a few poll intervals.
#[tokio::test]
async fn test_sweep_is_persisted_by_running_syncer() -> Result<()> {
    let scratch = Scratch::new("sweep-sync")?;
    scratch.write_log(
        "session-1.log",
        &[
            "joined uid=abc ip=10.0.0.1",
            "joined uid=def ip=10.0.0.2",
            "noise line without fields",
        ],
    )?;
    scratch.write_log("session-2.log", &["joined uid=abc ip=10.0.0.3"])?;
    scratch.write_log("notes.txt", &["joined uid=zzz ip=10.0.0.9"])?;

    let syncer = json_syncer(&scratch.store_path());
    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
    let task = tokio::spawn(
        syncer
            .clone()
            .run(Duration::from_millis(20), shutdown_rx),
    );

    let report = LogScanner::new(scratch.log_dir(), "log", KeyValueExtractor)
        .sweep(syncer.registry())
        .context("sweep failed")?;
    assert_eq!(report.files, 2);
    assert_eq!(report.observations, 3);
    assert_eq!(report.peers, 3);

    wait_until_clean(&syncer, 50).await?;

    shutdown_tx.send(()).context("syncer dropped its receiver")?;
    task.await.context("syncer task panicked")?;

    let records = JsonRecordStore::new().read_all(&scratch.store_path())?;
    assert_eq!(records.len(), 2);
    let abc = records
        .iter()
        .find(|r| r.uid == Some(Uid::new("abc")))
        .context("abc not persisted")?;
    assert_eq!(abc.ips.len(), 2);
    Ok(())
}

/// Nothing dirty, nothing written.
#[tokio::test]
async fn test_idle_syncer_does_not_write() -> Result<()> {
    let scratch = Scratch::new("idle")?;
    let syncer = json_syncer(&scratch.store_path());
    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
    let task = tokio::spawn(
        syncer
            .clone()
            .run(Duration::from_millis(10), shutdown_rx),
    );

    tokio::time::sleep(Duration::from_millis(60)).await;
    shutdown_tx.send(()).context("syncer dropped its receiver")?;
    task.await.context("syncer task panicked")?;

    assert!(!scratch.store_path().exists());
    Ok(())
}
