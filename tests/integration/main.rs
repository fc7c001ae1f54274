//! peerbook integration test harness.
//!
//! Every test gets its own scratch directory under the system temp dir
//! and drives the real JSON record store, log scanner and syncer against
//! it. No daemon process is spawned; the library is wired up the same
//! way `peerbookd` wires it.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use peerbook_core::config::PeerbookConfig;
use peerbook_services::{JsonRecordStore, Registry, Syncer, SYNC_INTERVAL};

mod peers;
mod syncing;

// ── Harness ───────────────────────────────────────────────────────────────────

/// Scratch directory removed on drop.
pub struct Scratch {
    pub root: PathBuf,
}

impl Scratch {
    pub fn new(name: &str) -> Result<Self> {
        let root = std::env::temp_dir().join(format!(
            "peerbook-it-{name}-{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&root);
        std::fs::create_dir_all(root.join("logs"))
            .with_context(|| format!("failed to create scratch dir {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn store_path(&self) -> PathBuf {
        self.root.join("peers.json")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn write_log(&self, name: &str, lines: &[&str]) -> Result<()> {
        let mut text = lines.join("\n");
        text.push('\n');
        std::fs::write(self.log_dir().join(name), text)
            .with_context(|| format!("failed to write log {name}"))
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

/// A fresh registry + JSON-backed syncer rooted at `path`.
pub fn json_syncer(path: &Path) -> Arc<Syncer> {
    Arc::new(Syncer::new(
        Registry::shared(),
        Arc::new(JsonRecordStore::new()),
        path,
    ))
}

pub fn ip(last: u8) -> Ipv4Addr {
    Ipv4Addr::new(10, 0, 0, last)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

/// The scratch harness cleans up after itself.
#[test]
fn test_scratch_is_removed_on_drop() -> Result<()> {
    let root = {
        let scratch = Scratch::new("harness")?;
        scratch.write_log("a.log", &["uid=abc ip=10.0.0.1"])?;
        assert!(scratch.log_dir().join("a.log").exists());
        scratch.root.clone()
    };
    assert!(!root.exists());
    Ok(())
}

/// The daemon's configured default poll interval and the library's
/// default are the same value.
#[test]
fn test_default_sync_interval_matches_library() {
    assert_eq!(PeerbookConfig::default().sync.interval(), SYNC_INTERVAL);
}
