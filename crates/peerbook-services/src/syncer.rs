//! Background syncer — keeps the record store in step with the registry.
//!
//! Polls the registry on a fixed interval; when any peer is dirty and no
//! save is running, deduplicates a snapshot and writes it through the
//! record store. Only one save may run at a time: a second caller gets
//! [`SaveError::Busy`] straight away instead of waiting.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use crate::dedup::deduplicate;
use crate::registry::Registry;
use crate::store::{RecordStore, StoreError};

/// Default poll interval.
pub const SYNC_INTERVAL: Duration = Duration::from_millis(100);

const MIN_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    /// Another save is in flight. Nothing was written, nothing changed.
    #[error("peer file is busy")]
    Busy,
    /// The store refused the write. Dirty flags are left for the next poll.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Owns the single-writer save guard for one record file.
pub struct Syncer {
    registry: Arc<Registry>,
    store: Arc<dyn RecordStore>,
    path: PathBuf,
    saving: AtomicBool,
}

/// Releases the save guard on drop, including on early return.
struct SaveGuard<'a>(&'a AtomicBool);

impl<'a> SaveGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for SaveGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Syncer {
    pub fn new(registry: Arc<Registry>, store: Arc<dyn RecordStore>, path: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            store,
            path: path.into(),
            saving: AtomicBool::new(false),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_saving(&self) -> bool {
        self.saving.load(Ordering::Acquire)
    }

    /// Deduplicate the current snapshot and write it out.
    ///
    /// Writes every peer, dirty or not. On success clears dirty up to the
    /// revision each peer had when it was captured and returns the number
    /// of records written.
    pub fn save(&self) -> Result<usize, SaveError> {
        let Some(_guard) = SaveGuard::acquire(&self.saving) else {
            tracing::warn!(path = %self.path.display(), "peer file is busy");
            return Err(SaveError::Busy);
        };

        let captured: Vec<_> = self
            .registry
            .snapshot()
            .into_iter()
            .map(|peer| {
                let (record, revision) = peer.capture();
                (peer, record, revision)
            })
            .collect();

        let records = deduplicate(captured.iter().map(|(_, record, _)| record.clone()));

        if let Err(e) = self.store.write_all(&self.path, &records) {
            tracing::warn!(error = %e, path = %self.path.display(), "failed to save peers");
            return Err(e.into());
        }

        for (peer, _, revision) in &captured {
            peer.mark_persisted(*revision);
        }

        tracing::debug!(
            peers = captured.len(),
            records = records.len(),
            path = %self.path.display(),
            "peers saved"
        );
        Ok(records.len())
    }

    /// Poll loop. Runs until `shutdown` fires (or its sender is dropped),
    /// then makes one last save if anything is still dirty.
    ///
    /// Intervals shorter than a millisecond are raised to one.
    pub async fn run(self: Arc<Self>, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        let interval = interval.max(MIN_INTERVAL);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            interval_ms = interval.as_millis() as u64,
            path = %self.path.display(),
            "peer syncer starting"
        );

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    self.poll().await;
                    tracing::info!("peer syncer shutting down");
                    return;
                }
                _ = ticker.tick() => {
                    self.poll().await;
                }
            }
        }
    }

    /// One poll: save if anything is dirty and nobody else is saving.
    /// Returns `None` when there was nothing to do.
    pub async fn poll(self: &Arc<Self>) -> Option<Result<usize, SaveError>> {
        if self.is_saving() || !self.registry.has_dirty() {
            return None;
        }
        let this = self.clone();
        match tokio::task::spawn_blocking(move || this.save()).await {
            Ok(result) => Some(result),
            Err(e) => {
                tracing::warn!(error = %e, "peer save task failed");
                None
            }
        }
    }
}
