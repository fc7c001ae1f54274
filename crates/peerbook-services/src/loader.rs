//! Startup recovery — fill the registry from the record store.
//!
//! Reads the primary record file; if that fails for any reason, tries the
//! backup once. A registry recovered from the backup is saved straight
//! away so the primary heals. If neither file is readable the registry
//! starts empty and the process carries on.

use peerbook_core::backup_path;

use crate::store::StoreError;
use crate::syncer::Syncer;

/// Both the primary and the backup were unreadable.
#[derive(Debug, thiserror::Error)]
#[error("no readable peer records (primary: {primary}; backup: {backup})")]
pub struct LoadError {
    pub primary: StoreError,
    pub backup: StoreError,
}

impl LoadError {
    /// Neither file exists, as on a first run.
    pub fn is_first_run(&self) -> bool {
        self.primary.is_not_found() && self.backup.is_not_found()
    }
}

/// Which path startup recovery took.
#[derive(Debug)]
pub enum LoadOutcome {
    /// Loaded from the primary file.
    Primary { count: usize },
    /// Primary unreadable, loaded from the backup. `resaved` is whether
    /// the immediate re-save of the primary succeeded.
    Recovered { count: usize, resaved: bool },
    /// Nothing readable; the registry was left empty.
    Empty { error: LoadError },
}

impl LoadOutcome {
    pub fn count(&self) -> usize {
        match self {
            LoadOutcome::Primary { count } | LoadOutcome::Recovered { count, .. } => *count,
            LoadOutcome::Empty { .. } => 0,
        }
    }
}

/// Populate `syncer`'s registry from its record file.
pub fn load(syncer: &Syncer) -> LoadOutcome {
    let primary = syncer.path();
    let registry = syncer.registry();

    let primary_err = match syncer.store().read_all(primary) {
        Ok(records) => {
            let count = records.len();
            for record in records {
                registry.insert_record(record);
            }
            tracing::info!(count, path = %primary.display(), "loaded tracked peers");
            return LoadOutcome::Primary { count };
        }
        Err(e) => e,
    };

    let backup = backup_path(primary);
    if !primary_err.is_not_found() {
        tracing::warn!(error = %primary_err, path = %primary.display(), "peer file unreadable, checking backup");
    }

    let records = match syncer.store().read_all(&backup) {
        Ok(records) => records,
        Err(backup_err) => {
            let error = LoadError {
                primary: primary_err,
                backup: backup_err,
            };
            if error.is_first_run() {
                tracing::info!(path = %primary.display(), "no peer file yet, starting fresh");
            } else {
                tracing::warn!(error = %error, "failed to load peers, starting fresh");
            }
            return LoadOutcome::Empty { error };
        }
    };

    let count = records.len();
    let peers: Vec<_> = records
        .into_iter()
        .map(|record| registry.insert_record(record))
        .collect();
    tracing::info!(count, path = %backup.display(), "recovered tracked peers from backup");

    let resaved = match syncer.save() {
        Ok(_) => true,
        Err(e) => {
            // Leave the recovered peers dirty so the syncer retries.
            tracing::warn!(error = %e, "failed to restore primary peer file");
            peers.iter().for_each(|p| p.touch());
            false
        }
    };

    LoadOutcome::Recovered { count, resaved }
}
