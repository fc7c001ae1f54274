//! Record store — durable read/write of peer records.
//!
//! The registry only depends on the [`RecordStore`] contract. The shipped
//! [`JsonRecordStore`] writes a pretty JSON array; writes are atomic
//! (tmp file → fsync → rename) and leave an emergency copy at
//! [`backup_path`] once the primary is in place.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use peerbook_core::{backup_path, PeerRecord};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("i/o error on {0}: {1}")]
    Io(PathBuf, std::io::Error),
    #[error("malformed record file {0}: {1}")]
    Malformed(PathBuf, serde_json::Error),
    #[error("failed to serialize records: {0}")]
    Serialize(serde_json::Error),
}

impl StoreError {
    /// True when the file simply isn't there (first run).
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::Io(_, e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}

/// Read/write contract for persisted peer records.
pub trait RecordStore: Send + Sync {
    /// Read every record at `path`. Missing or malformed input is an error.
    fn read_all(&self, path: &Path) -> Result<Vec<PeerRecord>, StoreError>;

    /// Replace the contents of `path` with `records`. All or nothing.
    fn write_all(&self, path: &Path, records: &[PeerRecord]) -> Result<(), StoreError>;
}

/// JSON file store.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRecordStore;

impl JsonRecordStore {
    pub fn new() -> Self {
        Self
    }
}

impl RecordStore for JsonRecordStore {
    fn read_all(&self, path: &Path) -> Result<Vec<PeerRecord>, StoreError> {
        let text = fs::read_to_string(path).map_err(|e| StoreError::Io(path.to_path_buf(), e))?;
        serde_json::from_str(&text).map_err(|e| StoreError::Malformed(path.to_path_buf(), e))
    }

    fn write_all(&self, path: &Path, records: &[PeerRecord]) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(records).map_err(StoreError::Serialize)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::Io(parent.to_path_buf(), e))?;
        }

        // Atomic write: tmp file → rename
        let tmp_path = path.with_extension("tmp");
        {
            let mut file =
                fs::File::create(&tmp_path).map_err(|e| StoreError::Io(tmp_path.clone(), e))?;
            file.write_all(&json)
                .map_err(|e| StoreError::Io(tmp_path.clone(), e))?;
            file.sync_all()
                .map_err(|e| StoreError::Io(tmp_path.clone(), e))?;
        }
        fs::rename(&tmp_path, path).map_err(|e| StoreError::Io(path.to_path_buf(), e))?;

        // The primary is already good; a failed emergency copy is not a failed save.
        let backup = backup_path(path);
        if let Err(e) = fs::copy(path, &backup) {
            tracing::warn!(error = %e, path = %backup.display(), "failed to write peer backup");
        }

        tracing::trace!(count = records.len(), path = %path.display(), "peer records written");
        Ok(())
    }
}
