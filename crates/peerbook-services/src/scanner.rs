//! Log scanner — one bounded sweep over a log directory.
//!
//! Every regular file in the directory whose name carries the log
//! extension is read and handed to an [`Extractor`], which yields
//! (UID, address) observations. Each observation is folded into the
//! registry. Subdirectories are skipped and files created after the sweep
//! starts are not picked up; call [`LogScanner::sweep`] again for that.

use std::fs;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use peerbook_core::Uid;

use crate::registry::Registry;

/// One UID seen at one address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub uid: Uid,
    pub ip: Ipv4Addr,
}

/// Turns log text into observations. The line grammar belongs to the
/// implementor; the scanner only consumes the sequence.
pub trait Extractor: Send + Sync {
    fn extract<'a>(&'a self, text: &'a str) -> Box<dyn Iterator<Item = Observation> + 'a>;
}

/// Extractor for lines carrying `uid=<token>` and `ip=<a.b.c.d>` fields,
/// in any order, separated by whitespace. Other lines are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyValueExtractor;

impl Extractor for KeyValueExtractor {
    fn extract<'a>(&'a self, text: &'a str) -> Box<dyn Iterator<Item = Observation> + 'a> {
        Box::new(text.lines().filter_map(|line| {
            let mut uid = None;
            let mut ip = None;
            for field in line.split_whitespace() {
                if let Some(v) = field.strip_prefix("uid=") {
                    uid = Some(v).filter(|v| !v.is_empty());
                } else if let Some(v) = field.strip_prefix("ip=") {
                    ip = v.parse::<Ipv4Addr>().ok();
                }
            }
            Some(Observation {
                uid: Uid::new(uid?),
                ip: ip?,
            })
        }))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("failed to list log directory {0}: {1}")]
    ReadDir(PathBuf, std::io::Error),
}

/// What one sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Log files read.
    pub files: usize,
    /// Observations extracted across all files.
    pub observations: usize,
    /// Observations that changed a peer (new UID or new address).
    pub updated: usize,
    /// Registry size after the sweep.
    pub peers: usize,
}

pub struct LogScanner<E> {
    dir: PathBuf,
    /// Name suffix, dot included.
    suffix: String,
    extractor: E,
}

impl<E: Extractor> LogScanner<E> {
    /// `extension` may be given with or without its leading dot; `".log"`
    /// and `"log"` behave the same. A file named exactly `.log` counts.
    pub fn new(dir: impl Into<PathBuf>, extension: &str, extractor: E) -> Self {
        Self {
            dir: dir.into(),
            suffix: format!(".{}", extension.trim_start_matches('.')),
            extractor,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Sweep the directory once. Files are visited in name order.
    pub fn sweep(&self, registry: &Registry) -> Result<ScanReport, ScanError> {
        let entries =
            fs::read_dir(&self.dir).map_err(|e| ScanError::ReadDir(self.dir.clone(), e))?;

        let mut logs: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| self.is_log(path))
            .collect();
        logs.sort();

        let mut report = ScanReport::default();
        for path in &logs {
            let bytes = match fs::read(path) {
                Ok(b) => b,
                Err(e) => {
                    tracing::warn!(error = %e, path = %path.display(), "skipping unreadable log");
                    continue;
                }
            };
            let text = String::from_utf8_lossy(&bytes);
            report.files += 1;

            let mut seen = 0usize;
            for obs in self.extractor.extract(&text) {
                seen += 1;
                let peer = registry.get_or_create(obs.ip);
                if registry.attach(&peer, obs.uid, obs.ip) {
                    report.updated += 1;
                }
            }
            report.observations += seen;
            tracing::debug!(path = %path.display(), observations = seen, "log processed");
        }

        report.peers = registry.len();
        tracing::info!(
            files = report.files,
            observations = report.observations,
            peers = report.peers,
            "log sweep finished"
        );
        Ok(report)
    }

    fn is_log(&self, path: &Path) -> bool {
        // Follows symlinks; directories and dangling links are skipped.
        let is_file = fs::metadata(path).map(|m| m.is_file()).unwrap_or(false);
        is_file
            && path
                .file_name()
                .is_some_and(|name| name.to_string_lossy().ends_with(self.suffix.as_str()))
    }
}
