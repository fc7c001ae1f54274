//! Persisted peer records.
//!
//! A `PeerRecord` is the value form of a tracked peer: what gets written
//! to the record store and what the loader reads back. Live peers in the
//! registry are built from records and flatten back into them on save.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Stable cross-session identifier for a peer, as learned from a log.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uid(String);

impl Uid {
    pub fn new(uid: impl Into<String>) -> Self {
        Self(uid.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Uid {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Uid {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One persisted peer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerRecord {
    /// Absent until a log pairs this peer's address with a UID.
    pub uid: Option<Uid>,

    /// Every IPv4 address ever observed for this peer.
    pub ips: BTreeSet<Ipv4Addr>,

    /// Opaque metadata (ratings, notes) owned by whoever sets it.
    /// Carried through merges untouched except for gap filling.
    pub meta: BTreeMap<String, serde_json::Value>,
}

impl PeerRecord {
    pub fn new(uid: Option<Uid>, ips: impl IntoIterator<Item = Ipv4Addr>) -> Self {
        Self {
            uid,
            ips: ips.into_iter().collect(),
            meta: BTreeMap::new(),
        }
    }

    /// Fold `other` into `self`: union the address sets and fill any
    /// metadata key `self` does not have. Existing values always win.
    pub fn absorb(&mut self, other: &PeerRecord) {
        self.ips.extend(other.ips.iter().copied());
        for (key, value) in &other.meta {
            self.meta
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        if self.uid.is_none() {
            self.uid = other.uid.clone();
        }
    }
}

/// Emergency copy location for a primary record file.
///
/// `peers.json` → `peers.json.bak`. Deterministic, same directory.
pub fn backup_path(primary: &Path) -> PathBuf {
    let mut name = primary
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".bak");
    primary.with_file_name(name)
}
