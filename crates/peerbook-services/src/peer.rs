//! Tracked peers — one remote participant and every address seen for it.

use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use peerbook_core::{PeerRecord, Uid};

/// Live state for a tracked peer.
///
/// Shared as `Arc<Peer>` between the registry, the log scanner and the
/// syncer. Field access goes through a short-lived mutex; dirty tracking
/// is revision based so a save only clears what it actually wrote.
#[derive(Debug)]
pub struct Peer {
    state: Mutex<PeerRecord>,

    /// Bumped on every effective mutation.
    revision: AtomicU64,

    /// Highest revision known to be on disk.
    persisted: AtomicU64,
}

impl Peer {
    /// New anonymous peer owning a single address. Starts dirty.
    pub(crate) fn anonymous(ip: Ipv4Addr) -> Self {
        Self {
            state: Mutex::new(PeerRecord::new(None, [ip])),
            revision: AtomicU64::new(1),
            persisted: AtomicU64::new(0),
        }
    }

    /// Rebuild a peer from a persisted record. Starts clean.
    pub fn from_record(record: PeerRecord) -> Self {
        Self {
            state: Mutex::new(record),
            revision: AtomicU64::new(0),
            persisted: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PeerRecord> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn uid(&self) -> Option<Uid> {
        self.lock().uid.clone()
    }

    pub fn has_uid(&self) -> bool {
        self.lock().uid.is_some()
    }

    pub fn ips(&self) -> BTreeSet<Ipv4Addr> {
        self.lock().ips.clone()
    }

    pub fn has_ip(&self, ip: Ipv4Addr) -> bool {
        self.lock().ips.contains(&ip)
    }

    pub fn meta(&self, key: &str) -> Option<serde_json::Value> {
        self.lock().meta.get(key).cloned()
    }

    /// Set an opaque metadata value. Marks the peer dirty if it changed.
    pub fn set_meta(&self, key: impl Into<String>, value: serde_json::Value) -> bool {
        let mut state = self.lock();
        let key = key.into();
        if state.meta.get(&key) == Some(&value) {
            return false;
        }
        state.meta.insert(key, value);
        self.bump();
        true
    }

    /// Attach a UID if none is known yet. A peer's UID is never replaced.
    pub fn set_uid_if_absent(&self, uid: Uid) -> bool {
        let mut state = self.lock();
        if state.uid.is_some() {
            return false;
        }
        state.uid = Some(uid);
        self.bump();
        true
    }

    /// Add an address to this peer's set. Only the registry calls this so
    /// the address index stays in step.
    pub(crate) fn add_ip(&self, ip: Ipv4Addr) -> bool {
        let mut state = self.lock();
        if !state.ips.insert(ip) {
            return false;
        }
        self.bump();
        true
    }

    /// Persist-ready copy of the current state.
    pub fn record(&self) -> PeerRecord {
        self.lock().clone()
    }

    /// Copy of the current state together with the revision it reflects.
    pub(crate) fn capture(&self) -> (PeerRecord, u64) {
        let state = self.lock();
        (state.clone(), self.revision.load(Ordering::Acquire))
    }

    pub fn is_dirty(&self) -> bool {
        self.revision.load(Ordering::Acquire) != self.persisted.load(Ordering::Acquire)
    }

    /// Record that `revision` reached disk. Later mutations stay dirty.
    pub(crate) fn mark_persisted(&self, revision: u64) {
        self.persisted.fetch_max(revision, Ordering::AcqRel);
    }

    /// Force the peer dirty without changing its fields.
    pub(crate) fn touch(&self) {
        let _state = self.lock();
        self.bump();
    }

    // Callers hold the state lock.
    fn bump(&self) {
        self.revision.fetch_add(1, Ordering::AcqRel);
    }
}
