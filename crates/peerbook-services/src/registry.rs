//! Peer registry — every peer seen this process lifetime, indexed by address.
//!
//! Peers live in an insertion-ordered list (the order dedup relies on)
//! and in a `DashMap` from address to owning peer. The first peer to
//! claim an address keeps it; nothing is ever removed.

use std::net::Ipv4Addr;
use std::sync::{Arc, PoisonError, RwLock};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use peerbook_core::{PeerRecord, Uid};

use crate::peer::Peer;

/// Shared peer registry.
///
/// Lock order is address shard → peer list → peer state. Snapshots only
/// take the list lock, and only long enough to clone the `Arc`s.
#[derive(Debug, Default)]
pub struct Registry {
    peers: RwLock<Vec<Arc<Peer>>>,
    by_ip: DashMap<Ipv4Addr, Arc<Peer>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new registry behind an `Arc`, ready to share.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// The peer owning `ip`, creating an anonymous dirty one if nobody does.
    ///
    /// Concurrent callers racing on the same new address all get the
    /// same peer.
    pub fn get_or_create(&self, ip: Ipv4Addr) -> Arc<Peer> {
        if let Some(peer) = self.by_ip.get(&ip) {
            return peer.clone();
        }
        match self.by_ip.entry(ip) {
            Entry::Occupied(e) => e.get().clone(),
            Entry::Vacant(e) => {
                let peer = Arc::new(Peer::anonymous(ip));
                self.push(peer.clone());
                e.insert(peer.clone());
                tracing::debug!(%ip, "new peer");
                peer
            }
        }
    }

    /// The peer owning `ip`, if any.
    pub fn get(&self, ip: Ipv4Addr) -> Option<Arc<Peer>> {
        self.by_ip.get(&ip).map(|p| p.clone())
    }

    /// Attach an observation to `peer`: set the UID if it has none and
    /// claim `ip` for it unless another peer already owns the address.
    ///
    /// Returns true if the peer changed.
    pub fn attach(&self, peer: &Arc<Peer>, uid: Uid, ip: Ipv4Addr) -> bool {
        let mut changed = peer.set_uid_if_absent(uid);
        match self.by_ip.entry(ip) {
            Entry::Vacant(e) => {
                changed |= peer.add_ip(ip);
                e.insert(peer.clone());
            }
            Entry::Occupied(e) if Arc::ptr_eq(e.get(), peer) => {
                changed |= peer.add_ip(ip);
            }
            Entry::Occupied(_) => {
                tracing::debug!(%ip, "address already owned by another peer");
            }
        }
        changed
    }

    /// Add a clean peer rebuilt from a persisted record. Addresses
    /// already owned by an earlier peer stay with that peer.
    pub fn insert_record(&self, record: PeerRecord) -> Arc<Peer> {
        let ips: Vec<Ipv4Addr> = record.ips.iter().copied().collect();
        let peer = Arc::new(Peer::from_record(record));
        self.push(peer.clone());
        for ip in ips {
            self.by_ip.entry(ip).or_insert_with(|| peer.clone());
        }
        peer
    }

    /// Point-in-time view of every peer, in insertion order.
    pub fn snapshot(&self) -> Vec<Arc<Peer>> {
        self.peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Every live peer carrying `uid`. More than one until a restart
    /// reloads the deduplicated records.
    pub fn find_by_uid(&self, uid: &Uid) -> Vec<Arc<Peer>> {
        self.snapshot()
            .into_iter()
            .filter(|p| p.uid().as_ref() == Some(uid))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Does any peer have changes not yet on disk?
    pub fn has_dirty(&self) -> bool {
        self.snapshot().iter().any(|p| p.is_dirty())
    }

    pub fn dirty_count(&self) -> usize {
        self.snapshot().iter().filter(|p| p.is_dirty()).count()
    }

    fn push(&self, peer: Arc<Peer>) {
        self.peers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(peer);
    }
}
