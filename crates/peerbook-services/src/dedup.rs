//! Deduplication — folds records sharing a UID into one before saving.
//!
//! Live peers are left alone: duplicates stay addressable for the rest of
//! the process and only the persisted view is collapsed. A restart then
//! loads one peer per UID.

use std::collections::HashMap;

use peerbook_core::{PeerRecord, Uid};

/// Collapse `records` into canonical, persist-ready entries.
///
/// The first record carrying a UID becomes the canonical entry for it;
/// every later record with the same UID is absorbed into it (address
/// union, missing metadata filled in). UID-less records are never merged.
/// Output order is the order in which canonical entries first appear.
pub fn deduplicate(records: impl IntoIterator<Item = PeerRecord>) -> Vec<PeerRecord> {
    let mut unique: Vec<PeerRecord> = Vec::new();
    let mut canonical: HashMap<Uid, usize> = HashMap::new();

    for record in records {
        let Some(uid) = record.uid.clone() else {
            unique.push(record);
            continue;
        };
        match canonical.get(&uid) {
            Some(&idx) => unique[idx].absorb(&record),
            None => {
                canonical.insert(uid, unique.len());
                unique.push(record);
            }
        }
    }

    unique
}
