use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use peerbook_core::Uid;
use peerbook_services::{deduplicate, load, JsonRecordStore, LoadOutcome, RecordStore};

use crate::*;

// ══════════════════════════════════════════════════════════════════════════════
//  Registry → dedup → store, end to end
// ══════════════════════════════════════════════════════════════════════════════

/// Two addresses learned for the same UID collapse into one persisted
/// record, while both live peers stay addressable.
#[test]
fn test_same_uid_two_addresses_collapse_on_save() -> Result<()> {
    let scratch = Scratch::new("collapse")?;
    let syncer = json_syncer(&scratch.store_path());
    let registry = syncer.registry();

    let p1 = registry.get_or_create(ip(1));
    assert!(p1.is_dirty());
    assert!(!p1.has_uid());
    registry.attach(&p1, "abc".into(), ip(1));

    let p2 = registry.get_or_create(ip(2));
    assert!(!Arc::ptr_eq(&p1, &p2));
    assert!(p2.is_dirty());
    registry.attach(&p2, "abc".into(), ip(2));

    let merged = deduplicate(registry.snapshot().iter().map(|p| p.record()));
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].uid, Some(Uid::new("abc")));
    assert_eq!(merged[0].ips, BTreeSet::from([ip(1), ip(2)]));

    assert_eq!(syncer.save().context("save failed")?, 1);
    let on_disk = JsonRecordStore::new()
        .read_all(&scratch.store_path())
        .context("saved file unreadable")?;
    assert_eq!(on_disk, merged);

    // Live registry keeps both instances for this process.
    assert_eq!(registry.len(), 2);
    assert!(Arc::ptr_eq(&registry.get_or_create(ip(2)), &p2));
    Ok(())
}

/// After a restart, the deduplicated file loads as one peer per UID and
/// either address resolves to it.
#[test]
fn test_restart_loads_one_peer_per_uid() -> Result<()> {
    let scratch = Scratch::new("restart")?;
    {
        let syncer = json_syncer(&scratch.store_path());
        let registry = syncer.registry();
        for n in 1..=3 {
            let peer = registry.get_or_create(ip(n));
            registry.attach(&peer, "abc".into(), ip(n));
        }
        registry.get_or_create(ip(9));
        syncer.save().context("first-run save failed")?;
    }

    let syncer = json_syncer(&scratch.store_path());
    let outcome = load(&syncer);
    assert!(matches!(outcome, LoadOutcome::Primary { count: 2 }), "got {outcome:?}");

    let registry = syncer.registry();
    let canonical = registry.get_or_create(ip(1));
    for n in 2..=3 {
        assert!(Arc::ptr_eq(&registry.get_or_create(ip(n)), &canonical));
    }
    assert_eq!(registry.len(), 2);
    assert!(!registry.has_dirty());
    Ok(())
}

/// Metadata set on a later duplicate fills gaps on the canonical record
/// without overwriting what the canonical record already has.
#[test]
fn test_metadata_survives_merge() -> Result<()> {
    let scratch = Scratch::new("meta")?;
    let syncer = json_syncer(&scratch.store_path());
    let registry = syncer.registry();

    let p1 = registry.get_or_create(ip(1));
    registry.attach(&p1, "abc".into(), ip(1));
    p1.set_meta("rating", serde_json::json!(1));

    let p2 = registry.get_or_create(ip(2));
    registry.attach(&p2, "abc".into(), ip(2));
    p2.set_meta("rating", serde_json::json!(-1));
    p2.set_meta("note", serde_json::json!("laggy"));

    syncer.save().context("save failed")?;
    let on_disk = JsonRecordStore::new().read_all(&scratch.store_path())?;
    assert_eq!(on_disk.len(), 1);
    assert_eq!(on_disk[0].meta["rating"], serde_json::json!(1));
    assert_eq!(on_disk[0].meta["note"], serde_json::json!("laggy"));
    Ok(())
}
