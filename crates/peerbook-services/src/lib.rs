//! peerbook-services — the live peer registry and everything that keeps
//! it in step with disk.
//!
//! Startup: [`load`] fills a [`Registry`] from the record store, falling
//! back to the backup file. Runtime: [`LogScanner`] sweeps feed
//! observations in, and [`Syncer::run`] saves deduplicated snapshots
//! whenever something is dirty.

pub mod dedup;
pub mod loader;
pub mod peer;
pub mod registry;
pub mod scanner;
pub mod store;
pub mod syncer;

pub use dedup::deduplicate;
pub use loader::{load, LoadError, LoadOutcome};
pub use peer::Peer;
pub use registry::Registry;
pub use scanner::{Extractor, KeyValueExtractor, LogScanner, Observation, ScanError, ScanReport};
pub use store::{JsonRecordStore, RecordStore, StoreError};
pub use syncer::{SaveError, Syncer, SYNC_INTERVAL};
