//! peerbook-core — shared record types and configuration.
//! All other peerbook crates depend on this one.

pub mod config;
pub mod record;

pub use record::{backup_path, PeerRecord, Uid};
