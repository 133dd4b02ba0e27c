//! On-disk building blocks.
//!
//! This module provides:
//! - WAL (Write-Ahead Log) of atomic key-value write batches
//! - Sorted table file holding compacted key-value snapshots
//! - Checksummed blob snapshots for the index collaborators

pub mod snapshot;
pub mod table;
pub mod wal;

pub use snapshot::{read_snapshot, write_snapshot};
pub use table::{read_table, write_table};
pub use wal::{SyncMode, Wal, WalBatch, WalReplay};
