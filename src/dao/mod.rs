//! Persistence layer: room snapshots and the storage abstraction over them.

pub mod snapshot;
pub mod snapshot_store;
pub mod storage;
