//! Snapshot-based rollback.
//!
//! Lifecycle of a snapshot: `begin` persists it before the install backend
//! runs, `record_token` stores what the attempt changed, then exactly one of
//! `commit` (verified success, snapshot discarded) or `rollback` (failure,
//! side effects reversed). Anything still persisted after a crash is found
//! by `pending` / `recover_pending`.

mod manager;
mod snapshot;

pub use manager::{RollbackManager, RollbackReport, RollbackStatus};
pub use snapshot::{
    FileSnapshotStore, MemorySnapshotStore, RollbackSnapshot, SnapshotListing, SnapshotStore,
    UnreadableSnapshot,
};
