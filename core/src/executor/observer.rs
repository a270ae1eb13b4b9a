use crate::conflict::ConflictRecord;
use crate::error::ErrorKind;
use crate::planner::ParallelInstallationGroup;

use super::types::{BatchResult, InstallationResult};

/// Receives progress events while a batch runs.
pub trait BatchObserver: Send + Sync {
    fn name(&self) -> &str;
    fn on_event(&self, event: &BatchEvent);
}

#[derive(Debug, Clone)]
pub enum BatchEvent {
    Plan {
        batch_id: String,
        groups: Vec<ParallelInstallationGroup>,
        warnings: Vec<ConflictRecord>,
    },
    GroupStart {
        batch_id: String,
        group: ParallelInstallationGroup,
    },
    ComponentStart {
        batch_id: String,
        component: String,
        level: usize,
        attempt: u32,
    },
    AttemptFailed {
        batch_id: String,
        component: String,
        attempt: u32,
        kind: ErrorKind,
        detail: String,
        will_retry: bool,
    },
    ComponentEnd {
        batch_id: String,
        result: InstallationResult,
    },
    GroupEnd {
        batch_id: String,
        level: usize,
    },
    BatchEnd {
        batch_id: String,
        result: BatchResult,
    },
}
