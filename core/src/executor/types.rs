use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::conflict::ConflictRecord;
use crate::error::ErrorKind;
use crate::planner::ParallelInstallationGroup;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY_MS: u64 = 500;
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;
pub const MAX_DEFAULT_PARALLEL: usize = 4;

/// Parallel slots when the caller does not choose: CPU count, capped so
/// installers and downloads do not swamp the host.
pub fn default_max_parallel() -> usize {
    num_cpus::get().clamp(1, MAX_DEFAULT_PARALLEL)
}

/// Options for one `execute_batch` call.
#[derive(Debug, Clone)]
pub struct ExecutionOptions {
    /// Upper bound on concurrent installs inside a parallel-eligible group
    pub max_parallel: usize,

    /// Attempt ceiling per component, counting the first attempt
    pub max_retries: u32,

    /// Snapshot before each attempt and undo side effects on final failure
    pub enable_rollback: bool,

    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,

    /// Id registered earlier with `Orchestrator::begin_batch`, so the caller
    /// can cancel while the batch runs.
    pub batch_id: Option<String>,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            max_parallel: default_max_parallel(),
            max_retries: DEFAULT_MAX_ATTEMPTS,
            enable_rollback: true,
            retry_base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            retry_max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
            batch_id: None,
        }
    }
}

impl ExecutionOptions {
    pub fn with_batch_id(mut self, batch_id: impl Into<String>) -> Self {
        self.batch_id = Some(batch_id.into());
        self
    }
}

/// Terminal status of one component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallationStatus {
    Succeeded,
    Failed,
    Skipped,
    RolledBack,
}

impl InstallationStatus {
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Failed | Self::RolledBack)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationResult {
    pub component: String,
    pub status: InstallationStatus,
    /// Install attempts actually made (0 when skipped)
    pub attempts: u32,
    pub error_kind: Option<ErrorKind>,
    pub error_detail: Option<String>,
    pub verification_passed: bool,
    /// Residual-state warning from a partial or failed rollback
    pub rollback_warning: Option<String>,
    pub level: usize,
    pub duration_ms: u64,
}

impl InstallationResult {
    pub fn skipped(component: &str, level: usize, kind: Option<ErrorKind>, detail: String) -> Self {
        Self {
            component: component.to_string(),
            status: InstallationStatus::Skipped,
            attempts: 0,
            error_kind: kind,
            error_detail: Some(detail),
            verification_passed: false,
            rollback_warning: None,
            level,
            duration_ms: 0,
        }
    }
}

/// Aggregated outcome of a batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub batch_id: String,
    /// False if any component ended `failed` or `rolled_back`
    pub overall_success: bool,
    pub completed: Vec<String>,
    /// Components that ended `failed` or `rolled_back`
    pub failed: Vec<String>,
    pub skipped: Vec<String>,
    pub groups_executed: Vec<ParallelInstallationGroup>,
    /// Retries beyond the first attempt, per attempted component
    pub recovery_attempts: BTreeMap<String, u32>,
    /// Per-component results in plan order
    pub results: Vec<InstallationResult>,
    /// Non-blocking conflicts carried over from planning
    pub warnings: Vec<ConflictRecord>,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl BatchResult {
    pub fn result_for(&self, component: &str) -> Option<&InstallationResult> {
        self.results.iter().find(|r| r.component == component)
    }

    pub fn status_of(&self, component: &str) -> Option<InstallationStatus> {
        self.result_for(component).map(|r| r.status)
    }
}
