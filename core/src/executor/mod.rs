//! Batch Orchestrator
//!
//! Executes an [`InstallPlan`](crate::planner::InstallPlan) against an
//! install backend, with failure isolation, retry and rollback.
//!
//! # Architecture
//!
//! ```text
//! InstallPlan { order, groups }
//!   ↓
//! Orchestrator::execute_batch()
//!   ↓  for each level, strictly in order
//! run_group() → parallel (Semaphore + FuturesUnordered) or serial
//!   ↓  per component
//! snapshot → backend.execute → verify → commit | retry | rollback
//!   ↓
//! BatchResult → BatchReport
//! ```
//!
//! A component whose dependency failed is skipped; unrelated components of
//! later levels still run. Cancellation is cooperative: it is checked between
//! levels, before each component starts and before each retry.

mod cancel;
mod engine;
mod observer;
mod progress;
mod report;
mod scheduler;
mod state;
mod strategy;
mod types;

pub use cancel::CancellationFlag;
pub use engine::{Orchestrator, OrchestratorBuilder};
pub use observer::{BatchEvent, BatchObserver};
pub use progress::ProgressMonitor;
pub use report::{BatchReport, ComponentReport, ConflictReport};
pub use scheduler::run_group;
pub use state::{ComponentLifecycle, ComponentPhase, TransitionError};
pub use strategy::{
    ConcurrencyContext, ConcurrencyStrategy, ExponentialBackoff, FixedConcurrency, RetryStrategy,
};
pub use types::{
    default_max_parallel, BatchResult, ExecutionOptions, InstallationResult, InstallationStatus,
    DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY_MS,
};
