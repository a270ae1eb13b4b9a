//! Installation Orchestrator.
//!
//! Turns a requested set of component names into a conflict-checked,
//! leveled plan and executes it with failure isolation, retry and
//! snapshot-based rollback.
//!
//! ```text
//! Catalog ──► resolver ──► conflict ──► planner ──► executor ──► BatchReport
//!                                                     │
//!                                  backend ◄──────────┼──► verify
//!                                                     ▼
//!                                                  rollback
//! ```

pub mod backend;
pub mod catalog;
pub mod config;
pub mod conflict;
pub mod error;
pub mod executor;
pub mod planner;
pub mod resolver;
pub mod rollback;
pub mod verify;

pub use backend::{InstallBackend, InstallOutcome, InstallRequest, RestoreToken, RollbackOutcome};
pub use catalog::{Catalog, ComponentDescriptor, StaticCatalog};
pub use error::{ErrorCode, ErrorKind, OrchestratorError, ResolutionError, SnapshotError, VerifyError};
pub use executor::{BatchReport, BatchResult, ExecutionOptions, InstallationStatus, Orchestrator};
pub use planner::{resolve_and_plan, InstallPlan};
