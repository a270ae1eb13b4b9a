use rigup_core::error::{OrchestratorError, ResolutionError, SnapshotError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("config error: {0}")]
    Config(String),

    #[error("catalog error: {0:#}")]
    Catalog(anyhow::Error),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("logging setup failed: {0}")]
    Logging(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl CliError {
    // 0: success
    // 2: batch finished with failed, rolled back or cancelled components
    // 11: config / catalog error
    // 12: request refused during planning
    // 20: I/O error
    // 50: internal/uncategorized
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Catalog(_) => 11,
            Self::Resolution(_) => 12,
            Self::Snapshot(_) | Self::Io(_) | Self::Logging(_) => 20,
            Self::Orchestrator(OrchestratorError::Resolution(_)) => 12,
            Self::Orchestrator(OrchestratorError::Snapshot(_)) => 20,
            Self::Orchestrator(OrchestratorError::UnknownBatch(_)) | Self::Anyhow(_) => 50,
        }
    }
}
