mod codes;
mod kind;

pub use codes::ErrorCode;
pub use kind::ErrorKind;

use thiserror::Error;

use crate::conflict::ConflictRecord;

/// Errors raised while turning a request into an install plan.
///
/// All of these abort the batch before any side effect occurs.
#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error("unknown component '{name}'{}", fmt_required_by(.required_by))]
    UnknownComponent {
        name: String,
        required_by: Option<String>,
    },

    #[error("circular dependency detected: {}", .0.join(" -> "))]
    CircularDependency(Vec<String>),

    #[error("{} critical conflict(s): {}", .0.len(), summarize_conflicts(.0))]
    ConflictCritical(Vec<ConflictRecord>),

    #[error("invalid descriptor '{name}': {reason}")]
    InvalidDescriptor { name: String, reason: String },
}

impl ResolutionError {
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::UnknownComponent { .. } => Some(ErrorKind::UnknownComponent),
            Self::CircularDependency(_) => Some(ErrorKind::CircularDependency),
            Self::ConflictCritical(_) => Some(ErrorKind::ConflictCritical),
            Self::InvalidDescriptor { .. } => None,
        }
    }

    pub fn error_code(&self) -> ErrorCode {
        self.kind()
            .map(ErrorKind::error_code)
            .unwrap_or(ErrorCode::ValidationError)
    }
}

fn fmt_required_by(required_by: &Option<String>) -> String {
    match required_by {
        Some(parent) => format!(" (required by '{parent}')"),
        None => String::new(),
    }
}

fn summarize_conflicts(records: &[ConflictRecord]) -> String {
    records
        .iter()
        .map(|r| format!("{} <-> {}", r.component_a, r.component_b))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors raised by the persistent snapshot store.
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("snapshot '{0}' not found")]
    NotFound(String),

    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot '{id}' is corrupt: {source}")]
    Corrupt {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("snapshot encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}

impl SnapshotError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) => ErrorCode::SnapshotNotFound,
            Self::Io(_) | Self::Encode(_) => ErrorCode::SnapshotIo,
            Self::Corrupt { .. } => ErrorCode::SnapshotCorrupt,
        }
    }
}

/// Why a probe could not produce a pass/fail answer. Always counted as a
/// failed probe.
#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("no handler registered for custom probe '{0}'")]
    UnknownHandler(String),

    #[error("probe kind '{0}' is not supported on this host")]
    Unsupported(&'static str),

    #[error("failed to run '{command}': {source}")]
    Command {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid probe parameters: {0}")]
    InvalidParams(String),
}

impl VerifyError {
    pub fn error_code(&self) -> ErrorCode {
        ErrorCode::VerificationFailed
    }
}

/// Errors crossing the orchestrator's public boundary.
///
/// Execution-phase failures never surface here: they resolve to a terminal
/// component status inside the batch result.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error("unknown batch id: {0}")]
    UnknownBatch(String),
}

impl OrchestratorError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Resolution(e) => e.error_code(),
            Self::Snapshot(e) => e.error_code(),
            Self::UnknownBatch(_) => ErrorCode::GeneralError,
        }
    }
}
