use std::fmt;

use serde::{Deserialize, Serialize};

use super::codes::ErrorCode;

/// Failure classes attached to a component's result.
///
/// Install backends return one of the execution-phase kinds directly, so
/// recoverability is decided by the variant and never by message content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnknownComponent,
    CircularDependency,
    ConflictCritical,
    /// Network timeout, lock held by the OS, interrupted download.
    InstallTransient,
    /// Insufficient privileges, disk space, incompatible architecture.
    InstallPermanent,
    VerificationFailed,
    RollbackPartial,
    Cancelled,
}

impl ErrorKind {
    /// Whether an attempt that failed with this kind may be retried.
    ///
    /// `VerificationFailed` is recoverable once; the orchestrator escalates a
    /// repeat occurrence to permanent semantics.
    pub fn is_recoverable(self) -> bool {
        matches!(self, Self::InstallTransient | Self::VerificationFailed)
    }

    pub fn error_code(self) -> ErrorCode {
        match self {
            Self::UnknownComponent => ErrorCode::UnknownComponent,
            Self::CircularDependency => ErrorCode::CircularDependency,
            Self::ConflictCritical => ErrorCode::ConflictCritical,
            Self::InstallTransient => ErrorCode::InstallTransient,
            Self::InstallPermanent => ErrorCode::InstallPermanent,
            Self::VerificationFailed => ErrorCode::VerificationFailed,
            Self::RollbackPartial => ErrorCode::RollbackPartial,
            Self::Cancelled => ErrorCode::Cancelled,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnknownComponent => "unknown_component",
            Self::CircularDependency => "circular_dependency",
            Self::ConflictCritical => "conflict_critical",
            Self::InstallTransient => "install_transient",
            Self::InstallPermanent => "install_permanent",
            Self::VerificationFailed => "verification_failed",
            Self::RollbackPartial => "rollback_partial",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_kinds() {
        assert!(ErrorKind::InstallTransient.is_recoverable());
        assert!(ErrorKind::VerificationFailed.is_recoverable());
        assert!(!ErrorKind::InstallPermanent.is_recoverable());
        assert!(!ErrorKind::RollbackPartial.is_recoverable());
        assert!(!ErrorKind::ConflictCritical.is_recoverable());
    }

    #[test]
    fn serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::InstallTransient).unwrap();
        assert_eq!(json, "\"install_transient\"");
    }
}
