use serde::{Deserialize, Serialize};

/// Stable numeric codes surfaced in batch reports and CLI exit paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u16)]
pub enum ErrorCode {
    Success = 0,
    GeneralError = 1,
    ValidationError = 3,
    UnknownComponent = 10,
    DependencyError = 11,
    CircularDependency = 12,
    ConflictCritical = 13,
    InstallTransient = 20,
    InstallPermanent = 21,
    VerificationFailed = 22,
    RollbackPartial = 23,
    Cancelled = 31,
    SnapshotIo = 60,
    SnapshotCorrupt = 61,
    SnapshotNotFound = 62,
}

impl ErrorCode {
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}
