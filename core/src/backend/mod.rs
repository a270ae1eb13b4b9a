//! Contract with the platform install backend.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::catalog::InstallDirective;
use crate::error::ErrorKind;

/// Backend-defined description of an install's side effects.
///
/// The orchestrator stores and forwards it; only the backend that produced
/// it knows its shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RestoreToken(serde_json::Value);

impl RestoreToken {
    pub fn empty() -> Self {
        Self(serde_json::Value::Null)
    }

    pub fn encode<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Self)
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.0.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_null()
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

impl From<serde_json::Value> for RestoreToken {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// What the backend needs to run one install attempt.
#[derive(Debug, Clone, Copy)]
pub struct InstallRequest<'a> {
    pub component: &'a str,
    pub directive: &'a InstallDirective,
    pub requires_elevated_privileges: bool,
    /// 1-based attempt number
    pub attempt: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InstallOutcome {
    Success {
        restore_token: RestoreToken,
    },
    Failure {
        kind: ErrorKind,
        detail: String,
        /// Side effects left behind by the failed attempt, if any.
        partial: RestoreToken,
    },
}

impl InstallOutcome {
    pub fn success(restore_token: RestoreToken) -> Self {
        Self::Success { restore_token }
    }

    pub fn transient(detail: impl Into<String>) -> Self {
        Self::Failure {
            kind: ErrorKind::InstallTransient,
            detail: detail.into(),
            partial: RestoreToken::empty(),
        }
    }

    pub fn permanent(detail: impl Into<String>) -> Self {
        Self::Failure {
            kind: ErrorKind::InstallPermanent,
            detail: detail.into(),
            partial: RestoreToken::empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RollbackOutcome {
    Complete,
    /// Some side effects could not be undone.
    Partial { residue: Vec<String> },
    Failed { detail: String },
}

/// Executes install directives and reverses them.
///
/// `execute` must be safe to call again for the same directive after a
/// failed attempt.
#[async_trait]
pub trait InstallBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn execute(&self, request: InstallRequest<'_>) -> InstallOutcome;

    /// Undo whatever `token` describes and restart `restart_services`.
    async fn rollback(
        &self,
        component: &str,
        token: &RestoreToken,
        restart_services: &[String],
    ) -> RollbackOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Paths {
        created: Vec<String>,
    }

    #[test]
    fn restore_token_is_opaque_json() {
        let token = RestoreToken::encode(&Paths {
            created: vec!["/opt/app".to_string()],
        })
        .unwrap();
        assert!(!token.is_empty());
        let back: Paths = token.decode().unwrap();
        assert_eq!(back.created, vec!["/opt/app"]);
        assert!(RestoreToken::empty().is_empty());
    }
}
