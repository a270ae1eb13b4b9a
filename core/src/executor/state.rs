//! Per-component lifecycle and its legal transitions.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentPhase {
    Pending,
    Installing,
    Verifying,
    Retrying,
    Succeeded,
    Failed,
    RolledBack,
    Skipped,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("invalid transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: ComponentPhase,
        to: ComponentPhase,
    },
    #[error("cannot transition from terminal phase {phase:?}")]
    FromTerminal { phase: ComponentPhase },
}

impl ComponentPhase {
    /// `Failed` is terminal only once no retry or rollback follows it.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::RolledBack | Self::Skipped)
    }

    pub fn validate(self, to: ComponentPhase) -> Result<(), TransitionError> {
        use ComponentPhase::*;

        if self.is_terminal() {
            return Err(TransitionError::FromTerminal { phase: self });
        }

        let ok = matches!(
            (self, to),
            (Pending, Installing)
                | (Pending, Skipped)
                | (Installing, Verifying)
                | (Installing, Failed)
                | (Verifying, Succeeded)
                | (Verifying, Failed)
                | (Failed, Retrying)
                | (Failed, RolledBack)
                | (Retrying, Installing)
        );

        if ok {
            Ok(())
        } else {
            Err(TransitionError::InvalidTransition { from: self, to })
        }
    }
}

/// Tracks one component's phase, rejecting illegal moves.
#[derive(Debug)]
pub struct ComponentLifecycle {
    phase: ComponentPhase,
    history: Vec<ComponentPhase>,
}

impl Default for ComponentLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentLifecycle {
    pub fn new() -> Self {
        Self {
            phase: ComponentPhase::Pending,
            history: vec![ComponentPhase::Pending],
        }
    }

    pub fn phase(&self) -> ComponentPhase {
        self.phase
    }

    pub fn history(&self) -> &[ComponentPhase] {
        &self.history
    }

    pub fn advance(&mut self, to: ComponentPhase) -> Result<(), TransitionError> {
        self.phase.validate(to)?;
        self.phase = to;
        self.history.push(to);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ComponentPhase::*;

    #[test]
    fn happy_path() {
        let mut lc = ComponentLifecycle::new();
        for phase in [Installing, Verifying, Succeeded] {
            lc.advance(phase).unwrap();
        }
        assert_eq!(lc.history(), &[Pending, Installing, Verifying, Succeeded]);
    }

    #[test]
    fn retry_then_rollback() {
        let mut lc = ComponentLifecycle::new();
        for phase in [Installing, Failed, Retrying, Installing, Verifying, Failed, RolledBack] {
            lc.advance(phase).unwrap();
        }
        assert!(lc.phase().is_terminal());
    }

    #[test]
    fn rejects_illegal_moves() {
        assert_eq!(
            Pending.validate(Succeeded),
            Err(TransitionError::InvalidTransition {
                from: Pending,
                to: Succeeded
            })
        );
        assert_eq!(
            Succeeded.validate(Installing),
            Err(TransitionError::FromTerminal { phase: Succeeded })
        );
        assert!(Installing.validate(Retrying).is_err());
    }
}
