//! Post-install verification.
//!
//! Built-in probe kinds go through an injected [`ProbeRunner`]; `Custom`
//! probes are dispatched through a table of handlers registered by name.

mod probe;

pub use probe::Probe;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::catalog::ComponentDescriptor;
use crate::error::VerifyError;

/// Runs the built-in probe kinds against the host. Must be side-effect free.
#[async_trait]
pub trait ProbeRunner: Send + Sync {
    async fn run(&self, probe: &Probe) -> Result<bool, VerifyError>;
}

/// Handler for an extension probe kind.
#[async_trait]
pub trait ProbeHandler: Send + Sync {
    async fn check(&self, params: &serde_json::Value) -> Result<bool, VerifyError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    pub passed: bool,
    pub probes_run: usize,
    pub failed_probes: Vec<String>,
}

pub struct Verifier {
    runner: Arc<dyn ProbeRunner>,
    handlers: HashMap<String, Arc<dyn ProbeHandler>>,
    require_probes: bool,
}

impl Verifier {
    pub fn new(runner: Arc<dyn ProbeRunner>) -> Self {
        Self {
            runner,
            handlers: HashMap::new(),
            require_probes: false,
        }
    }

    pub fn register_handler(&mut self, name: impl Into<String>, handler: Arc<dyn ProbeHandler>) {
        self.handlers.insert(name.into(), handler);
    }

    /// Treat a component without probes as unverified instead of passing it.
    pub fn require_probes(mut self, required: bool) -> Self {
        self.require_probes = required;
        self
    }

    /// Run every declared probe in order. Passes only if all of them pass.
    pub async fn verify(&self, descriptor: &ComponentDescriptor) -> VerificationReport {
        let probes = &descriptor.verification_probes;
        if probes.is_empty() {
            if self.require_probes {
                warn!(component = %descriptor.name, "no verification probes declared; failing verification");
                return VerificationReport {
                    passed: false,
                    probes_run: 0,
                    failed_probes: vec!["<no probes declared>".to_string()],
                };
            }
            debug!(component = %descriptor.name, "no verification probes declared");
            return VerificationReport {
                passed: true,
                probes_run: 0,
                failed_probes: Vec::new(),
            };
        }

        let mut failed_probes = Vec::new();
        for probe in probes {
            match self.run_probe(probe).await {
                Ok(true) => debug!(component = %descriptor.name, probe = %probe, "probe passed"),
                Ok(false) => {
                    debug!(component = %descriptor.name, probe = %probe, "probe failed");
                    failed_probes.push(probe.to_string());
                }
                Err(e) => {
                    warn!(component = %descriptor.name, probe = %probe, error = %e, "probe errored");
                    failed_probes.push(format!("{probe}: {e}"));
                }
            }
        }

        VerificationReport {
            passed: failed_probes.is_empty(),
            probes_run: probes.len(),
            failed_probes,
        }
    }

    async fn run_probe(&self, probe: &Probe) -> Result<bool, VerifyError> {
        match probe {
            Probe::Custom { handler, params } => match self.handlers.get(handler) {
                Some(h) => h.check(params).await,
                None => Err(VerifyError::UnknownHandler(handler.clone())),
            },
            builtin => self.runner.run(builtin).await,
        }
    }
}
