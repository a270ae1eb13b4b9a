#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Notify;

use rigup_core::backend::{InstallBackend, InstallOutcome, InstallRequest, RestoreToken, RollbackOutcome};
use rigup_core::catalog::{ComponentDescriptor, StaticCatalog};
use rigup_core::error::VerifyError;
use rigup_core::executor::{ExecutionOptions, Orchestrator};
use rigup_core::verify::{Probe, ProbeRunner, Verifier};

pub fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

pub fn catalog(descriptors: Vec<ComponentDescriptor>) -> StaticCatalog {
    StaticCatalog::from_descriptors(descriptors).expect("valid fixture catalog")
}

/// Options with zero backoff so retry tests run instantly.
pub fn fast_options() -> ExecutionOptions {
    ExecutionOptions {
        max_parallel: 4,
        max_retries: 3,
        enable_rollback: true,
        retry_base_delay: Duration::ZERO,
        retry_max_delay: Duration::ZERO,
        batch_id: None,
    }
}

pub fn orchestrator(backend: Arc<ScriptedBackend>, probes: Arc<FixtureProbes>) -> Orchestrator {
    Orchestrator::builder(backend, Verifier::new(probes)).build()
}

/// Install backend driven by per-component scripts.
///
/// Each `execute` pops the next scripted outcome for the component; an
/// exhausted or missing script succeeds with a token naming the component.
#[derive(Default)]
pub struct ScriptedBackend {
    scripts: Mutex<HashMap<String, VecDeque<InstallOutcome>>>,
    rollback_outcomes: Mutex<HashMap<String, RollbackOutcome>>,
    calls: Mutex<Vec<(String, u32)>>,
    rollbacks: Mutex<Vec<String>>,
    delay: Option<Duration>,
    delays: Mutex<HashMap<String, Duration>>,
    active: AtomicUsize,
    peak: AtomicUsize,
    pub started: Notify,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every attempt takes `delay`, so overlapping installs can be observed.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Attempts of `component` take `delay`, overriding the global delay.
    pub fn slow(&self, component: &str, delay: Duration) {
        self.delays
            .lock()
            .unwrap()
            .insert(component.to_string(), delay);
    }

    pub fn script(&self, component: &str, outcomes: Vec<InstallOutcome>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(component.to_string(), outcomes.into());
    }

    pub fn fail_always(&self, component: &str, outcome: InstallOutcome, times: usize) {
        self.script(component, vec![outcome; times]);
    }

    pub fn rollback_with(&self, component: &str, outcome: RollbackOutcome) {
        self.rollback_outcomes
            .lock()
            .unwrap()
            .insert(component.to_string(), outcome);
    }

    pub fn calls(&self) -> Vec<(String, u32)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn attempts_for(&self, component: &str) -> usize {
        self.calls().iter().filter(|(c, _)| c == component).count()
    }

    pub fn call_order(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.calls()
            .into_iter()
            .map(|(c, _)| c)
            .filter(|c| seen.insert(c.clone()))
            .collect()
    }

    pub fn rollbacks(&self) -> Vec<String> {
        self.rollbacks.lock().unwrap().clone()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

pub fn token_for(component: &str) -> RestoreToken {
    RestoreToken::from(json!({ "created": [format!("/opt/{component}")] }))
}

#[async_trait]
impl InstallBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn execute(&self, request: InstallRequest<'_>) -> InstallOutcome {
        self.calls
            .lock()
            .unwrap()
            .push((request.component.to_string(), request.attempt));
        self.started.notify_one();

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let delay = self
            .delays
            .lock()
            .unwrap()
            .get(request.component)
            .copied()
            .or(self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(request.component)
            .and_then(VecDeque::pop_front);
        scripted.unwrap_or_else(|| InstallOutcome::success(token_for(request.component)))
    }

    async fn rollback(
        &self,
        component: &str,
        _token: &RestoreToken,
        _restart_services: &[String],
    ) -> RollbackOutcome {
        self.rollbacks.lock().unwrap().push(component.to_string());
        self.rollback_outcomes
            .lock()
            .unwrap()
            .get(component)
            .cloned()
            .unwrap_or(RollbackOutcome::Complete)
    }
}

/// Probe runner where `file_exists` probes fail a scripted number of times.
#[derive(Default)]
pub struct FixtureProbes {
    failures_left: Mutex<HashMap<String, usize>>,
}

impl FixtureProbes {
    pub fn passing() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing(path: &str, times: usize) -> Arc<Self> {
        let probes = Self::default();
        probes
            .failures_left
            .lock()
            .unwrap()
            .insert(path.to_string(), times);
        Arc::new(probes)
    }
}

#[async_trait]
impl ProbeRunner for FixtureProbes {
    async fn run(&self, probe: &Probe) -> Result<bool, VerifyError> {
        let Probe::FileExists { path } = probe else {
            return Ok(true);
        };
        let mut left = self.failures_left.lock().unwrap();
        match left.get_mut(path) {
            Some(n) if *n > 0 => {
                *n -= 1;
                Ok(false)
            }
            _ => Ok(true),
        }
    }
}
