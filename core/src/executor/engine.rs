use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::backend::{InstallBackend, InstallOutcome, InstallRequest, RestoreToken};
use crate::catalog::{Catalog, ComponentDescriptor};
use crate::error::{ErrorKind, OrchestratorError, ResolutionError};
use crate::planner::{self, InstallPlan};
use crate::rollback::{MemorySnapshotStore, RollbackManager, RollbackReport, SnapshotStore};
use crate::verify::Verifier;

use super::cancel::CancellationFlag;
use super::observer::{BatchEvent, BatchObserver};
use super::scheduler::run_group;
use super::state::{ComponentLifecycle, ComponentPhase};
use super::strategy::{
    ConcurrencyContext, ConcurrencyStrategy, ExponentialBackoff, FixedConcurrency, RetryStrategy,
};
use super::types::{BatchResult, ExecutionOptions, InstallationResult, InstallationStatus};

/// Drives installation plans against an [`InstallBackend`].
pub struct Orchestrator {
    backend: Arc<dyn InstallBackend>,
    verifier: Arc<Verifier>,
    rollback: Arc<RollbackManager>,
    retry_strategy: Option<Arc<dyn RetryStrategy>>,
    concurrency_strategy: Arc<dyn ConcurrencyStrategy>,
    observers: Vec<Arc<dyn BatchObserver>>,
    /// Cancellation flags of registered and running batches
    batches: Mutex<HashMap<String, Arc<CancellationFlag>>>,
}

pub struct OrchestratorBuilder {
    backend: Arc<dyn InstallBackend>,
    verifier: Verifier,
    store: Option<Arc<dyn SnapshotStore>>,
    retry_strategy: Option<Arc<dyn RetryStrategy>>,
    concurrency_strategy: Option<Arc<dyn ConcurrencyStrategy>>,
    observers: Vec<Arc<dyn BatchObserver>>,
}

impl OrchestratorBuilder {
    pub fn new(backend: Arc<dyn InstallBackend>, verifier: Verifier) -> Self {
        Self {
            backend,
            verifier,
            store: None,
            retry_strategy: None,
            concurrency_strategy: None,
            observers: Vec::new(),
        }
    }

    /// Where rollback snapshots are persisted; in-memory when unset.
    pub fn snapshot_store(mut self, store: Arc<dyn SnapshotStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Overrides the exponential backoff built from `ExecutionOptions`.
    pub fn retry_strategy(mut self, strategy: Arc<dyn RetryStrategy>) -> Self {
        self.retry_strategy = Some(strategy);
        self
    }

    pub fn concurrency_strategy(mut self, strategy: Arc<dyn ConcurrencyStrategy>) -> Self {
        self.concurrency_strategy = Some(strategy);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn BatchObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn build(self) -> Orchestrator {
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemorySnapshotStore::new()));
        let rollback = Arc::new(RollbackManager::new(store, self.backend.clone()));

        Orchestrator {
            backend: self.backend,
            verifier: Arc::new(self.verifier),
            rollback,
            retry_strategy: self.retry_strategy,
            concurrency_strategy: self
                .concurrency_strategy
                .unwrap_or_else(|| Arc::new(FixedConcurrency)),
            observers: self.observers,
            batches: Mutex::new(HashMap::new()),
        }
    }
}

/// Per-batch state shared by every component install of one `execute_batch` call.
struct BatchRun<'a> {
    batch_id: String,
    plan: &'a InstallPlan,
    options: &'a ExecutionOptions,
    levels: HashMap<String, usize>,
    retry: Arc<dyn RetryStrategy>,
    cancel: Arc<CancellationFlag>,
}

impl Orchestrator {
    pub fn builder(backend: Arc<dyn InstallBackend>, verifier: Verifier) -> OrchestratorBuilder {
        OrchestratorBuilder::new(backend, verifier)
    }

    pub fn rollback_manager(&self) -> &Arc<RollbackManager> {
        &self.rollback
    }

    /// Resolve, conflict-check and level `requested` against `catalog`.
    pub fn resolve_and_plan(
        &self,
        catalog: &dyn Catalog,
        requested: &[String],
        strict: bool,
    ) -> Result<InstallPlan, ResolutionError> {
        planner::resolve_and_plan(catalog, requested, strict)
    }

    /// Register a batch id up front so it can be cancelled while it runs.
    pub fn begin_batch(&self) -> String {
        let batch_id = Uuid::new_v4().to_string();
        self.register(&batch_id);
        batch_id
    }

    /// Request cooperative cancellation of a registered batch.
    pub fn cancel(&self, batch_id: &str) -> Result<(), OrchestratorError> {
        match self.batches_guard().get(batch_id) {
            Some(flag) => {
                info!(batch_id = %batch_id, "Cancellation requested");
                flag.cancel();
                Ok(())
            }
            None => Err(OrchestratorError::UnknownBatch(batch_id.to_string())),
        }
    }

    /// Undo persisted snapshots left behind by interrupted batches.
    pub async fn recover(&self) -> Result<Vec<RollbackReport>, OrchestratorError> {
        Ok(self.rollback.recover_pending().await?)
    }

    fn batches_guard(&self) -> MutexGuard<'_, HashMap<String, Arc<CancellationFlag>>> {
        match self.batches.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn register(&self, batch_id: &str) -> Arc<CancellationFlag> {
        self.batches_guard()
            .entry(batch_id.to_string())
            .or_insert_with(|| Arc::new(CancellationFlag::new()))
            .clone()
    }

    fn emit(&self, event: BatchEvent) {
        for observer in &self.observers {
            observer.on_event(&event);
        }
    }

    /// Execute a plan level by level and return the aggregated result.
    ///
    /// Levels run strictly one after another. Inside a level, a
    /// parallel-eligible group runs its members concurrently up to the
    /// concurrency bound; otherwise members run in plan order. A failed
    /// component never aborts the batch: only components that transitively
    /// depend on it are skipped.
    pub async fn execute_batch(&self, plan: &InstallPlan, options: &ExecutionOptions) -> BatchResult {
        let batch_id = options
            .batch_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let cancel = self.register(&batch_id);
        let started_at = Utc::now();
        let start = Instant::now();

        let retry = self.retry_strategy.clone().unwrap_or_else(|| {
            Arc::new(ExponentialBackoff::new(
                options.retry_base_delay,
                options.retry_max_delay,
            ))
        });

        let run = BatchRun {
            batch_id: batch_id.clone(),
            plan,
            options,
            levels: plan.levels(),
            retry,
            cancel: cancel.clone(),
        };

        info!(
            batch_id = %batch_id,
            components = plan.order.len(),
            levels = plan.groups.len(),
            max_parallel = options.max_parallel,
            max_retries = options.max_retries,
            rollback = options.enable_rollback,
            "Executing batch"
        );

        self.emit(BatchEvent::Plan {
            batch_id: batch_id.clone(),
            groups: plan.groups.clone(),
            warnings: plan.warnings(),
        });

        let mut results: HashMap<String, InstallationResult> = HashMap::new();
        let mut failed: HashSet<String> = HashSet::new();
        let mut groups_executed = Vec::new();

        for group in &plan.groups {
            if cancel.is_cancelled() {
                for name in &group.components {
                    let result = InstallationResult::skipped(
                        name,
                        group.level,
                        Some(ErrorKind::Cancelled),
                        "batch cancelled before this level started".to_string(),
                    );
                    self.emit(BatchEvent::ComponentEnd {
                        batch_id: batch_id.clone(),
                        result: result.clone(),
                    });
                    results.insert(name.clone(), result);
                }
                continue;
            }

            let mut runnable = Vec::with_capacity(group.components.len());
            for name in &group.components {
                let blocked_by = plan
                    .graph
                    .transitive_dependencies(name)
                    .into_iter()
                    .find(|dep| failed.contains(dep));

                match blocked_by {
                    Some(dep) => {
                        debug!(component = %name, dependency = %dep, "Skipping dependent of failed component");
                        let result = InstallationResult::skipped(
                            name,
                            group.level,
                            None,
                            format!("dependency '{dep}' failed"),
                        );
                        self.emit(BatchEvent::ComponentEnd {
                            batch_id: batch_id.clone(),
                            result: result.clone(),
                        });
                        results.insert(name.clone(), result);
                    }
                    None => runnable.push(name.clone()),
                }
            }

            if runnable.is_empty() {
                continue;
            }

            self.emit(BatchEvent::GroupStart {
                batch_id: batch_id.clone(),
                group: group.clone(),
            });
            groups_executed.push(group.clone());

            let concurrency = self
                .concurrency_strategy
                .calculate_concurrency(&ConcurrencyContext {
                    requested_max: options.max_parallel,
                    group_size: runnable.len(),
                    available_cpus: num_cpus::get(),
                })
                .max(1);

            debug!(
                level = group.level,
                members = runnable.len(),
                parallel = group.can_install_parallel,
                concurrency,
                "Starting level"
            );

            let group_results = run_group(&runnable, group.can_install_parallel, concurrency, |name| {
                self.install_component(&run, name)
            })
            .await;

            for result in group_results {
                if result.status.is_failure() {
                    failed.insert(result.component.clone());
                }
                results.insert(result.component.clone(), result);
            }

            self.emit(BatchEvent::GroupEnd {
                batch_id: batch_id.clone(),
                level: group.level,
            });
        }

        let result = self.aggregate(&run, results, groups_executed, started_at, start);
        self.batches_guard().remove(&batch_id);
        self.rollback.release_batch(&batch_id);

        if result.overall_success {
            info!(batch_id = %batch_id, duration_ms = result.duration_ms, "Batch completed");
        } else {
            warn!(
                batch_id = %batch_id,
                failed = ?result.failed,
                skipped = result.skipped.len(),
                cancelled = result.cancelled,
                "Batch finished with failures"
            );
        }

        self.emit(BatchEvent::BatchEnd {
            batch_id,
            result: result.clone(),
        });
        result
    }

    fn aggregate(
        &self,
        run: &BatchRun<'_>,
        mut results: HashMap<String, InstallationResult>,
        groups_executed: Vec<crate::planner::ParallelInstallationGroup>,
        started_at: chrono::DateTime<Utc>,
        start: Instant,
    ) -> BatchResult {
        let mut ordered = Vec::with_capacity(run.plan.order.len());
        let mut completed = Vec::new();
        let mut failed = Vec::new();
        let mut skipped = Vec::new();
        let mut recovery_attempts = BTreeMap::new();

        for name in &run.plan.order {
            let level = run.levels.get(name).copied().unwrap_or(0);
            let result = results.remove(name).unwrap_or_else(|| {
                InstallationResult::skipped(name, level, None, "never scheduled".to_string())
            });

            match result.status {
                InstallationStatus::Succeeded => completed.push(name.clone()),
                InstallationStatus::Failed | InstallationStatus::RolledBack => {
                    failed.push(name.clone())
                }
                InstallationStatus::Skipped => skipped.push(name.clone()),
            }
            if result.attempts > 0 {
                recovery_attempts.insert(name.clone(), result.attempts - 1);
            }
            ordered.push(result);
        }

        let cancelled = run.cancel.is_cancelled();

        BatchResult {
            batch_id: run.batch_id.clone(),
            overall_success: failed.is_empty() && !cancelled,
            completed,
            failed,
            skipped,
            groups_executed,
            recovery_attempts,
            results: ordered,
            warnings: run.plan.warnings(),
            cancelled,
            started_at,
            finished_at: Utc::now(),
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn advance(&self, lifecycle: &mut ComponentLifecycle, to: ComponentPhase, component: &str) {
        if let Err(e) = lifecycle.advance(to) {
            warn!(component = %component, error = %e, "Unexpected lifecycle transition");
        }
    }

    fn attach_token(&self, snapshots: &[String], token: RestoreToken) {
        let Some(id) = snapshots.last() else {
            return;
        };
        if let Err(e) = self.rollback.record_token(id, token) {
            warn!(snapshot_id = %id, error = %e, "Failed to store restore token");
        }
    }

    /// Drive one component to a terminal status.
    async fn install_component(&self, run: &BatchRun<'_>, name: String) -> InstallationResult {
        let start = Instant::now();
        let level = run.levels.get(&name).copied().unwrap_or(0);

        if run.cancel.is_cancelled() {
            let result = InstallationResult::skipped(
                &name,
                level,
                Some(ErrorKind::Cancelled),
                "batch cancelled before this component started".to_string(),
            );
            self.emit(BatchEvent::ComponentEnd {
                batch_id: run.batch_id.clone(),
                result: result.clone(),
            });
            return result;
        }

        let result = match run.plan.descriptor(&name) {
            Some(descriptor) => self.drive_attempts(run, descriptor, level, start).await,
            None => {
                error!(component = %name, "Planned component has no descriptor");
                InstallationResult {
                    component: name.clone(),
                    status: InstallationStatus::Failed,
                    attempts: 0,
                    error_kind: Some(ErrorKind::InstallPermanent),
                    error_detail: Some("component missing from plan".to_string()),
                    verification_passed: false,
                    rollback_warning: None,
                    level,
                    duration_ms: start.elapsed().as_millis() as u64,
                }
            }
        };

        self.emit(BatchEvent::ComponentEnd {
            batch_id: run.batch_id.clone(),
            result: result.clone(),
        });
        result
    }

    async fn drive_attempts(
        &self,
        run: &BatchRun<'_>,
        descriptor: &ComponentDescriptor,
        level: usize,
        start: Instant,
    ) -> InstallationResult {
        let name = descriptor.name.as_str();
        let ceiling = run.options.max_retries.max(1);
        let mut lifecycle = ComponentLifecycle::new();
        let mut snapshots: Vec<String> = Vec::new();
        let mut attempt: u32 = 0;
        let mut verification_failures: u32 = 0;

        let (kind, detail) = loop {
            attempt += 1;
            self.advance(&mut lifecycle, ComponentPhase::Installing, name);
            self.emit(BatchEvent::ComponentStart {
                batch_id: run.batch_id.clone(),
                component: name.to_string(),
                level,
                attempt,
            });

            if run.options.enable_rollback {
                match self.rollback.begin(
                    name,
                    Some(&run.batch_id),
                    attempt,
                    &descriptor.restart_services,
                ) {
                    Ok(id) => snapshots.push(id),
                    Err(e) => {
                        error!(component = %name, error = %e, "Cannot record rollback snapshot");
                        self.advance(&mut lifecycle, ComponentPhase::Failed, name);
                        break (
                            ErrorKind::InstallPermanent,
                            format!("cannot record rollback snapshot: {e}"),
                        );
                    }
                }
            }

            debug!(component = %name, attempt, backend = self.backend.name(), "Executing install directive");
            let outcome = self
                .backend
                .execute(InstallRequest {
                    component: name,
                    directive: &descriptor.install_directive,
                    requires_elevated_privileges: descriptor.requires_elevated_privileges,
                    attempt,
                })
                .await;

            let (kind, detail) = match outcome {
                InstallOutcome::Success { restore_token } => {
                    self.attach_token(&snapshots, restore_token);
                    self.advance(&mut lifecycle, ComponentPhase::Verifying, name);

                    let report = self.verifier.verify(descriptor).await;
                    if report.passed {
                        self.advance(&mut lifecycle, ComponentPhase::Succeeded, name);
                        for id in &snapshots {
                            if let Err(e) = self.rollback.commit(id) {
                                warn!(snapshot_id = %id, error = %e, "Failed to discard snapshot");
                            }
                        }
                        info!(component = %name, attempts = attempt, "Component installed");
                        return InstallationResult {
                            component: name.to_string(),
                            status: InstallationStatus::Succeeded,
                            attempts: attempt,
                            error_kind: None,
                            error_detail: None,
                            verification_passed: true,
                            rollback_warning: None,
                            level,
                            duration_ms: start.elapsed().as_millis() as u64,
                        };
                    }

                    verification_failures += 1;
                    (
                        ErrorKind::VerificationFailed,
                        format!("verification failed: {}", report.failed_probes.join(", ")),
                    )
                }
                InstallOutcome::Failure {
                    kind,
                    detail,
                    partial,
                } => {
                    if !partial.is_empty() {
                        self.attach_token(&snapshots, partial);
                    }
                    (kind, detail)
                }
            };

            self.advance(&mut lifecycle, ComponentPhase::Failed, name);

            // A verification failure earns one more attempt, then escalates.
            let recoverable = match kind {
                ErrorKind::VerificationFailed => verification_failures <= 1,
                other => other.is_recoverable(),
            };
            let will_retry = recoverable
                && run.retry.should_retry(attempt, ceiling, kind)
                && !run.cancel.is_cancelled();

            self.emit(BatchEvent::AttemptFailed {
                batch_id: run.batch_id.clone(),
                component: name.to_string(),
                attempt,
                kind,
                detail: detail.clone(),
                will_retry,
            });

            if !will_retry {
                break (kind, detail);
            }

            let delay = run.retry.next_delay(attempt, kind);
            warn!(
                component = %name,
                attempt,
                kind = %kind,
                delay_ms = delay.as_millis() as u64,
                "Attempt failed, retrying"
            );
            if !run.cancel.sleep_unless_cancelled(delay).await {
                info!(component = %name, "Batch cancelled during backoff");
                break (kind, detail);
            }
            self.advance(&mut lifecycle, ComponentPhase::Retrying, name);
        };

        let (status, rollback_warning) = if run.options.enable_rollback && !snapshots.is_empty() {
            let mut warnings = Vec::new();
            for id in snapshots.iter().rev() {
                let report = self.rollback.rollback(id).await;
                if let Some(w) = report.warning() {
                    warnings.push(w);
                }
            }
            self.advance(&mut lifecycle, ComponentPhase::RolledBack, name);
            let warning = (!warnings.is_empty()).then(|| warnings.join("; "));
            (InstallationStatus::RolledBack, warning)
        } else {
            (InstallationStatus::Failed, None)
        };

        error!(
            component = %name,
            attempts = attempt,
            kind = %kind,
            status = ?status,
            "Component failed: {detail}"
        );

        InstallationResult {
            component: name.to_string(),
            status,
            attempts: attempt,
            error_kind: Some(kind),
            error_detail: Some(detail),
            verification_passed: false,
            rollback_warning,
            level,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }
}
