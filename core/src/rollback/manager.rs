use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::backend::{InstallBackend, RestoreToken, RollbackOutcome};
use crate::error::SnapshotError;

use super::snapshot::{RollbackSnapshot, SnapshotListing, SnapshotStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RollbackStatus {
    RolledBack,
    /// Rollback ran but left residual state behind.
    Partial { residue: Vec<String> },
    /// The backend could not reverse anything.
    Failed { detail: String },
    /// No persisted snapshot under this id; nothing left to undo.
    NothingToUndo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollbackReport {
    pub snapshot_id: String,
    pub component: Option<String>,
    #[serde(flatten)]
    pub status: RollbackStatus,
}

impl RollbackReport {
    pub fn is_clean(&self) -> bool {
        matches!(
            self.status,
            RollbackStatus::RolledBack | RollbackStatus::NothingToUndo
        )
    }

    /// Human-readable residual-state warning, if rollback was not clean.
    pub fn warning(&self) -> Option<String> {
        match &self.status {
            RollbackStatus::Partial { residue } => {
                Some(format!("rollback left residual state: {}", residue.join(", ")))
            }
            RollbackStatus::Failed { detail } => Some(format!("rollback failed: {detail}")),
            _ => None,
        }
    }
}

struct AppliedRollback {
    batch_id: Option<String>,
    report: RollbackReport,
}

/// Records pre-install snapshots and undoes component side effects.
pub struct RollbackManager {
    store: Arc<dyn SnapshotStore>,
    backend: Arc<dyn InstallBackend>,
    /// Results of rollbacks already applied in this process, by snapshot id.
    /// Entries are dropped by `release_batch` once their batch is over.
    applied: Mutex<HashMap<String, AppliedRollback>>,
}

impl RollbackManager {
    pub fn new(store: Arc<dyn SnapshotStore>, backend: Arc<dyn InstallBackend>) -> Self {
        Self {
            store,
            backend,
            applied: Mutex::new(HashMap::new()),
        }
    }

    /// Persist a snapshot for `component`; must happen before the backend runs.
    pub fn begin(
        &self,
        component: &str,
        batch_id: Option<&str>,
        attempt: u32,
        restart_services: &[String],
    ) -> Result<String, SnapshotError> {
        let mut snapshot = RollbackSnapshot::new(component);
        snapshot.batch_id = batch_id.map(str::to_string);
        snapshot.attempt = attempt;
        snapshot.restart_services = restart_services.to_vec();

        self.store.save(&snapshot)?;
        debug!(component, snapshot_id = %snapshot.id, attempt, "snapshot recorded");
        Ok(snapshot.id)
    }

    /// Attach the backend's description of what the attempt changed.
    pub fn record_token(&self, snapshot_id: &str, token: RestoreToken) -> Result<(), SnapshotError> {
        let mut snapshot = self.store.load(snapshot_id)?;
        snapshot.restore_token = token;
        self.store.save(&snapshot)
    }

    /// Discard the snapshot after a verified install.
    pub fn commit(&self, snapshot_id: &str) -> Result<(), SnapshotError> {
        self.store.delete(snapshot_id)?;
        debug!(snapshot_id, "snapshot committed");
        Ok(())
    }

    /// Undo the side effects recorded under `snapshot_id`.
    ///
    /// Best-effort and idempotent: until the batch is released, repeated calls
    /// return the first call's report without touching the system again. Once
    /// a clean rollback has discarded its snapshot, later calls see
    /// `NothingToUndo`. Failures come back as a report, never as an error.
    pub async fn rollback(&self, snapshot_id: &str) -> RollbackReport {
        let previous = self
            .applied_guard()
            .get(snapshot_id)
            .map(|applied| applied.report.clone());
        if let Some(previous) = previous {
            debug!(snapshot_id, "rollback already applied");
            return previous;
        }

        // Reports that did not touch the system are not memoised.
        let snapshot = match self.store.load(snapshot_id) {
            Ok(snapshot) => snapshot,
            Err(SnapshotError::NotFound(_)) => {
                return RollbackReport {
                    snapshot_id: snapshot_id.to_string(),
                    component: None,
                    status: RollbackStatus::NothingToUndo,
                };
            }
            Err(e) => {
                warn!(snapshot_id, error = %e, "cannot load snapshot for rollback");
                return RollbackReport {
                    snapshot_id: snapshot_id.to_string(),
                    component: None,
                    status: RollbackStatus::Failed {
                        detail: e.to_string(),
                    },
                };
            }
        };

        let report = self.apply(&snapshot).await;
        self.applied_guard().insert(
            report.snapshot_id.clone(),
            AppliedRollback {
                batch_id: snapshot.batch_id.clone(),
                report: report.clone(),
            },
        );
        report
    }

    /// Forget memoised rollbacks of a finished batch.
    pub fn release_batch(&self, batch_id: &str) {
        self.applied_guard()
            .retain(|_, applied| applied.batch_id.as_deref() != Some(batch_id));
    }

    /// Number of rollback reports held for idempotent replay.
    pub fn remembered(&self) -> usize {
        self.applied_guard().len()
    }

    /// Snapshots persisted by an interrupted run.
    pub fn pending(&self) -> Result<SnapshotListing, SnapshotError> {
        self.store.list()
    }

    /// Roll back everything an interrupted run left in flight.
    ///
    /// Each snapshot is handled on its own: an unreadable file becomes a
    /// `Failed` report and the remaining snapshots are still rolled back.
    pub async fn recover_pending(&self) -> Result<Vec<RollbackReport>, SnapshotError> {
        let pending = self.pending()?;
        if !pending.is_empty() {
            info!(
                count = pending.snapshots.len(),
                unreadable = pending.unreadable.len(),
                "recovering in-flight snapshots"
            );
        }

        let mut reports = Vec::with_capacity(pending.len());
        for snapshot in &pending.snapshots {
            reports.push(self.rollback(&snapshot.id).await);
        }
        for unreadable in pending.unreadable {
            reports.push(RollbackReport {
                snapshot_id: unreadable.id,
                component: None,
                status: RollbackStatus::Failed {
                    detail: unreadable.detail,
                },
            });
        }

        let mut applied = self.applied_guard();
        for snapshot in &pending.snapshots {
            applied.remove(&snapshot.id);
        }
        Ok(reports)
    }

    async fn apply(&self, snapshot: &RollbackSnapshot) -> RollbackReport {
        let outcome = if snapshot.restore_token.is_empty() && snapshot.restart_services.is_empty() {
            RollbackOutcome::Complete
        } else {
            self.backend
                .rollback(
                    &snapshot.component,
                    &snapshot.restore_token,
                    &snapshot.restart_services,
                )
                .await
        };

        let status = match outcome {
            RollbackOutcome::Complete => {
                if let Err(e) = self.store.delete(&snapshot.id) {
                    warn!(snapshot_id = %snapshot.id, error = %e, "rolled back but could not discard snapshot");
                }
                info!(component = %snapshot.component, "rolled back");
                RollbackStatus::RolledBack
            }
            RollbackOutcome::Partial { residue } => {
                warn!(component = %snapshot.component, residue = ?residue, "rollback left residual state");
                RollbackStatus::Partial { residue }
            }
            RollbackOutcome::Failed { detail } => {
                warn!(component = %snapshot.component, %detail, "rollback failed");
                RollbackStatus::Failed { detail }
            }
        };

        RollbackReport {
            snapshot_id: snapshot.id.clone(),
            component: Some(snapshot.component.clone()),
            status,
        }
    }

    fn applied_guard(&self) -> std::sync::MutexGuard<'_, HashMap<String, AppliedRollback>> {
        match self.applied.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{InstallOutcome, InstallRequest};
    use crate::rollback::MemorySnapshotStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingBackend {
        rollbacks: AtomicUsize,
        outcome: RollbackOutcome,
    }

    impl CountingBackend {
        fn new(outcome: RollbackOutcome) -> Arc<Self> {
            Arc::new(Self {
                rollbacks: AtomicUsize::new(0),
                outcome,
            })
        }
    }

    #[async_trait]
    impl InstallBackend for CountingBackend {
        fn name(&self) -> &str {
            "counting"
        }

        async fn execute(&self, _request: InstallRequest<'_>) -> InstallOutcome {
            InstallOutcome::success(RestoreToken::empty())
        }

        async fn rollback(&self, _c: &str, _t: &RestoreToken, _s: &[String]) -> RollbackOutcome {
            self.rollbacks.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone()
        }
    }

    fn token() -> RestoreToken {
        RestoreToken::from(serde_json::json!({ "created": ["/opt/lib"] }))
    }

    #[tokio::test]
    async fn rollback_twice_is_idempotent() {
        let store = Arc::new(MemorySnapshotStore::new());
        let backend = CountingBackend::new(RollbackOutcome::Complete);
        let manager = RollbackManager::new(store.clone(), backend.clone());

        let id = manager.begin("lib", None, 1, &[]).unwrap();
        manager.record_token(&id, token()).unwrap();

        let first = manager.rollback(&id).await;
        let second = manager.rollback(&id).await;

        assert_eq!(first, second);
        assert_eq!(first.status, RollbackStatus::RolledBack);
        assert_eq!(backend.rollbacks.load(Ordering::SeqCst), 1);
        assert!(store.list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn commit_discards_snapshot() {
        let store = Arc::new(MemorySnapshotStore::new());
        let manager = RollbackManager::new(store.clone(), CountingBackend::new(RollbackOutcome::Complete));

        let id = manager.begin("lib", Some("batch-1"), 1, &[]).unwrap();
        assert_eq!(manager.pending().unwrap().len(), 1);
        manager.commit(&id).unwrap();
        assert!(manager.pending().unwrap().is_empty());

        let report = manager.rollback(&id).await;
        assert_eq!(report.status, RollbackStatus::NothingToUndo);
    }

    #[tokio::test]
    async fn partial_rollback_is_a_warning_and_keeps_snapshot() {
        let store = Arc::new(MemorySnapshotStore::new());
        let backend = CountingBackend::new(RollbackOutcome::Partial {
            residue: vec!["/opt/lib/locked.dll".to_string()],
        });
        let manager = RollbackManager::new(store.clone(), backend);

        let id = manager.begin("lib", None, 1, &[]).unwrap();
        manager.record_token(&id, token()).unwrap();

        let report = manager.rollback(&id).await;
        assert!(!report.is_clean());
        assert!(report.warning().unwrap().contains("locked.dll"));
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_token_needs_no_backend_call() {
        let store = Arc::new(MemorySnapshotStore::new());
        let backend = CountingBackend::new(RollbackOutcome::Complete);
        let manager = RollbackManager::new(store, backend.clone());

        let id = manager.begin("lib", None, 1, &[]).unwrap();
        assert!(manager.rollback(&id).await.is_clean());
        assert_eq!(backend.rollbacks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn recover_pending_rolls_back_leftovers() {
        let store = Arc::new(MemorySnapshotStore::new());
        let backend = CountingBackend::new(RollbackOutcome::Complete);

        {
            let crashed = RollbackManager::new(store.clone(), backend.clone());
            let a = crashed.begin("a", Some("batch-1"), 1, &[]).unwrap();
            crashed.record_token(&a, token()).unwrap();
            let b = crashed.begin("b", Some("batch-1"), 1, &[]).unwrap();
            crashed.record_token(&b, token()).unwrap();
        }

        let manager = RollbackManager::new(store.clone(), backend.clone());
        let reports = manager.recover_pending().await.unwrap();
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(RollbackReport::is_clean));
        assert!(store.list().unwrap().is_empty());
        assert_eq!(backend.rollbacks.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn release_batch_drops_memoised_reports() {
        let store = Arc::new(MemorySnapshotStore::new());
        let backend = CountingBackend::new(RollbackOutcome::Partial {
            residue: vec!["/opt/lib".to_string()],
        });
        let manager = RollbackManager::new(store, backend.clone());

        let mine = manager.begin("lib", Some("batch-1"), 1, &[]).unwrap();
        manager.record_token(&mine, token()).unwrap();
        let other = manager.begin("app", Some("batch-2"), 1, &[]).unwrap();
        manager.record_token(&other, token()).unwrap();

        manager.rollback(&mine).await;
        manager.rollback(&mine).await;
        manager.rollback(&other).await;
        assert_eq!(manager.remembered(), 2);
        assert_eq!(backend.rollbacks.load(Ordering::SeqCst), 2);

        manager.release_batch("batch-1");
        assert_eq!(manager.remembered(), 1);
    }

    #[tokio::test]
    async fn missing_snapshot_is_not_memoised() {
        let manager = RollbackManager::new(
            Arc::new(MemorySnapshotStore::new()),
            CountingBackend::new(RollbackOutcome::Complete),
        );
        let report = manager.rollback("gone").await;
        assert_eq!(report.status, RollbackStatus::NothingToUndo);
        assert_eq!(manager.remembered(), 0);
    }

    #[tokio::test]
    async fn recover_pending_continues_past_unreadable_snapshots() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = Arc::new(crate::rollback::FileSnapshotStore::new(dir.path()).unwrap());
        let backend = CountingBackend::new(RollbackOutcome::Complete);
        let manager = RollbackManager::new(store.clone(), backend.clone());

        let id = manager.begin("lib", Some("batch-1"), 1, &[]).unwrap();
        manager.record_token(&id, token()).unwrap();
        std::fs::write(dir.path().join("snapshot_torn.json"), r#"{"id":"#).unwrap();

        let reports = manager.recover_pending().await.unwrap();

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].snapshot_id, id);
        assert_eq!(reports[0].status, RollbackStatus::RolledBack);
        assert_eq!(reports[1].snapshot_id, "torn");
        assert!(matches!(reports[1].status, RollbackStatus::Failed { .. }));
        assert_eq!(backend.rollbacks.load(Ordering::SeqCst), 1);
        assert_eq!(manager.remembered(), 0);

        let left = store.list().unwrap();
        assert!(left.snapshots.is_empty());
        assert_eq!(left.unreadable.len(), 1);
    }
}
