use std::sync::Arc;

use anyhow::Result;

use rigup_core::config::{self, AppConfig, ConcurrencyConfig, RetryConfig};
use rigup_core::executor::{
    BatchObserver, ConcurrencyStrategy, FixedConcurrency, Orchestrator, RetryStrategy,
};
use rigup_core::rollback::{FileSnapshotStore, SnapshotStore};
use rigup_core::verify::Verifier;

use crate::backend::CommandBackend;
use crate::executor::{exponential_from_config, AdaptiveConcurrency, JsonlRenderer, LinearRetry, TextRenderer};
use crate::probe::SystemProbeRunner;

pub fn build_retry_strategy(cfg: &RetryConfig) -> Arc<dyn RetryStrategy> {
    match cfg.strategy.as_str() {
        "linear" => Arc::new(LinearRetry::new(cfg.clone())),
        // Anything else behaves like the default exponential backoff.
        _ => Arc::new(exponential_from_config(cfg)),
    }
}

pub fn build_concurrency_strategy(cfg: &ConcurrencyConfig) -> Arc<dyn ConcurrencyStrategy> {
    match cfg.strategy.as_str() {
        "adaptive" => Arc::new(AdaptiveConcurrency::new(cfg.clone())),
        _ => Arc::new(FixedConcurrency),
    }
}

pub fn build_renderer(format: &str, ascii_only: bool) -> Arc<dyn BatchObserver> {
    match format {
        "jsonl" => Arc::new(JsonlRenderer::new(false)),
        _ => Arc::new(TextRenderer::new(ascii_only)),
    }
}

pub fn build_snapshot_store(cfg: &AppConfig) -> Result<Arc<dyn SnapshotStore>> {
    let dir = config::snapshot_dir(cfg)?;
    Ok(Arc::new(FileSnapshotStore::new(dir)?))
}

/// Orchestrator wired with the host collaborators: command backend, system
/// probes and file snapshots.
pub fn build_orchestrator(cfg: &AppConfig, observers: Vec<Arc<dyn BatchObserver>>) -> Result<Orchestrator> {
    let backend = Arc::new(CommandBackend::new());
    let verifier = Verifier::new(Arc::new(SystemProbeRunner::with_default_store()))
        .require_probes(cfg.executor.require_probes);

    let mut builder = Orchestrator::builder(backend, verifier)
        .snapshot_store(build_snapshot_store(cfg)?)
        .retry_strategy(build_retry_strategy(&cfg.executor.retry))
        .concurrency_strategy(build_concurrency_strategy(&cfg.executor.concurrency));
    for observer in observers {
        builder = builder.observer(observer);
    }
    Ok(builder.build())
}
