use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use rigup_core::config::AppConfig;
use rigup_core::executor::{BatchObserver, BatchReport, BatchResult, InstallationStatus, ProgressMonitor};
use rigup_plugins::factory::{build_orchestrator, build_renderer};

use crate::commands::cli::{InstallArgs, OutputFormat};
use crate::commands::plan::load_plan;
use crate::error::CliError;

pub async fn handle_install(args: InstallArgs, mut cfg: AppConfig, ascii: bool) -> Result<i32, CliError> {
    if let Some(n) = args.max_parallel {
        cfg.executor.max_parallel = n;
    }
    if let Some(n) = args.max_retries {
        cfg.executor.max_retries = n;
    }
    if args.no_rollback {
        cfg.executor.enable_rollback = false;
    }

    let plan = match load_plan(&args.plan, cfg.executor.strict) {
        Ok(plan) => plan,
        Err(CliError::Resolution(err)) => {
            if let Some(path) = &args.report {
                let report = BatchReport::rejected(uuid::Uuid::new_v4().to_string(), &err);
                write_report(path, &report)?;
            }
            return Err(CliError::Resolution(err));
        }
        Err(other) => return Err(other),
    };

    let show_progress = args.plan.format == OutputFormat::Text
        && !args.no_progress
        && atty::is(atty::Stream::Stderr);
    let observer: Arc<dyn BatchObserver> = if show_progress {
        Arc::new(ProgressMonitor::new(plan.order.len(), true))
    } else {
        build_renderer(args.plan.format.as_str(), ascii)
    };

    let orchestrator = Arc::new(build_orchestrator(&cfg, vec![observer])?);
    let batch_id = orchestrator.begin_batch();
    let options = cfg.executor.execution_options().with_batch_id(batch_id.clone());

    let ctrl_c = {
        let orchestrator = Arc::clone(&orchestrator);
        let batch_id = batch_id.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!(batch_id = %batch_id, "interrupt received, cancelling batch");
                if let Err(e) = orchestrator.cancel(&batch_id) {
                    warn!(error = %e, "cancel failed");
                }
            }
        })
    };

    let result = orchestrator.execute_batch(&plan, &options).await;
    ctrl_c.abort();

    if let Some(path) = &args.report {
        write_report(path, &result.to_report())?;
        info!(path = %path.display(), "batch report written");
    }
    if args.plan.format == OutputFormat::Text {
        print!("{}", render_summary(&result));
    }

    Ok(if result.overall_success { 0 } else { 2 })
}

fn write_report(path: &Path, report: &BatchReport) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(report).map_err(anyhow::Error::from)?;
    std::fs::write(path, json)?;
    Ok(())
}

fn render_summary(result: &BatchResult) -> String {
    let rolled_back = result
        .results
        .iter()
        .filter(|r| r.status == InstallationStatus::RolledBack)
        .count();
    let mut out = format!(
        "\n{} installed, {} failed ({} rolled back), {} skipped in {}ms\n",
        result.completed.len(),
        result.failed.len(),
        rolled_back,
        result.skipped.len(),
        result.duration_ms
    );
    if result.cancelled {
        out.push_str("batch was cancelled\n");
    }
    for r in result.results.iter().filter(|r| r.status.is_failure()) {
        out.push_str(&format!(
            "  {}: {}\n",
            r.component,
            r.error_detail.as_deref().unwrap_or("failed")
        ));
        if let Some(w) = &r.rollback_warning {
            out.push_str(&format!("    {w}\n"));
        }
    }
    out
}
