use rigup_core::config::AppConfig;
use rigup_plugins::factory::build_orchestrator;

use crate::commands::cli::RecoverArgs;
use crate::error::CliError;

pub async fn handle_recover(args: RecoverArgs, cfg: AppConfig) -> Result<i32, CliError> {
    let orchestrator = build_orchestrator(&cfg, Vec::new())?;

    if args.dry_run {
        let pending = orchestrator.rollback_manager().pending()?;
        if pending.is_empty() {
            println!("no pending snapshots");
        }
        for snap in &pending.snapshots {
            println!(
                "{} {} attempt {} ({})",
                snap.id,
                snap.component,
                snap.attempt,
                snap.created_at.to_rfc3339()
            );
        }
        for bad in &pending.unreadable {
            println!("{} unreadable: {}", bad.id, bad.detail);
        }
        return Ok(0);
    }

    let reports = orchestrator.recover().await?;
    if reports.is_empty() {
        println!("nothing to recover");
    }
    let mut clean = true;
    for report in &reports {
        let component = report.component.as_deref().unwrap_or("?");
        match report.warning() {
            Some(w) => {
                clean = false;
                println!("{component} ({}): {w}", report.snapshot_id);
            }
            None => println!("{component} ({}): rolled back", report.snapshot_id),
        }
    }
    Ok(if clean { 0 } else { 2 })
}
