use rigup_core::executor::{BatchEvent, BatchObserver, InstallationStatus};

/// Human-readable batch log on stdout.
pub struct TextRenderer {
    ascii_only: bool,
}

impl TextRenderer {
    pub fn new(ascii_only: bool) -> Self {
        Self { ascii_only }
    }

    fn status_label(&self, status: InstallationStatus) -> &'static str {
        match (status, self.ascii_only) {
            (InstallationStatus::Succeeded, true) => "OK",
            (InstallationStatus::Succeeded, false) => "✅ installed",
            (InstallationStatus::Failed, true) => "FAIL",
            (InstallationStatus::Failed, false) => "❌ failed",
            (InstallationStatus::RolledBack, true) => "ROLLED BACK",
            (InstallationStatus::RolledBack, false) => "↩ rolled back",
            (InstallationStatus::Skipped, true) => "SKIP",
            (InstallationStatus::Skipped, false) => "⏭ skipped",
        }
    }

    fn format_event(&self, event: &BatchEvent) -> String {
        match event {
            BatchEvent::Plan {
                batch_id,
                groups,
                warnings,
            } => {
                let mut out = format!("PLAN {batch_id}:");
                for group in groups {
                    let mode = if group.can_install_parallel {
                        "parallel"
                    } else {
                        "serial"
                    };
                    out.push_str(&format!(
                        "\n  level {} ({mode}): {}",
                        group.level,
                        group.components.join(", ")
                    ));
                }
                for w in warnings {
                    out.push_str(&format!(
                        "\n  warning: {} <-> {}: {}",
                        w.component_a, w.component_b, w.resolution_hint
                    ));
                }
                out
            }
            BatchEvent::GroupStart { group, .. } => format!(
                "LEVEL {} START ({} components)",
                group.level,
                group.components.len()
            ),
            BatchEvent::ComponentStart {
                component, attempt, ..
            } => {
                if *attempt > 1 {
                    format!("INSTALL {component} (attempt {attempt})")
                } else {
                    format!("INSTALL {component}")
                }
            }
            BatchEvent::AttemptFailed {
                component,
                attempt,
                kind,
                detail,
                will_retry,
                ..
            } => {
                let next = if *will_retry { ", retrying" } else { "" };
                format!("ATTEMPT {attempt} FAILED {component} [{kind}] {detail}{next}")
            }
            BatchEvent::ComponentEnd { result, .. } => {
                let mut line = format!(
                    "{} {} (attempts {}, {}ms)",
                    self.status_label(result.status),
                    result.component,
                    result.attempts,
                    result.duration_ms
                );
                if let Some(detail) = &result.error_detail {
                    line.push_str(&format!(": {detail}"));
                }
                if let Some(warning) = &result.rollback_warning {
                    line.push_str(&format!(" [warning: {warning}]"));
                }
                line
            }
            BatchEvent::GroupEnd { level, .. } => format!("LEVEL {level} END"),
            BatchEvent::BatchEnd { batch_id, result } => format!(
                "BATCH END {batch_id} (completed {}, failed {}, skipped {}, duration {}ms{})",
                result.completed.len(),
                result.failed.len(),
                result.skipped.len(),
                result.duration_ms,
                if result.cancelled { ", cancelled" } else { "" }
            ),
        }
    }
}

impl BatchObserver for TextRenderer {
    fn name(&self) -> &str {
        "text-renderer"
    }

    fn on_event(&self, event: &BatchEvent) {
        println!("{}", self.format_event(event));
    }
}
