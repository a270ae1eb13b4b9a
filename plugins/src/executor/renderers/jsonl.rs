use chrono::Local;
use rigup_core::executor::{BatchEvent, BatchObserver};
use serde_json::{json, Value};

/// One JSON object per batch event on stdout.
pub struct JsonlRenderer {
    pretty_print: bool,
}

impl JsonlRenderer {
    pub fn new(pretty_print: bool) -> Self {
        Self { pretty_print }
    }

    fn event_to_json(&self, event: &BatchEvent) -> Value {
        let ts = Local::now().to_rfc3339();
        match event {
            BatchEvent::Plan {
                batch_id,
                groups,
                warnings,
            } => json!({
                "v": 1,
                "event_type": "batch.plan",
                "ts": ts,
                "batch_id": batch_id,
                "metadata": {
                    "groups": groups,
                    "warnings": warnings,
                    "total_components": groups.iter().map(|g| g.len()).sum::<usize>(),
                }
            }),
            BatchEvent::GroupStart { batch_id, group } => json!({
                "v": 1,
                "event_type": "level.start",
                "ts": ts,
                "batch_id": batch_id,
                "metadata": {
                    "level": group.level,
                    "components": group.components,
                    "parallel": group.can_install_parallel,
                }
            }),
            BatchEvent::ComponentStart {
                batch_id,
                component,
                level,
                attempt,
            } => json!({
                "v": 1,
                "event_type": "component.start",
                "ts": ts,
                "batch_id": batch_id,
                "component": component,
                "metadata": {
                    "level": level,
                    "attempt": attempt,
                }
            }),
            BatchEvent::AttemptFailed {
                batch_id,
                component,
                attempt,
                kind,
                detail,
                will_retry,
            } => json!({
                "v": 1,
                "event_type": "component.attempt_failed",
                "ts": ts,
                "batch_id": batch_id,
                "component": component,
                "code": kind.error_code().as_u16(),
                "metadata": {
                    "attempt": attempt,
                    "error_kind": kind,
                    "detail": detail,
                    "will_retry": will_retry,
                }
            }),
            BatchEvent::ComponentEnd { batch_id, result } => json!({
                "v": 1,
                "event_type": "component.end",
                "ts": ts,
                "batch_id": batch_id,
                "component": result.component,
                "status": result.status,
                "metadata": {
                    "attempts": result.attempts,
                    "duration_ms": result.duration_ms,
                    "level": result.level,
                    "error_kind": result.error_kind,
                    "error_detail": result.error_detail,
                    "verification_passed": result.verification_passed,
                    "rollback_warning": result.rollback_warning,
                }
            }),
            BatchEvent::GroupEnd { batch_id, level } => json!({
                "v": 1,
                "event_type": "level.end",
                "ts": ts,
                "batch_id": batch_id,
                "metadata": {
                    "level": level,
                }
            }),
            BatchEvent::BatchEnd { batch_id, result } => json!({
                "v": 1,
                "event_type": "batch.end",
                "ts": ts,
                "batch_id": batch_id,
                "metadata": {
                    "overall_success": result.overall_success,
                    "completed": result.completed,
                    "failed": result.failed,
                    "skipped": result.skipped,
                    "cancelled": result.cancelled,
                    "duration_ms": result.duration_ms,
                }
            }),
        }
    }
}

impl BatchObserver for JsonlRenderer {
    fn name(&self) -> &str {
        "jsonl-renderer"
    }

    fn on_event(&self, event: &BatchEvent) {
        let value = self.event_to_json(event);
        if self.pretty_print {
            println!("{}", serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".into()));
        } else {
            println!("{}", serde_json::to_string(&value).unwrap_or_else(|_| "{}".into()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigup_core::error::ErrorKind;
    use rigup_core::executor::InstallationResult;

    #[test]
    fn test_jsonl_renderer_attempt_failed() {
        let renderer = JsonlRenderer::new(false);
        let event = BatchEvent::AttemptFailed {
            batch_id: "b".to_string(),
            component: "lib".to_string(),
            attempt: 2,
            kind: ErrorKind::InstallTransient,
            detail: "timeout".to_string(),
            will_retry: false,
        };

        let value = renderer.event_to_json(&event);
        assert_eq!(value["event_type"], "component.attempt_failed");
        assert_eq!(value["code"], 20);
        assert_eq!(value["metadata"]["error_kind"], "install_transient");
    }

    #[test]
    fn test_jsonl_renderer_component_end() {
        let renderer = JsonlRenderer::new(false);
        let event = BatchEvent::ComponentEnd {
            batch_id: "b".to_string(),
            result: InstallationResult::skipped("app", 1, None, "dependency 'lib' failed".to_string()),
        };

        let value = renderer.event_to_json(&event);
        assert_eq!(value["event_type"], "component.end");
        assert_eq!(value["status"], "skipped");
        assert_eq!(value["metadata"]["attempts"], 0);
    }
}
