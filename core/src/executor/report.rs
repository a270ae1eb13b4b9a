use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::conflict::ConflictRecord;
use crate::error::{ErrorKind, ResolutionError};

use super::types::{BatchResult, InstallationStatus};

/// Machine-readable outcome of a batch, suitable for logging or display.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub batch_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub overall_success: bool,
    pub cancelled: bool,
    pub components: Vec<ComponentReport>,
    pub conflicts: ConflictReport,
    /// Numeric code of the error that stopped the batch before execution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentReport {
    pub component: String,
    pub status: InstallationStatus,
    pub attempts: u32,
    pub error_kind: Option<ErrorKind>,
    pub error_code: Option<u16>,
    pub error_detail: Option<String>,
    pub verification_passed: bool,
    pub rollback_warning: Option<String>,
    pub duration_ms: u64,
    pub level: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConflictReport {
    pub critical: Vec<ConflictRecord>,
    pub warning: Vec<ConflictRecord>,
}

impl BatchResult {
    pub fn to_report(&self) -> BatchReport {
        let components = self
            .results
            .iter()
            .map(|r| ComponentReport {
                component: r.component.clone(),
                status: r.status,
                attempts: r.attempts,
                error_kind: r.error_kind,
                error_code: r.error_kind.map(|k| k.error_code().as_u16()),
                error_detail: r.error_detail.clone(),
                verification_passed: r.verification_passed,
                rollback_warning: r.rollback_warning.clone(),
                duration_ms: r.duration_ms,
                level: r.level,
            })
            .collect();

        BatchReport {
            batch_id: self.batch_id.clone(),
            started_at: self.started_at,
            finished_at: self.finished_at,
            duration_ms: self.duration_ms,
            overall_success: self.overall_success,
            cancelled: self.cancelled,
            components,
            conflicts: ConflictReport {
                critical: Vec::new(),
                warning: self.warnings.clone(),
            },
            error_code: None,
            error: None,
        }
    }
}

impl BatchReport {
    /// Report for a request that was refused during planning.
    pub fn rejected(batch_id: impl Into<String>, error: &ResolutionError) -> Self {
        let now = Utc::now();
        let critical = match error {
            ResolutionError::ConflictCritical(records) => records.clone(),
            _ => Vec::new(),
        };

        Self {
            batch_id: batch_id.into(),
            started_at: now,
            finished_at: now,
            duration_ms: 0,
            overall_success: false,
            cancelled: false,
            components: Vec::new(),
            conflicts: ConflictReport {
                critical,
                warning: Vec::new(),
            },
            error_code: Some(error.error_code().as_u16()),
            error: Some(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::{ConflictType, Severity};

    #[test]
    fn rejected_report_carries_critical_conflicts() {
        let record = ConflictRecord {
            component_a: "app".to_string(),
            component_b: "legacy".to_string(),
            conflict_type: ConflictType::Explicit,
            severity: Severity::Critical,
            resolution_hint: "remove one of them".to_string(),
        };
        let err = ResolutionError::ConflictCritical(vec![record.clone()]);

        let report = BatchReport::rejected("b-1", &err);

        assert!(!report.overall_success);
        assert_eq!(report.conflicts.critical, vec![record]);
        assert_eq!(report.error_code, Some(13));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["conflicts"]["critical"][0]["severity"], "critical");
        assert!(json["components"].as_array().unwrap().is_empty());
    }
}
