//! Pairwise conflict detection over a resolved component set.

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::catalog::{ComponentDescriptor, Enforcement};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    Explicit,
    VersionIncompatible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Critical,
}

/// An incompatibility between two components of the same plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub component_a: String,
    pub component_b: String,
    pub conflict_type: ConflictType,
    pub severity: Severity,
    pub resolution_hint: String,
}

impl ConflictRecord {
    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }

    pub fn involves(&self, name: &str) -> bool {
        self.component_a == name || self.component_b == name
    }
}

/// Check every unordered pair of `components`.
///
/// Pairs are visited in slice order so output is reproducible. Severity does
/// not depend on whether a member was requested or pulled in as a
/// dependency.
pub fn detect_conflicts(components: &[&ComponentDescriptor]) -> Vec<ConflictRecord> {
    let mut records = Vec::new();

    for (i, a) in components.iter().enumerate() {
        for b in &components[i + 1..] {
            if let Some(record) = explicit_conflict(a, b) {
                records.push(record);
            }
            records.extend(version_conflicts(a, b));
        }
    }

    for record in &records {
        match record.severity {
            Severity::Critical => error!(
                a = %record.component_a,
                b = %record.component_b,
                kind = ?record.conflict_type,
                "critical conflict"
            ),
            Severity::Warning => warn!(
                a = %record.component_a,
                b = %record.component_b,
                kind = ?record.conflict_type,
                "conflict warning"
            ),
        }
    }

    records
}

fn explicit_conflict(a: &ComponentDescriptor, b: &ComponentDescriptor) -> Option<ConflictRecord> {
    let a_declares = a.declares_conflict_with(&b.name);
    let b_declares = b.declares_conflict_with(&a.name);
    if !a_declares && !b_declares {
        return None;
    }

    let declared_by = match (a_declares, b_declares) {
        (true, true) => "both components".to_string(),
        (true, false) => format!("'{}'", a.name),
        _ => format!("'{}'", b.name),
    };

    Some(ConflictRecord {
        component_a: a.name.clone(),
        component_b: b.name.clone(),
        conflict_type: ConflictType::Explicit,
        severity: Severity::Critical,
        resolution_hint: format!(
            "conflict declared by {declared_by}; request only one of '{}' and '{}'",
            a.name, b.name
        ),
    })
}

fn version_conflicts(a: &ComponentDescriptor, b: &ComponentDescriptor) -> Vec<ConflictRecord> {
    let mut records = Vec::new();

    for ca in &a.capabilities {
        for cb in b.capabilities.iter().filter(|c| c.capability == ca.capability) {
            if ca.range.intersects(&cb.range) {
                continue;
            }

            let severity = if ca.enforcement == Enforcement::Strict
                || cb.enforcement == Enforcement::Strict
            {
                Severity::Critical
            } else {
                Severity::Warning
            };

            records.push(ConflictRecord {
                component_a: a.name.clone(),
                component_b: b.name.clone(),
                conflict_type: ConflictType::VersionIncompatible,
                severity,
                resolution_hint: format!(
                    "'{}' needs {} {} but '{}' needs {} {}",
                    a.name, ca.capability, ca.range, b.name, cb.capability, cb.range
                ),
            });
        }
    }

    records
}
