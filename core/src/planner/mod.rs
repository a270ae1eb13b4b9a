//! Request → plan pipeline: resolve, check conflicts, group by level.

mod grouper;

pub use grouper::{assign_levels, group_by_level, ParallelInstallationGroup};

use std::collections::HashMap;

use serde::Serialize;
use tracing::info;

use crate::catalog::{Catalog, ComponentDescriptor};
use crate::conflict::{detect_conflicts, ConflictRecord};
use crate::error::ResolutionError;
use crate::resolver::{resolve, DependencyGraph, DroppedDependency};

/// A conflict-checked, leveled execution plan.
#[derive(Debug, Clone)]
pub struct InstallPlan {
    pub requested: Vec<String>,
    pub order: Vec<String>,
    pub groups: Vec<ParallelInstallationGroup>,
    /// Only warnings remain here; critical records abort planning.
    pub conflicts: Vec<ConflictRecord>,
    pub graph: DependencyGraph,
}

impl InstallPlan {
    pub fn descriptor(&self, name: &str) -> Option<&ComponentDescriptor> {
        self.graph.nodes.get(name)
    }

    pub fn warnings(&self) -> Vec<ConflictRecord> {
        self.conflicts
            .iter()
            .filter(|c| !c.is_critical())
            .cloned()
            .collect()
    }

    pub fn dropped_dependencies(&self) -> &[DroppedDependency] {
        self.graph.dropped()
    }

    pub fn levels(&self) -> HashMap<String, usize> {
        self.groups
            .iter()
            .flat_map(|g| g.components.iter().map(move |c| (c.clone(), g.level)))
            .collect()
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            requested: self.requested.clone(),
            order: self.order.clone(),
            groups: self.groups.clone(),
            conflicts: self.conflicts.clone(),
            dropped_dependencies: self
                .graph
                .dropped()
                .iter()
                .map(|d| (d.component.clone(), d.missing.clone()))
                .collect(),
        }
    }
}

/// Serializable view of a plan for display layers.
#[derive(Debug, Clone, Serialize)]
pub struct PlanSummary {
    pub requested: Vec<String>,
    pub order: Vec<String>,
    pub groups: Vec<ParallelInstallationGroup>,
    pub conflicts: Vec<ConflictRecord>,
    pub dropped_dependencies: Vec<(String, String)>,
}

/// Turn a requested set into an install plan.
///
/// Fails with `UnknownComponent`, `CircularDependency` or `ConflictCritical`
/// before anything is executed.
pub fn resolve_and_plan(
    catalog: &dyn Catalog,
    requested: &[String],
    strict: bool,
) -> Result<InstallPlan, ResolutionError> {
    let resolution = resolve(catalog, requested, strict)?;

    let members: Vec<&ComponentDescriptor> = resolution
        .order
        .iter()
        .filter_map(|name| resolution.graph.nodes.get(name))
        .collect();
    let conflicts = detect_conflicts(&members);

    let critical: Vec<ConflictRecord> = conflicts.iter().filter(|c| c.is_critical()).cloned().collect();
    if !critical.is_empty() {
        return Err(ResolutionError::ConflictCritical(critical));
    }

    let groups = group_by_level(&resolution.order, &resolution.graph);
    info!(
        components = resolution.order.len(),
        groups = groups.len(),
        warnings = conflicts.len(),
        "install plan ready"
    );

    Ok(InstallPlan {
        requested: resolution.graph.requested().to_vec(),
        order: resolution.order,
        groups,
        conflicts,
        graph: resolution.graph,
    })
}
