use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::resolver::DependencyGraph;

/// Components sharing a dependency depth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParallelInstallationGroup {
    /// 0-based dependency depth
    pub level: usize,

    /// Members in resolver order. Carries no ordering meaning when
    /// `can_install_parallel` is set.
    pub components: Vec<String>,

    /// False if any member is not parallel-safe or the group has one member.
    pub can_install_parallel: bool,
}

impl ParallelInstallationGroup {
    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

/// Assign each component `1 + max(level(dep))` (0 without dependencies) and
/// bucket by level.
///
/// `order` must list every dependency before its dependents, which the
/// resolver guarantees.
pub fn group_by_level(order: &[String], graph: &DependencyGraph) -> Vec<ParallelInstallationGroup> {
    let levels = assign_levels(order, graph);

    let mut buckets: BTreeMap<usize, Vec<String>> = BTreeMap::new();
    for name in order {
        buckets.entry(levels[name]).or_default().push(name.clone());
    }

    buckets
        .into_iter()
        .map(|(level, components)| {
            let all_parallel_safe = components.iter().all(|name| {
                graph
                    .nodes
                    .get(name)
                    .map(|d| d.supports_parallel_install)
                    .unwrap_or(false)
            });
            ParallelInstallationGroup {
                level,
                can_install_parallel: components.len() > 1 && all_parallel_safe,
                components,
            }
        })
        .collect()
}

pub fn assign_levels(order: &[String], graph: &DependencyGraph) -> HashMap<String, usize> {
    let mut levels: HashMap<String, usize> = HashMap::with_capacity(order.len());
    for name in order {
        let level = graph
            .edges
            .get(name)
            .into_iter()
            .flatten()
            .filter_map(|dep| levels.get(dep))
            .map(|l| l + 1)
            .max()
            .unwrap_or(0);
        levels.insert(name.clone(), level);
    }
    levels
}
