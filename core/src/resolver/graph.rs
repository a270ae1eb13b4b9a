use std::collections::{BTreeSet, HashMap, VecDeque};

use tracing::warn;

use crate::catalog::{Catalog, ComponentDescriptor};
use crate::error::ResolutionError;

/// DFS marking used while ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// A dependency declaration dropped in lenient mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedDependency {
    pub component: String,
    pub missing: String,
}

/// Transient "depends on" graph over the requested components and their
/// transitive dependencies.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// Component nodes: name -> descriptor
    pub nodes: HashMap<String, ComponentDescriptor>,

    /// Dependency edges restricted to nodes present in the graph
    pub edges: HashMap<String, Vec<String>>,

    /// Reverse edges: name -> components that depend on it
    pub reverse_edges: HashMap<String, Vec<String>>,

    /// Requested names, deduplicated, in request order
    requested: Vec<String>,

    dropped: Vec<DroppedDependency>,
}

impl DependencyGraph {
    /// Collect the transitive closure of `requested` from the catalog.
    ///
    /// Requested names must always exist. Unknown declared dependencies fail
    /// the build when `strict`, otherwise they are dropped with a warning.
    pub fn build(
        catalog: &dyn Catalog,
        requested: &[String],
        strict: bool,
    ) -> Result<Self, ResolutionError> {
        let mut nodes = HashMap::new();
        let mut edges: HashMap<String, Vec<String>> = HashMap::new();
        let mut reverse_edges: HashMap<String, Vec<String>> = HashMap::new();
        let mut dropped = Vec::new();
        let mut ordered_requested = Vec::new();

        for name in requested {
            if ordered_requested.contains(name) {
                continue;
            }
            if !catalog.contains(name) {
                return Err(ResolutionError::UnknownComponent {
                    name: name.clone(),
                    required_by: None,
                });
            }
            ordered_requested.push(name.clone());
        }

        let mut queue: VecDeque<String> = ordered_requested.iter().cloned().collect();
        while let Some(name) = queue.pop_front() {
            if nodes.contains_key(&name) {
                continue;
            }
            let Some(descriptor) = catalog.get(&name) else {
                continue;
            };

            let mut present = Vec::new();
            for dep in &descriptor.dependencies {
                if present.contains(dep) {
                    continue;
                }
                if !catalog.contains(dep) {
                    if strict {
                        return Err(ResolutionError::UnknownComponent {
                            name: dep.clone(),
                            required_by: Some(name.clone()),
                        });
                    }
                    warn!(component = %name, missing = %dep, "dropping unknown dependency");
                    dropped.push(DroppedDependency {
                        component: name.clone(),
                        missing: dep.clone(),
                    });
                    continue;
                }
                present.push(dep.clone());
                reverse_edges
                    .entry(dep.clone())
                    .or_default()
                    .push(name.clone());
                queue.push_back(dep.clone());
            }

            edges.insert(name.clone(), present);
            nodes.insert(name, descriptor.clone());
        }

        Ok(Self {
            nodes,
            edges,
            reverse_edges,
            requested: ordered_requested,
            dropped,
        })
    }

    pub fn requested(&self) -> &[String] {
        &self.requested
    }

    pub fn dropped(&self) -> &[DroppedDependency] {
        &self.dropped
    }

    /// Depth-first post-order with three-colour marking.
    ///
    /// Roots are visited in request order and dependencies in declaration
    /// order, so identical input always yields the identical order. Meeting
    /// an in-progress node aborts with the cycle's member chain; no partial
    /// order is ever returned. The walk keeps its own frame stack, so chain
    /// depth is bounded by memory rather than the thread stack.
    pub fn topological_order(&self) -> Result<Vec<String>, ResolutionError> {
        let mut marks: HashMap<&str, Mark> = HashMap::with_capacity(self.nodes.len());
        let mut order = Vec::with_capacity(self.nodes.len());
        // (node, index of the next dependency to descend into)
        let mut stack: Vec<(&str, usize)> = Vec::new();

        for root in &self.requested {
            if marks.contains_key(root.as_str()) {
                continue;
            }
            marks.insert(root.as_str(), Mark::InProgress);
            stack.push((root.as_str(), 0));

            while let Some(frame) = stack.last_mut() {
                let node = frame.0;
                let next = self.edges.get(node).and_then(|deps| deps.get(frame.1));
                let Some(dep) = next else {
                    stack.pop();
                    marks.insert(node, Mark::Done);
                    order.push(node.to_string());
                    continue;
                };
                frame.1 += 1;

                match marks.get(dep.as_str()) {
                    Some(Mark::Done) => {}
                    Some(Mark::InProgress) => return Err(cycle_error(&stack, dep)),
                    None => {
                        marks.insert(dep.as_str(), Mark::InProgress);
                        stack.push((dep.as_str(), 0));
                    }
                }
            }
        }

        Ok(order)
    }

    /// Every component that depends on `name`, directly or transitively.
    pub fn transitive_dependents(&self, name: &str) -> BTreeSet<String> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![name.to_string()];
        while let Some(current) = stack.pop() {
            if let Some(dependents) = self.reverse_edges.get(&current) {
                for dependent in dependents {
                    if seen.insert(dependent.clone()) {
                        stack.push(dependent.clone());
                    }
                }
            }
        }
        seen
    }

    /// Every component `name` depends on, directly or transitively.
    pub fn transitive_dependencies(&self, name: &str) -> BTreeSet<String> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![name.to_string()];
        while let Some(current) = stack.pop() {
            if let Some(deps) = self.edges.get(&current) {
                for dep in deps {
                    if seen.insert(dep.clone()) {
                        stack.push(dep.clone());
                    }
                }
            }
        }
        seen
    }
}

/// Cycle chain from the first occurrence of `node` on the walk, closed by
/// `node` itself.
fn cycle_error(stack: &[(&str, usize)], node: &str) -> ResolutionError {
    let start = stack.iter().position(|(n, _)| *n == node).unwrap_or(0);
    let mut chain: Vec<String> = stack[start..].iter().map(|(n, _)| n.to_string()).collect();
    chain.push(node.to_string());
    ResolutionError::CircularDependency(chain)
}
