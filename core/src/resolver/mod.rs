//! Dependency resolution.
//!
//! ```text
//! requested names + &dyn Catalog
//!   ↓
//! DependencyGraph::build()        (closure, unknown-name policy)
//!   ↓
//! DependencyGraph::topological_order()   (three-colour DFS, cycle check)
//!   ↓
//! Resolution { order, graph }
//! ```

mod graph;

pub use graph::{DependencyGraph, DroppedDependency};

use tracing::{debug, info};

use crate::catalog::Catalog;
use crate::error::ResolutionError;

/// Output of a successful resolution.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Every dependency precedes its dependents.
    pub order: Vec<String>,
    pub graph: DependencyGraph,
}

/// Resolve `requested` into a dependency-respecting total order.
pub fn resolve(
    catalog: &dyn Catalog,
    requested: &[String],
    strict: bool,
) -> Result<Resolution, ResolutionError> {
    info!(requested = requested.len(), strict, "resolving components");

    let graph = DependencyGraph::build(catalog, requested, strict)?;
    let order = graph.topological_order()?;

    debug!(order = ?order, dropped = graph.dropped().len(), "resolution complete");
    Ok(Resolution { order, graph })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ComponentDescriptor, StaticCatalog};

    fn catalog(descs: Vec<ComponentDescriptor>) -> StaticCatalog {
        StaticCatalog::from_descriptors(descs).unwrap()
    }

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn position(order: &[String], name: &str) -> usize {
        order.iter().position(|n| n == name).unwrap()
    }

    #[test]
    fn dependencies_precede_dependents() {
        let cat = catalog(vec![
            ComponentDescriptor::new("app").with_dependencies(["lib", "runtime"]),
            ComponentDescriptor::new("lib").with_dependencies(["runtime"]),
            ComponentDescriptor::new("runtime"),
        ]);

        let res = resolve(&cat, &names(&["app"]), true).unwrap();
        assert_eq!(res.order, names(&["runtime", "lib", "app"]));
        for (name, deps) in &res.graph.edges {
            for dep in deps {
                assert!(position(&res.order, dep) < position(&res.order, name));
            }
        }
    }

    #[test]
    fn ties_follow_request_order() {
        let cat = catalog(vec![
            ComponentDescriptor::new("a"),
            ComponentDescriptor::new("b"),
            ComponentDescriptor::new("c"),
        ]);

        let first = resolve(&cat, &names(&["c", "a", "b"]), true).unwrap();
        assert_eq!(first.order, names(&["c", "a", "b"]));

        let again = resolve(&cat, &names(&["c", "a", "b"]), true).unwrap();
        assert_eq!(first.order, again.order);
    }

    #[test]
    fn duplicate_requests_collapse() {
        let cat = catalog(vec![ComponentDescriptor::new("a")]);
        let res = resolve(&cat, &names(&["a", "a"]), true).unwrap();
        assert_eq!(res.order, names(&["a"]));
        assert_eq!(res.graph.requested(), names(&["a"]).as_slice());
    }

    #[test]
    fn very_deep_chain_resolves() {
        const DEPTH: usize = 100_000;
        let cat = catalog(
            (0..DEPTH)
                .map(|i| {
                    let desc = ComponentDescriptor::new(format!("c{i}"));
                    if i + 1 < DEPTH {
                        desc.with_dependencies([format!("c{}", i + 1)])
                    } else {
                        desc
                    }
                })
                .collect(),
        );

        let res = resolve(&cat, &names(&["c0"]), true).unwrap();
        assert_eq!(res.order.len(), DEPTH);
        assert_eq!(res.order.first().map(String::as_str), Some("c99999"));
        assert_eq!(res.order.last().map(String::as_str), Some("c0"));
    }

    #[test]
    fn cycle_reports_member_chain() {
        let cat = catalog(vec![
            ComponentDescriptor::new("a").with_dependencies(["b"]),
            ComponentDescriptor::new("b").with_dependencies(["c"]),
            ComponentDescriptor::new("c").with_dependencies(["a"]),
        ]);

        match resolve(&cat, &names(&["a"]), true) {
            Err(ResolutionError::CircularDependency(chain)) => {
                assert_eq!(chain, names(&["a", "b", "c", "a"]));
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn strict_mode_fails_on_unknown_dependency() {
        let cat = catalog(vec![
            ComponentDescriptor::new("x").with_dependencies(["z"]),
            ComponentDescriptor::new("y").with_dependencies(["z"]),
        ]);

        match resolve(&cat, &names(&["x", "y"]), true) {
            Err(ResolutionError::UnknownComponent { name, required_by }) => {
                assert_eq!(name, "z");
                assert_eq!(required_by.as_deref(), Some("x"));
            }
            other => panic!("expected unknown component, got {other:?}"),
        }
    }

    #[test]
    fn lenient_mode_drops_unknown_dependency() {
        let cat = catalog(vec![
            ComponentDescriptor::new("x").with_dependencies(["z"]),
            ComponentDescriptor::new("y").with_dependencies(["z"]),
        ]);

        let res = resolve(&cat, &names(&["x", "y"]), false).unwrap();
        assert_eq!(res.order, names(&["x", "y"]));
        assert_eq!(res.graph.dropped().len(), 2);
        assert!(res.graph.edges["x"].is_empty());
    }

    #[test]
    fn unknown_requested_name_fails_even_when_lenient() {
        let cat = catalog(vec![ComponentDescriptor::new("x")]);
        assert!(matches!(
            resolve(&cat, &names(&["nope"]), false),
            Err(ResolutionError::UnknownComponent { required_by: None, .. })
        ));
    }

    #[test]
    fn transitive_queries() {
        let cat = catalog(vec![
            ComponentDescriptor::new("app").with_dependencies(["lib"]),
            ComponentDescriptor::new("lib").with_dependencies(["base"]),
            ComponentDescriptor::new("base"),
        ]);
        let res = resolve(&cat, &names(&["app"]), true).unwrap();

        assert_eq!(
            res.graph.transitive_dependents("base").into_iter().collect::<Vec<_>>(),
            names(&["app", "lib"])
        );
        assert_eq!(
            res.graph.transitive_dependencies("app").into_iter().collect::<Vec<_>>(),
            names(&["base", "lib"])
        );
    }
}
