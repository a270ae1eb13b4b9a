mod common;

use std::collections::HashMap;

use pretty_assertions::assert_eq;

use rigup_core::catalog::{CapabilityConstraint, ComponentDescriptor, VersionRange};
use rigup_core::conflict::{ConflictType, Severity};
use rigup_core::error::{ErrorCode, ResolutionError};
use rigup_core::planner::resolve_and_plan;

use common::{catalog, names};

fn desc(name: &str, deps: &[&str]) -> ComponentDescriptor {
    ComponentDescriptor::new(name)
        .with_dependencies(deps.iter().copied())
        .parallel(true)
}

/// A mid-sized catalog: two runtimes, a shared library layer, tools on top.
fn toolchain_catalog() -> Vec<ComponentDescriptor> {
    vec![
        desc("base", &[]),
        desc("openssl", &["base"]),
        desc("zlib", &["base"]),
        desc("python", &["openssl", "zlib"]),
        desc("node", &["openssl"]),
        desc("pip", &["python"]),
        desc("npm", &["node"]),
        desc("linters", &["pip", "npm"]),
        desc("docs", &["python"]),
    ]
}

#[test]
fn every_dependency_precedes_its_dependents() {
    let cat = catalog(toolchain_catalog());
    let plan = resolve_and_plan(&cat, &names(&["linters", "docs"]), true).unwrap();

    let position: HashMap<&str, usize> = plan
        .order
        .iter()
        .enumerate()
        .map(|(i, n)| (n.as_str(), i))
        .collect();

    assert_eq!(plan.order.len(), 9);
    for name in &plan.order {
        for dep in &plan.descriptor(name).unwrap().dependencies {
            assert!(
                position[dep.as_str()] < position[name.as_str()],
                "{dep} must come before {name}"
            );
        }
    }
}

#[test]
fn levels_strictly_increase_along_edges() {
    let cat = catalog(toolchain_catalog());
    let plan = resolve_and_plan(&cat, &names(&["linters", "docs"]), true).unwrap();
    let levels = plan.levels();

    for name in &plan.order {
        for dep in &plan.descriptor(name).unwrap().dependencies {
            assert!(levels[dep] < levels[name], "{dep} level must be below {name}");
        }
    }

    let level_of = |n: &str| levels[n];
    assert_eq!(level_of("base"), 0);
    assert_eq!(level_of("openssl"), 1);
    assert_eq!(level_of("zlib"), 1);
    assert_eq!(level_of("python"), 2);
    assert_eq!(level_of("node"), 2);
    assert_eq!(level_of("linters"), 4);

    let sizes: Vec<usize> = plan.groups.iter().map(|g| g.components.len()).collect();
    assert_eq!(sizes, vec![1, 2, 2, 3, 1]);
    assert!(plan.groups[1].can_install_parallel);
    assert!(!plan.groups[0].can_install_parallel);
}

#[test]
fn app_on_lib_plans_two_serial_levels() {
    let cat = catalog(vec![
        ComponentDescriptor::new("lib"),
        ComponentDescriptor::new("app").with_dependencies(["lib"]),
    ]);

    let plan = resolve_and_plan(&cat, &names(&["app"]), true).unwrap();

    assert_eq!(plan.order, names(&["lib", "app"]));
    assert_eq!(plan.groups.len(), 2);
    assert_eq!(plan.groups[0].components, names(&["lib"]));
    assert_eq!(plan.groups[1].components, names(&["app"]));
    assert!(plan.conflicts.is_empty());
}

#[test]
fn explicit_conflict_blocks_the_whole_request() {
    let cat = catalog(vec![
        ComponentDescriptor::new("mysql").with_conflicts(["mariadb"]),
        ComponentDescriptor::new("mariadb"),
        ComponentDescriptor::new("redis"),
    ]);

    let err = resolve_and_plan(&cat, &names(&["redis", "mysql", "mariadb"]), true).unwrap_err();

    match &err {
        ResolutionError::ConflictCritical(records) => {
            assert_eq!(records.len(), 1);
            assert_eq!(records[0].conflict_type, ConflictType::Explicit);
            assert!(records[0].involves("mysql") && records[0].involves("mariadb"));
        }
        other => panic!("expected ConflictCritical, got {other:?}"),
    }
    assert_eq!(err.error_code(), ErrorCode::ConflictCritical);
}

#[test]
fn conflict_pulled_in_transitively_is_still_critical() {
    let cat = catalog(vec![
        ComponentDescriptor::new("web").with_dependencies(["nginx"]),
        ComponentDescriptor::new("nginx").with_conflicts(["apache"]),
        ComponentDescriptor::new("apache"),
    ]);

    let err = resolve_and_plan(&cat, &names(&["web", "apache"]), true).unwrap_err();
    assert!(matches!(err, ResolutionError::ConflictCritical(_)));
}

#[test]
fn advisory_version_mismatch_only_warns() {
    let range = |s: &str| VersionRange::parse(s).unwrap();
    let cat = catalog(vec![
        ComponentDescriptor::new("tool-a")
            .with_capability(CapabilityConstraint::advisory("python", range(">=3.12"))),
        ComponentDescriptor::new("tool-b")
            .with_capability(CapabilityConstraint::advisory("python", range("<3.10"))),
    ]);

    let plan = resolve_and_plan(&cat, &names(&["tool-a", "tool-b"]), true).unwrap();
    let warnings = plan.warnings();

    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].severity, Severity::Warning);
    assert_eq!(warnings[0].conflict_type, ConflictType::VersionIncompatible);
}

#[test]
fn strict_version_mismatch_blocks() {
    let range = |s: &str| VersionRange::parse(s).unwrap();
    let cat = catalog(vec![
        ComponentDescriptor::new("tool-a")
            .with_capability(CapabilityConstraint::strict("python", range(">=3.12"))),
        ComponentDescriptor::new("tool-b")
            .with_capability(CapabilityConstraint::advisory("python", range("<3.10"))),
    ]);

    let err = resolve_and_plan(&cat, &names(&["tool-a", "tool-b"]), true).unwrap_err();
    assert!(matches!(err, ResolutionError::ConflictCritical(_)));
}

#[test]
fn unknown_dependency_fails_strict_and_is_dropped_lenient() {
    let cat = catalog(vec![
        ComponentDescriptor::new("x").with_dependencies(["y"]),
        ComponentDescriptor::new("y").with_dependencies(["z"]),
    ]);

    let err = resolve_and_plan(&cat, &names(&["x"]), true).unwrap_err();
    match err {
        ResolutionError::UnknownComponent { name, required_by } => {
            assert_eq!(name, "z");
            assert_eq!(required_by.as_deref(), Some("y"));
        }
        other => panic!("expected UnknownComponent, got {other:?}"),
    }

    let plan = resolve_and_plan(&cat, &names(&["x"]), false).unwrap();
    assert_eq!(plan.order, names(&["y", "x"]));
    assert_eq!(plan.dropped_dependencies().len(), 1);
    assert_eq!(plan.dropped_dependencies()[0].missing, "z");
}

#[test]
fn unknown_requested_name_fails_even_when_lenient() {
    let cat = catalog(vec![ComponentDescriptor::new("x")]);
    let err = resolve_and_plan(&cat, &names(&["nope"]), false).unwrap_err();
    assert!(matches!(err, ResolutionError::UnknownComponent { .. }));
}

#[test]
fn cycle_reports_the_chain() {
    let cat = catalog(vec![
        ComponentDescriptor::new("a").with_dependencies(["b"]),
        ComponentDescriptor::new("b").with_dependencies(["c"]),
        ComponentDescriptor::new("c").with_dependencies(["a"]),
    ]);

    let err = resolve_and_plan(&cat, &names(&["a"]), true).unwrap_err();
    match err {
        ResolutionError::CircularDependency(chain) => {
            assert_eq!(chain.first(), chain.last());
            assert_eq!(chain.len(), 4);
        }
        other => panic!("expected CircularDependency, got {other:?}"),
    }
}

#[test]
fn planning_is_deterministic() {
    let cat = catalog(toolchain_catalog());
    let request = names(&["docs", "linters"]);

    let first = resolve_and_plan(&cat, &request, true).unwrap();
    for _ in 0..5 {
        let again = resolve_and_plan(&cat, &request, true).unwrap();
        assert_eq!(again.order, first.order);
        assert_eq!(again.groups, first.groups);
    }
}
