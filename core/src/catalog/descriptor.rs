use std::collections::BTreeMap;

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::error::ResolutionError;
use crate::verify::Probe;

use super::version::VersionRange;

/// Immutable description of an installable component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDescriptor {
    pub name: String,

    #[serde(default)]
    pub version: Option<Version>,

    /// Declared dependencies, in declaration order.
    #[serde(default)]
    pub dependencies: Vec<String>,

    #[serde(default)]
    pub conflicts: Vec<String>,

    /// Components must opt in to running beside same-level siblings.
    #[serde(default)]
    pub supports_parallel_install: bool,

    #[serde(default)]
    pub requires_elevated_privileges: bool,

    #[serde(default)]
    pub verification_probes: Vec<Probe>,

    #[serde(default)]
    pub install_directive: InstallDirective,

    /// Version constraints against shared capabilities (runtimes, ports, ABIs).
    #[serde(default)]
    pub capabilities: Vec<CapabilityConstraint>,

    /// Services to restart after this component is rolled back.
    #[serde(default)]
    pub restart_services: Vec<String>,
}

impl ComponentDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            dependencies: Vec::new(),
            conflicts: Vec::new(),
            supports_parallel_install: false,
            requires_elevated_privileges: false,
            verification_probes: Vec::new(),
            install_directive: InstallDirective::default(),
            capabilities: Vec::new(),
            restart_services: Vec::new(),
        }
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.extend(deps.into_iter().map(Into::into));
        self
    }

    pub fn with_conflicts<I, S>(mut self, conflicts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.conflicts.extend(conflicts.into_iter().map(Into::into));
        self
    }

    pub fn parallel(mut self, supported: bool) -> Self {
        self.supports_parallel_install = supported;
        self
    }

    pub fn with_probe(mut self, probe: Probe) -> Self {
        self.verification_probes.push(probe);
        self
    }

    pub fn with_capability(mut self, constraint: CapabilityConstraint) -> Self {
        self.capabilities.push(constraint);
        self
    }

    pub fn with_directive(mut self, directive: InstallDirective) -> Self {
        self.install_directive = directive;
        self
    }

    pub fn depends_on(&self, name: &str) -> bool {
        self.dependencies.iter().any(|d| d == name)
    }

    pub fn declares_conflict_with(&self, name: &str) -> bool {
        self.conflicts.iter().any(|c| c == name)
    }

    /// Check the structural invariants that do not need the rest of the catalog.
    pub fn validate(&self) -> Result<(), ResolutionError> {
        let invalid = |reason: &str| ResolutionError::InvalidDescriptor {
            name: self.name.clone(),
            reason: reason.to_string(),
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty"));
        }
        if self.depends_on(&self.name) {
            return Err(invalid("component lists itself as a dependency"));
        }
        if self.declares_conflict_with(&self.name) {
            return Err(invalid("component lists itself as a conflict"));
        }
        if let Some(both) = self.dependencies.iter().find(|d| self.declares_conflict_with(d)) {
            return Err(invalid(&format!(
                "'{both}' is declared as both dependency and conflict"
            )));
        }
        Ok(())
    }
}

/// Backend-specific instruction for installing a component.
///
/// The orchestrator never interprets this; it is handed to the install
/// backend as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InstallDirective {
    Command(CommandDirective),
    Opaque {
        #[serde(default)]
        payload: serde_json::Value,
    },
}

impl Default for InstallDirective {
    fn default() -> Self {
        Self::Opaque {
            payload: serde_json::Value::Null,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CommandDirective {
    pub program: String,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Paths the command is expected to create; tracked for rollback.
    #[serde(default)]
    pub creates: Vec<String>,

    /// Exit codes that indicate a retryable failure.
    #[serde(default)]
    pub transient_exit_codes: Vec<i32>,

    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Enforcement {
    #[default]
    Strict,
    Advisory,
}

/// A version requirement against a capability several components may share.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityConstraint {
    pub capability: String,
    pub range: VersionRange,
    #[serde(default)]
    pub enforcement: Enforcement,
}

impl CapabilityConstraint {
    pub fn strict(capability: impl Into<String>, range: VersionRange) -> Self {
        Self {
            capability: capability.into(),
            range,
            enforcement: Enforcement::Strict,
        }
    }

    pub fn advisory(capability: impl Into<String>, range: VersionRange) -> Self {
        Self {
            capability: capability.into(),
            range,
            enforcement: Enforcement::Advisory,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_self_dependency() {
        let desc = ComponentDescriptor::new("app").with_dependencies(["app"]);
        assert!(matches!(
            desc.validate(),
            Err(ResolutionError::InvalidDescriptor { .. })
        ));
    }

    #[test]
    fn rejects_self_conflict() {
        let desc = ComponentDescriptor::new("app").with_conflicts(["app"]);
        assert!(desc.validate().is_err());
    }

    #[test]
    fn deserializes_with_defaults() {
        let desc: ComponentDescriptor = toml::from_str(
            r#"
            name = "git"
            dependencies = ["zlib"]

            [install_directive]
            type = "command"
            program = "/usr/bin/true"
            creates = ["/opt/git"]
            "#,
        )
        .unwrap();

        assert_eq!(desc.dependencies, vec!["zlib".to_string()]);
        assert!(!desc.supports_parallel_install);
        assert!(desc.verification_probes.is_empty());
        match desc.install_directive {
            InstallDirective::Command(cmd) => assert_eq!(cmd.creates, vec!["/opt/git"]),
            other => panic!("unexpected directive: {other:?}"),
        }
    }
}
