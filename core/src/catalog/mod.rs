//! Read-only component catalog consumed by the orchestrator.
//!
//! The catalog is always injected per call; nothing in the orchestrator
//! keeps catalog state of its own.

mod descriptor;
mod version;

pub use descriptor::{
    CapabilityConstraint, CommandDirective, ComponentDescriptor, Enforcement, InstallDirective,
};
pub use version::{VersionRange, VersionRangeError};

use std::collections::{BTreeSet, HashMap};

use crate::error::ResolutionError;

/// Lookup interface over component descriptors.
pub trait Catalog: Send + Sync {
    fn get(&self, name: &str) -> Option<&ComponentDescriptor>;

    fn all_names(&self) -> BTreeSet<String>;

    fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

/// In-memory catalog built from a fixed list of descriptors.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    components: HashMap<String, ComponentDescriptor>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_descriptors<I>(descriptors: I) -> Result<Self, ResolutionError>
    where
        I: IntoIterator<Item = ComponentDescriptor>,
    {
        let mut catalog = Self::new();
        for desc in descriptors {
            catalog.insert(desc)?;
        }
        Ok(catalog)
    }

    pub fn insert(&mut self, descriptor: ComponentDescriptor) -> Result<(), ResolutionError> {
        descriptor.validate()?;
        if self.components.contains_key(&descriptor.name) {
            return Err(ResolutionError::InvalidDescriptor {
                name: descriptor.name,
                reason: "duplicate component name".to_string(),
            });
        }
        self.components.insert(descriptor.name.clone(), descriptor);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl Catalog for StaticCatalog {
    fn get(&self, name: &str) -> Option<&ComponentDescriptor> {
        self.components.get(name)
    }

    fn all_names(&self) -> BTreeSet<String> {
        self.components.keys().cloned().collect()
    }
}
