use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use rigup_core::catalog::{ComponentDescriptor, StaticCatalog};

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default, rename = "component")]
    components: Vec<ComponentDescriptor>,
}

/// Load a catalog from a TOML file of `[[component]]` tables.
pub fn load_catalog(path: &Path) -> anyhow::Result<StaticCatalog> {
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog {}", path.display()))?;
    let catalog =
        parse_catalog(&s).with_context(|| format!("invalid catalog {}", path.display()))?;
    tracing::debug!(path = %path.display(), components = catalog.len(), "catalog loaded");
    Ok(catalog)
}

pub fn parse_catalog(s: &str) -> anyhow::Result<StaticCatalog> {
    let file: CatalogFile = toml::from_str(s)?;
    Ok(StaticCatalog::from_descriptors(file.components)?)
}
