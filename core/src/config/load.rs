use std::path::{Path, PathBuf};

use anyhow::Context;

use super::types::AppConfig;

/// Get the default rigup data directory: ~/.rigup
pub fn get_rigup_data_dir() -> anyhow::Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(home.join(".rigup"))
}

/// Snapshot directory from config, falling back to ~/.rigup/snapshots.
pub fn snapshot_dir(cfg: &AppConfig) -> anyhow::Result<PathBuf> {
    match cfg.snapshots.directory.as_deref().map(str::trim) {
        Some(dir) if !dir.is_empty() => Ok(PathBuf::from(dir)),
        _ => Ok(get_rigup_data_dir()?.join("snapshots")),
    }
}

pub fn load_from_path(path: &Path) -> anyhow::Result<AppConfig> {
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    toml::from_str::<AppConfig>(&s).with_context(|| format!("invalid config {}", path.display()))
}

pub fn load_default() -> anyhow::Result<AppConfig> {
    // Priority 1: ~/.rigup/config.toml
    let rigup_dir = get_rigup_data_dir()?;
    let user_config = rigup_dir.join("config.toml");

    // Priority 2: ./rigup.toml
    let local_config = Path::new("rigup.toml");

    let mut cfg = if user_config.exists() {
        load_from_path(&user_config)?
    } else if local_config.exists() {
        load_from_path(local_config)?
    } else {
        AppConfig::default()
    };

    if cfg
        .logging
        .directory
        .as_deref()
        .map(|s| s.trim().is_empty())
        .unwrap_or(true)
    {
        cfg.logging.directory = Some(rigup_dir.join("logs").to_string_lossy().to_string());
    }

    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok())?;
    Ok(cfg)
}

/// Environment variable overrides (highest priority).
pub fn apply_env_overrides<F>(cfg: &mut AppConfig, lookup: F) -> anyhow::Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("RIGUP_MAX_PARALLEL") {
        cfg.executor.max_parallel = v
            .trim()
            .parse()
            .with_context(|| format!("RIGUP_MAX_PARALLEL must be a number, got '{v}'"))?;
    }
    if let Some(v) = get("RIGUP_MAX_RETRIES") {
        cfg.executor.max_retries = v
            .trim()
            .parse()
            .with_context(|| format!("RIGUP_MAX_RETRIES must be a number, got '{v}'"))?;
    }
    if let Some(v) = get("RIGUP_SNAPSHOT_DIR") {
        cfg.snapshots.directory = Some(v);
    }
    if let Some(v) = get("RIGUP_LOG_LEVEL") {
        cfg.logging.level = v;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let mut cfg = AppConfig::default();
        apply_env_overrides(
            &mut cfg,
            env(&[
                ("RIGUP_MAX_PARALLEL", "2"),
                ("RIGUP_MAX_RETRIES", " 5 "),
                ("RIGUP_SNAPSHOT_DIR", "/tmp/snaps"),
                ("RIGUP_LOG_LEVEL", ""),
            ]),
        )
        .unwrap();

        assert_eq!(cfg.executor.max_parallel, 2);
        assert_eq!(cfg.executor.max_retries, 5);
        assert_eq!(cfg.snapshots.directory.as_deref(), Some("/tmp/snaps"));
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(snapshot_dir(&cfg).unwrap(), PathBuf::from("/tmp/snaps"));
    }

    #[test]
    fn bad_numeric_override_is_an_error() {
        let mut cfg = AppConfig::default();
        let err = apply_env_overrides(&mut cfg, env(&[("RIGUP_MAX_RETRIES", "many")])).unwrap_err();
        assert!(err.to_string().contains("RIGUP_MAX_RETRIES"));
    }

    #[test]
    fn load_from_path_reads_toml() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("rigup.toml");
        std::fs::write(&path, "[executor]\nmax_parallel = 3\n").unwrap();

        let cfg = load_from_path(&path).unwrap();
        assert_eq!(cfg.executor.max_parallel, 3);
    }
}
