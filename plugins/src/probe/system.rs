use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use rigup_core::error::VerifyError;
use rigup_core::verify::{Probe, ProbeRunner};

const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Checks probes against the local host.
///
/// Platform-store keys are read from a directory-backed store:
/// `<store_root>/<store>/<key>` holds the value of `key`.
pub struct SystemProbeRunner {
    store_root: Option<PathBuf>,
}

impl SystemProbeRunner {
    pub fn new(store_root: Option<PathBuf>) -> Self {
        Self { store_root }
    }

    /// Store root under the rigup data directory.
    pub fn with_default_store() -> Self {
        Self::new(dirs::home_dir().map(|h| h.join(".rigup").join("store")))
    }

    async fn command_output_contains(
        &self,
        command: &str,
        args: &[String],
        expected: &str,
    ) -> Result<bool, VerifyError> {
        let output = Command::new(expand(command))
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(PROBE_TIMEOUT, output).await {
            Ok(result) => result.map_err(|source| VerifyError::Command {
                command: command.to_string(),
                source,
            })?,
            Err(_) => return Ok(false),
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        Ok(stdout.contains(expected) || stderr.contains(expected))
    }

    #[cfg(not(windows))]
    async fn platform_store_key(
        &self,
        store: &str,
        key: &str,
        expected_value: Option<&str>,
    ) -> Result<bool, VerifyError> {
        let root = self
            .store_root
            .as_ref()
            .ok_or(VerifyError::Unsupported("platform_store_key"))?;
        if !is_plain_segment(store) || key.split('/').any(|s| !is_plain_segment(s)) {
            return Err(VerifyError::InvalidParams(format!(
                "store key '{store}:{key}' must not escape the store root"
            )));
        }

        let path = root.join(store).join(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(value) => Ok(match expected_value {
                Some(want) => value.trim() == want,
                None => true,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(VerifyError::Command {
                command: path.display().to_string(),
                source,
            }),
        }
    }

    #[cfg(windows)]
    async fn platform_store_key(
        &self,
        _store: &str,
        _key: &str,
        _expected_value: Option<&str>,
    ) -> Result<bool, VerifyError> {
        Err(VerifyError::Unsupported("platform_store_key"))
    }
}

#[async_trait]
impl ProbeRunner for SystemProbeRunner {
    async fn run(&self, probe: &Probe) -> Result<bool, VerifyError> {
        match probe {
            Probe::FileExists { path } => Ok(expand(path).exists()),
            Probe::CommandExists { command } => Ok(which::which(expand(command)).is_ok()),
            Probe::CommandOutputContains {
                command,
                args,
                expected,
            } => self.command_output_contains(command, args, expected).await,
            Probe::PlatformStoreKey {
                store,
                key,
                expected_value,
            } => {
                self.platform_store_key(store, key, expected_value.as_deref())
                    .await
            }
            Probe::Custom { handler, .. } => Err(VerifyError::UnknownHandler(handler.clone())),
        }
    }
}

fn expand(path: &str) -> PathBuf {
    Path::new(shellexpand::tilde(path).as_ref()).to_path_buf()
}

fn is_plain_segment(segment: &str) -> bool {
    !segment.is_empty() && segment != "." && segment != ".." && !segment.contains('\\')
}
