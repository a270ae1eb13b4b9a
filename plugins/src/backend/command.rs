use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use rigup_core::backend::{InstallBackend, InstallOutcome, InstallRequest, RestoreToken, RollbackOutcome};
use rigup_core::catalog::{CommandDirective, InstallDirective};
use rigup_core::error::ErrorKind;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);
const STDERR_TAIL_BYTES: usize = 512;

/// Restore token of the command backend: paths that did not exist before
/// the attempt and did afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedPaths {
    pub created: Vec<String>,
}

/// Runs `InstallDirective::Command` directives as child processes.
pub struct CommandBackend {
    default_timeout: Duration,
    /// Program used as `<manager> restart <service>` after rollback
    service_manager: Option<String>,
}

impl Default for CommandBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandBackend {
    pub fn new() -> Self {
        let service_manager = which::which("systemctl")
            .ok()
            .map(|p| p.to_string_lossy().to_string());
        Self {
            default_timeout: DEFAULT_TIMEOUT,
            service_manager,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_service_manager(mut self, program: Option<String>) -> Self {
        self.service_manager = program;
        self
    }

    async fn run(&self, component: &str, directive: &CommandDirective) -> InstallOutcome {
        let watched: Vec<PathBuf> = directive.creates.iter().map(|p| expand(p)).collect();
        let preexisting: Vec<bool> = watched.iter().map(|p| p.exists()).collect();

        let mut cmd = Command::new(expand(&directive.program));
        cmd.args(&directive.args)
            .envs(&directive.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let timeout = directive
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout);

        tracing::debug!(
            component,
            program = %directive.program,
            args = ?directive.args,
            timeout_secs = timeout.as_secs(),
            "spawning install command"
        );

        let result = tokio::time::timeout(timeout, cmd.output()).await;

        let created: Vec<String> = watched
            .iter()
            .zip(preexisting)
            .filter(|(path, existed)| !existed && path.exists())
            .map(|(path, _)| path.to_string_lossy().to_string())
            .collect();
        let token = RestoreToken::encode(&CreatedPaths { created }).unwrap_or_default();

        let output = match result {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                let kind = match e.kind() {
                    IoErrorKind::NotFound | IoErrorKind::PermissionDenied => ErrorKind::InstallPermanent,
                    _ => ErrorKind::InstallTransient,
                };
                return InstallOutcome::Failure {
                    kind,
                    detail: format!("failed to spawn '{}': {e}", directive.program),
                    partial: token,
                };
            }
            Err(_) => {
                return InstallOutcome::Failure {
                    kind: ErrorKind::InstallTransient,
                    detail: format!("'{}' timed out after {}s", directive.program, timeout.as_secs()),
                    partial: token,
                };
            }
        };

        if output.status.success() {
            return InstallOutcome::success(token);
        }

        let code = output.status.code();
        let kind = match code {
            Some(c) if directive.transient_exit_codes.contains(&c) => ErrorKind::InstallTransient,
            _ => ErrorKind::InstallPermanent,
        };
        let code_label = code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        let stderr = stderr_tail(&output.stderr);
        let detail = if stderr.is_empty() {
            format!("'{}' exited with {code_label}", directive.program)
        } else {
            format!("'{}' exited with {code_label}: {stderr}", directive.program)
        };

        InstallOutcome::Failure {
            kind,
            detail,
            partial: token,
        }
    }

    async fn restart(&self, service: &str) -> Result<(), String> {
        let Some(manager) = &self.service_manager else {
            return Err(format!("service '{service}' not restarted: no service manager"));
        };
        let status = Command::new(manager)
            .args(["restart", service])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| format!("service '{service}' restart failed: {e}"))?;
        if status.success() {
            Ok(())
        } else {
            Err(format!("service '{service}' restart exited with {status}"))
        }
    }
}

#[async_trait]
impl InstallBackend for CommandBackend {
    fn name(&self) -> &str {
        "command"
    }

    async fn execute(&self, request: InstallRequest<'_>) -> InstallOutcome {
        if request.requires_elevated_privileges {
            tracing::info!(component = request.component, "component requires elevated privileges");
        }

        match request.directive {
            InstallDirective::Command(directive) => self.run(request.component, directive).await,
            InstallDirective::Opaque { .. } => InstallOutcome::permanent(format!(
                "component '{}' has no command directive",
                request.component
            )),
        }
    }

    async fn rollback(
        &self,
        component: &str,
        token: &RestoreToken,
        restart_services: &[String],
    ) -> RollbackOutcome {
        let paths = if token.is_empty() {
            CreatedPaths::default()
        } else {
            match token.decode::<CreatedPaths>() {
                Ok(paths) => paths,
                Err(e) => {
                    return RollbackOutcome::Failed {
                        detail: format!("unreadable restore token: {e}"),
                    }
                }
            }
        };

        let mut residue = remove_created(&paths.created).await;

        for service in restart_services {
            if let Err(e) = self.restart(service).await {
                tracing::warn!(component, service = %service, error = %e, "service restart failed");
                residue.push(e);
            }
        }

        if residue.is_empty() {
            RollbackOutcome::Complete
        } else {
            RollbackOutcome::Partial { residue }
        }
    }
}

/// Remove files first, then directories deepest-first. Returns what is left.
async fn remove_created(created: &[String]) -> Vec<String> {
    let mut files = Vec::new();
    let mut dirs = Vec::new();
    for raw in created {
        let path = PathBuf::from(raw);
        if path.is_dir() {
            dirs.push(path);
        } else {
            files.push(path);
        }
    }
    dirs.sort_by_key(|d| std::cmp::Reverse(d.components().count()));

    let mut residue = Vec::new();
    for file in files {
        if let Err(e) = tokio::fs::remove_file(&file).await {
            if e.kind() != IoErrorKind::NotFound {
                tracing::warn!(path = %file.display(), error = %e, "cannot remove file");
                residue.push(file.to_string_lossy().to_string());
            }
        }
    }
    for dir in dirs {
        if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
            if e.kind() != IoErrorKind::NotFound {
                tracing::warn!(path = %dir.display(), error = %e, "cannot remove directory");
                residue.push(dir.to_string_lossy().to_string());
            }
        }
    }
    residue
}

fn expand(path: &str) -> PathBuf {
    Path::new(shellexpand::tilde(path).as_ref()).to_path_buf()
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let trimmed = text.trim();
    if trimmed.len() <= STDERR_TAIL_BYTES {
        return trimmed.to_string();
    }
    let mut start = trimmed.len() - STDERR_TAIL_BYTES;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &trimmed[start..])
}
