use std::fmt;

use serde::{Deserialize, Serialize};

/// A stateless post-install check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Probe {
    FileExists {
        path: String,
    },
    CommandOutputContains {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        expected: String,
    },
    CommandExists {
        command: String,
    },
    /// A key in a platform configuration store (registry hive, defaults
    /// domain, dconf path).
    PlatformStoreKey {
        store: String,
        key: String,
        #[serde(default)]
        expected_value: Option<String>,
    },
    /// Dispatched to a handler registered under `handler` on the verifier.
    Custom {
        handler: String,
        #[serde(default)]
        params: serde_json::Value,
    },
}

impl Probe {
    pub fn file_exists(path: impl Into<String>) -> Self {
        Self::FileExists { path: path.into() }
    }

    pub fn command_exists(command: impl Into<String>) -> Self {
        Self::CommandExists {
            command: command.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::FileExists { .. } => "file_exists",
            Self::CommandOutputContains { .. } => "command_output_contains",
            Self::CommandExists { .. } => "command_exists",
            Self::PlatformStoreKey { .. } => "platform_store_key",
            Self::Custom { .. } => "custom",
        }
    }
}

impl fmt::Display for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FileExists { path } => write!(f, "file_exists({path})"),
            Self::CommandOutputContains {
                command, expected, ..
            } => write!(f, "command_output_contains({command} ~ {expected:?})"),
            Self::CommandExists { command } => write!(f, "command_exists({command})"),
            Self::PlatformStoreKey { store, key, .. } => {
                write!(f, "platform_store_key({store}:{key})")
            }
            Self::Custom { handler, .. } => write!(f, "custom({handler})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_representation() {
        let probe: Probe = serde_json::from_value(serde_json::json!({
            "kind": "command_output_contains",
            "command": "git",
            "args": ["--version"],
            "expected": "git version"
        }))
        .unwrap();
        assert_eq!(probe.kind(), "command_output_contains");
        assert_eq!(
            probe.to_string(),
            "command_output_contains(git ~ \"git version\")"
        );
    }
}
