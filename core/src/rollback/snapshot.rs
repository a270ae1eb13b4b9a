use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::backend::RestoreToken;
use crate::error::SnapshotError;

/// Pre-install record sufficient to undo one component attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackSnapshot {
    /// Unique per attempt
    pub id: String,
    pub component: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub batch_id: Option<String>,
    #[serde(default)]
    pub attempt: u32,
    /// Filled in once the backend reports what it changed.
    #[serde(default)]
    pub restore_token: RestoreToken,
    #[serde(default)]
    pub restart_services: Vec<String>,
}

impl RollbackSnapshot {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            component: component.into(),
            created_at: Utc::now(),
            batch_id: None,
            attempt: 0,
            restore_token: RestoreToken::empty(),
            restart_services: Vec::new(),
        }
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(id: &str, json: &str) -> Result<Self, SnapshotError> {
        serde_json::from_str(json).map_err(|source| SnapshotError::Corrupt {
            id: id.to_string(),
            source,
        })
    }
}

/// Durable key-value storage for snapshots, keyed by snapshot id.
///
/// Implementations must tolerate concurrent calls for distinct ids.
pub trait SnapshotStore: Send + Sync {
    fn save(&self, snapshot: &RollbackSnapshot) -> Result<(), SnapshotError>;

    fn load(&self, id: &str) -> Result<RollbackSnapshot, SnapshotError>;

    /// Deleting a missing id is not an error.
    fn delete(&self, id: &str) -> Result<(), SnapshotError>;

    /// All persisted snapshots, oldest first. Entries that cannot be
    /// decoded are reported in `unreadable` instead of failing the listing.
    fn list(&self) -> Result<SnapshotListing, SnapshotError>;
}

/// Result of scanning a snapshot store.
#[derive(Debug, Default)]
pub struct SnapshotListing {
    pub snapshots: Vec<RollbackSnapshot>,
    pub unreadable: Vec<UnreadableSnapshot>,
}

impl SnapshotListing {
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty() && self.unreadable.is_empty()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len() + self.unreadable.len()
    }
}

/// A persisted snapshot whose contents could not be read back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadableSnapshot {
    pub id: String,
    pub detail: String,
}

/// One JSON file per snapshot under a directory; survives restarts.
pub struct FileSnapshotStore {
    snapshot_dir: PathBuf,
}

impl FileSnapshotStore {
    pub fn new<P: Into<PathBuf>>(snapshot_dir: P) -> Result<Self, SnapshotError> {
        let snapshot_dir = snapshot_dir.into();
        if !snapshot_dir.exists() {
            fs::create_dir_all(&snapshot_dir)?;
        }
        Ok(Self { snapshot_dir })
    }

    pub fn dir(&self) -> &Path {
        &self.snapshot_dir
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.snapshot_dir.join(format!("snapshot_{id}.json"))
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn save(&self, snapshot: &RollbackSnapshot) -> Result<(), SnapshotError> {
        let json = snapshot.to_json()?;
        let path = self.path_for(&snapshot.id);
        let tmp = path.with_extension("json.tmp");

        // Write-then-rename so a crash never leaves a truncated snapshot.
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn load(&self, id: &str) -> Result<RollbackSnapshot, SnapshotError> {
        let path = self.path_for(id);
        match fs::read_to_string(&path) {
            Ok(json) => RollbackSnapshot::from_json(id, &json),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SnapshotError::NotFound(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, id: &str) -> Result<(), SnapshotError> {
        match fs::remove_file(self.path_for(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self) -> Result<SnapshotListing, SnapshotError> {
        let mut listing = SnapshotListing::default();

        for entry in fs::read_dir(&self.snapshot_dir)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.strip_prefix("snapshot_"))
            else {
                continue;
            };
            let decoded = fs::read_to_string(&path)
                .map_err(SnapshotError::from)
                .and_then(|json| RollbackSnapshot::from_json(id, &json));
            match decoded {
                Ok(snapshot) => listing.snapshots.push(snapshot),
                Err(e) => {
                    warn!(snapshot_id = id, path = %path.display(), error = %e, "skipping unreadable snapshot");
                    listing.unreadable.push(UnreadableSnapshot {
                        id: id.to_string(),
                        detail: e.to_string(),
                    });
                }
            }
        }

        listing
            .snapshots
            .sort_by(|a, b| a.created_at.cmp(&b.created_at));
        listing.unreadable.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(listing)
    }
}

/// Process-local store for tests and dry runs.
#[derive(Default)]
pub struct MemorySnapshotStore {
    snapshots: Mutex<HashMap<String, RollbackSnapshot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, HashMap<String, RollbackSnapshot>> {
        match self.snapshots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn save(&self, snapshot: &RollbackSnapshot) -> Result<(), SnapshotError> {
        self.guard().insert(snapshot.id.clone(), snapshot.clone());
        Ok(())
    }

    fn load(&self, id: &str) -> Result<RollbackSnapshot, SnapshotError> {
        self.guard()
            .get(id)
            .cloned()
            .ok_or_else(|| SnapshotError::NotFound(id.to_string()))
    }

    fn delete(&self, id: &str) -> Result<(), SnapshotError> {
        self.guard().remove(id);
        Ok(())
    }

    fn list(&self) -> Result<SnapshotListing, SnapshotError> {
        let mut snapshots: Vec<_> = self.guard().values().cloned().collect();
        snapshots.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(SnapshotListing {
            snapshots,
            unreadable: Vec::new(),
        })
    }
}
