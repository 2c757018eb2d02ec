//! Instance records, launcher directory layout, and record persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::UpdaterError;

/// A locally managed game instance.
///
/// `local` flips to true the first time the package manifest is read; the
/// remaining lifecycle fields are only committed together after a
/// successful update.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub installed: bool,
    #[serde(default)]
    pub update_pending: bool,
    #[serde(default)]
    pub local: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_url: Option<String>,

    /// Instance root directory; derived from where the record was loaded,
    /// never serialized.
    #[serde(skip)]
    pub dir: PathBuf,
}

impl Instance {
    pub fn new(name: impl Into<String>, dir: PathBuf) -> Self {
        let name = name.into();
        Self {
            title: name.clone(),
            name,
            version: None,
            installed: false,
            update_pending: false,
            local: false,
            manifest_url: None,
            dir,
        }
    }

    /// Directory holding the game content itself.
    pub fn content_dir(&self) -> PathBuf {
        self.dir.join("content")
    }

    /// Where the resolved version manifest is written.
    pub fn version_path(&self) -> PathBuf {
        self.content_dir().join("version.json")
    }

    /// Local copy of the package manifest, for offline runs.
    pub fn manifest_path(&self) -> PathBuf {
        self.content_dir().join("manifest.json")
    }

    pub fn record_path(&self) -> PathBuf {
        self.dir.join("instance.json")
    }
}

/// Shared on-disk pools under the launcher root.
#[derive(Debug, Clone)]
pub struct LauncherDirs {
    root: PathBuf,
}

impl LauncherDirs {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn libraries_dir(&self) -> PathBuf {
        self.root.join("libraries")
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.root.join("assets")
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.root.join("versions")
    }

    /// Shared client jar for a version.
    pub fn jar_path(&self, version_id: &str) -> PathBuf {
        self.versions_dir().join(format!("{}-client.jar", version_id))
    }

    /// Per-version extraction target for native libraries.
    pub fn natives_dir(&self, version_id: &str) -> PathBuf {
        self.root.join("natives").join(version_id)
    }
}

/// Persistence collaborator for instance records. The launcher proper keeps
/// a generic key/object store; the updater only needs commit.
pub trait ObjectStore: Send + Sync {
    fn commit(&self, instance: &Instance) -> Result<(), UpdaterError>;

    /// Commit, logging instead of failing. Used at points where persistence
    /// trouble should not abort the update.
    fn commit_and_forget(&self, instance: &Instance) {
        if let Err(err) = self.commit(instance) {
            log::warn!("failed to commit instance '{}': {}", instance.name, err);
        }
    }
}

/// Pretty-JSON file store writing `instance.json` inside the instance
/// directory, replaced atomically.
pub struct JsonFileStore;

impl JsonFileStore {
    pub fn load(dir: &Path) -> Result<Instance, UpdaterError> {
        let record = dir.join("instance.json");
        let raw = std::fs::read_to_string(&record)?;
        let mut instance: Instance =
            serde_json::from_str(&raw).map_err(|e| UpdaterError::Decode {
                context: record.display().to_string(),
                message: e.to_string(),
            })?;
        instance.dir = dir.to_path_buf();
        Ok(instance)
    }
}

impl ObjectStore for JsonFileStore {
    fn commit(&self, instance: &Instance) -> Result<(), UpdaterError> {
        let path = instance.record_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        write_json_atomic(&path, instance)
    }
}

/// Serialize a value as pretty JSON and replace `path` atomically via a
/// sibling temp file.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), UpdaterError> {
    let body = serde_json::to_vec_pretty(value).map_err(|e| UpdaterError::Decode {
        context: path.display().to_string(),
        message: e.to_string(),
    })?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, body)?;
    match std::fs::rename(&tmp, path) {
        Ok(()) => Ok(()),
        Err(err) => {
            let _ = std::fs::remove_file(&tmp);
            Err(err.into())
        }
    }
}
