//! Launcher properties: primary origins plus operator-configured mirrors.

use std::collections::HashMap;
use std::path::Path;

use crate::error::UpdaterError;

// Primary (vendor) origins.
pub const VERSION_MANIFEST_URL: &str =
    "https://launchermeta.mojang.com/mc/game/version_manifest.json";
pub const LIBRARIES_SOURCE: &str = "https://libraries.minecraft.net/";
pub const ASSETS_SOURCE: &str = "https://resources.download.minecraft.net/";

// Property keys. The custom keys are optional mirror origins; a blank value
// is treated the same as an absent one.
pub const KEY_VERSION_MANIFEST_URL: &str = "versionManifestUrl";
pub const KEY_LIBRARIES_SOURCE: &str = "librariesSource";
pub const KEY_ASSETS_SOURCE: &str = "assetsSource";
pub const KEY_CUSTOM_VERSION_MANIFEST_URL: &str = "customVersionManifestUrl";
pub const KEY_CUSTOM_VERSIONS_SOURCE: &str = "customVersionsSource";
pub const KEY_CUSTOM_LIBRARIES_SOURCE: &str = "customLibrariesSource";
pub const KEY_CUSTOM_ASSETS_SOURCE: &str = "customAssetsSource";
pub const KEY_CUSTOM_ASSET_INDEXES_SOURCE: &str = "customAssetIndexesSource";
pub const KEY_CUSTOM_SOURCES_FIRST: &str = "customSourcesFirst";

/// String-keyed configuration view backing the source-list builder.
#[derive(Debug, Clone, Default)]
pub struct Properties {
    values: HashMap<String, String>,
}

impl Properties {
    /// Empty property set. Mostly useful in tests; real callers want
    /// [`Properties::with_defaults`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Property set seeded with the built-in primary origins.
    pub fn with_defaults() -> Self {
        let mut props = Self::new();
        props.set(KEY_VERSION_MANIFEST_URL, VERSION_MANIFEST_URL);
        props.set(KEY_LIBRARIES_SOURCE, LIBRARIES_SOURCE);
        props.set(KEY_ASSETS_SOURCE, ASSETS_SOURCE);
        props
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Trimmed value, with blank/whitespace treated as absent.
    pub fn get_nonblank(&self, key: &str) -> Option<String> {
        self.values
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    /// Required primary-origin value. A missing primary means the source
    /// list for that role would be empty.
    pub fn require(&self, key: &str) -> Result<String, UpdaterError> {
        self.get_nonblank(key).ok_or(UpdaterError::NoSources)
    }

    /// `customSourcesFirst=true` (case-insensitive) flips the primary/custom
    /// ordering; any other value keeps custom sources as fallback.
    pub fn custom_sources_first(&self) -> bool {
        self.get(KEY_CUSTOM_SOURCES_FIRST)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    /// Overlay key/value pairs from a JSON object file on top of the
    /// current set. Used by the CLI for operator overrides.
    pub fn merge_json_file(&mut self, path: &Path) -> Result<(), UpdaterError> {
        let raw = std::fs::read_to_string(path)?;
        let overrides: HashMap<String, String> =
            serde_json::from_str(&raw).map_err(|e| UpdaterError::Decode {
                context: path.display().to_string(),
                message: e.to_string(),
            })?;
        for (key, value) in overrides {
            self.set(key, value);
        }
        Ok(())
    }
}
