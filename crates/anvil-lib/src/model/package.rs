//! The modpack descriptor: release tag, target game version, overlay files.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::version::VersionManifest;
use crate::instance::Instance;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    /// Display name; applied to the instance record on update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// The modpack release tag.
    pub version: String,

    /// Target game version id, e.g. `"1.20.1"`.
    pub game_version: String,

    /// Origin of this manifest; null for purely local instances.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_url: Option<String>,

    /// Optional extra primary library source, prepended at plan time ahead
    /// of every configured source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub libraries_url: Option<String>,

    /// Embedded version manifest. May be incomplete; the resolver repairs
    /// old copies whose downloads table is empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_manifest: Option<VersionManifest>,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub features: BTreeSet<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileEntry>,
}

impl PackageManifest {
    /// Apply the manifest's high-level fields to the instance record.
    /// The version label itself is only written after a successful update.
    pub fn apply_to(&self, instance: &mut Instance) {
        if let Some(title) = &self.title {
            instance.title = title.clone();
        }
    }
}

/// One overlay file. Opaque to the core planner; consumed by the overlay
/// installer collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}
