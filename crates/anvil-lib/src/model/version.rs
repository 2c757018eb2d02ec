//! Game-engine version metadata: client jar, libraries, asset index.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The per-version manifest describing everything a launch-ready instance
/// needs to have on disk.
///
/// Maps are ordered so that planning over a structurally equal manifest
/// always enumerates in the same order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionManifest {
    pub id: String,

    /// Key into the asset index directory; absent for the oldest versions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets: Option<String>,

    /// Null for legacy versions that have no assets to fetch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_index: Option<AssetIndexRef>,

    /// Role ("client", "server", ...) to downloadable artifact.
    #[serde(default)]
    pub downloads: BTreeMap<String, Artifact>,

    #[serde(default)]
    pub libraries: Vec<Library>,
}

impl VersionManifest {
    pub fn asset_id(&self) -> &str {
        self.assets.as_deref().unwrap_or("legacy")
    }

    pub fn client_download(&self) -> Option<&Artifact> {
        self.downloads.get("client")
    }
}

/// Pointer to the asset index file for a version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetIndexRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub url: String,
    pub sha1: String,
    #[serde(default)]
    pub size: u64,
}

/// A single downloadable, hash-addressed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub url: String,
    pub sha1: String,
    #[serde(default)]
    pub size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Library {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads: Option<LibraryDownloads>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<Rule>,
    /// OS name to classifier key, e.g. `"linux" -> "natives-linux"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub natives: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extract: Option<ExtractRules>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryDownloads {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<LibraryArtifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifiers: Option<BTreeMap<String, LibraryArtifact>>,
}

/// Library artifacts carry a repository-relative path in addition to the
/// absolute URL; mirrors are rebased onto that path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryArtifact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<OsRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OsRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Vec<String>>,
}

/// Host platform, for library rule evaluation and native classifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsType {
    Windows,
    MacOs,
    Linux,
}

impl OsType {
    pub fn current() -> Self {
        #[cfg(target_os = "windows")]
        return OsType::Windows;

        #[cfg(target_os = "macos")]
        return OsType::MacOs;

        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        return OsType::Linux;
    }

    /// Name used by library rules and natives maps.
    pub fn rule_name(&self) -> &'static str {
        match self {
            OsType::Windows => "windows",
            OsType::MacOs => "osx",
            OsType::Linux => "linux",
        }
    }
}

impl Library {
    /// Evaluate allow/disallow rules against the given platform. The last
    /// matching rule wins; no rules means allowed.
    pub fn applies_to(&self, os: OsType) -> bool {
        if self.rules.is_empty() {
            return true;
        }
        let mut allowed = false;
        for rule in &self.rules {
            let matches = rule
                .os
                .as_ref()
                .and_then(|o| o.name.as_deref())
                .map(|name| name == os.rule_name())
                .unwrap_or(true);
            if matches {
                allowed = rule.action == "allow";
            }
        }
        allowed
    }

    /// The platform-applicable downloadable artifacts: the main artifact
    /// plus the native classifier for this OS, when present.
    pub fn all_artifacts(&self, os: OsType) -> Vec<&LibraryArtifact> {
        let mut out = Vec::new();
        if !self.applies_to(os) {
            return out;
        }
        if let Some(downloads) = &self.downloads {
            if let Some(artifact) = &downloads.artifact {
                out.push(artifact);
            }
            if let Some(native) = self.native_artifact(os) {
                out.push(native);
            }
        }
        out
    }

    /// Every downloadable artifact regardless of platform rules: the main
    /// artifact plus all classifiers. A mirror serves every platform.
    pub fn every_artifact(&self) -> Vec<&LibraryArtifact> {
        let mut out = Vec::new();
        if let Some(downloads) = &self.downloads {
            if let Some(artifact) = &downloads.artifact {
                out.push(artifact);
            }
            if let Some(classifiers) = &downloads.classifiers {
                out.extend(classifiers.values());
            }
        }
        out
    }

    /// The native classifier artifact for this OS, if the library ships one.
    pub fn native_artifact(&self, os: OsType) -> Option<&LibraryArtifact> {
        let classifier = self.natives.as_ref()?.get(os.rule_name())?;
        // Some older manifests template the architecture into the key.
        let key = classifier.replace("${arch}", "64");
        self.downloads
            .as_ref()?
            .classifiers
            .as_ref()?
            .get(&key)
            .or_else(|| {
                self.downloads
                    .as_ref()
                    .and_then(|d| d.classifiers.as_ref())
                    .and_then(|c| c.get(classifier))
            })
    }
}
