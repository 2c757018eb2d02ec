//! Version-manifest resolution: embedded copy, remote fallback, and the
//! repair path for old embedded manifests that predate the downloads table.

use std::path::Path;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::config::{
    Properties, KEY_CUSTOM_VERSIONS_SOURCE, KEY_CUSTOM_VERSION_MANIFEST_URL,
    KEY_VERSION_MANIFEST_URL,
};
use crate::error::UpdaterError;
use crate::http::HttpRequest;
use crate::instance::write_json_atomic;
use crate::model::package::PackageManifest;
use crate::model::version::VersionManifest;
use crate::sources::{as_base, source_list, with_suffix};

/// Index of all published game versions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseList {
    #[serde(default)]
    pub versions: Vec<ReleaseEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseEntry {
    pub id: String,
    pub url: String,
}

impl ReleaseList {
    pub fn find(&self, id: &str) -> Option<&ReleaseEntry> {
        self.versions.iter().find(|v| v.id == id)
    }
}

/// Resolve the version manifest for a package manifest and write the result
/// to `version_path` as pretty JSON.
///
/// Old package manifests embed a version manifest without the downloads
/// table. Those are repaired by fetching a fresh remote copy and taking its
/// `downloads` and `assetIndex` while keeping everything else, most
/// importantly the embedded library list, which may legitimately differ
/// from the vendor's.
pub async fn resolve(
    client: &Client,
    props: &Properties,
    manifest: &PackageManifest,
    version_path: &Path,
    cancel: &CancelToken,
) -> Result<VersionManifest, UpdaterError> {
    let mut version = match &manifest.version_manifest {
        Some(embedded) => embedded.clone(),
        None => fetch_remote_version(client, props, &manifest.game_version, cancel).await?,
    };

    if version.downloads.is_empty() {
        let fresh = fetch_remote_version(client, props, &manifest.game_version, cancel).await?;
        repair(&mut version, fresh);
    }

    if let Some(parent) = version_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    write_json_atomic(version_path, &version)?;
    Ok(version)
}

/// Copy the downloads table and asset index from a fresh remote manifest
/// into an incomplete one, leaving the library list untouched.
pub(crate) fn repair(version: &mut VersionManifest, fresh: VersionManifest) {
    version.downloads = fresh.downloads;
    version.asset_index = fresh.asset_index;
}

/// Walk the release list to the per-version JSON for `game_version`.
async fn fetch_remote_version(
    client: &Client,
    props: &Properties,
    game_version: &str,
    cancel: &CancelToken,
) -> Result<VersionManifest, UpdaterError> {
    let release_sources = source_list(
        props,
        &props.require(KEY_VERSION_MANIFEST_URL)?,
        KEY_CUSTOM_VERSION_MANIFEST_URL,
        as_base,
    );
    let releases: ReleaseList = fetch_json_fallback(client, &release_sources, cancel).await?;

    let entry = releases
        .find(game_version)
        .ok_or_else(|| UpdaterError::ManifestNotFound {
            game_version: game_version.to_string(),
        })?;

    let version_sources = source_list(
        props,
        &entry.url,
        KEY_CUSTOM_VERSIONS_SOURCE,
        with_suffix(&format!("{game_version}.json")),
    );
    fetch_json_fallback(client, &version_sources, cancel).await
}

/// Try each source in order; the first success wins and the last error is
/// propagated when all fail. Cancellation is never swallowed into fallback.
async fn fetch_json_fallback<T: DeserializeOwned>(
    client: &Client,
    sources: &[String],
    cancel: &CancelToken,
) -> Result<T, UpdaterError> {
    let mut last_err = None;
    for source in sources {
        match HttpRequest::get(client, source)
            .with_cancel(cancel.clone())
            .expect_status(200)
            .json::<T>()
            .await
        {
            Ok(value) => return Ok(value),
            Err(err) if err.is_cancelled() => return Err(err),
            Err(err) => {
                log::warn!("fetch from {source} failed ({err}), trying next source");
                last_err = Some(err);
            }
        }
    }
    Err(last_err.unwrap_or(UpdaterError::NoSources))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::default_client;
    use crate::testutil::TestServer;
    use std::collections::BTreeMap;

    use crate::model::version::{Artifact, Library};

    fn package(game_version: &str, embedded: Option<VersionManifest>) -> PackageManifest {
        serde_json::from_value(serde_json::json!({
            "version": "3.0",
            "gameVersion": game_version,
        }))
        .map(|mut m: PackageManifest| {
            m.version_manifest = embedded;
            m
        })
        .unwrap()
    }

    fn embedded_manifest(downloads_empty: bool) -> VersionManifest {
        let mut downloads = BTreeMap::new();
        if !downloads_empty {
            downloads.insert(
                "client".to_string(),
                Artifact {
                    url: "https://launcher.mojang.com/client.jar".to_string(),
                    sha1: "1ab8bae4511fe77dd464ca455a15a2c42dac53de".to_string(),
                    size: 16,
                },
            );
        }
        VersionManifest {
            id: "1.20.1".to_string(),
            assets: None,
            asset_index: None,
            downloads,
            libraries: vec![Library {
                name: "com.example:patched:9.9".to_string(),
                downloads: None,
                rules: Vec::new(),
                natives: None,
                extract: None,
            }],
        }
    }

    fn remote_version_json() -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "id": "1.20.1",
            "assets": "5",
            "assetIndex": {
                "id": "5",
                "url": "https://piston-meta.mojang.com/5.json",
                "sha1": "0b5a6c4f12d4fcf812fdde022de76073ebc10d9b",
                "size": 64
            },
            "downloads": {
                "client": {
                    "url": "https://launcher.mojang.com/client.jar",
                    "sha1": "1ab8bae4511fe77dd464ca455a15a2c42dac53de",
                    "size": 16
                }
            },
            "libraries": [{"name": "org.lwjgl:lwjgl:3.3.1"}]
        }))
        .unwrap()
    }

    fn release_list_json(version_url: &str) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "versions": [
                {"id": "1.19.4", "url": "https://unused.example/1.19.4.json"},
                {"id": "1.20.1", "url": version_url}
            ]
        }))
        .unwrap()
    }

    fn props_with_manifest_url(url: String) -> Properties {
        let mut props = Properties::with_defaults();
        props.set(KEY_VERSION_MANIFEST_URL, url);
        props
    }

    #[test]
    fn repair_replaces_downloads_and_keeps_libraries() {
        let mut version = embedded_manifest(true);
        let fresh: VersionManifest = serde_json::from_slice(&remote_version_json()).unwrap();

        repair(&mut version, fresh);

        assert!(version.downloads.contains_key("client"));
        assert!(version.asset_index.is_some());
        assert_eq!(version.libraries.len(), 1);
        assert_eq!(version.libraries[0].name, "com.example:patched:9.9");
    }

    #[tokio::test]
    async fn embedded_complete_manifest_needs_no_network() {
        let server = TestServer::start(Vec::new()).await;
        let dir = tempfile::tempdir().unwrap();
        let version_path = dir.path().join("content").join("version.json");

        let props = props_with_manifest_url(server.url("version_manifest.json"));
        let manifest = package("1.20.1", Some(embedded_manifest(false)));
        let client = default_client().unwrap();

        let resolved = resolve(
            &client,
            &props,
            &manifest,
            &version_path,
            &CancelToken::never(),
        )
        .await
        .unwrap();

        assert_eq!(server.hits(), 0);
        assert!(resolved.downloads.contains_key("client"));
        assert!(version_path.exists());
    }

    #[tokio::test]
    async fn missing_embedded_manifest_is_fetched_remotely() {
        // Connection 1 serves the release list, connection 2 the version JSON.
        let server = TestServer::start(Vec::new()).await;
        server.push(200, release_list_json(&server.url("v1/packages/1.20.1.json")));
        server.push(200, remote_version_json());

        let dir = tempfile::tempdir().unwrap();
        let version_path = dir.path().join("version.json");
        let props = props_with_manifest_url(server.url("version_manifest.json"));
        let manifest = package("1.20.1", None);
        let client = default_client().unwrap();

        let resolved = resolve(
            &client,
            &props,
            &manifest,
            &version_path,
            &CancelToken::never(),
        )
        .await
        .unwrap();

        assert_eq!(resolved.id, "1.20.1");
        assert!(resolved.downloads.contains_key("client"));

        let written: VersionManifest =
            serde_json::from_slice(&std::fs::read(&version_path).unwrap()).unwrap();
        assert_eq!(written.id, "1.20.1");
    }

    #[tokio::test]
    async fn empty_downloads_triggers_repair_and_preserves_libraries() {
        let server = TestServer::start(Vec::new()).await;
        server.push(200, release_list_json(&server.url("v1/packages/1.20.1.json")));
        server.push(200, remote_version_json());
        let props = props_with_manifest_url(server.url("version_manifest.json"));

        let dir = tempfile::tempdir().unwrap();
        let version_path = dir.path().join("version.json");
        let manifest = package("1.20.1", Some(embedded_manifest(true)));
        let client = default_client().unwrap();

        let resolved = resolve(
            &client,
            &props,
            &manifest,
            &version_path,
            &CancelToken::never(),
        )
        .await
        .unwrap();

        assert!(resolved.downloads.contains_key("client"));
        assert!(resolved.asset_index.is_some());
        assert_eq!(resolved.libraries.len(), 1);
        assert_eq!(resolved.libraries[0].name, "com.example:patched:9.9");
    }

    #[tokio::test]
    async fn unknown_game_version_is_reported() {
        let server = TestServer::start(vec![(
            200,
            release_list_json("https://unused.example/1.20.1.json"),
        )])
        .await;
        let props = props_with_manifest_url(server.url("version_manifest.json"));
        let dir = tempfile::tempdir().unwrap();
        let manifest = package("1.99.0", None);
        let client = default_client().unwrap();

        let err = resolve(
            &client,
            &props,
            &manifest,
            &dir.path().join("version.json"),
            &CancelToken::never(),
        )
        .await
        .unwrap_err();

        match err {
            UpdaterError::ManifestNotFound { game_version } => {
                assert_eq!(game_version, "1.99.0")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn last_error_is_propagated_when_all_sources_fail() {
        let server = TestServer::start(vec![(503, b"down".to_vec())]).await;
        let props = props_with_manifest_url(server.url("version_manifest.json"));
        let dir = tempfile::tempdir().unwrap();
        let manifest = package("1.20.1", None);
        let client = default_client().unwrap();

        let err = resolve(
            &client,
            &props,
            &manifest,
            &dir.path().join("version.json"),
            &CancelToken::never(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, UpdaterError::HttpStatus { status: 503, .. }));
    }
}
