//! Batch mirror builder: walks the same dependency graph as the updater and
//! populates a local mirror tree from the primary origins.
//!
//! Layout under the output directory:
//!
//! ```text
//! version_manifest.json
//! versions/<id>.json
//! versions/<id>-client.jar
//! libraries/<artifact path>
//! indexes/<asset id>.json
//! assets/<hash prefix>/<hash>
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;

use crate::cancel::CancelToken;
use crate::config::{Properties, KEY_ASSETS_SOURCE, KEY_VERSION_MANIFEST_URL};
use crate::download::{DownloadProgress, Downloader};
use crate::error::UpdaterError;
use crate::http::{default_client, HttpRequest};
use crate::model::assets::AssetsIndex;
use crate::model::version::VersionManifest;
use crate::plan::{DownloadTask, TaskKind};
use crate::resolver::ReleaseList;

const MIRROR_CONCURRENCY: usize = 8;
const MIRROR_DELAY: Duration = Duration::from_millis(50);

/// Owns the worker pool and the dedup set for one mirror run; nothing here
/// is process-global.
pub struct MirrorContext {
    client: Client,
    props: Properties,
    output: PathBuf,
    downloader: Downloader,
    cancel: CancelToken,
}

/// Outcome of a mirror run. Individual artifact failures do not abort the
/// run; they are counted here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorReport {
    pub planned: usize,
    pub failed: usize,
    pub missing_versions: Vec<String>,
}

impl MirrorContext {
    pub fn new(props: Properties, output: PathBuf) -> Result<Self, UpdaterError> {
        let client = default_client()?;
        let downloader =
            Downloader::new(client.clone(), MIRROR_CONCURRENCY).with_delay(MIRROR_DELAY);
        Ok(Self {
            client,
            props,
            output,
            downloader,
            cancel: CancelToken::never(),
        })
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.downloader = Downloader::new(self.client.clone(), MIRROR_CONCURRENCY)
            .with_delay(MIRROR_DELAY)
            .with_cancel(cancel.clone());
        self.cancel = cancel;
        self
    }

    /// Override the pool size and inter-request delay.
    pub fn with_pool(mut self, concurrency: usize, delay: Duration) -> Self {
        self.downloader = Downloader::new(self.client.clone(), concurrency)
            .with_delay(delay)
            .with_cancel(self.cancel.clone());
        self
    }

    pub fn progress(&self) -> Arc<DownloadProgress> {
        self.downloader.progress()
    }

    /// Mirror the release index plus every artifact reachable from the
    /// given version ids. Failure to fetch the release index is fatal;
    /// unknown version ids are reported and skipped.
    pub async fn mirror_versions(
        &self,
        ids: &[String],
    ) -> Result<MirrorReport, UpdaterError> {
        let manifest_url = self.props.require(KEY_VERSION_MANIFEST_URL)?;
        let releases: ReleaseList = HttpRequest::get(&self.client, &manifest_url)
            .with_cancel(self.cancel.clone())
            .expect_status(200)
            .json()
            .await?;

        let mut tasks = vec![DownloadTask {
            kind: TaskKind::Meta,
            sources: vec![manifest_url],
            target: self.output.join("version_manifest.json"),
            expected_hash: None,
            expected_size: None,
        }];
        let mut missing = Vec::new();

        for id in ids {
            let Some(entry) = releases.find(id) else {
                log::warn!("version not found in release list: {id}");
                missing.push(id.clone());
                continue;
            };
            log::info!("planning mirror of version {id}");

            let version: VersionManifest = HttpRequest::get(&self.client, &entry.url)
                .with_cancel(self.cancel.clone())
                .expect_status(200)
                .json()
                .await?;

            tasks.push(DownloadTask {
                kind: TaskKind::Meta,
                sources: vec![entry.url.clone()],
                target: self.output.join("versions").join(format!("{id}.json")),
                expected_hash: None,
                expected_size: None,
            });
            tasks.extend(self.plan_version(&version).await?);
        }

        let planned = tasks.len();
        let failed = self.downloader.run_lenient(tasks).await?;
        log::info!(
            "mirror complete: {} of {planned} files, {} version(s) unknown",
            planned - failed,
            missing.len()
        );
        Ok(MirrorReport {
            planned,
            failed,
            missing_versions: missing,
        })
    }

    async fn plan_version(
        &self,
        version: &VersionManifest,
    ) -> Result<Vec<DownloadTask>, UpdaterError> {
        let mut tasks = Vec::new();

        match version.client_download() {
            Some(client_jar) => tasks.push(DownloadTask {
                kind: TaskKind::Jar,
                sources: vec![client_jar.url.clone()],
                target: self
                    .output
                    .join("versions")
                    .join(format!("{}-client.jar", version.id)),
                expected_hash: Some(client_jar.sha1.clone()),
                expected_size: Some(client_jar.size),
            }),
            None => log::warn!("no client download for version {}", version.id),
        }

        for library in &version.libraries {
            for artifact in library.every_artifact() {
                let (Some(path), Some(url)) = (&artifact.path, &artifact.url) else {
                    continue;
                };
                tasks.push(DownloadTask {
                    kind: TaskKind::Library,
                    sources: vec![url.clone()],
                    target: self.output.join("libraries").join(path),
                    expected_hash: artifact.sha1.clone(),
                    expected_size: artifact.size,
                });
            }
        }

        if let Some(index_ref) = &version.asset_index {
            tasks.push(DownloadTask {
                kind: TaskKind::Index,
                sources: vec![index_ref.url.clone()],
                target: self
                    .output
                    .join("indexes")
                    .join(format!("{}.json", version.asset_id())),
                expected_hash: Some(index_ref.sha1.clone()),
                expected_size: Some(index_ref.size),
            });

            // The index body drives the asset enumeration.
            let index: AssetsIndex = HttpRequest::get(&self.client, &index_ref.url)
                .with_cancel(self.cancel.clone())
                .expect_status(200)
                .json()
                .await?;
            let assets_base = self.props.require(KEY_ASSETS_SOURCE)?;
            for (name, asset) in &index.objects {
                let Some(path) = asset.object_path() else {
                    log::warn!("asset '{name}' has an unusable hash, skipping");
                    continue;
                };
                tasks.push(DownloadTask {
                    kind: TaskKind::Asset,
                    sources: vec![format!("{assets_base}{path}")],
                    target: self.output.join("assets").join(&path),
                    expected_hash: Some(asset.hash.clone()),
                    expected_size: Some(asset.size),
                });
            }
        } else {
            log::info!("no asset index for version {}", version.id);
        }

        Ok(tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::TestServer;

    const JAR_BODY: &[u8] = b"client-jar-bytes";
    const JAR_SHA1: &str = "1ab8bae4511fe77dd464ca455a15a2c42dac53de";
    const LIB_BODY: &[u8] = b"library-bytes";
    const LIB_SHA1: &str = "6ac178e3637abb0b8e09c8eca5214c79549c5528";
    const ASSET_BODY: &[u8] = b"mirror-object";
    const ASSET_SHA1: &str = "ff6ea80253580624c6e17fc2d23f18dce05182f1";

    fn sha1_hex(data: &[u8]) -> String {
        use sha1::{Digest, Sha1};
        let mut hasher = Sha1::new();
        hasher.update(data);
        format!("{:x}", hasher.finalize())
    }

    fn index_body() -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "objects": {
                "minecraft/lang/en_us.json": {"hash": ASSET_SHA1, "size": ASSET_BODY.len()}
            }
        }))
        .unwrap()
    }

    fn release_body(server: &TestServer) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "versions": [{"id": "1.20.1", "url": server.url("v1/1.20.1.json")}]
        }))
        .unwrap()
    }

    fn version_body(server: &TestServer) -> Vec<u8> {
        let index = index_body();
        serde_json::to_vec(&serde_json::json!({
            "id": "1.20.1",
            "assets": "5",
            "assetIndex": {
                "id": "5",
                "url": server.url("indexes/5.json"),
                "sha1": sha1_hex(&index),
                "size": index.len()
            },
            "downloads": {
                "client": {"url": server.url("client.jar"), "sha1": JAR_SHA1, "size": JAR_BODY.len()}
            },
            "libraries": [{
                "name": "com.example:lib:1.0",
                "downloads": {
                    "artifact": {
                        "path": "com/example/lib/1.0/lib-1.0.jar",
                        "url": server.url("lib.jar"),
                        "sha1": LIB_SHA1,
                        "size": LIB_BODY.len()
                    }
                }
            }]
        }))
        .unwrap()
    }

    fn context(server: &TestServer, output: PathBuf) -> MirrorContext {
        let mut props = Properties::with_defaults();
        props.set(KEY_VERSION_MANIFEST_URL, server.url("version_manifest.json"));
        props.set(KEY_ASSETS_SOURCE, server.url("resources/"));
        // Single worker keeps the scripted responses aligned with requests.
        MirrorContext::new(props, output)
            .unwrap()
            .with_pool(1, Duration::ZERO)
    }

    #[tokio::test]
    async fn mirrors_the_full_tree_layout() {
        let server = TestServer::start(Vec::new()).await;
        // Planning fetches: release list, version JSON, asset index.
        server.push(200, release_body(&server));
        server.push(200, version_body(&server));
        server.push(200, index_body());
        // Download order matches plan order with one worker.
        server.push(200, release_body(&server));
        server.push(200, version_body(&server));
        server.push(200, JAR_BODY.to_vec());
        server.push(200, LIB_BODY.to_vec());
        server.push(200, index_body());
        server.push(200, ASSET_BODY.to_vec());

        let out = tempfile::tempdir().unwrap();
        let report = context(&server, out.path().to_path_buf())
            .mirror_versions(&["1.20.1".to_string()])
            .await
            .unwrap();

        assert_eq!(report.failed, 0);
        assert_eq!(report.planned, 6);
        assert!(report.missing_versions.is_empty());

        assert!(out.path().join("version_manifest.json").exists());
        assert!(out.path().join("versions/1.20.1.json").exists());
        assert_eq!(
            std::fs::read(out.path().join("versions/1.20.1-client.jar")).unwrap(),
            JAR_BODY
        );
        assert_eq!(
            std::fs::read(out.path().join("libraries/com/example/lib/1.0/lib-1.0.jar"))
                .unwrap(),
            LIB_BODY
        );
        assert!(out.path().join("indexes/5.json").exists());
        assert_eq!(
            std::fs::read(out.path().join("assets/ff").join(ASSET_SHA1)).unwrap(),
            ASSET_BODY
        );
    }

    #[tokio::test]
    async fn unknown_versions_are_reported_and_skipped() {
        let server = TestServer::start(Vec::new()).await;
        server.push(200, release_body(&server));
        // Only the release-list meta task downloads.
        server.push(200, release_body(&server));

        let out = tempfile::tempdir().unwrap();
        let report = context(&server, out.path().to_path_buf())
            .mirror_versions(&["9.9.9".to_string()])
            .await
            .unwrap();

        assert_eq!(report.missing_versions, vec!["9.9.9".to_string()]);
        assert_eq!(report.planned, 1);
        assert_eq!(report.failed, 0);
    }

    #[tokio::test]
    async fn release_index_failure_is_fatal() {
        let server = TestServer::start(vec![(503, b"down".to_vec())]).await;
        let out = tempfile::tempdir().unwrap();
        let err = context(&server, out.path().to_path_buf())
            .mirror_versions(&["1.20.1".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, UpdaterError::HttpStatus { status: 503, .. }));
    }

    #[tokio::test]
    async fn artifact_failures_do_not_abort_the_run() {
        let server = TestServer::start(Vec::new()).await;
        server.push(200, release_body(&server));
        server.push(200, version_body(&server));
        server.push(200, index_body());
        server.push(200, release_body(&server));
        server.push(200, version_body(&server));
        // Client jar fails; everything after still lands.
        server.push(503, b"down".to_vec());
        server.push(200, LIB_BODY.to_vec());
        server.push(200, index_body());
        server.push(200, ASSET_BODY.to_vec());

        let out = tempfile::tempdir().unwrap();
        let report = context(&server, out.path().to_path_buf())
            .mirror_versions(&["1.20.1".to_string()])
            .await
            .unwrap();

        assert_eq!(report.failed, 1);
        assert!(!out.path().join("versions/1.20.1-client.jar").exists());
        assert_eq!(
            std::fs::read(out.path().join("assets/ff").join(ASSET_SHA1)).unwrap(),
            ASSET_BODY
        );
    }
}
