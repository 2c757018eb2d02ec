//! Download planning: walk a resolved version manifest and produce the
//! deterministic set of fetch-and-verify tasks plus deferred install work.

use std::path::{Component, Path, PathBuf};

use crate::config::{
    Properties, KEY_ASSETS_SOURCE, KEY_CUSTOM_ASSETS_SOURCE, KEY_CUSTOM_ASSET_INDEXES_SOURCE,
    KEY_CUSTOM_LIBRARIES_SOURCE, KEY_CUSTOM_VERSIONS_SOURCE, KEY_LIBRARIES_SOURCE,
};
use crate::error::UpdaterError;
use crate::instance::LauncherDirs;
use crate::model::assets::AssetsIndex;
use crate::model::version::{OsType, VersionManifest};
use crate::sources::{as_base, rebase_all, source_list, with_suffix};

/// What a task materializes; drives logging and mirror layout decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// The client jar.
    Jar,
    /// A library archive under the shared libraries pool.
    Library,
    /// A content-addressed asset object.
    Asset,
    /// The asset index for a version.
    Index,
    /// Other metadata files (release list, per-version JSON) mirrored as-is.
    Meta,
}

/// The smallest unit the downloader schedules: one artifact, one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub kind: TaskKind,
    /// Ordered fallback list; never empty for a well-formed plan.
    pub sources: Vec<String>,
    pub target: PathBuf,
    pub expected_hash: Option<String>,
    pub expected_size: Option<u64>,
}

impl DownloadTask {
    /// Progress weight, proportional to expected size when known.
    pub fn weight(&self) -> u64 {
        self.expected_size.unwrap_or(1).max(1)
    }
}

/// Work deferred until every download has landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostInstallAction {
    ExtractNatives {
        jar: PathBuf,
        dest: PathBuf,
        exclude: Vec<String>,
    },
}

/// Client jar task: vendor URL first (or the mirror, when configured and
/// preferred), hash-checked against the manifest.
pub fn client_jar_task(
    version: &VersionManifest,
    props: &Properties,
    dirs: &LauncherDirs,
) -> Result<DownloadTask, UpdaterError> {
    let client = version
        .client_download()
        .ok_or_else(|| UpdaterError::Decode {
            context: format!("version manifest {}", version.id),
            message: "no client download entry".to_string(),
        })?;
    let sources = source_list(
        props,
        &client.url,
        KEY_CUSTOM_VERSIONS_SOURCE,
        with_suffix(&format!("{}-client.jar", version.id)),
    );
    Ok(DownloadTask {
        kind: TaskKind::Jar,
        sources,
        target: dirs.jar_path(&version.id),
        expected_hash: Some(client.sha1.clone()),
        expected_size: Some(client.size),
    })
}

/// Library tasks for every platform-applicable artifact, and the deferred
/// native-extraction actions that go with them.
///
/// `package_libraries_url` is the per-manifest extra source; it outranks
/// every configured origin.
pub fn library_tasks(
    version: &VersionManifest,
    package_libraries_url: Option<&str>,
    props: &Properties,
    dirs: &LauncherDirs,
) -> Result<(Vec<DownloadTask>, Vec<PostInstallAction>), UpdaterError> {
    let mut bases: Vec<String> = Vec::new();
    if let Some(url) = package_libraries_url {
        bases.push(url.to_string());
    }
    bases.extend(source_list(
        props,
        &props.require(KEY_LIBRARIES_SOURCE)?,
        KEY_CUSTOM_LIBRARIES_SOURCE,
        as_base,
    ));

    let os = OsType::current();
    let libraries_dir = dirs.libraries_dir();
    let mut tasks = Vec::new();
    let mut actions = Vec::new();

    for library in &version.libraries {
        for artifact in library.all_artifacts(os) {
            let (Some(path), Some(_url)) = (&artifact.path, &artifact.url) else {
                continue;
            };
            if !is_safe_relative(path) {
                log::error!("refusing library path from metadata: {path}");
                continue;
            }
            tasks.push(DownloadTask {
                kind: TaskKind::Library,
                sources: rebase_all(&bases, path),
                target: libraries_dir.join(path),
                expected_hash: artifact.sha1.clone(),
                expected_size: artifact.size,
            });
        }

        if !library.applies_to(os) {
            continue;
        }
        if let Some(native) = library.native_artifact(os) {
            if let Some(path) = &native.path {
                if is_safe_relative(path) {
                    actions.push(PostInstallAction::ExtractNatives {
                        jar: libraries_dir.join(path),
                        dest: dirs.natives_dir(&version.id),
                        exclude: library
                            .extract
                            .as_ref()
                            .and_then(|e| e.exclude.clone())
                            .unwrap_or_default(),
                    });
                }
            }
        }
    }

    Ok((tasks, actions))
}

/// The asset index itself, or `None` for legacy versions without assets.
pub fn asset_index_task(
    version: &VersionManifest,
    props: &Properties,
    dirs: &LauncherDirs,
) -> Option<DownloadTask> {
    let index = version.asset_index.as_ref()?;
    let name = format!("{}.json", version.asset_id());
    let sources = source_list(
        props,
        &index.url,
        KEY_CUSTOM_ASSET_INDEXES_SOURCE,
        with_suffix(&name),
    );
    Some(DownloadTask {
        kind: TaskKind::Index,
        sources,
        target: dirs.assets_dir().join("indexes").join(name),
        expected_hash: Some(index.sha1.clone()),
        expected_size: Some(index.size),
    })
}

/// One task per asset object. Planned only after the index body is on disk,
/// since the index is the input here.
pub fn asset_object_tasks(
    index: &AssetsIndex,
    props: &Properties,
    dirs: &LauncherDirs,
) -> Result<Vec<DownloadTask>, UpdaterError> {
    let bases = source_list(
        props,
        &props.require(KEY_ASSETS_SOURCE)?,
        KEY_CUSTOM_ASSETS_SOURCE,
        as_base,
    );
    let objects_dir = dirs.assets_dir().join("objects");

    let mut tasks = Vec::new();
    for (name, asset) in &index.objects {
        let Some(path) = asset.object_path() else {
            log::warn!("asset '{name}' has an unusable hash, skipping");
            continue;
        };
        tasks.push(DownloadTask {
            kind: TaskKind::Asset,
            sources: rebase_all(&bases, &path),
            target: objects_dir.join(&path),
            expected_hash: Some(asset.hash.clone()),
            expected_size: Some(asset.size),
        });
    }
    Ok(tasks)
}

/// Reject absolute paths and parent-directory traversal coming from
/// untrusted metadata.
fn is_safe_relative(path: &str) -> bool {
    let path = Path::new(path);
    !path.is_absolute()
        && !path
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
}
