//! Update orchestration: decide whether an instance needs work, resolve its
//! manifests, run the download plan, then the deferred install phases, and
//! finally commit the instance record.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;

use crate::cancel::CancelToken;
use crate::config::Properties;
use crate::download::Downloader;
use crate::error::UpdaterError;
use crate::http::{default_client, HttpRequest};
use crate::instance::{write_json_atomic, Instance, LauncherDirs, ObjectStore};
use crate::locale;
use crate::model::assets::AssetsIndex;
use crate::model::package::PackageManifest;
use crate::plan::{
    asset_index_task, asset_object_tasks, client_jar_task, library_tasks, PostInstallAction,
};
use crate::progress::{DefaultProgress, ProgressCell, ProgressFilter, ProgressObservable};
use crate::resolver;

/// Collaborator that materializes the overlay content (mods, configs)
/// described by the package manifest. Invoked before manifest resolution;
/// `finalize` runs as the late install phase.
#[async_trait]
pub trait OverlayInstaller: Send + Sync {
    async fn install_package(
        &self,
        manifest: &PackageManifest,
        instance: &Instance,
    ) -> Result<(), UpdaterError>;

    async fn finalize(&self, _instance: &Instance) -> Result<(), UpdaterError> {
        Ok(())
    }
}

/// Pass-through overlay installer: applies nothing beyond the manifest's
/// own metadata. Suitable for plain game instances.
pub struct NoOverlay;

#[async_trait]
impl OverlayInstaller for NoOverlay {
    async fn install_package(
        &self,
        manifest: &PackageManifest,
        _instance: &Instance,
    ) -> Result<(), UpdaterError> {
        if !manifest.files.is_empty() {
            log::info!(
                "manifest lists {} overlay files; no overlay installer is configured",
                manifest.files.len()
            );
        }
        Ok(())
    }
}

pub struct Updater {
    client: Client,
    props: Properties,
    dirs: LauncherDirs,
    store: Arc<dyn ObjectStore>,
    overlay: Arc<dyn OverlayInstaller>,
    online: bool,
    concurrency: usize,
    cancel: CancelToken,
    progress: ProgressCell,
}

impl Updater {
    pub fn new(
        props: Properties,
        dirs: LauncherDirs,
        store: Arc<dyn ObjectStore>,
    ) -> Result<Self, UpdaterError> {
        Ok(Self {
            client: default_client()?,
            props,
            dirs,
            store,
            overlay: Arc::new(NoOverlay),
            online: true,
            concurrency: 4,
            cancel: CancelToken::never(),
            progress: ProgressCell::new(Arc::new(DefaultProgress::indeterminate(locale::tr(
                "updater.preparingUpdate",
            )))),
        })
    }

    pub fn with_online(mut self, online: bool) -> Self {
        self.online = online;
        self
    }

    pub fn with_overlay(mut self, overlay: Arc<dyn OverlayInstaller>) -> Self {
        self.overlay = overlay;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Observable for the whole run; the backing phase observable is
    /// swapped as the update progresses.
    pub fn progress(&self) -> ProgressCell {
        self.progress.clone()
    }

    /// Check the instance against the update-decision table and update it
    /// when required or pending. Returns the (possibly updated) instance.
    pub async fn run(&self, mut instance: Instance) -> Result<Instance, UpdaterError> {
        log::info!("checking for an update for '{}'", instance.name);
        std::fs::create_dir_all(instance.content_dir())?;

        let proceed = decide(
            self.online,
            instance.installed,
            instance.update_pending,
            instance.manifest_url.is_some(),
        )?;
        if !proceed {
            log::info!("no update needed for '{}'", instance.title);
            return Ok(instance);
        }

        self.update(&mut instance).await?;
        Ok(instance)
    }

    async fn update(&self, instance: &mut Instance) -> Result<(), UpdaterError> {
        log::info!("updating '{}'", instance.title);

        // The instance now has local content, whatever happens next.
        instance.local = true;
        self.store.commit_and_forget(instance);

        self.set_phase("updater.readingManifest");
        let manifest = self.read_package_manifest(instance).await?;
        self.overlay.install_package(&manifest, instance).await?;
        manifest.apply_to(instance);

        self.set_phase("updater.readingVersion");
        let version = resolver::resolve(
            &self.client,
            &self.props,
            &manifest,
            &instance.version_path(),
            &self.cancel,
        )
        .await?;

        self.set_phase("updater.buildingDownloadList");
        let downloader = Downloader::new(self.client.clone(), self.concurrency)
            .with_cancel(self.cancel.clone());
        self.progress.set(Arc::new(ProgressFilter::between(
            downloader.progress(),
            0.0,
            0.98,
        )));

        let mut tasks = vec![client_jar_task(&version, &self.props, &self.dirs)?];
        let (library_downloads, actions) = library_tasks(
            &version,
            manifest.libraries_url.as_deref(),
            &self.props,
            &self.dirs,
        )?;
        tasks.extend(library_downloads);

        let index_task = asset_index_task(&version, &self.props, &self.dirs);
        let index_path = index_task.as_ref().map(|t| t.target.clone());
        tasks.extend(index_task);

        downloader.run(tasks).await?;

        // Asset objects are planned from the index body, so only after the
        // index task has landed.
        if let Some(index_path) = index_path {
            let raw = tokio::fs::read(&index_path).await?;
            let index: AssetsIndex =
                serde_json::from_slice(&raw).map_err(|e| UpdaterError::Decode {
                    context: index_path.display().to_string(),
                    message: e.to_string(),
                })?;
            downloader
                .run(asset_object_tasks(&index, &self.props, &self.dirs)?)
                .await?;
        }

        let install_progress: Arc<dyn ProgressObservable> = Arc::new(
            DefaultProgress::indeterminate(locale::tr("updater.installing")),
        );
        self.progress.set(Arc::new(ProgressFilter::between(
            install_progress,
            0.98,
            1.0,
        )));
        run_post_install(&actions, &self.cancel).await?;
        self.overlay.finalize(instance).await?;
        self.complete(instance)?;

        instance.version = Some(manifest.version.clone());
        instance.installed = true;
        instance.update_pending = false;
        instance.local = true;
        self.store.commit(instance)?;

        log::info!(
            "'{}' has been updated to version {}",
            instance.name,
            manifest.version
        );
        Ok(())
    }

    /// Fetch the package manifest from its URL, keeping a local copy for
    /// offline runs; purely local instances read the stored copy.
    async fn read_package_manifest(
        &self,
        instance: &Instance,
    ) -> Result<PackageManifest, UpdaterError> {
        let path = instance.manifest_path();
        match &instance.manifest_url {
            Some(url) => {
                let manifest: PackageManifest = HttpRequest::get(&self.client, url)
                    .with_cancel(self.cancel.clone())
                    .expect_status(200)
                    .json()
                    .await?;
                write_json_atomic(&path, &manifest)?;
                Ok(manifest)
            }
            None => {
                let raw = std::fs::read_to_string(&path)?;
                serde_json::from_str(&raw).map_err(|e| UpdaterError::Decode {
                    context: path.display().to_string(),
                    message: e.to_string(),
                })
            }
        }
    }

    /// Final bookkeeping: clear staging files left behind by interrupted
    /// earlier runs.
    fn complete(&self, instance: &Instance) -> Result<(), UpdaterError> {
        sweep_temp_files(&instance.content_dir());
        sweep_temp_files(&self.dirs.versions_dir());
        Ok(())
    }

    fn set_phase(&self, key: &str) {
        self.progress
            .set(Arc::new(DefaultProgress::indeterminate(locale::tr(key))));
    }
}

/// Update-decision table. Returns whether to proceed, or the policy error
/// for states that cannot be serviced. No I/O happens before this check.
fn decide(
    online: bool,
    installed: bool,
    update_pending: bool,
    has_manifest_url: bool,
) -> Result<bool, UpdaterError> {
    let update_required = !installed;
    let update_desired = update_pending || update_required;

    if !online && update_required {
        return Err(UpdaterError::UpdateRequiredOffline);
    }
    if update_desired && !has_manifest_url {
        if update_required {
            return Err(UpdaterError::UpdateRequiredNoManifest);
        }
        return Ok(false);
    }
    Ok(update_desired)
}

/// Execute the deferred actions registered during planning.
async fn run_post_install(
    actions: &[PostInstallAction],
    cancel: &CancelToken,
) -> Result<(), UpdaterError> {
    for action in actions {
        if cancel.is_cancelled() {
            return Err(UpdaterError::Cancelled);
        }
        match action {
            PostInstallAction::ExtractNatives { jar, dest, exclude } => {
                log::info!("extracting natives from {}", jar.display());
                let bytes = tokio::fs::read(jar).await?;
                let dest = dest.clone();
                let exclude = exclude.clone();
                tokio::task::spawn_blocking(move || extract_natives(&bytes, &dest, &exclude))
                    .await
                    .map_err(|e| {
                        UpdaterError::Io(std::io::Error::other(format!(
                            "native extraction task failed: {e}"
                        )))
                    })??;
            }
        }
    }
    Ok(())
}

fn extract_natives(
    zip_bytes: &[u8],
    dest: &Path,
    exclude: &[String],
) -> Result<(), UpdaterError> {
    let cursor = std::io::Cursor::new(zip_bytes);
    let mut archive = zip::ZipArchive::new(cursor).map_err(|e| UpdaterError::Decode {
        context: "native archive".to_string(),
        message: e.to_string(),
    })?;

    std::fs::create_dir_all(dest)?;
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).map_err(|e| UpdaterError::Decode {
            context: "native archive".to_string(),
            message: e.to_string(),
        })?;
        let name = file.name().to_string();
        if file.is_dir() || exclude.iter().any(|prefix| name.starts_with(prefix)) {
            continue;
        }
        // Entry names come from untrusted archives.
        if name.contains("..") || Path::new(&name).is_absolute() {
            log::warn!("skipping suspicious archive entry: {name}");
            continue;
        }
        let out_path = dest.join(&name);
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = std::fs::File::create(&out_path)?;
        std::io::copy(&mut file, &mut out)?;
    }
    Ok(())
}

fn sweep_temp_files(dir: &Path) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().is_some_and(|e| e == "tmp") {
            log::debug!("removing stale staging file {}", path.display());
            let _ = std::fs::remove_file(&path);
        }
    }
}
