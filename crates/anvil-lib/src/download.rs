//! Parallel download-and-verify engine.
//!
//! Tasks are independent: each one stages into a sibling `.tmp` file, is
//! hash-verified, then atomically renamed over the target. Transport or
//! verification failures advance to the next source in the task's list;
//! exhausting the list is fatal on the update path and tolerated on the
//! mirror path.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt, TryStreamExt};
use parking_lot::Mutex;
use reqwest::Client;

use crate::cancel::CancelToken;
use crate::error::UpdaterError;
use crate::hash::{hash_matches, sha1_file};
use crate::http::HttpRequest;
use crate::plan::DownloadTask;
use crate::progress::{ProgressObservable, INDETERMINATE};

/// Aggregate progress over all submitted tasks, weighted by expected size.
pub struct DownloadProgress {
    total: AtomicU64,
    completed: AtomicU64,
    status: Mutex<String>,
}

impl DownloadProgress {
    fn new() -> Self {
        Self {
            total: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            status: Mutex::new(String::new()),
        }
    }

    fn add_total(&self, weight: u64) {
        self.total.fetch_add(weight, Ordering::SeqCst);
    }

    fn add_completed(&self, weight: u64) {
        self.completed.fetch_add(weight, Ordering::SeqCst);
    }

    fn set_status(&self, status: String) {
        *self.status.lock() = status;
    }
}

impl ProgressObservable for DownloadProgress {
    fn progress(&self) -> f64 {
        let total = self.total.load(Ordering::SeqCst);
        if total == 0 {
            return INDETERMINATE;
        }
        self.completed.load(Ordering::SeqCst) as f64 / total as f64
    }

    fn status(&self) -> String {
        self.status.lock().clone()
    }
}

/// Removes the staged temp file on every exit path unless defused after the
/// final rename.
struct TempGuard {
    path: PathBuf,
    armed: bool,
}

impl TempGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn defuse(mut self) {
        self.armed = false;
    }
}

impl Drop for TempGuard {
    fn drop(&mut self) {
        if self.armed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

pub struct Downloader {
    client: Client,
    concurrency: usize,
    delay: Duration,
    cancel: CancelToken,
    completed: Mutex<HashSet<PathBuf>>,
    progress: Arc<DownloadProgress>,
}

impl Downloader {
    pub fn new(client: Client, concurrency: usize) -> Self {
        Self {
            client,
            concurrency: concurrency.max(1),
            delay: Duration::ZERO,
            cancel: CancelToken::never(),
            completed: Mutex::new(HashSet::new()),
            progress: Arc::new(DownloadProgress::new()),
        }
    }

    /// Inter-request delay, applied per worker at issue time.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn progress(&self) -> Arc<DownloadProgress> {
        self.progress.clone()
    }

    /// Execute a plan; the first task to exhaust its sources fails the run.
    pub async fn run(&self, tasks: Vec<DownloadTask>) -> Result<(), UpdaterError> {
        let tasks = self.prepare(tasks);
        stream::iter(tasks.into_iter().map(Ok::<DownloadTask, UpdaterError>))
            .try_for_each_concurrent(self.concurrency, |task| self.execute(task))
            .await
    }

    /// Execute a plan, logging and counting per-task failures instead of
    /// aborting. Cancellation still stops the run. Returns the failure count.
    pub async fn run_lenient(&self, tasks: Vec<DownloadTask>) -> Result<usize, UpdaterError> {
        let tasks = self.prepare(tasks);
        let results: Vec<(PathBuf, Result<(), UpdaterError>)> = stream::iter(tasks)
            .map(|task| async move {
                let target = task.target.clone();
                (target, self.execute(task).await)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut failed = 0;
        for (target, result) in results {
            if let Err(err) = result {
                if err.is_cancelled() {
                    return Err(err);
                }
                log::warn!("failed to mirror {}: {}", target.display(), err);
                failed += 1;
            }
        }
        Ok(failed)
    }

    /// Drop duplicate targets and account their weights up front so the
    /// aggregate fraction is meaningful from the first completion.
    fn prepare(&self, tasks: Vec<DownloadTask>) -> Vec<DownloadTask> {
        let mut seen = HashSet::new();
        let mut unique = Vec::new();
        for task in tasks {
            if seen.insert(task.target.clone()) {
                self.progress.add_total(task.weight());
                unique.push(task);
            }
        }
        unique
    }

    async fn execute(&self, task: DownloadTask) -> Result<(), UpdaterError> {
        let weight = task.weight();
        if self.cancel.is_cancelled() {
            return Err(UpdaterError::Cancelled);
        }
        if self.completed.lock().contains(&task.target) {
            self.progress.add_completed(weight);
            return Ok(());
        }

        if let Some(parent) = task.target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Skip-if-valid: an existing target with the right hash costs one
        // read, not one transfer.
        if let Some(expected) = &task.expected_hash {
            if tokio::fs::try_exists(&task.target).await? {
                let actual = sha1_file(&task.target).await?;
                if hash_matches(expected, &actual) {
                    log::debug!("skipped (already valid): {}", task.target.display());
                    self.mark_done(&task.target, weight);
                    return Ok(());
                }
                log::info!(
                    "existing file fails verification, re-downloading: {}",
                    task.target.display()
                );
            }
        }

        let name = task
            .target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| task.target.display().to_string());
        self.progress.set_status(format!("Downloading {name}"));

        let tmp = temp_path(&task.target);
        let mut last_err: Option<UpdaterError> = None;

        for source in &task.sources {
            if self.cancel.is_cancelled() {
                return Err(UpdaterError::Cancelled);
            }
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            let guard = TempGuard::new(tmp.clone());
            let outcome = HttpRequest::get(&self.client, source)
                .with_cancel(self.cancel.clone())
                .expect_status(200)
                .save_to(&tmp)
                .await;

            match outcome {
                Ok(actual) => {
                    if let Some(expected) = &task.expected_hash {
                        if !hash_matches(expected, &actual) {
                            log::warn!(
                                "hash mismatch from {source} (expected {expected}, got {actual}), trying next source"
                            );
                            last_err = Some(UpdaterError::HashMismatch {
                                path: task.target.clone(),
                                expected: expected.clone(),
                                actual,
                            });
                            continue;
                        }
                    }
                    tokio::fs::rename(&tmp, &task.target).await?;
                    guard.defuse();
                    self.mark_done(&task.target, weight);
                    return Ok(());
                }
                Err(err) if err.is_cancelled() => return Err(err),
                Err(err) => {
                    log::warn!("download from {source} failed ({err}), trying next source");
                    last_err = Some(err);
                }
            }
        }

        Err(UpdaterError::ArtifactFetchFailed {
            target: task.target,
            source: Box::new(last_err.unwrap_or(UpdaterError::NoSources)),
        })
    }

    fn mark_done(&self, target: &Path, weight: u64) {
        self.completed.lock().insert(target.to_path_buf());
        self.progress.add_completed(weight);
    }
}

fn temp_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "download".to_string());
    target.with_file_name(format!("{name}.tmp"))
}
