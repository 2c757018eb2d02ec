use std::path::PathBuf;

use crate::locale;

/// Errors produced by the update pipeline.
///
/// Transport and verification failures (`Network`, `HttpStatus`, `Decode`,
/// `Io`, `HashMismatch`) are recoverable within a single download task and
/// trigger fallback to the next source. `ArtifactFetchFailed` means every
/// source for a task was exhausted and is fatal to the update.
#[derive(Debug, thiserror::Error)]
pub enum UpdaterError {
    #[error("network error requesting {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected HTTP status {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("failed to decode {context}: {message}")]
    Decode { context: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("hash mismatch for {}: expected {expected}, got {actual}", .path.display())]
    HashMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("game version {game_version} not present in the release list")]
    ManifestNotFound { game_version: String },

    #[error("no download sources configured")]
    NoSources,

    #[error("failed to fetch {} from every source", .target.display())]
    ArtifactFetchFailed {
        target: PathBuf,
        #[source]
        source: Box<UpdaterError>,
    },

    #[error("update required but currently offline")]
    UpdateRequiredOffline,

    #[error("update required but no manifest URL is set")]
    UpdateRequiredNoManifest,

    #[error("operation cancelled")]
    Cancelled,
}

impl UpdaterError {
    /// Short message suitable for display to the user, distinct from the
    /// technical cause that goes to the log.
    pub fn user_message(&self) -> String {
        match self {
            UpdaterError::Network { .. } => locale::tr("updater.networkError"),
            UpdaterError::HttpStatus { .. } => locale::tr("updater.serverError"),
            UpdaterError::Decode { .. } => locale::tr("updater.badResponse"),
            UpdaterError::Io(_) => locale::tr("updater.diskError"),
            UpdaterError::HashMismatch { .. } => locale::tr("updater.corruptDownload"),
            UpdaterError::ManifestNotFound { game_version } => {
                format!("{} ({})", locale::tr("updater.versionNotFound"), game_version)
            }
            UpdaterError::NoSources => locale::tr("updater.noSources"),
            UpdaterError::ArtifactFetchFailed { target, .. } => format!(
                "{} ({})",
                locale::tr("updater.artifactFailed"),
                target.display()
            ),
            UpdaterError::UpdateRequiredOffline => {
                locale::tr("updater.updateRequiredButOffline")
            }
            UpdaterError::UpdateRequiredNoManifest => {
                locale::tr("updater.updateRequiredButNoManifest")
            }
            UpdaterError::Cancelled => locale::tr("updater.cancelled"),
        }
    }

    /// True for the cancellation signal, which must unwind without being
    /// swallowed by source-fallback loops.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, UpdaterError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_differs_from_technical_display() {
        let err = UpdaterError::HttpStatus {
            url: "http://example.invalid/a.json".to_string(),
            status: 503,
        };
        assert!(err.to_string().contains("503"));
        assert!(!err.user_message().contains("503"));
    }

    #[test]
    fn cancelled_is_detected_through_artifact_wrapper() {
        let err = UpdaterError::Cancelled;
        assert!(err.is_cancelled());
        let wrapped = UpdaterError::ArtifactFetchFailed {
            target: PathBuf::from("/tmp/x"),
            source: Box::new(UpdaterError::Cancelled),
        };
        assert!(!wrapped.is_cancelled());
    }
}
