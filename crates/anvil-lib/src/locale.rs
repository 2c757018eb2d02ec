//! Built-in English string table.
//!
//! A full launcher would load translated bundles; the library only needs the
//! keyed lookup so user-facing messages stay separate from log output.

pub fn tr(key: &str) -> String {
    let text = match key {
        "updater.preparingUpdate" => "Preparing update...",
        "updater.readingManifest" => "Reading package manifest...",
        "updater.readingVersion" => "Reading version manifest...",
        "updater.buildingDownloadList" => "Building download list...",
        "updater.collectingLibraries" => "Collecting libraries...",
        "updater.collectingAssets" => "Collecting assets...",
        "updater.downloading" => "Downloading files...",
        "updater.installing" => "Installing...",
        "updater.networkError" => "A download server could not be reached.",
        "updater.serverError" => "A download server returned an error.",
        "updater.badResponse" => "A download server returned an unusable response.",
        "updater.diskError" => "A file could not be read or written.",
        "updater.corruptDownload" => "A downloaded file was corrupt.",
        "updater.versionNotFound" => "The requested game version does not exist.",
        "updater.noSources" => "No download sources are configured.",
        "updater.artifactFailed" => "A required file could not be downloaded.",
        "updater.updateRequiredButOffline" => {
            "This instance must be updated, but you are playing offline."
        }
        "updater.updateRequiredButNoManifest" => {
            "This instance must be updated, but it has no update source."
        }
        "updater.cancelled" => "The update was cancelled.",
        _ => key,
    };
    text.to_string()
}
