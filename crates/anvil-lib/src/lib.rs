//! Core update pipeline for the Anvil modpack launcher.
//!
//! Given a package manifest describing a target game version plus overlay
//! content, [`update::Updater`] brings an instance directory into an
//! installed, launch-ready state: manifest resolution with embedded/remote
//! fallback, deterministic download planning, a parallel hash-verifying
//! downloader with mirror failover, and deferred install phases.
//! [`mirror::MirrorContext`] drives the same planner and download engine to
//! populate a local mirror tree.

pub mod cancel;
pub mod config;
pub mod download;
pub mod error;
pub mod hash;
pub mod http;
pub mod instance;
pub mod locale;
pub mod mirror;
pub mod model;
pub mod plan;
pub mod progress;
pub mod resolver;
pub mod session;
pub mod sources;
pub mod update;

#[cfg(test)]
mod testutil;

pub use cancel::{cancel_pair, CancelHandle, CancelToken};
pub use config::Properties;
pub use error::UpdaterError;
pub use instance::{Instance, JsonFileStore, LauncherDirs, ObjectStore};
pub use mirror::{MirrorContext, MirrorReport};
pub use progress::{ProgressCell, ProgressObservable};
pub use session::{Account, Session};
pub use update::Updater;
