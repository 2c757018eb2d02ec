//! Anvil command line: instance updates and mirror building.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};

use anvil_lib::progress::ProgressObservable;
use anvil_lib::{
    Instance, JsonFileStore, LauncherDirs, MirrorContext, ProgressCell, Properties, Updater,
};

#[derive(Parser)]
#[command(name = "anvil")]
#[command(about = "Modpack instance updater and mirror builder", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Update (or install) a local instance.
    Update {
        /// Instance directory containing instance.json.
        #[arg(long)]
        instance: PathBuf,

        /// Launcher root holding the shared libraries/assets/versions pools.
        #[arg(long)]
        root: PathBuf,

        /// JSON file with property overrides (mirror origins, ordering).
        #[arg(long)]
        config: Option<PathBuf>,

        /// Manifest URL to record before updating a fresh instance.
        #[arg(long)]
        manifest_url: Option<String>,

        /// Treat the session as offline; a required update becomes an error.
        #[arg(long)]
        offline: bool,
    },

    /// Populate a local mirror tree from the primary origins.
    Mirror {
        /// Comma-separated version ids, e.g. "1.20.1,1.19.4".
        #[arg(long)]
        versions: String,

        /// Output directory for the mirror tree.
        #[arg(long)]
        output: PathBuf,

        /// JSON file with property overrides.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // Help and version requests are not failures.
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("error: failed to start runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Update {
            instance,
            root,
            config,
            manifest_url,
            offline,
        } => update(instance, root, config, manifest_url, offline).await,
        Command::Mirror {
            versions,
            output,
            config,
        } => mirror(versions, output, config).await,
    }
}

fn load_properties(config: Option<&PathBuf>) -> anyhow::Result<Properties> {
    let mut props = Properties::with_defaults();
    if let Some(path) = config {
        props
            .merge_json_file(path)
            .with_context(|| format!("loading properties from {}", path.display()))?;
    }
    Ok(props)
}

async fn update(
    instance_dir: PathBuf,
    root: PathBuf,
    config: Option<PathBuf>,
    manifest_url: Option<String>,
    offline: bool,
) -> anyhow::Result<()> {
    let props = load_properties(config.as_ref())?;

    let mut instance = match JsonFileStore::load(&instance_dir) {
        Ok(instance) => instance,
        Err(_) if manifest_url.is_some() => {
            let name = instance_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "instance".to_string());
            Instance::new(name, instance_dir.clone())
        }
        Err(err) => {
            return Err(err).with_context(|| {
                format!("no usable instance record in {}", instance_dir.display())
            })
        }
    };
    if let Some(url) = manifest_url {
        instance.manifest_url = Some(url);
    }

    let updater = Updater::new(props, LauncherDirs::new(root), Arc::new(JsonFileStore))
        .context("setting up updater")?
        .with_online(!offline);

    let progress = updater.progress();
    let reporter = tokio::spawn(report_progress(progress));

    let result = updater.run(instance).await;
    reporter.abort();

    let updated = result.map_err(|err| anyhow::anyhow!("{}: {err}", err.user_message()))?;
    println!(
        "{} is up to date (version {})",
        updated.title,
        updated.version.as_deref().unwrap_or("unknown")
    );
    Ok(())
}

async fn mirror(
    versions: String,
    output: PathBuf,
    config: Option<PathBuf>,
) -> anyhow::Result<()> {
    let props = load_properties(config.as_ref())?;
    let ids: Vec<String> = versions
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if ids.is_empty() {
        anyhow::bail!("--versions must name at least one version id");
    }

    let context = MirrorContext::new(props, output).context("setting up mirror")?;
    let reporter = tokio::spawn(report_progress(ProgressCell::new(context.progress())));

    let report = context
        .mirror_versions(&ids)
        .await
        .map_err(|err| anyhow::anyhow!("{}: {err}", err.user_message()))?;
    reporter.abort();

    println!(
        "mirrored {} of {} files ({} failed)",
        report.planned - report.failed,
        report.planned,
        report.failed
    );
    for id in &report.missing_versions {
        println!("version not found upstream: {id}");
    }
    if report.failed > 0 {
        anyhow::bail!("{} file(s) could not be mirrored", report.failed);
    }
    Ok(())
}

/// Print status transitions and coarse percentage steps until aborted.
async fn report_progress(progress: impl ProgressObservable) {
    let mut last_status = String::new();
    let mut last_percent = -1i32;
    loop {
        tokio::time::sleep(Duration::from_millis(500)).await;
        let status = progress.status();
        let fraction = progress.progress();
        if status != last_status && !status.is_empty() {
            log::info!("{status}");
            last_status = status;
        }
        if fraction >= 0.0 {
            let percent = (fraction * 100.0) as i32;
            if percent / 10 > last_percent / 10 {
                log::info!("{percent}%");
                last_percent = percent;
            }
        }
    }
}
