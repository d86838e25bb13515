use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use feniks_catalog::{
    config::Settings,
    fetch::{self, HttpClient},
    link::{LinkOutcome, Linker},
    normalize::Normalizer,
    status::Status,
    store::JsonFileStore,
    translation,
};
use tracing::{error, info, warn};

#[derive(Parser)]
#[clap(version, about = "Maintenance jobs for the wine catalog")]
struct Opts {
    /// YAML settings file.
    #[clap(short, long, env = "FENIKS_CONFIG", global = true)]
    config: Option<PathBuf>,
    /// Catalog document, overrides the settings file.
    #[clap(long, env = "FENIKS_CATALOG", global = true)]
    catalog: Option<PathBuf>,
    /// Directory holding fetched images, overrides the settings file.
    #[clap(long, env = "FENIKS_IMAGES_DIR", global = true)]
    images_dir: Option<PathBuf>,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download every record's image URL into the images directory.
    Fetch,
    /// Resize fetched images to padded square JPEGs.
    Normalize {
        #[clap(long)]
        target_size: Option<u32>,
        #[clap(long)]
        quality: Option<u8>,
        #[clap(long)]
        output_dir: Option<PathBuf>,
    },
    /// Set `image_local` from the normalized images on disk.
    Link {
        #[clap(long)]
        source_dir: Option<PathBuf>,
        #[clap(long)]
        prefix: Option<String>,
    },
    /// Write the nl translations to a CSV table.
    Export { output: Option<PathBuf> },
    /// Merge an edited CSV table back into the catalog.
    Import { input: Option<PathBuf> },
}

fn load_settings(opts: &Opts) -> anyhow::Result<Settings> {
    let mut settings = match &opts.config {
        Some(path) => {
            let source = std::fs::read_to_string(path)
                .with_context(|| format!("read settings from {}", path.display()))?;
            Settings::from_yaml(&source)
                .with_context(|| format!("parse settings from {}", path.display()))?
        }
        None => Settings::default(),
    };
    if let Some(catalog) = &opts.catalog {
        settings.catalog = catalog.clone();
    }
    if let Some(images_dir) = &opts.images_dir {
        settings.images_dir = images_dir.clone();
    }
    match &opts.command {
        Command::Fetch => {}
        Command::Normalize {
            target_size,
            quality,
            output_dir,
        } => {
            if let Some(target_size) = target_size {
                settings.normalize.target_size = *target_size;
            }
            if let Some(quality) = quality {
                settings.normalize.quality = *quality;
            }
            if output_dir.is_some() {
                settings.normalize.output_dir = output_dir.clone();
            }
        }
        Command::Link { source_dir, prefix } => {
            if source_dir.is_some() {
                settings.link.source_dir = source_dir.clone();
            }
            if let Some(prefix) = prefix {
                settings.link.path_prefix = prefix.clone();
            }
        }
        Command::Export { output } => {
            if let Some(output) = output {
                settings.translation.export_path = output.clone();
            }
        }
        Command::Import { input } => {
            if let Some(input) = input {
                settings.translation.import_path = input.clone();
            }
        }
    }
    settings.validate().map_err(|msg| anyhow!("{msg}"))?;
    Ok(settings)
}

/// Runs one job. Item failures are reported through the returned status.
async fn run(opts: Opts) -> anyhow::Result<Status> {
    let settings = load_settings(&opts)?;
    let store = JsonFileStore::new(&settings.catalog);
    match opts.command {
        Command::Fetch => {
            let client = HttpClient::new(&settings.fetch).context("build HTTP client")?;
            let report = fetch::run(&store, &client, &settings.images_dir)
                .await
                .context("fetch images")?;
            Ok(report.into())
        }
        Command::Normalize { .. } => {
            let report = Normalizer::try_from(&settings.normalize)?
                .run(&settings.images_dir, &settings.optimized_dir())
                .context("normalize images")?;
            Ok(report.into())
        }
        Command::Link { .. } => {
            let linker = Linker {
                source_dir: settings.link_source_dir(),
                path_prefix: settings.link.path_prefix.clone(),
            };
            let report = linker.run(&store).context("link local images")?;
            match report.outcome() {
                LinkOutcome::Complete => {}
                LinkOutcome::NothingUpdated => {
                    warn!("no local images found, catalog left unchanged");
                }
                LinkOutcome::Incomplete => {
                    warn!(missing = report.missing, "some wines have no local image");
                }
            }
            Ok(report.into())
        }
        Command::Export { .. } => {
            translation::export(&store, &settings.translation.export_path)
                .context("export translations")?;
            Ok(Status::Success)
        }
        Command::Import { .. } => {
            let report = translation::import(&store, &settings.translation.import_path)
                .context("import translations")?;
            Ok(report.into())
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let opts = Opts::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
    let result = run(opts).await;
    if let Err(e) = &result {
        error!(?e, "critical error");
    }
    let status = Status::from_result(result);
    if status.is_success() {
        info!("done");
    }
    ExitCode::from(status.code())
}
