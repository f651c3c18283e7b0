use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facefilter::{
    config, encoder, export, preview, separator, session::FilterSession, storage, MatchEvent,
    Pipeline,
};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};

#[derive(Parser)]
#[command(name = "facefilter")]
#[command(
    version,
    about = "Find the photos a person appears in, by face"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a folder of reference photos (one face each, named after the person)
    Encode {
        /// Folder of reference images
        images: PathBuf,
        /// Encoding store to write (defaults to the configured store)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Copy photos containing a known person into another folder
    Separate {
        /// Folder to scan
        source: PathBuf,
        /// Folder receiving the matching photos
        destination: PathBuf,
        /// Label of the person to look for
        #[arg(short, long)]
        target: String,
        /// Encoding store to read (defaults to the configured store)
        #[arg(short, long)]
        store: Option<PathBuf>,
        /// Maximum face distance counted as a match
        #[arg(long)]
        tolerance: Option<f32>,
    },
    /// Find photos matching a single face photo
    Find {
        /// Folder to scan
        source: PathBuf,
        /// Photo of the person to look for
        #[arg(short, long)]
        face: PathBuf,
        /// Write the matching photos to this ZIP archive
        #[arg(long)]
        zip: Option<PathBuf>,
        /// Write a thumbnail of each match into this folder as it is found
        #[arg(long)]
        previews: Option<PathBuf>,
        /// Maximum face distance counted as a match
        #[arg(long)]
        tolerance: Option<f32>,
    },
    /// List the labels in an encoding store
    List {
        #[arg(short, long)]
        store: Option<PathBuf>,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Open config file in editor
    Config,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_target(false)
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(None)?;

    match cli.command {
        Commands::Encode { images, output } => {
            let output = output.unwrap_or_else(|| cfg.store.clone());
            encode(&cfg, &images, &output)
        }
        Commands::Separate {
            source,
            destination,
            target,
            store,
            tolerance,
        } => {
            let store = store.unwrap_or_else(|| cfg.store.clone());
            let tolerance = tolerance.unwrap_or(cfg.tolerance);
            separate(&cfg, &store, &source, &destination, &target, tolerance)
        }
        Commands::Find {
            source,
            face,
            zip,
            previews,
            tolerance,
        } => {
            let tolerance = tolerance.unwrap_or(cfg.tolerance);
            find(&cfg, source, face, zip.as_deref(), previews, tolerance)
        }
        Commands::List { store, json } => {
            let store = store.unwrap_or_else(|| cfg.store.clone());
            list(&store, json)
        }
        Commands::Config => open_config(),
    }
}

fn pipeline(cfg: &config::Config) -> Result<Pipeline> {
    Pipeline::new(&cfg.detector_model, &cfg.recognizer_model, cfg.detect_options())
        .context("Failed to initialize face recognition pipeline")
}

/// Renders scan events on a progress bar and optionally writes previews.
struct ScanProgress {
    bar: Option<ProgressBar>,
    previews: Option<(PathBuf, u32)>,
}

impl ScanProgress {
    fn new(previews: Option<(PathBuf, u32)>) -> Self {
        Self {
            bar: None,
            previews,
        }
    }

    fn handle(&mut self, event: MatchEvent) {
        match event {
            MatchEvent::Progress { current, total } => {
                let bar = self.bar.get_or_insert_with(|| {
                    let bar = ProgressBar::new(total as u64);
                    if let Ok(style) =
                        ProgressStyle::with_template("{bar:40} {pos}/{len} {wide_msg}")
                    {
                        bar.set_style(style);
                    }
                    bar
                });
                bar.set_position(current as u64);
            }
            MatchEvent::Matched(path) => {
                let line = format!("match: {}", path.display());
                match &self.bar {
                    Some(bar) => bar.println(line),
                    None => println!("{}", line),
                }
                if let Some((dir, size)) = &self.previews {
                    if let Err(e) = preview::write_thumbnail(&path, dir, *size) {
                        warn!("No preview for {}: {:#}", path.display(), e);
                    }
                }
            }
        }
    }

    fn finish(self) {
        if let Some(bar) = self.bar {
            bar.finish_and_clear();
        }
    }
}

fn encode(cfg: &config::Config, images: &Path, output: &Path) -> Result<()> {
    let mut pipeline = pipeline(cfg)?;

    info!("Encoding Started...");
    let report = encoder::encode_folder(&mut pipeline, images)?;

    if !report.skipped.is_empty() {
        warn!(
            "{} reference image(s) were left out of the store:",
            report.skipped.len()
        );
        for skipped in &report.skipped {
            warn!("  {}: {}", skipped.path.display(), skipped.reason);
        }
    }
    if report.known.is_empty() {
        warn!("No faces were encoded; the store will be empty");
    }

    storage::save_known_set(output, &report.known).context("Failed to save encoding store")?;
    info!(
        "✓ Saved {} encoding(s) to {}",
        report.known.len(),
        output.display()
    );
    Ok(())
}

fn separate(
    cfg: &config::Config,
    store: &Path,
    source: &Path,
    destination: &Path,
    target: &str,
    tolerance: f32,
) -> Result<()> {
    let known = storage::load_known_set(store)?;
    info!("Loaded {} known face(s) from {}", known.len(), store.display());

    let mut pipeline = pipeline(cfg)?;
    let mut progress = ScanProgress::new(None);
    let report = separator::separate(
        &mut pipeline,
        &known,
        source,
        destination,
        target,
        tolerance,
        |event| progress.handle(event),
    )?;
    progress.finish();

    for (path, reason) in &report.failed {
        warn!("Not copied: {} ({})", path.display(), reason);
    }
    info!(
        "✓ Copied {} of {} image(s) into {}",
        report.copied.len(),
        report.scanned.len(),
        destination.display()
    );
    Ok(())
}

fn find(
    cfg: &config::Config,
    source: PathBuf,
    face: PathBuf,
    zip: Option<&Path>,
    previews: Option<PathBuf>,
    tolerance: f32,
) -> Result<()> {
    let mut session = FilterSession::new(tolerance);
    session.select_folder(source)?;
    session.select_face_image(face)?;

    let mut pipeline = pipeline(cfg)?;
    let mut progress = ScanProgress::new(previews.map(|dir| (dir, cfg.thumbnail_size)));
    let matched = session.run_match(&mut pipeline, |event| progress.handle(event))?;
    progress.finish();

    info!("Found {} images matching the selected face.", matched.len());
    if matched.is_empty() {
        return Ok(());
    }

    if let Some(archive) = zip {
        let written = export::export_zip(&matched, archive).context("Could not create ZIP file")?;
        info!(
            "✓ Matched images ({}) saved as: {}",
            written,
            archive.display()
        );
    } else {
        for path in &matched {
            println!("{}", path.display());
        }
    }
    Ok(())
}

fn list(store: &Path, json: bool) -> Result<()> {
    let known = storage::load_known_set(store)?;
    if json {
        println!("{}", serde_json::to_string_pretty(known.labels())?);
    } else {
        for label in known.labels() {
            println!("{}", label);
        }
    }
    Ok(())
}

fn open_config() -> Result<()> {
    let config_path = config::CONFIG_PATH.as_path();
    if !config_path.exists() {
        config::save_config(&config::Config::default(), Some(config_path))
            .context("Failed to write default config")?;
    }
    let editor = env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());

    info!("Opening config file: {:?}", config_path);

    let status = std::process::Command::new(editor)
        .arg(config_path)
        .status()
        .context("Failed to open editor")?;

    if !status.success() {
        anyhow::bail!("Editor exited with non-zero status");
    }

    Ok(())
}
