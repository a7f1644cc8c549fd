use std::path::{Path, PathBuf};
use std::sync::Arc;

use autocut_core::{
    to_srt, AppConfig, AssetSnapshot, BeatAnalysis, SfxCatalog, TimelineEngine,
    TranscriptionResult,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

fn main() -> autocut_core::Result<()> {
    let _ = dotenvy::dotenv();
    let config = AppConfig::from_env();
    init_tracing(&config.log_level);

    let cli = Cli::parse();

    match cli.command {
        Commands::Build(args) => run_build(&config, args),
        Commands::Sfx { command } => run_sfx(&config, command),
        Commands::Srt { captions, output } => run_srt(&captions, output.as_deref()),
    }
}

fn run_build(config: &AppConfig, args: BuildArgs) -> autocut_core::Result<()> {
    let template_path = args.template.unwrap_or_else(|| config.template_path.clone());
    tracing::info!(asset = ?args.asset, template = ?template_path, "building timeline");

    let catalog = open_catalog(config, args.sfx_dir, args.seed)?;
    let engine = TimelineEngine::from_template_path(&template_path, Arc::new(catalog))?;

    let analysis: BeatAnalysis = read_json(&args.beats)?;
    let transcription: TranscriptionResult = read_json(&args.captions)?;

    let mut asset = AssetSnapshot::new(
        args.asset_id,
        args.asset.to_string_lossy(),
        args.duration,
        args.resolution,
    );
    asset.fps = args.fps;

    let timeline = engine.build(&asset, &analysis, &transcription);
    write_or_print(args.output.as_deref(), &timeline.to_text()?)
}

fn run_sfx(config: &AppConfig, command: SfxCommand) -> autocut_core::Result<()> {
    match command {
        SfxCommand::List { sfx_dir } => {
            let catalog = open_catalog(config, sfx_dir, None)?;
            for item in catalog.list() {
                println!(
                    "{}\t{:.2}s\t{}\t{}",
                    item.name,
                    item.duration,
                    item.tags.join(","),
                    item.path.display()
                );
            }
            Ok(())
        }
        SfxCommand::Export { output, sfx_dir } => {
            let catalog = open_catalog(config, sfx_dir, None)?;
            catalog.export(&output)
        }
    }
}

fn run_srt(captions: &Path, output: Option<&Path>) -> autocut_core::Result<()> {
    let transcription: TranscriptionResult = read_json(captions)?;
    write_or_print(output, &to_srt(&transcription.segments))
}

fn open_catalog(
    config: &AppConfig,
    sfx_dir: Option<PathBuf>,
    seed: Option<u64>,
) -> autocut_core::Result<SfxCatalog> {
    let root = sfx_dir.unwrap_or_else(|| config.sfx_dir.clone());
    match seed {
        Some(seed) => SfxCatalog::with_seed(root, seed),
        None => SfxCatalog::open(root),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> autocut_core::Result<T> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn write_or_print(output: Option<&Path>, text: &str) -> autocut_core::Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, text)?;
            tracing::info!(?path, "wrote output");
        }
        None => println!("{text}"),
    }
    Ok(())
}

fn init_tracing(default_level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Beat and caption aware timeline builder", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build a timeline from externally produced beat and caption analysis.
    Build(BuildArgs),
    /// Inspect the sound effect catalog.
    Sfx {
        #[command(subcommand)]
        command: SfxCommand,
    },
    /// Convert a transcription document to SubRip subtitles.
    Srt {
        /// Transcription JSON (`segments`, `language`, `text`).
        captions: PathBuf,
        /// Output file; printed to stdout when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(clap::Args, Debug)]
struct BuildArgs {
    /// Source video the timeline describes.
    #[arg(long)]
    asset: PathBuf,
    /// Beat analysis JSON (`beats`, `tempo`, `energy_peaks`).
    #[arg(long)]
    beats: PathBuf,
    /// Transcription JSON (`segments`, `language`, `text`).
    #[arg(long)]
    captions: PathBuf,
    /// Template document; defaults to the configured template.
    #[arg(short, long)]
    template: Option<PathBuf>,
    /// Sound effect directory; defaults to the configured one.
    #[arg(long)]
    sfx_dir: Option<PathBuf>,
    /// Seed for random sound effect selection.
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, default_value_t = 0)]
    asset_id: i64,
    #[arg(long, default_value = "1080x1920")]
    resolution: String,
    #[arg(long)]
    fps: Option<f64>,
    /// Asset duration in seconds.
    #[arg(long, default_value_t = 0.0)]
    duration: f64,
    /// Output file; printed to stdout when omitted.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum SfxCommand {
    /// Print every cataloged sound effect.
    List {
        #[arg(long)]
        sfx_dir: Option<PathBuf>,
    },
    /// Write the catalog as a JSON document.
    Export {
        output: PathBuf,
        #[arg(long)]
        sfx_dir: Option<PathBuf>,
    },
}
