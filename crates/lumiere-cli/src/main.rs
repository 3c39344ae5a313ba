mod shell;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use lumiere_contracts::catalog::StylePreset;
use lumiere_contracts::events::EventWriter;
use lumiere_contracts::intake::UploadedImage;
use lumiere_contracts::runs::summary::{
    load_summary, now_utc_iso, write_summary, BatchSummary, FailureRecord, ResultRecord,
    SUMMARY_SCHEMA_VERSION,
};
use lumiere_engine::{
    default_provider_registry, download_file_name, resolve_generation, write_result_image,
    BatchObserver, CancelToken, CredentialProvider, EnvCredentials, GeneratedResult, Orchestrator,
    PoseFailure, Studio, StudioConfig,
};

const DRYRUN_MODEL: &str = "dryrun-image-1";

#[derive(Debug, Parser)]
#[command(name = "lumiere", version, about = "Lumière fashion editorial generator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate the ten-shot editorial for one portrait and its products.
    Generate(GenerateArgs),
    /// List the style presets.
    Styles,
    /// List the editorial poses in generation order.
    Poses,
    /// Print the gallery of a finished run.
    Gallery(GalleryArgs),
    /// Copy one shot of a finished run as `lumiere-editorial-<id>.png`.
    Export(ExportArgs),
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    #[arg(long)]
    portrait: PathBuf,
    #[arg(long = "product", required = true)]
    products: Vec<PathBuf>,
    #[arg(long, default_value = "minimalist")]
    style: String,
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    image_size: Option<String>,
    #[arg(long)]
    aspect_ratio: Option<String>,
    /// Use the offline placeholder provider.
    #[arg(long)]
    dryrun: bool,
}

#[derive(Debug, Parser)]
struct GalleryArgs {
    #[arg(long)]
    run: PathBuf,
}

#[derive(Debug, Parser)]
struct ExportArgs {
    #[arg(long)]
    run: PathBuf,
    #[arg(long)]
    id: String,
    #[arg(long)]
    dest: PathBuf,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("lumiere error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Generate(args) => run_generate(args),
        Command::Styles => {
            for line in shell::style_lines(StylePreset::default()) {
                println!("{line}");
            }
            Ok(0)
        }
        Command::Poses => {
            for line in shell::pose_lines() {
                println!("{line}");
            }
            Ok(0)
        }
        Command::Gallery(args) => run_gallery(args),
        Command::Export(args) => run_export(args),
    }
}

fn run_generate(args: GenerateArgs) -> Result<i32> {
    let style: StylePreset = args.style.parse()?;

    let mut config = StudioConfig::from_env();
    if let Some(model) = args.model.clone() {
        config.model = Some(model);
    }
    if args.dryrun {
        config.model = Some(DRYRUN_MODEL.to_string());
    }
    if let Some(size) = args.image_size.clone() {
        config.image_size = size;
    }
    if let Some(ratio) = args.aspect_ratio.clone() {
        config.aspect_ratio = ratio;
    }

    let credentials = Arc::new(EnvCredentials::new());
    let providers = default_provider_registry(&config, credentials.clone());
    let resolved = resolve_generation(&config, &providers)?;
    if let Some(reason) = &resolved.fallback_reason {
        eprintln!("{reason}");
    }
    for warning in &resolved.warnings {
        eprintln!("warning: {warning}");
    }
    let Some(provider) = providers.get(&resolved.model.provider) else {
        bail!("provider '{}' is not registered", resolved.model.provider);
    };
    if provider.name() == "gemini"
        && !credentials.has_credential()
        && !credentials.request_credential()
    {
        bail!("an API key is required; set GEMINI_API_KEY or enter one when prompted");
    }

    fs::create_dir_all(&args.out)
        .with_context(|| format!("failed to create {}", args.out.display()))?;
    let session_id = args
        .out
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let events_path = args
        .events
        .clone()
        .unwrap_or_else(|| args.out.join("events.jsonl"));
    let events = EventWriter::new(events_path, session_id.clone());

    let orchestrator = Orchestrator::new(provider, resolved.settings.clone(), Some(events));
    let mut studio = Studio::new(orchestrator);
    studio.set_style(style);
    studio
        .portrait
        .add(vec![UploadedImage::from_path(&args.portrait)?]);
    let products = args
        .products
        .iter()
        .map(UploadedImage::from_path)
        .collect::<Result<Vec<_>>>()?;
    let offered = products.len();
    let kept = studio.products.add(products);
    if kept < offered {
        eprintln!(
            "warning: only the first {kept} of {offered} products were kept (limit {})",
            studio.products.capacity()
        );
    }

    for line in shell::slot_lines("01. The Model", "portrait", &studio.portrait) {
        println!("{line}");
    }
    for line in shell::slot_lines("02. The Collection", "products", &studio.products) {
        println!("{line}");
    }
    println!("03. Aesthetic");
    for line in shell::style_lines(studio.style()) {
        println!("  {line}");
    }
    println!(
        "model {} ({}, {})",
        resolved.settings.model, resolved.settings.aspect_ratio, resolved.settings.image_size
    );

    let started_at = now_utc_iso();
    let mut observer = ShellObserver {
        out_dir: args.out.clone(),
        records: Vec::new(),
        failures: Vec::new(),
    };
    let outcome = studio.generate(&mut observer, &CancelToken::new());

    let (attempted, cancelled) = match &outcome {
        Ok(done) => (done.attempted, done.cancelled),
        Err(_) => (observer.records.len() + observer.failures.len(), false),
    };
    let summary = BatchSummary {
        schema_version: SUMMARY_SCHEMA_VERSION,
        session_id,
        style: style.key().to_string(),
        model: resolved.settings.model.clone(),
        started_at,
        finished_at: now_utc_iso(),
        attempted,
        cancelled,
        results: observer.records,
        failures: observer.failures,
    };
    write_summary(&args.out.join("summary.json"), &summary)?;

    if let Some(message) = studio.generation_error() {
        eprintln!("{message}");
    }
    outcome?;

    for line in shell::gallery_lines(&summary.results) {
        println!("{line}");
    }
    if summary.results.is_empty() {
        println!("No shots were generated.");
    }
    Ok(0)
}

fn run_gallery(args: GalleryArgs) -> Result<i32> {
    let summary = load_summary(&summary_path(&args.run))?;
    println!(
        "{} / {} / {}",
        summary.session_id, summary.style, summary.model
    );
    for line in shell::gallery_lines(&summary.results) {
        println!("{line}");
    }
    for failure in &summary.failures {
        println!("  pose {:>2} failed: {}", failure.pose_index + 1, failure.error);
    }
    Ok(0)
}

fn run_export(args: ExportArgs) -> Result<i32> {
    let summary = load_summary(&summary_path(&args.run))?;
    let Some(record) = summary.find(&args.id) else {
        bail!("no result '{}' in {}", args.id, args.run.display());
    };
    fs::create_dir_all(&args.dest)
        .with_context(|| format!("failed to create {}", args.dest.display()))?;
    let target = args.dest.join(download_file_name(&record.id));
    fs::copy(&record.image_path, &target)
        .with_context(|| format!("failed to copy {}", record.image_path))?;
    println!("{}", target.display());
    Ok(0)
}

fn summary_path(run: &Path) -> PathBuf {
    if run.is_dir() {
        run.join("summary.json")
    } else {
        run.to_path_buf()
    }
}

/// Saves each shot as it arrives and keeps the run report current.
struct ShellObserver {
    out_dir: PathBuf,
    records: Vec<ResultRecord>,
    failures: Vec<FailureRecord>,
}

impl BatchObserver for ShellObserver {
    fn on_pose_started(&mut self, index: usize, _pose: &str) -> Result<()> {
        println!("Synthesizing pose {}...", index + 1);
        Ok(())
    }

    fn on_result(&mut self, result: &GeneratedResult, progress: f64) -> Result<()> {
        let path = write_result_image(&result.id, &result.data_url, &self.out_dir)?;
        self.records.push(ResultRecord {
            id: result.id.clone(),
            pose_index: result.pose_index,
            prompt: result.prompt.clone(),
            image_path: path.to_string_lossy().to_string(),
        });
        println!("{} {}", shell::progress_bar(progress), path.display());
        Ok(())
    }

    fn on_failure(&mut self, failure: &PoseFailure, progress: f64) -> Result<()> {
        eprintln!("pose {} failed: {}", failure.pose_index + 1, failure.error);
        self.failures.push(FailureRecord {
            pose_index: failure.pose_index,
            error: failure.error.clone(),
        });
        println!("{}", shell::progress_bar(progress));
        Ok(())
    }
}
