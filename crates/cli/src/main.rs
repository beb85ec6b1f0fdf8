use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::error::{ContextKind, ContextValue, ErrorKind};
use clap::{Args, Parser, Subcommand};

use facecount_core::detection::infrastructure::model_detector_factory::ModelDetectorFactory;
use facecount_core::distribution::infrastructure::distributed_cache::DistributedCache;
use facecount_core::output::infrastructure::text_output_writer::TextOutputWriter;
use facecount_core::pipeline::count_faces_use_case::CountFacesUseCase;
use facecount_core::pipeline::infrastructure::threaded_job_executor::ThreadedJobExecutor;
use facecount_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use facecount_core::shared::constants::FACE_COUNT_KEY;
use facecount_core::shared::job_config::{ConfigError, JobConfig};

const USAGE: &str = "Usage: facecount run <input-container-path> <output-directory>";

/// Counts faces across a bundle of images.
#[derive(Parser, Debug)]
#[command(name = "facecount", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a face counting job and write the total to the output directory.
    Run(RunArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Image file or directory of images.
    input: PathBuf,

    /// Output directory. Must not exist yet.
    output: PathBuf,

    /// Detector model URI, optionally with a `#link` name.
    #[arg(long)]
    model: Option<String>,

    /// Number of worker threads.
    #[arg(long)]
    workers: Option<usize>,

    /// Images per input split.
    #[arg(long)]
    split_size: Option<usize>,

    /// Directory the model is staged into.
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// JSON job configuration. Flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Smallest face the cascade detector looks for, in pixels (>= 20).
    #[arg(long)]
    min_face_size: Option<u32>,

    /// Cascade classifier score threshold.
    #[arg(long)]
    score_threshold: Option<f64>,
}

fn main() {
    env_logger::init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if is_usage_error(&e) => {
            println!("{USAGE}");
            process::exit(0);
        }
        Err(e) => e.exit(),
    };

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

/// Wrong argument count prints usage and exits cleanly instead of failing.
/// Unknown flags still fail through clap.
fn is_usage_error(err: &clap::Error) -> bool {
    match err.kind() {
        ErrorKind::MissingRequiredArgument
        | ErrorKind::MissingSubcommand
        | ErrorKind::InvalidSubcommand
        | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => true,
        ErrorKind::UnknownArgument => is_extra_positional(err),
        _ => false,
    }
}

fn is_extra_positional(err: &clap::Error) -> bool {
    match err.get(ContextKind::InvalidArg) {
        Some(ContextValue::String(arg)) => !arg.starts_with('-'),
        _ => false,
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let Command::Run(args) = cli.command;
    let config = build_config(&args)?;

    let mut sink = TextOutputWriter::create(&args.output)?;

    let cache = match &config.cache_dir {
        Some(dir) => DistributedCache::new(dir),
        None => DistributedCache::with_default_root()?,
    };
    let mut cache = cache.with_progress(Box::new(download_progress));
    let model = cache.add_cache_file(&config.model)?;
    log::info!("Using model {} (linked as {})", model.uri, model.link);

    let mut use_case = CountFacesUseCase::new(
        Box::new(ThreadedJobExecutor::new(config.workers)),
        Arc::new(cache),
        Arc::new(ModelDetectorFactory::new(config.detector.clone())),
        Box::new(StdoutPipelineLogger::default()),
    )
    .with_split_size(config.split_size);

    let report = use_case.execute(&args.input, &mut sink)?;
    if let Some(result) = report.result_for(FACE_COUNT_KEY) {
        log::info!(
            "Counted {} faces in {} images",
            result.total_faces,
            result.images_processed
        );
    }
    log::info!("Output written to {}", sink.part_file().display());
    Ok(())
}

fn build_config(args: &RunArgs) -> Result<JobConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => JobConfig::load(path)?,
        None => JobConfig::default(),
    };

    if let Some(model) = &args.model {
        config.model = model.clone();
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(split_size) = args.split_size {
        config.split_size = split_size;
    }
    if let Some(dir) = &args.cache_dir {
        config.cache_dir = Some(dir.clone());
    }
    if let Some(size) = args.min_face_size {
        config.detector.min_face_size = size;
    }
    if let Some(threshold) = args.score_threshold {
        config.detector.score_threshold = threshold;
    }

    config.validate()?;
    Ok(config)
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading face detection model... {pct}%");
        if downloaded >= total {
            eprintln!();
        }
    } else {
        eprint!("\rDownloading face detection model... {downloaded} bytes");
    }
}
