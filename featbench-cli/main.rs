use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use featbench::{
    BenchConfig, BenchError, CombinationKey, FileImageSource, Harness, JpegSink, JsonReporter, TableReporter,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Compare feature detector/descriptor/matcher combinations on an image pair")]
struct Cli {
    /// Configuration file (.json or .toml)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,
    /// Query (object) image
    #[arg(long, value_name = "PATH", global = true)]
    query: Option<PathBuf>,
    /// Reference (scene) image
    #[arg(long, value_name = "PATH", global = true)]
    reference: Option<PathBuf>,
    /// Keypoints kept per image
    #[arg(long, global = true)]
    cap: Option<usize>,
    /// Directory for result_<det>_<desc>_<matcher>.jpg images
    #[arg(short, long, value_name = "DIR", global = true)]
    output_dir: Option<PathBuf>,
    /// Print results as JSON instead of a table
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every valid combination
    Grid,
    /// Run a single combination
    Run {
        #[arg(short, long)]
        detector: String,
        #[arg(short = 'e', long)]
        descriptor: String,
        #[arg(short, long, default_value = "BF")]
        matcher: String,
    },
    /// Print the default configuration as TOML
    PrintConfig,
}

fn load_config(cli: &Cli) -> Result<BenchConfig, BenchError> {
    let mut config = match &cli.config {
        Some(path) => BenchConfig::load(path)?,
        None => BenchConfig::default(),
    };
    if let Some(query) = &cli.query {
        config.query_image = Some(query.clone());
    }
    if let Some(reference) = &cli.reference {
        config.reference_image = Some(reference.clone());
    }
    if let Some(cap) = cli.cap {
        config.pipeline.extraction.keypoint_cap = cap;
    }
    if let Some(dir) = &cli.output_dir {
        config.output_dir = Some(dir.clone());
    }
    config.validate()?;
    Ok(config)
}

fn run(cli: Cli) -> Result<(), BenchError> {
    if let Command::PrintConfig = cli.command {
        print!("{}", BenchConfig::default().to_toml()?);
        return Ok(());
    }

    let config = load_config(&cli)?;
    info!("{}", config.summary());

    #[cfg(feature = "parallel")]
    featbench::init_workers(config.threads)?;

    let (Some(query), Some(reference)) = (&config.query_image, &config.reference_image) else {
        return Err(featbench::ConfigError::Invalid("both --query and --reference images are required".into()).into());
    };
    let source = FileImageSource::new(query, reference).with_max_side(config.max_image_side);

    let mut harness = Harness::new(config.pipeline.clone());
    harness = if cli.json {
        harness.with_reporter(JsonReporter::new(std::io::stdout()))
    } else {
        harness.with_reporter(TableReporter::stdout())
    };
    if let Some(dir) = &config.output_dir {
        harness = harness.with_sink(JpegSink::new(dir));
    }

    match cli.command {
        Command::Grid => {
            harness.run_grid(&source, &config.grid)?;
        }
        Command::Run {
            detector,
            descriptor,
            matcher,
        } => {
            harness.run_single(&source, &CombinationKey::new(detector, descriptor, matcher))?;
        }
        Command::PrintConfig => {}
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
