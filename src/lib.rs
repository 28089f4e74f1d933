pub mod cache;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod evaluator;
pub mod llm;
pub mod models;
pub mod normalize;
pub mod ocr;
pub mod services;
pub mod solar;
pub mod types;

use cache::ModelChoice;
use clap::{Parser, Subcommand, ValueEnum};
use commands::AppState;
use config::AppConfig;
use error::AppError;
use services::PipelineKind;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "solar-ocr-bench", version, about = "Solar PV prediction tools and receipt OCR benchmarking")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModelArg {
    /// Gradient-boosted trees
    Xgb,
    /// Random forest
    Rf,
}

impl From<ModelArg> for ModelChoice {
    fn from(m: ModelArg) -> Self {
        match m {
            ModelArg::Xgb => ModelChoice::GradientBoosted,
            ModelArg::Rf => ModelChoice::RandomForest,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show which services and paths are configured
    Status,
    /// Look up coordinates of an Australian city
    Lookup { city: String },
    /// Typical weather for a month's season
    Seasonal { month: i64 },
    /// List the features the regressors expect
    Features,
    /// Predict daily PV output (kWh/kWp)
    Predict {
        /// Weather record as inline JSON or a path to a JSON file
        #[arg(long)]
        json: Option<String>,
        /// Fill Latitude/Longitude from this city
        #[arg(long)]
        city: Option<String>,
        /// Fill weather parameters from this month's seasonal defaults
        #[arg(long)]
        month: Option<i64>,
        #[arg(long, value_enum, default_value = "xgb")]
        model: ModelArg,
    },
    /// Talk to the solar prediction assistant
    Chat {
        /// Send one message and exit instead of starting a session
        #[arg(long, short)]
        message: Option<String>,
    },
    /// Run one pipeline on one receipt image
    Ocr {
        #[arg(long, value_enum, default_value = "raw-ocr")]
        pipeline: PipelineKind,
        image: PathBuf,
    },
    /// Print the reconstructed ground truth of a document
    GroundTruth { document: String },
    /// Run one pipeline on one image and score it against ground truth
    Evaluate {
        #[arg(long, value_enum, default_value = "raw-ocr")]
        pipeline: PipelineKind,
        image: PathBuf,
    },
    /// Score pipelines over the dataset and print averages
    Benchmark {
        /// Only the first N images; 0 runs the whole dataset
        #[arg(long, default_value_t = 10)]
        samples: usize,
        /// Restrict to these pipelines (repeatable); all four by default
        #[arg(long, value_enum)]
        pipeline: Vec<PipelineKind>,
        /// Do not record the run in the local store
        #[arg(long)]
        no_store: bool,
    },
    /// One image through all four pipelines with timings
    Verify {
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Recorded benchmark runs, or the documents of one run
    History {
        #[arg(long)]
        run: Option<i64>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

/// `RUST_LOG` wins, then `LOG_LEVEL`. Logs go to stderr.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn run() -> Result<(), AppError> {
    config::load_env();
    let cli = Cli::parse();
    let config = AppConfig::from_env();
    init_tracing(&config.log_level);
    execute(cli.command, &AppState::new(config))
}

pub fn execute(command: Command, state: &AppState) -> Result<(), AppError> {
    let output = match command {
        Command::Status => commands::status(state),
        Command::Lookup { city } => commands::lookup(&city),
        Command::Seasonal { month } => commands::seasonal(month),
        Command::Features => commands::features(state),
        Command::Predict {
            json,
            city,
            month,
            model,
        } => commands::predict(state, json.as_deref(), city.as_deref(), month, model.into())?,
        Command::Chat { message } => return commands::chat(state, message.as_deref()),
        Command::Ocr { pipeline, image } => commands::ocr(state, pipeline, &image)?,
        Command::GroundTruth { document } => commands::ground_truth(state, &document)?,
        Command::Evaluate { pipeline, image } => commands::evaluate(state, pipeline, &image)?,
        Command::Benchmark {
            samples,
            pipeline,
            no_store,
        } => commands::benchmark(state, Some(samples), &pipeline, !no_store)?,
        Command::Verify { image } => commands::verify(state, image)?,
        Command::History { run, limit } => commands::history(state, run, limit)?,
    };
    println!("{}", output);
    Ok(())
}
