use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "threatsift", version, about = "Threat detection ETL and feature export")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress the progress bar
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch, validate, and persist the current threat window
    Run(RunArgs),
    /// Fetch enriched threats to a raw JSON snapshot without persisting
    Fetch(FetchArgs),
    /// Load a raw JSON snapshot into the database
    Ingest(IngestArgs),
    /// Create the database schema
    InitDb(InitDbArgs),
    /// Export the tabular feature set from a raw JSON snapshot
    Features(FeaturesArgs),
}

#[derive(Args, Clone)]
pub struct RunArgs {
    /// Look-back window in days (overrides SIFT_SINCE_DAYS)
    #[arg(long)]
    pub since_days: Option<i64>,

    /// Comma-separated analyst verdicts to fetch (overrides SIFT_VERDICTS)
    #[arg(long)]
    pub verdicts: Option<String>,

    /// Sub-fetch worker-pool size (overrides SIFT_WORKERS)
    #[arg(long)]
    pub workers: Option<usize>,
}

#[derive(Args, Clone)]
pub struct FetchArgs {
    /// Output path for the raw snapshot
    #[arg(short, long, default_value = "./raw.json")]
    pub output: String,

    /// Look-back window in days (overrides SIFT_SINCE_DAYS)
    #[arg(long)]
    pub since_days: Option<i64>,

    /// Comma-separated analyst verdicts to fetch (overrides SIFT_VERDICTS)
    #[arg(long)]
    pub verdicts: Option<String>,

    /// Sub-fetch worker-pool size (overrides SIFT_WORKERS)
    #[arg(long)]
    pub workers: Option<usize>,
}

#[derive(Args, Clone)]
pub struct IngestArgs {
    /// Raw snapshot file to load
    #[arg(short, long)]
    pub input: String,
}

#[derive(Args, Clone)]
pub struct InitDbArgs {
    /// Database path (overrides SIFT_DB_PATH)
    #[arg(long)]
    pub db_path: Option<String>,
}

#[derive(Args, Clone)]
pub struct FeaturesArgs {
    /// Raw snapshot file to featurize
    #[arg(short, long)]
    pub input: String,

    /// Output CSV path, or - for stdout
    #[arg(short, long, default_value = "./features.csv")]
    pub output: String,
}
