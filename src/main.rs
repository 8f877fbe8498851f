use clap::Parser;
use tracing_subscriber::EnvFilter;

use threatsift::cli;
use threatsift::errors::SiftError;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(!cli.no_color)
        .init();

    let result = match cli.command {
        cli::Commands::Run(args) => cli::run::handle_run(args, cli.quiet).await,
        cli::Commands::Fetch(args) => cli::fetch::handle_fetch(args, cli.quiet).await,
        cli::Commands::Ingest(args) => cli::ingest::handle_ingest(args).await,
        cli::Commands::InitDb(args) => cli::initdb::handle_initdb(args).await,
        cli::Commands::Features(args) => cli::features::handle_features(args).await,
    };

    match result {
        Ok(()) => {}
        Err(e) => {
            eprintln!("Error: {}", e);
            let exit_code = match &e {
                SiftError::Config(_) => 2,
                SiftError::Authentication(_) => 4,
                _ => 1,
            };
            std::process::exit(exit_code);
        }
    }
}
