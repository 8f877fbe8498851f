use std::sync::Arc;

use crate::cli::commands::RunArgs;
use crate::client::ApiClient;
use crate::config::Settings;
use crate::db::Database;
use crate::errors::SiftError;
use crate::pipeline::Pipeline;

pub async fn handle_run(args: RunArgs, quiet: bool) -> Result<(), SiftError> {
    let mut settings = Settings::from_env()?;
    apply_overrides(&mut settings, args.since_days, args.verdicts, args.workers)?;
    settings.etl.progress = !quiet;
    settings.require_api()?;

    let db = Database::new(&settings.database.path)?;
    let feed = Arc::new(ApiClient::new(&settings.api)?);
    let report = Pipeline::new(settings, db, feed).run().await?;

    println!(
        "Run complete: {} threats fetched, {} rows written, {} records dropped",
        report.fetched,
        report.total_written(),
        report.total_dropped()
    );
    Ok(())
}

/// Flag overrides win over environment configuration.
pub(super) fn apply_overrides(
    settings: &mut Settings,
    since_days: Option<i64>,
    verdicts: Option<String>,
    workers: Option<usize>,
) -> Result<(), SiftError> {
    if let Some(workers) = workers {
        if workers == 0 {
            return Err(SiftError::Config("--workers must be at least 1".into()));
        }
        settings.etl.workers = workers;
    }
    if let Some(days) = since_days {
        if days < 0 {
            return Err(SiftError::Config("--since-days must be non-negative".into()));
        }
        settings.etl.since_days = days;
    }
    if let Some(verdicts) = verdicts {
        let parsed: Vec<String> = verdicts
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect();
        if parsed.is_empty() {
            return Err(SiftError::Config("--verdicts must name at least one verdict".into()));
        }
        settings.etl.verdicts = parsed;
    }
    Ok(())
}
