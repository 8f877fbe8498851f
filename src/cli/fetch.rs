use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use serde_json::json;
use tracing::info;

use crate::cli::commands::FetchArgs;
use crate::client::{ApiClient, ThreatFeed};
use crate::config::Settings;
use crate::errors::SiftError;
use crate::pipeline::enrich_payloads;

/// Fetch and enrich the threat window, then write it as a raw snapshot
/// for later `ingest` or `features` runs.
pub async fn handle_fetch(args: FetchArgs, quiet: bool) -> Result<(), SiftError> {
    let mut settings = Settings::from_env()?;
    super::run::apply_overrides(&mut settings, args.since_days, args.verdicts, args.workers)?;
    settings.require_api()?;

    let feed: Arc<dyn ThreatFeed> = Arc::new(ApiClient::new(&settings.api)?);
    let since = Utc::now() - ChronoDuration::days(settings.effective_since_days());

    let payloads = feed.fetch_threats(since, &settings.etl.verdicts).await?;
    info!(threats = payloads.len(), "Fetched threat window");
    let enriched = enrich_payloads(feed, payloads, settings.etl.workers, !quiet).await;

    let envelope = json!({
        "metadata": {
            "generated_at": Utc::now().to_rfc3339(),
            "num_threats": enriched.len(),
        },
        "threats": enriched,
    });
    std::fs::write(&args.output, serde_json::to_vec_pretty(&envelope)?)?;

    println!("Wrote {} threats to {}", envelope["metadata"]["num_threats"], args.output);
    Ok(())
}
