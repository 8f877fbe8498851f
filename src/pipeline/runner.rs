//! End-to-end run orchestration: fetch the threat feed, enrich each payload
//! with its notes and deep-visibility events concurrently, extract validated
//! records, then persist entity groups in dependency order so foreign keys
//! always resolve.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::client::ThreatFeed;
use crate::config::Settings;
use crate::db::Database;
use crate::errors::SiftError;
use crate::etl::extract::{extract_payloads, ExtractedBatch};
use crate::etl::upsert::UpsertOutcome;

/// Per-entity outcome of one pipeline run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub fetched: usize,
    pub extraction_dropped: usize,
    pub tenants: UpsertOutcome,
    pub endpoints: UpsertOutcome,
    pub threats: UpsertOutcome,
    pub notes: UpsertOutcome,
    pub indicators: UpsertOutcome,
    pub events: UpsertOutcome,
}

impl RunReport {
    pub fn total_written(&self) -> usize {
        self.tenants.written
            + self.endpoints.written
            + self.threats.written
            + self.notes.written
            + self.indicators.written
            + self.events.written
    }

    pub fn total_dropped(&self) -> usize {
        self.extraction_dropped
            + self.tenants.dropped
            + self.endpoints.dropped
            + self.threats.dropped
            + self.notes.dropped
            + self.indicators.dropped
            + self.events.dropped
    }
}

pub struct Pipeline {
    settings: Settings,
    db: Database,
    feed: Arc<dyn ThreatFeed>,
}

impl Pipeline {
    pub fn new(settings: Settings, db: Database, feed: Arc<dyn ThreatFeed>) -> Self {
        Self { settings, db, feed }
    }

    /// Fetch, enrich, extract, and persist one window of threats.
    pub async fn run(&self) -> Result<RunReport, SiftError> {
        let since = Utc::now() - ChronoDuration::days(self.settings.effective_since_days());
        info!(since = %since, "Starting pipeline run");

        let payloads = self
            .feed
            .fetch_threats(since, &self.settings.etl.verdicts)
            .await?;
        info!(threats = payloads.len(), "Fetched threat window");

        let enriched = enrich_payloads(
            self.feed.clone(),
            payloads,
            self.settings.etl.workers,
            self.settings.etl.progress,
        )
        .await;

        let batch = extract_payloads(&enriched);
        let mut report = persist_batch(&self.db, &batch, self.settings.etl.chunk_size);
        report.fetched = enriched.len();
        report.extraction_dropped = batch.dropped;

        info!(
            fetched = report.fetched,
            written = report.total_written(),
            dropped = report.total_dropped(),
            "Pipeline run complete"
        );
        Ok(report)
    }
}

/// Attach each threat's notes and deep-visibility events to its payload,
/// fanning the sub-fetches out across a bounded worker pool. A failed
/// sub-fetch degrades that one payload to empty enrichment rather than
/// failing the run.
pub async fn enrich_payloads(
    feed: Arc<dyn ThreatFeed>,
    payloads: Vec<Value>,
    workers: usize,
    progress: bool,
) -> Vec<Value> {
    let bar = if progress {
        let bar = ProgressBar::new(payloads.len() as u64);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} threats enriched",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
        );
        bar
    } else {
        ProgressBar::hidden()
    };

    let enriched: Vec<Value> = stream::iter(payloads)
        .map(|payload| {
            let feed = feed.clone();
            let bar = bar.clone();
            async move {
                let payload = enrich_one(feed, payload).await;
                bar.inc(1);
                payload
            }
        })
        .buffer_unordered(workers.max(1))
        .collect()
        .await;

    bar.finish_and_clear();
    enriched
}

async fn enrich_one(feed: Arc<dyn ThreatFeed>, mut payload: Value) -> Value {
    let threat_id = payload_threat_id(&payload);

    let notes = match threat_id {
        Some(id) => match feed.fetch_notes(id).await {
            Ok(notes) => notes,
            Err(e) => {
                warn!(threat_id = id, error = %e, "Notes fetch failed, continuing without notes");
                Vec::new()
            }
        },
        None => Vec::new(),
    };

    let events = match feed.fetch_deepvis(&payload).await {
        Ok(events) => events,
        Err(e) => {
            warn!(
                threat_id = threat_id.unwrap_or(0),
                error = %e,
                "Deep visibility fetch failed, continuing without events"
            );
            Vec::new()
        }
    };

    if let Some(obj) = payload.as_object_mut() {
        obj.insert("notes".to_string(), json!(notes));
        obj.insert("deepVisibilityEvents".to_string(), Value::Array(events));
    }
    payload
}

fn payload_threat_id(payload: &Value) -> Option<i64> {
    let raw = payload.pointer("/threatInfo/threatId")?;
    match raw {
        Value::Number(n) => n.as_i64().filter(|id| *id > 0),
        Value::String(s) => s.parse::<i64>().ok().filter(|id| *id > 0),
        _ => None,
    }
}

/// Write every entity group in dependency order. Parents before children:
/// a threat's row must exist before its notes, indicators, or events bind
/// their foreign keys.
pub fn persist_batch(db: &Database, batch: &ExtractedBatch, chunk_size: usize) -> RunReport {
    RunReport {
        tenants: db.upsert_all(&batch.tenants, chunk_size),
        endpoints: db.upsert_all(&batch.endpoints, chunk_size),
        threats: db.upsert_all(&batch.threats, chunk_size),
        notes: db.upsert_all(&batch.notes, chunk_size),
        indicators: db.upsert_all(&batch.indicators, chunk_size),
        events: db.upsert_all(&batch.events, chunk_size),
        ..Default::default()
    }
}
