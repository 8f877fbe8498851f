//! End-to-end ingestion tests over an in-memory database: extraction,
//! tiered persistence, cascade behavior, and pipeline degradation under
//! upstream failure.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use threatsift::client::ThreatFeed;
use threatsift::config::Settings;
use threatsift::db::Database;
use threatsift::errors::SiftError;
use threatsift::etl::extract_payloads;
use threatsift::pipeline::{persist_batch, Pipeline};

const CHUNK: usize = 100;

fn payload(threat_id: i64, tenant_id: i64, sha256: &str) -> Value {
    json!({
        "threatInfo": {
            "threatId": threat_id,
            "storyline": format!("story-{}", threat_id),
            "sha256": sha256,
            "createdAt": "2025-06-01T08:00:00Z",
            "identifiedAt": "2025-06-01T08:00:00Z",
            "analystVerdict": "true_positive",
            "incidentStatus": "resolved",
            "threatName": "evil.exe",
            "filePath": "C:\\temp\\evil.exe",
        },
        "agentDetectionInfo": {
            "accountId": tenant_id,
            "accountName": format!("tenant-{}", tenant_id),
        },
        "agentRealtimeInfo": {
            "agentId": threat_id * 10,
            "agentUuid": format!("6dd2a233-5fe5-4dd1-9b2c-0b4f9a1e2{:03}", threat_id),
            "agentComputerName": format!("host-{}", threat_id),
            "agentLocalIpV4": "10.0.0.5",
        },
        "notes": [format!("analyst note for {}", threat_id)],
        "indicators": [
            {
                "category": "Persistence",
                "description": "registry run key",
                "tactics": [
                    {"name": "TA0003", "source": "MITRE",
                     "techniques": [{"name": "T1547", "link": "https://attack.mitre.org/techniques/T1547"}]}
                ]
            }
        ],
        "deepVisibilityEvents": [
            {"event.time": "2025-06-01T08:00:30Z", "event.type": "Process Creation",
             "event.category": "process", "severity": 4}
        ],
    })
}

fn sha(fill: char) -> String {
    std::iter::repeat(fill).take(64).collect()
}

#[test]
fn clean_batch_persists_every_entity() {
    let db = Database::in_memory().unwrap();
    let payloads = vec![
        payload(1, 100, &sha('a')),
        payload(2, 100, &sha('b')),
        payload(3, 100, &sha('c')),
    ];

    let batch = extract_payloads(&payloads);
    let report = persist_batch(&db, &batch, CHUNK);

    assert_eq!(report.tenants.written, 1);
    assert_eq!(report.threats.written, 3);
    assert_eq!(report.total_dropped(), 0);

    assert_eq!(db.tenant_count().unwrap(), 1);
    assert_eq!(db.endpoint_count().unwrap(), 3);
    assert_eq!(db.threat_count().unwrap(), 3);
    assert_eq!(db.note_count().unwrap(), 3);
    assert_eq!(db.indicator_count().unwrap(), 3);
    assert_eq!(db.tactic_count().unwrap(), 3);
    assert_eq!(db.technique_count().unwrap(), 3);
    assert_eq!(db.event_count().unwrap(), 3);
}

#[test]
fn rerun_is_idempotent_for_core_entities() {
    let db = Database::in_memory().unwrap();
    let payloads = vec![payload(1, 100, &sha('a')), payload(2, 100, &sha('b'))];

    let batch = extract_payloads(&payloads);
    persist_batch(&db, &batch, CHUNK);
    let batch = extract_payloads(&payloads);
    let report = persist_batch(&db, &batch, CHUNK);

    assert_eq!(report.total_dropped(), 0);
    assert_eq!(db.tenant_count().unwrap(), 1);
    assert_eq!(db.endpoint_count().unwrap(), 2);
    assert_eq!(db.threat_count().unwrap(), 2);
    // Deep visibility events carry a natural key and never duplicate
    assert_eq!(db.event_count().unwrap(), 2);
}

#[test]
fn conflicting_natural_key_demotes_to_per_record_and_drops_one() {
    let db = Database::in_memory().unwrap();

    // Same tenant, sha256, and identification time under two different
    // threat ids violates the content-identity constraint; only the record
    // that reached the store first survives
    let payloads = vec![
        payload(1, 100, &sha('a')),
        payload(2, 100, &sha('a')),
        payload(3, 100, &sha('c')),
    ];

    let batch = extract_payloads(&payloads);
    let report = persist_batch(&db, &batch, CHUNK);

    assert_eq!(report.threats.attempted, 3);
    assert_eq!(report.threats.written, 2);
    assert_eq!(report.threats.dropped, 1);
    assert_eq!(db.threat_count().unwrap(), 2);

    // Unrelated entities from the dropped threat's payload are unaffected
    assert_eq!(db.tenant_count().unwrap(), 1);
    assert_eq!(db.endpoint_count().unwrap(), 3);
}

#[test]
fn duplicate_deepvis_events_collapse_to_one_row() {
    let db = Database::in_memory().unwrap();
    let mut p = payload(1, 100, &sha('a'));
    let ev = p["deepVisibilityEvents"][0].clone();
    p["deepVisibilityEvents"].as_array_mut().unwrap().push(ev);

    let batch = extract_payloads(&[p]);
    assert_eq!(batch.events.len(), 2);
    persist_batch(&db, &batch, CHUNK);

    assert_eq!(db.event_count().unwrap(), 1);
}

#[test]
fn malformed_sha256_drops_threat_but_keeps_tenant() {
    let db = Database::in_memory().unwrap();
    let mut p = payload(1, 100, &sha('a'));
    p["threatInfo"]["sha256"] = json!("not-hex!");

    let batch = extract_payloads(&[p]);
    assert_eq!(batch.threats.len(), 0);
    assert_eq!(batch.dropped, 1);

    persist_batch(&db, &batch, CHUNK);
    assert_eq!(db.tenant_count().unwrap(), 1);
    assert_eq!(db.threat_count().unwrap(), 0);
}

#[test]
fn reingest_updates_verdict_but_never_identity_fields() {
    let db = Database::in_memory().unwrap();
    let first = payload(1, 100, &sha('a'));
    persist_batch(&db, &extract_payloads(&[first.clone()]), CHUNK);
    let stamped_at_insert = db.threat_last_updated(1).unwrap().unwrap();

    // Millisecond-resolution trigger timestamps need a little real time
    std::thread::sleep(std::time::Duration::from_millis(20));

    let mut second = first;
    second["threatInfo"]["analystVerdict"] = json!("false_positive");
    second["threatInfo"]["sha256"] = json!(sha('b'));
    let report = persist_batch(&db, &extract_payloads(&[second]), CHUNK);
    assert_eq!(report.threats.dropped, 0);

    // Mutable classification fields follow the newest observation
    assert_eq!(db.threat_verdict(1).unwrap().as_deref(), Some("false_positive"));
    // Identity fields survive the conflict untouched
    let stored = db.threat_sha256(1).unwrap().unwrap();
    assert_eq!(data_encoding::HEXLOWER.encode(&stored), sha('a'));
    // The touch trigger stamps the update
    let stamped_at_update = db.threat_last_updated(1).unwrap().unwrap();
    assert!(stamped_at_update > stamped_at_insert);
    // Notes are append-only; the re-ingested duplicate is kept
    assert_eq!(db.notes_for_threat(1).unwrap().len(), 2);
}

#[test]
fn hash_round_trips_through_the_store() {
    let db = Database::in_memory().unwrap();
    let digest = "deadbeef".repeat(8);
    let batch = extract_payloads(&[payload(7, 100, &digest)]);
    persist_batch(&db, &batch, CHUNK);

    let stored = db.threat_sha256(7).unwrap().unwrap();
    assert_eq!(stored.len(), 32);
    assert_eq!(data_encoding::HEXLOWER.encode(&stored), digest);
}

#[test]
fn deleting_a_tenant_cascades_to_every_dependent() {
    let db = Database::in_memory().unwrap();
    let batch = extract_payloads(&[payload(1, 100, &sha('a')), payload(2, 100, &sha('b'))]);
    persist_batch(&db, &batch, CHUNK);

    let removed = db.delete_tenant(100).unwrap();
    assert_eq!(removed, 1);
    assert_eq!(db.endpoint_count().unwrap(), 0);
    assert_eq!(db.threat_count().unwrap(), 0);
    assert_eq!(db.note_count().unwrap(), 0);
    assert_eq!(db.indicator_count().unwrap(), 0);
    assert_eq!(db.tactic_count().unwrap(), 0);
    assert_eq!(db.technique_count().unwrap(), 0);
    assert_eq!(db.event_count().unwrap(), 0);
}

#[test]
fn deleting_a_threat_leaves_its_endpoint_and_tenant() {
    let db = Database::in_memory().unwrap();
    let batch = extract_payloads(&[payload(1, 100, &sha('a'))]);
    persist_batch(&db, &batch, CHUNK);

    assert_eq!(db.delete_threat(1).unwrap(), 1);
    assert_eq!(db.threat_count().unwrap(), 0);
    assert_eq!(db.note_count().unwrap(), 0);
    assert_eq!(db.tenant_count().unwrap(), 1);
    assert_eq!(db.endpoint_count().unwrap(), 1);
}

struct FlakyFeed {
    threats: Vec<Value>,
    note_calls: AtomicU32,
}

#[async_trait]
impl ThreatFeed for FlakyFeed {
    async fn fetch_threats(
        &self,
        _since: DateTime<Utc>,
        _verdicts: &[String],
    ) -> Result<Vec<Value>, SiftError> {
        Ok(self.threats.clone())
    }

    async fn fetch_notes(&self, threat_id: i64) -> Result<Vec<String>, SiftError> {
        // Every other note fetch hits the rate limiter
        if self.note_calls.fetch_add(1, Ordering::SeqCst) % 2 == 0 {
            return Err(SiftError::RateLimit("429".into()));
        }
        Ok(vec![format!("fetched note {}", threat_id)])
    }

    async fn fetch_deepvis(&self, _threat: &Value) -> Result<Vec<Value>, SiftError> {
        Err(SiftError::TransientUpstream("502".into()))
    }
}

#[tokio::test]
async fn pipeline_degrades_on_subfetch_failures_without_failing_the_run() {
    let feed = Arc::new(FlakyFeed {
        threats: vec![payload(1, 100, &sha('a')), payload(2, 100, &sha('b'))],
        note_calls: AtomicU32::new(0),
    });
    let db = Database::in_memory().unwrap();
    let mut settings = Settings::default();
    settings.etl.progress = false;

    let report = Pipeline::new(settings, db.clone(), feed).run().await.unwrap();

    assert_eq!(report.fetched, 2);
    assert_eq!(report.threats.written, 2);
    // One of the two note fetches failed; the run still completed
    assert_eq!(db.note_count().unwrap(), 1);
    assert_eq!(db.event_count().unwrap(), 0);
}

struct DeadFeed;

#[async_trait]
impl ThreatFeed for DeadFeed {
    async fn fetch_threats(
        &self,
        _since: DateTime<Utc>,
        _verdicts: &[String],
    ) -> Result<Vec<Value>, SiftError> {
        Err(SiftError::Authentication("401 invalid token".into()))
    }

    async fn fetch_notes(&self, _threat_id: i64) -> Result<Vec<String>, SiftError> {
        Ok(Vec::new())
    }

    async fn fetch_deepvis(&self, _threat: &Value) -> Result<Vec<Value>, SiftError> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn pipeline_surfaces_feed_level_failure() {
    let db = Database::in_memory().unwrap();
    let mut settings = Settings::default();
    settings.etl.progress = false;

    let err = Pipeline::new(settings, db, Arc::new(DeadFeed)).run().await.unwrap_err();
    assert!(matches!(err, SiftError::Authentication(_)));
}
