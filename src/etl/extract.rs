//! Turns raw nested threat payloads into validated entity records. Absent
//! branches read as empty, and every candidate goes through the validation
//! layer: a record that fails is logged and dropped without disturbing the
//! rest of its payload or the batch. Tenant extraction and threat
//! extraction are independent failure domains.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{info, warn};

use crate::etl::validation::{
    agent_uuid, hash_bytes, normalize_ip, optional_timestamp, timestamp,
};
use crate::models::{
    DeepVisEvent, DetectionType, Endpoint, IncidentStatus, Indicator, Note, Tactic, Technique,
    Tenant, Threat, Verdict,
};

static EMPTY_LIST: Vec<Value> = Vec::new();

/// All candidate records extracted from one fetch, core entities deduped by
/// natural key (newest observation wins).
#[derive(Debug, Default)]
pub struct ExtractedBatch {
    pub tenants: Vec<Tenant>,
    pub endpoints: Vec<Endpoint>,
    pub threats: Vec<Threat>,
    pub notes: Vec<Note>,
    pub indicators: Vec<Indicator>,
    pub events: Vec<DeepVisEvent>,
    /// Candidate records dropped by validation during extraction.
    pub dropped: usize,
}

pub fn extract_payloads(payloads: &[Value]) -> ExtractedBatch {
    let mut tenants: BTreeMap<i64, Tenant> = BTreeMap::new();
    let mut endpoints: BTreeMap<i64, Endpoint> = BTreeMap::new();
    let mut threats: BTreeMap<i64, Threat> = BTreeMap::new();
    let mut batch = ExtractedBatch::default();

    for payload in payloads {
        extract_one(payload, &mut tenants, &mut endpoints, &mut threats, &mut batch);
    }

    batch.tenants = tenants.into_values().collect();
    batch.endpoints = endpoints.into_values().collect();
    batch.threats = threats.into_values().collect();

    info!(
        tenants = batch.tenants.len(),
        endpoints = batch.endpoints.len(),
        threats = batch.threats.len(),
        notes = batch.notes.len(),
        indicators = batch.indicators.len(),
        events = batch.events.len(),
        dropped = batch.dropped,
        "Extraction complete"
    );
    batch
}

fn extract_one(
    payload: &Value,
    tenants: &mut BTreeMap<i64, Tenant>,
    endpoints: &mut BTreeMap<i64, Endpoint>,
    threats: &mut BTreeMap<i64, Threat>,
    batch: &mut ExtractedBatch,
) {
    let ti = field(payload, "threatInfo");
    let det = field(payload, "agentDetectionInfo");
    let rt = field(payload, "agentRealtimeInfo");

    // Tenant: its own failure domain, extracted even when the threat id is
    // unusable
    let tenant_id = json_i64(det, "accountId").unwrap_or(0);
    if tenant_id > 0 {
        if let Some(name) = json_str(det, "accountName").filter(|n| !n.trim().is_empty()) {
            match Tenant::new(tenant_id, name) {
                Ok(t) => {
                    tenants.insert(t.tenant_id, t);
                }
                Err(e) => {
                    batch.dropped += 1;
                    warn!(entity = "tenant", tenant_id, error = %e, "Validation failed, dropping record");
                }
            }
        }
    }

    // Endpoint: requires a positive agent id, but its absence never blocks
    // the threat
    let endpoint_id = json_i64(rt, "agentId").filter(|&id| id > 0);
    if let Some(endpoint_id) = endpoint_id {
        match build_endpoint(endpoint_id, tenant_id, rt) {
            Ok(ep) => {
                endpoints.insert(ep.endpoint_id, ep);
            }
            Err(e) => {
                batch.dropped += 1;
                warn!(entity = "endpoint", endpoint_id, error = %e, "Validation failed, dropping record");
            }
        }
    }

    // Threat and dependents share the threat id; an unparsable id skips
    // them all without touching the tenant above
    let Some(threat_id) = json_i64(ti, "threatId").filter(|&id| id > 0) else {
        return;
    };

    match build_threat(threat_id, tenant_id, endpoint_id, ti) {
        Ok(th) => {
            threats.insert(th.threat_id, th);
        }
        Err(e) => {
            batch.dropped += 1;
            warn!(entity = "threat", threat_id, error = %e, "Validation failed, dropping record");
            // Dependents reference a threat row that will never exist
            return;
        }
    }

    for note in json_list(payload, "notes") {
        let Some(text) = note.as_str() else { continue };
        match Note::new(threat_id, text) {
            Ok(n) => batch.notes.push(n),
            Err(e) => {
                batch.dropped += 1;
                warn!(entity = "note", threat_id, error = %e, "Validation failed, dropping record");
            }
        }
    }

    for ind in json_list(payload, "indicators") {
        match build_indicator(threat_id, ind) {
            Ok(i) => batch.indicators.push(i),
            Err(e) => {
                batch.dropped += 1;
                warn!(entity = "indicator", threat_id, error = %e, "Validation failed, dropping record");
            }
        }
    }

    for ev in deepvis_list(payload) {
        match build_event(threat_id, ev) {
            Ok(e) => batch.events.push(e),
            Err(e) => {
                batch.dropped += 1;
                warn!(entity = "deepvis_event", threat_id, error = %e, "Validation failed, dropping record");
            }
        }
    }
}

fn build_endpoint(
    endpoint_id: i64,
    tenant_id: i64,
    rt: &Value,
) -> Result<Endpoint, crate::etl::validation::ValidationError> {
    Endpoint {
        endpoint_id,
        tenant_id,
        agent_uuid: agent_uuid("agent_uuid", json_str(rt, "agentUuid").unwrap_or(""))?,
        computer_name: owned(json_str(rt, "agentComputerName")),
        os_name: owned(json_str(rt, "agentOsName")),
        os_type: owned(json_str(rt, "agentOsType")),
        os_revision: owned(json_str(rt, "agentOsRevision")),
        ip_v4: normalize_ip("ip_v4", json_str(rt, "agentLocalIpV4"), false)?,
        ip_v6: normalize_ip("ip_v6", json_str(rt, "agentLocalIpV6"), true)?,
        group_id: json_i64(rt, "groupId"),
        site_id: json_i64(rt, "siteId"),
        agent_version: owned(json_str(rt, "agentVersion")),
        scan_started_at: optional_timestamp("scan_started_at", json_str(rt, "scanStartedAt"))?,
        scan_finished_at: optional_timestamp("scan_finished_at", json_str(rt, "scanFinishedAt"))?,
    }
    .validate()
}

fn build_threat(
    threat_id: i64,
    tenant_id: i64,
    endpoint_id: Option<i64>,
    ti: &Value,
) -> Result<Threat, crate::etl::validation::ValidationError> {
    Threat {
        threat_id,
        storyline: owned(json_str(ti, "storyline")),
        tenant_id,
        endpoint_id,
        md5: hash_bytes("md5", ti.get("md5"))?,
        sha1: hash_bytes("sha1", ti.get("sha1"))?,
        sha256: hash_bytes("sha256", ti.get("sha256"))?,
        file_path: owned(json_str(ti, "filePath")),
        file_size: json_i64(ti, "fileSize"),
        threat_name: owned(json_str(ti, "threatName")),
        publisher_name: owned(json_str(ti, "publisherName")),
        certificate_id: owned(json_str(ti, "certificateId")),
        incident_status: json_str(ti, "incidentStatus").and_then(IncidentStatus::parse),
        analyst_verdict: json_str(ti, "analystVerdict").and_then(Verdict::parse),
        detection_type: json_str(ti, "detectionType").and_then(DetectionType::parse),
        confidence_level: owned(json_str(ti, "confidenceLevel")),
        classification: owned(json_str(ti, "classification")),
        classification_source: owned(json_str(ti, "classificationSource")),
        initiated_by: owned(json_str(ti, "initiatedBy")),
        identified_at: timestamp("identified_at", json_str(ti, "identifiedAt").unwrap_or(""))?,
        created_at: timestamp("created_at", json_str(ti, "createdAt").unwrap_or(""))?,
    }
    .validate()
}

fn build_indicator(
    threat_id: i64,
    ind: &Value,
) -> Result<Indicator, crate::etl::validation::ValidationError> {
    let ids = ind.get("ids").and_then(Value::as_array).map(|arr| {
        arr.iter().filter_map(Value::as_i64).collect::<Vec<_>>()
    });

    let mut tactics = Vec::new();
    for tac in json_list(ind, "tactics") {
        let mut techniques = Vec::new();
        for tech in json_list(tac, "techniques") {
            match Technique::new(
                json_str(tech, "name").unwrap_or(""),
                json_str(tech, "link").unwrap_or(""),
            ) {
                Ok(t) => techniques.push(t),
                Err(e) => {
                    warn!(threat_id, error = %e, "Dropping malformed technique");
                }
            }
        }
        match Tactic::new(
            json_str(tac, "name").unwrap_or(""),
            json_str(tac, "source").unwrap_or("MITRE"),
            techniques,
        ) {
            Ok(t) => tactics.push(t),
            Err(e) => {
                warn!(threat_id, error = %e, "Dropping malformed tactic");
            }
        }
    }

    Indicator {
        threat_id,
        category: owned(json_str(ind, "category")),
        description: owned(json_str(ind, "description")),
        ids,
        tactics,
    }
    .validate()
}

fn build_event(
    threat_id: i64,
    ev: &Value,
) -> Result<DeepVisEvent, crate::etl::validation::ValidationError> {
    let event_time = json_str(ev, "event.time")
        .or_else(|| json_str(ev, "eventTime"))
        .unwrap_or("");
    let event_type = json_str(ev, "event.type")
        .or_else(|| json_str(ev, "eventType"))
        .unwrap_or("");
    let event_cat = json_str(ev, "event.category").or_else(|| json_str(ev, "eventCategory"));
    let severity = json_i64(ev, "severity");
    DeepVisEvent::new(
        threat_id,
        timestamp("event_time", event_time)?,
        event_type,
        owned(event_cat),
        severity,
    )
}

/// Nested object lookup that treats an absent or non-object branch as empty.
fn field<'a>(v: &'a Value, key: &str) -> &'a Value {
    match v.get(key) {
        Some(obj @ Value::Object(_)) => obj,
        _ => &Value::Null,
    }
}

fn json_str<'a>(v: &'a Value, key: &str) -> Option<&'a str> {
    v.get(key).and_then(Value::as_str)
}

/// Integer lookup tolerating ids serialized as strings.
fn json_i64(v: &Value, key: &str) -> Option<i64> {
    match v.get(key) {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    }
}

fn json_list<'a>(v: &'a Value, key: &str) -> &'a [Value] {
    v.get(key).and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&EMPTY_LIST)
}

fn deepvis_list(payload: &Value) -> &[Value] {
    let events = json_list(payload, "deepVisibilityEvents");
    if events.is_empty() {
        json_list(payload, "deepvis")
    } else {
        events
    }
}

fn owned(s: Option<&str>) -> Option<String> {
    s.map(str::to_string).filter(|s| !s.is_empty())
}
