//! Flattens one enriched threat payload into a tabular feature row. Rows
//! are ragged by nature (engine one-hots and per-category counts only
//! appear where observed); the CSV writer is responsible for unioning
//! columns and zero-filling.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Datelike, Timelike};
use serde_json::Value;

/// Maximum characters of concatenated analyst notes carried per row.
const NOTES_TEXT_CAP: usize = 5000;

/// One feature row, keyed by column name. String-valued columns hold
/// `Value::String`; everything else is numeric.
pub type FeatureRow = BTreeMap<String, Value>;

pub fn featurize(payload: &Value) -> FeatureRow {
    let ti = payload.get("threatInfo").unwrap_or(&Value::Null);
    let mut row = FeatureRow::new();

    let verdict = ti.get("analystVerdict").and_then(Value::as_str).unwrap_or("");
    let is_tp = verdict.eq_ignore_ascii_case("true_positive");
    row.insert("label".into(), Value::from(i64::from(is_tp)));

    if let Some(created) = ti
        .get("createdAt")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
    {
        row.insert("created_hour".into(), Value::from(created.hour() as i64));
        row.insert(
            "created_weekday".into(),
            Value::from(created.weekday().num_days_from_monday() as i64),
        );
    }

    for engine in ti.get("engines").and_then(Value::as_array).into_iter().flatten() {
        if let Some(name) = engine.as_str().filter(|n| !n.trim().is_empty()) {
            row.insert(format!("eng_{}", column_key(name)), Value::from(1));
        }
    }

    for hash in ["md5", "sha1", "sha256"] {
        let present = ti.get(hash).and_then(Value::as_str).is_some_and(|h| !h.is_empty());
        row.insert(format!("{}_present", hash), Value::from(i64::from(present)));
    }

    if let Some(size) = ti.get("fileSize").and_then(Value::as_i64) {
        row.insert("file_size".into(), Value::from(size));
    }
    if let Some(confidence) = ti.get("confidenceLevel").and_then(Value::as_str) {
        row.insert(
            "confidence_malicious".into(),
            Value::from(i64::from(confidence == "malicious")),
        );
    }

    deepvis_features(payload, &mut row);
    indicator_features(payload, &mut row);

    let notes: Vec<&str> = payload
        .get("notes")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .filter(|n| !n.trim().is_empty())
        .collect();
    if !notes.is_empty() {
        row.insert("notes_text".into(), Value::from(cap_chars(&notes.join(" "), NOTES_TEXT_CAP)));
    }

    row
}

fn deepvis_features(payload: &Value, row: &mut FeatureRow) {
    let events = payload
        .get("deepVisibilityEvents")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut per_category: BTreeMap<String, i64> = BTreeMap::new();
    let mut event_types: BTreeSet<&str> = BTreeSet::new();
    for ev in events {
        if let Some(cat) = ev.get("event.category").and_then(Value::as_str) {
            if !cat.trim().is_empty() {
                *per_category.entry(column_key(cat)).or_insert(0) += 1;
            }
        }
        if let Some(ty) = ev.get("event.type").and_then(Value::as_str) {
            event_types.insert(ty);
        }
    }

    row.insert("dv_event_count".into(), Value::from(events.len() as i64));
    row.insert("dv_event_type_unique".into(), Value::from(event_types.len() as i64));
    for (cat, count) in per_category {
        row.insert(format!("dv_cat_{}_count", cat), Value::from(count));
    }
}

fn indicator_features(payload: &Value, row: &mut FeatureRow) {
    let indicators = payload
        .get("indicators")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut per_category: BTreeMap<String, i64> = BTreeMap::new();
    let mut tactics: BTreeSet<&str> = BTreeSet::new();
    let mut techniques: BTreeSet<&str> = BTreeSet::new();
    for ind in indicators {
        if let Some(cat) = ind.get("category").and_then(Value::as_str) {
            if !cat.trim().is_empty() {
                *per_category.entry(column_key(cat)).or_insert(0) += 1;
            }
        }
        for tac in ind.get("tactics").and_then(Value::as_array).into_iter().flatten() {
            if let Some(name) = tac.get("name").and_then(Value::as_str) {
                tactics.insert(name);
            }
            for tech in tac.get("techniques").and_then(Value::as_array).into_iter().flatten() {
                if let Some(name) = tech.get("name").and_then(Value::as_str) {
                    techniques.insert(name);
                }
            }
        }
    }

    row.insert("ind_count".into(), Value::from(indicators.len() as i64));
    row.insert("ind_unique_tactic_count".into(), Value::from(tactics.len() as i64));
    row.insert("ind_unique_technique_count".into(), Value::from(techniques.len() as i64));
    for (cat, count) in per_category {
        row.insert(format!("ind_cat_{}_count", cat), Value::from(count));
    }
}

/// Lowercase and collapse anything non-alphanumeric so dynamic values make
/// safe column names.
fn column_key(raw: &str) -> String {
    let mut key = String::with_capacity(raw.len());
    let mut last_underscore = false;
    for c in raw.trim().chars() {
        if c.is_ascii_alphanumeric() {
            key.push(c.to_ascii_lowercase());
            last_underscore = false;
        } else if !last_underscore && !key.is_empty() {
            key.push('_');
            last_underscore = true;
        }
    }
    if key.ends_with('_') {
        key.pop();
    }
    key
}

fn cap_chars(s: &str, cap: usize) -> String {
    s.chars().take(cap).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload() -> Value {
        json!({
            "threatInfo": {
                "analystVerdict": "true_positive",
                "createdAt": "2025-06-02T14:30:00Z",
                "engines": ["On-Write Static AI", "reputation"],
                "sha256": "ab".repeat(32),
                "md5": "",
                "confidenceLevel": "malicious",
                "fileSize": 2048,
            },
            "deepVisibilityEvents": [
                {"event.type": "Process Creation", "event.category": "process"},
                {"event.type": "Process Creation", "event.category": "process"},
                {"event.type": "File Rename", "event.category": "file"},
            ],
            "indicators": [
                {
                    "category": "Persistence",
                    "tactics": [
                        {"name": "TA0003", "techniques": [{"name": "T1547"}, {"name": "T1053"}]}
                    ]
                }
            ],
            "notes": ["looked at this", "  "],
        })
    }

    #[test]
    fn test_label_and_time_features() {
        let row = featurize(&payload());
        assert_eq!(row["label"], 1);
        let mut upper = payload();
        upper["threatInfo"]["analystVerdict"] = json!("TRUE_POSITIVE");
        assert_eq!(featurize(&upper)["label"], 1);
        assert_eq!(row["created_hour"], 14);
        assert_eq!(row["created_weekday"], 0); // 2025-06-02 is a Monday
    }

    #[test]
    fn test_engine_one_hots_use_sanitized_keys() {
        let row = featurize(&payload());
        assert_eq!(row["eng_on_write_static_ai"], 1);
        assert_eq!(row["eng_reputation"], 1);
    }

    #[test]
    fn test_hash_presence_flags() {
        let row = featurize(&payload());
        assert_eq!(row["sha256_present"], 1);
        assert_eq!(row["md5_present"], 0);
        assert_eq!(row["sha1_present"], 0);
    }

    #[test]
    fn test_deepvis_aggregates() {
        let row = featurize(&payload());
        assert_eq!(row["dv_event_count"], 3);
        assert_eq!(row["dv_event_type_unique"], 2);
        assert_eq!(row["dv_cat_process_count"], 2);
        assert_eq!(row["dv_cat_file_count"], 1);
    }

    #[test]
    fn test_indicator_aggregates() {
        let row = featurize(&payload());
        assert_eq!(row["ind_count"], 1);
        assert_eq!(row["ind_cat_persistence_count"], 1);
        assert_eq!(row["ind_unique_tactic_count"], 1);
        assert_eq!(row["ind_unique_technique_count"], 2);
    }

    #[test]
    fn test_blank_notes_are_skipped() {
        let row = featurize(&payload());
        assert_eq!(row["notes_text"], "looked at this");
    }

    #[test]
    fn test_empty_payload_still_yields_core_columns() {
        let row = featurize(&json!({}));
        assert_eq!(row["label"], 0);
        assert_eq!(row["dv_event_count"], 0);
        assert!(!row.contains_key("created_hour"));
        assert!(!row.contains_key("notes_text"));
    }

    #[test]
    fn test_column_key_sanitization() {
        assert_eq!(column_key("On-Write Static AI"), "on_write_static_ai");
        assert_eq!(column_key("  process  "), "process");
        assert_eq!(column_key("a//b"), "a_b");
    }
}
