//! Management-console HTTP client. Transient failures (429, 5xx, network)
//! are retried with exponential backoff inside a bounded time budget;
//! other 4xx responses propagate immediately so the caller can substitute
//! an empty result for that one sub-fetch.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::ApiSettings;
use crate::errors::{with_backoff, SiftError};

use super::feed::ThreatFeed;

const PAGE_BUDGET: Duration = Duration::from_secs(60);
const NOTES_BUDGET: Duration = Duration::from_secs(30);
const DEEPVIS_BUDGET: Duration = Duration::from_secs(60);
const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Column order the power-query endpoint uses when it returns positional
/// rows instead of keyed objects.
const DV_COLUMNS: [&str; 4] = ["event.time", "event.type", "event.category", "severity"];

pub struct ApiClient {
    client: Client,
    base_url: String,
    page_limit: u32,
    note_page_limit: u32,
    deepvis_lookback_days: i64,
}

impl ApiClient {
    pub fn new(settings: &ApiSettings) -> Result<Self, SiftError> {
        let mut headers = reqwest::header::HeaderMap::new();
        let auth = format!("ApiToken {}", settings.token);
        let mut auth_value = reqwest::header::HeaderValue::from_str(&auth)
            .map_err(|_| SiftError::Config("API token contains invalid header characters".into()))?;
        auth_value.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, auth_value);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| SiftError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            page_limit: settings.page_limit,
            note_page_limit: settings.note_page_limit,
            deepvis_lookback_days: settings.deepvis_lookback_days,
        })
    }

    async fn get_json(&self, url: &str, params: &[(&str, String)]) -> Result<Value, SiftError> {
        let resp = self.client.get(url).query(params).send().await?;
        Ok(check_status(resp).await?.json::<Value>().await?)
    }
}

/// Map an HTTP response onto the error taxonomy: 429 is rate limiting,
/// 5xx is transient, 401 is an authentication failure, any other 4xx is
/// permanent for this sub-fetch.
async fn check_status(resp: Response) -> Result<Response, SiftError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let detail = format!("{} {}", status.as_u16(), crate::utils::truncation::truncate_error(&body));
    match status {
        StatusCode::TOO_MANY_REQUESTS => Err(SiftError::RateLimit(detail)),
        StatusCode::UNAUTHORIZED => Err(SiftError::Authentication(detail)),
        s if s.is_server_error() => Err(SiftError::TransientUpstream(detail)),
        _ => Err(SiftError::PermanentUpstream(detail)),
    }
}

#[async_trait]
impl ThreatFeed for ApiClient {
    async fn fetch_threats(
        &self,
        since: DateTime<Utc>,
        verdicts: &[String],
    ) -> Result<Vec<Value>, SiftError> {
        let url = format!("{}/threats", self.base_url);
        let since_iso = since.format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let verdict_csv = verdicts.join(",");

        let mut threats = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut params = vec![
                ("createdAt__gte", since_iso.clone()),
                ("analystVerdicts", verdict_csv.clone()),
                ("limit", self.page_limit.to_string()),
            ];
            if let Some(c) = &cursor {
                params.push(("cursor", c.clone()));
            }

            let page = with_backoff("fetch_threats", PAGE_BUDGET, || {
                self.get_json(&url, &params)
            })
            .await?;

            let data = page.get("data").and_then(Value::as_array).cloned().unwrap_or_default();
            debug!(count = data.len(), "Fetched threat page");
            threats.extend(data);

            cursor = page
                .pointer("/pagination/nextCursor")
                .or_else(|| page.get("nextPageToken"))
                .and_then(Value::as_str)
                .map(str::to_string);
            if cursor.is_none() {
                break;
            }
        }
        Ok(threats)
    }

    async fn fetch_notes(&self, threat_id: i64) -> Result<Vec<String>, SiftError> {
        let url = format!("{}/threats/{}/notes", self.base_url, threat_id);

        let mut notes = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut params = vec![("limit", self.note_page_limit.to_string())];
            if let Some(c) = &cursor {
                params.push(("cursor", c.clone()));
            }

            let page = with_backoff("fetch_notes", NOTES_BUDGET, || {
                self.get_json(&url, &params)
            })
            .await?;

            for rec in page.get("data").and_then(Value::as_array).into_iter().flatten() {
                let text = rec
                    .get("body")
                    .or_else(|| rec.get("text"))
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .unwrap_or("");
                if !text.is_empty() {
                    notes.push(text.to_string());
                }
            }

            cursor = page
                .pointer("/pagination/nextCursor")
                .and_then(Value::as_str)
                .map(str::to_string);
            if cursor.is_none() {
                break;
            }
        }
        Ok(notes)
    }

    async fn fetch_deepvis(&self, threat: &Value) -> Result<Vec<Value>, SiftError> {
        let ti = threat.get("threatInfo").cloned().unwrap_or_default();
        let Some(created) = ti.get("createdAt").and_then(Value::as_str) else {
            debug!("Skipping deep visibility, threat has no createdAt");
            return Ok(Vec::new());
        };
        let Ok(created) = DateTime::parse_from_rfc3339(created) else {
            debug!(created, "Skipping deep visibility, unparsable createdAt");
            return Ok(Vec::new());
        };
        let created = created.with_timezone(&Utc);

        let cutoff = Utc::now() - ChronoDuration::days(self.deepvis_lookback_days);
        if created < cutoff {
            debug!("Skipping deep visibility, threat older than lookback ceiling");
            return Ok(Vec::new());
        }

        let from = (created - ChronoDuration::minutes(1)).format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let to = (created + ChronoDuration::minutes(1)).format("%Y-%m-%dT%H:%M:%SZ").to_string();

        let mut queries = Vec::new();
        if let Some(story) = ti.get("storyline").and_then(Value::as_str) {
            queries.push(format!("src.process.storyline.id == '{}'", story));
        }
        if let Some(agent) = threat.pointer("/agentRealtimeInfo/agentUuid").and_then(Value::as_str) {
            queries.push(format!("agent.uuid == '{}'", agent));
        }

        for query in queries {
            let body = json!({
                "query": query,
                "fromDate": from,
                "toDate": to,
                "limit": self.page_limit,
            });
            let rows = with_backoff("fetch_deepvis", DEEPVIS_BUDGET, || {
                self.run_power_query(&body)
            })
            .await?;
            match rows {
                Some(rows) if !rows.is_empty() => return Ok(keyed_rows(rows)),
                _ => continue,
            }
        }
        Ok(Vec::new())
    }
}

impl ApiClient {
    /// Submit one power query and poll it to completion. `Ok(None)` means
    /// this query was rejected (bad request or no query id) and the caller
    /// should fall through to its next candidate query.
    async fn run_power_query(&self, body: &Value) -> Result<Option<Vec<Value>>, SiftError> {
        let pq_url = format!("{}/dv/events/pq", self.base_url);
        let ping_url = format!("{}/dv/events/pq-ping", self.base_url);

        let resp = self.client.post(&pq_url).json(body).send().await?;
        if resp.status() == StatusCode::BAD_REQUEST {
            warn!("Power query rejected as bad request");
            return Ok(None);
        }
        let submitted = check_status(resp).await?.json::<Value>().await?;

        let state = submitted.get("data").cloned().unwrap_or_default();
        let Some(query_id) = state.get("queryId").and_then(Value::as_str).map(str::to_string) else {
            warn!("Power query returned no queryId");
            return Ok(None);
        };

        let ping_params = [("queryId", query_id.clone())];
        let state = poll_until_finished(&query_id, state, DEEPVIS_BUDGET, || {
            self.get_json(&ping_url, &ping_params)
        })
        .await?;

        let rows = state.get("data").and_then(Value::as_array).cloned().unwrap_or_default();
        debug!(query_id = %query_id, rows = rows.len(), "Power query finished");
        Ok(Some(rows))
    }
}

/// Poll a submitted query until it finishes, fails, or the time budget
/// runs out. A query stuck in a running state yields `Timeout` so the
/// caller can degrade to an empty sub-fetch instead of hanging a worker.
async fn poll_until_finished<F, Fut>(
    query_id: &str,
    mut state: Value,
    budget: Duration,
    mut ping: F,
) -> Result<Value, SiftError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Value, SiftError>>,
{
    let started = tokio::time::Instant::now();
    while !query_finished(&state) {
        if query_failed(&state) {
            return Err(SiftError::TransientUpstream(format!(
                "power query {} reported failure",
                query_id
            )));
        }
        if started.elapsed() + POLL_INTERVAL > budget {
            return Err(SiftError::Timeout(format!(
                "power query {} still running after {}s",
                query_id,
                budget.as_secs()
            )));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
        let resp = ping().await?;
        state = resp.get("data").cloned().unwrap_or_default();
    }
    Ok(state)
}

fn query_finished(state: &Value) -> bool {
    match state.get("status").or_else(|| state.get("progress")) {
        Some(Value::String(s)) => s == "FINISHED" || s == "SUCCEEDED",
        Some(Value::Number(n)) => n.as_i64() == Some(100),
        _ => false,
    }
}

fn query_failed(state: &Value) -> bool {
    matches!(
        state.get("status").and_then(Value::as_str),
        Some(s) if s.starts_with("FAILED")
    )
}

/// The power-query endpoint may return positional rows; map them onto the
/// standard column names so extraction sees keyed objects either way.
fn keyed_rows(rows: Vec<Value>) -> Vec<Value> {
    rows.into_iter()
        .map(|row| match row {
            Value::Array(cells) => {
                let mut obj = serde_json::Map::new();
                for (name, cell) in DV_COLUMNS.iter().zip(cells) {
                    if !cell.is_null() {
                        obj.insert(name.to_string(), cell);
                    }
                }
                Value::Object(obj)
            }
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_stuck_query_times_out_within_budget() {
        let pings = Arc::new(AtomicU32::new(0));
        let pings_clone = pings.clone();

        let result = poll_until_finished(
            "q-1",
            json!({"status": "RUNNING"}),
            Duration::from_secs(60),
            || {
                let pings = pings_clone.clone();
                async move {
                    pings.fetch_add(1, Ordering::SeqCst);
                    Ok(json!({"data": {"status": "RUNNING"}}))
                }
            },
        )
        .await;

        assert!(matches!(result, Err(SiftError::Timeout(_))));
        // 5 s polls inside a 60 s budget: bounded, never unbounded
        assert!(pings.load(Ordering::SeqCst) <= 12);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_returns_final_state_on_finish() {
        let pings = Arc::new(AtomicU32::new(0));
        let pings_clone = pings.clone();

        let state = poll_until_finished(
            "q-2",
            json!({"status": "RUNNING"}),
            Duration::from_secs(60),
            || {
                let pings = pings_clone.clone();
                async move {
                    let n = pings.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Ok(json!({"data": {"status": "RUNNING"}}))
                    } else {
                        Ok(json!({"data": {"status": "FINISHED", "data": [1, 2]}}))
                    }
                }
            },
        )
        .await
        .unwrap();

        assert!(query_finished(&state));
        assert_eq!(state["data"].as_array().map(Vec::len), Some(2));
        assert_eq!(pings.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failed_query_state_is_transient_error() {
        let result = poll_until_finished(
            "q-3",
            json!({"status": "FAILED_TIMEOUT"}),
            Duration::from_secs(60),
            || async { Ok(json!({})) },
        )
        .await;
        assert!(matches!(result, Err(SiftError::TransientUpstream(_))));
    }

    #[test]
    fn test_query_finished_states() {
        assert!(query_finished(&json!({"status": "FINISHED"})));
        assert!(query_finished(&json!({"status": "SUCCEEDED"})));
        assert!(query_finished(&json!({"progress": 100})));
        assert!(!query_finished(&json!({"status": "RUNNING"})));
        assert!(!query_finished(&json!({"progress": 60})));
        assert!(!query_finished(&json!({})));
    }

    #[test]
    fn test_query_failed_detection() {
        assert!(query_failed(&json!({"status": "FAILED"})));
        assert!(query_failed(&json!({"status": "FAILED_TIMEOUT"})));
        assert!(!query_failed(&json!({"status": "RUNNING"})));
    }

    #[test]
    fn test_keyed_rows_maps_positional_cells() {
        let rows = vec![json!(["2025-06-01T08:00:00Z", "Process Creation", "process", 4])];
        let keyed = keyed_rows(rows);
        assert_eq!(keyed[0]["event.type"], "Process Creation");
        assert_eq!(keyed[0]["severity"], 4);
    }

    #[test]
    fn test_keyed_rows_passes_objects_through() {
        let rows = vec![json!({"event.type": "File Rename"})];
        let keyed = keyed_rows(rows);
        assert_eq!(keyed[0]["event.type"], "File Rename");
    }

    #[test]
    fn test_keyed_rows_drops_null_cells() {
        let rows = vec![json!(["2025-06-01T08:00:00Z", "Login", null, null])];
        let keyed = keyed_rows(rows);
        assert!(keyed[0].get("event.category").is_none());
        assert!(keyed[0].get("severity").is_none());
    }
}
