use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::errors::SiftError;

/// Source of raw threat payloads. The pipeline only talks to this trait so
/// tests can substitute a scripted feed for the live API.
#[async_trait]
pub trait ThreatFeed: Send + Sync {
    /// All threats created since the given instant, filtered by analyst
    /// verdict, pagination followed to exhaustion.
    async fn fetch_threats(
        &self,
        since: DateTime<Utc>,
        verdicts: &[String],
    ) -> Result<Vec<Value>, SiftError>;

    /// All note texts for one threat.
    async fn fetch_notes(&self, threat_id: i64) -> Result<Vec<String>, SiftError>;

    /// Deep-visibility events correlated to one threat payload.
    async fn fetch_deepvis(&self, threat: &Value) -> Result<Vec<Value>, SiftError>;
}
