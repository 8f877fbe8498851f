use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::etl::validation::{non_negative, positive_id, ValidationError};

/// Analyst disposition of a threat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Undefined,
    TruePositive,
    FalsePositive,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Undefined => "undefined",
            Verdict::TruePositive => "true_positive",
            Verdict::FalsePositive => "false_positive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "undefined" => Some(Verdict::Undefined),
            "true_positive" => Some(Verdict::TruePositive),
            "false_positive" => Some(Verdict::FalsePositive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    Unresolved,
    InProgress,
    Resolved,
}

impl IncidentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentStatus::Unresolved => "unresolved",
            IncidentStatus::InProgress => "in_progress",
            IncidentStatus::Resolved => "resolved",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unresolved" => Some(IncidentStatus::Unresolved),
            "in_progress" => Some(IncidentStatus::InProgress),
            "resolved" => Some(IncidentStatus::Resolved),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionType {
    Static,
    Dynamic,
}

impl DetectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionType::Static => "static",
            DetectionType::Dynamic => "dynamic",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "static" => Some(DetectionType::Static),
            "dynamic" => Some(DetectionType::Dynamic),
            _ => None,
        }
    }
}

/// One detection record. Identity fields (hashes, tenant, timestamps) are
/// immutable once persisted; only the verdict/classification/status fields
/// change on re-ingest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Threat {
    pub threat_id: i64,
    pub storyline: Option<String>,
    pub tenant_id: i64,
    pub endpoint_id: Option<i64>,
    pub md5: Option<Vec<u8>>,
    pub sha1: Option<Vec<u8>>,
    pub sha256: Option<Vec<u8>>,
    pub file_path: Option<String>,
    pub file_size: Option<i64>,
    pub threat_name: Option<String>,
    pub publisher_name: Option<String>,
    pub certificate_id: Option<String>,
    pub incident_status: Option<IncidentStatus>,
    pub analyst_verdict: Option<Verdict>,
    pub detection_type: Option<DetectionType>,
    pub confidence_level: Option<String>,
    pub classification: Option<String>,
    pub classification_source: Option<String>,
    pub initiated_by: Option<String>,
    pub identified_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Threat {
    pub fn validate(self) -> Result<Self, ValidationError> {
        positive_id("threat_id", self.threat_id)?;
        positive_id("tenant_id", self.tenant_id)?;
        if let Some(ep) = self.endpoint_id {
            positive_id("endpoint_id", ep)?;
        }
        if let Some(size) = self.file_size {
            non_negative("file_size", size)?;
        }
        Ok(self)
    }
}
