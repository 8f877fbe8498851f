use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::etl::validation::{non_negative, positive_id, ValidationError};

/// A managed device observed by the agent. All mutable attributes are
/// overwritten by the newest observation on re-ingest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub endpoint_id: i64,
    pub tenant_id: i64,
    pub agent_uuid: Uuid,
    pub computer_name: Option<String>,
    pub os_name: Option<String>,
    pub os_type: Option<String>,
    pub os_revision: Option<String>,
    pub ip_v4: Option<String>,
    pub ip_v6: Option<String>,
    pub group_id: Option<i64>,
    pub site_id: Option<i64>,
    pub agent_version: Option<String>,
    pub scan_started_at: Option<DateTime<Utc>>,
    pub scan_finished_at: Option<DateTime<Utc>>,
}

impl Endpoint {
    /// Check the cross-field and numeric constraints that individual field
    /// coercion cannot see.
    pub fn validate(self) -> Result<Self, ValidationError> {
        positive_id("endpoint_id", self.endpoint_id)?;
        positive_id("tenant_id", self.tenant_id)?;
        if let Some(g) = self.group_id {
            non_negative("group_id", g)?;
        }
        if let Some(s) = self.site_id {
            non_negative("site_id", s)?;
        }
        if let (Some(start), Some(finish)) = (self.scan_started_at, self.scan_finished_at) {
            if finish < start {
                return Err(ValidationError::new(
                    "scan_finished_at",
                    "must be >= scan_started_at",
                ));
            }
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn base_endpoint() -> Endpoint {
        Endpoint {
            endpoint_id: 100,
            tenant_id: 1,
            agent_uuid: Uuid::new_v4(),
            computer_name: Some("WS-042".into()),
            os_name: Some("Windows 11 Pro".into()),
            os_type: Some("windows".into()),
            os_revision: None,
            ip_v4: Some("10.1.2.3".into()),
            ip_v6: None,
            group_id: Some(7),
            site_id: Some(3),
            agent_version: Some("23.4.2".into()),
            scan_started_at: None,
            scan_finished_at: None,
        }
    }

    #[test]
    fn test_endpoint_valid() {
        assert!(base_endpoint().validate().is_ok());
    }

    #[test]
    fn test_scan_finished_before_start_rejected() {
        let mut ep = base_endpoint();
        ep.scan_started_at = Some(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap());
        ep.scan_finished_at = Some(Utc.with_ymd_and_hms(2025, 6, 1, 11, 0, 0).unwrap());
        let err = ep.validate().unwrap_err();
        assert_eq!(err.field, "scan_finished_at");
    }

    #[test]
    fn test_scan_ordering_ok_when_equal() {
        let mut ep = base_endpoint();
        let t = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        ep.scan_started_at = Some(t);
        ep.scan_finished_at = Some(t);
        assert!(ep.validate().is_ok());
    }

    #[test]
    fn test_endpoint_serde_round_trip() {
        let ep = base_endpoint();
        let json = serde_json::to_string(&ep).unwrap();
        let back: Endpoint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ep);
    }

    #[test]
    fn test_negative_group_id_rejected() {
        let mut ep = base_endpoint();
        ep.group_id = Some(-1);
        assert!(ep.validate().is_err());
    }
}
