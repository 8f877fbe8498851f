use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::etl::validation::{non_empty, positive_id, ValidationError};

/// A deep-visibility event correlated to a threat. Unique on
/// (threat_id, event_time, event_type); duplicates from overlapping query
/// windows are ignored on conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeepVisEvent {
    pub threat_id: i64,
    pub event_time: DateTime<Utc>,
    pub event_type: String,
    pub event_cat: Option<String>,
    pub severity: Option<i64>,
}

impl DeepVisEvent {
    pub fn new(
        threat_id: i64,
        event_time: DateTime<Utc>,
        event_type: &str,
        event_cat: Option<String>,
        severity: Option<i64>,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            threat_id: positive_id("threat_id", threat_id)?,
            event_time,
            event_type: non_empty("event_type", event_type)?,
            event_cat,
            severity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_event_valid() {
        let t = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();
        let ev = DeepVisEvent::new(7, t, "Process Creation", Some("process".into()), Some(4)).unwrap();
        assert_eq!(ev.event_type, "Process Creation");
    }

    #[test]
    fn test_event_requires_type() {
        let t = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();
        assert!(DeepVisEvent::new(7, t, "", None, None).is_err());
    }
}
