use serde::{Deserialize, Serialize};

use crate::etl::validation::{non_empty, positive_id, ValidationError};

/// Free-text analyst annotation on a threat. Append-only; duplicate note
/// text is tolerated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub threat_id: i64,
    pub note: String,
}

impl Note {
    pub fn new(threat_id: i64, note: &str) -> Result<Self, ValidationError> {
        Ok(Self {
            threat_id: positive_id("threat_id", threat_id)?,
            note: non_empty("note", note)?,
        })
    }
}
