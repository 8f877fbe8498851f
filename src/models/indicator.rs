use serde::{Deserialize, Serialize};

use crate::etl::validation::{non_empty, positive_id, ValidationError};

/// A MITRE technique reference under a tactic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Technique {
    pub name: String,
    pub link: String,
}

impl Technique {
    pub fn new(name: &str, link: &str) -> Result<Self, ValidationError> {
        Ok(Self {
            name: non_empty("technique.name", name)?,
            link: non_empty("technique.link", link)?,
        })
    }
}

/// A tactic observed for an indicator, owning its techniques.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tactic {
    pub name: String,
    pub source: String,
    pub techniques: Vec<Technique>,
}

impl Tactic {
    pub fn new(name: &str, source: &str, techniques: Vec<Technique>) -> Result<Self, ValidationError> {
        Ok(Self {
            name: non_empty("tactic.name", name)?,
            source: non_empty("tactic.source", source)?,
            techniques,
        })
    }
}

/// A behavioral indicator attached to a threat, owning its tactic tree.
/// Persisted via the normalized cascade insert (indicator, then tactics,
/// then techniques).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Indicator {
    pub threat_id: i64,
    pub category: Option<String>,
    pub description: Option<String>,
    pub ids: Option<Vec<i64>>,
    pub tactics: Vec<Tactic>,
}

impl Indicator {
    pub fn validate(self) -> Result<Self, ValidationError> {
        positive_id("threat_id", self.threat_id)?;
        Ok(self)
    }
}
