use serde::{Deserialize, Serialize};

use crate::etl::validation::{non_empty, positive_id, ValidationError};

/// An account that owns endpoints and threats. Created on first sighting,
/// never deleted by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub tenant_id: i64,
    pub name: String,
}

impl Tenant {
    pub fn new(tenant_id: i64, name: &str) -> Result<Self, ValidationError> {
        Ok(Self {
            tenant_id: positive_id("tenant_id", tenant_id)?,
            name: non_empty("name", name)?,
        })
    }
}
