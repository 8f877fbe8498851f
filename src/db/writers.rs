//! Conflict-aware SQL for each entity, plus the batch entry points on
//! `Database`. Merge policies: tenants insert-or-ignore, endpoints
//! overwrite all mutable attributes on either key, threats update only the
//! verdict/classification/status columns, notes append, deep-visibility
//! events first-writer-wins on the natural key.

use rusqlite::Transaction;
use tracing::warn;

use crate::etl::upsert::{upsert_batch, Upsertable, UpsertOutcome};
use crate::models::{DeepVisEvent, Endpoint, Indicator, Note, Tenant, Threat};
use crate::utils::truncation::truncate_error;

use super::Database;

impl Upsertable for Tenant {
    const ENTITY: &'static str = "tenants";

    fn natural_key(&self) -> String {
        self.tenant_id.to_string()
    }

    fn bind(&self, tx: &Transaction) -> rusqlite::Result<usize> {
        tx.execute(
            "INSERT INTO tenants (tenant_id, name) VALUES (?1, ?2)
             ON CONFLICT(tenant_id) DO NOTHING",
            rusqlite::params![self.tenant_id, self.name],
        )
    }
}

impl Upsertable for Endpoint {
    const ENTITY: &'static str = "endpoints";

    fn natural_key(&self) -> String {
        format!("{}/{}", self.tenant_id, self.agent_uuid)
    }

    fn bind(&self, tx: &Transaction) -> rusqlite::Result<usize> {
        tx.execute(
            "INSERT INTO endpoints (endpoint_id, tenant_id, agent_uuid, computer_name,
                 os_name, os_type, os_revision, ip_v4, ip_v6, group_id, site_id,
                 agent_version, scan_started_at, scan_finished_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
             ON CONFLICT(endpoint_id) DO UPDATE SET
                 tenant_id = excluded.tenant_id,
                 agent_uuid = excluded.agent_uuid,
                 computer_name = excluded.computer_name,
                 os_name = excluded.os_name,
                 os_type = excluded.os_type,
                 os_revision = excluded.os_revision,
                 ip_v4 = excluded.ip_v4,
                 ip_v6 = excluded.ip_v6,
                 group_id = excluded.group_id,
                 site_id = excluded.site_id,
                 agent_version = excluded.agent_version,
                 scan_started_at = excluded.scan_started_at,
                 scan_finished_at = excluded.scan_finished_at
             ON CONFLICT(tenant_id, agent_uuid) DO UPDATE SET
                 computer_name = excluded.computer_name,
                 os_name = excluded.os_name,
                 os_type = excluded.os_type,
                 os_revision = excluded.os_revision,
                 ip_v4 = excluded.ip_v4,
                 ip_v6 = excluded.ip_v6,
                 group_id = excluded.group_id,
                 site_id = excluded.site_id,
                 agent_version = excluded.agent_version,
                 scan_started_at = excluded.scan_started_at,
                 scan_finished_at = excluded.scan_finished_at",
            rusqlite::params![
                self.endpoint_id,
                self.tenant_id,
                self.agent_uuid.to_string(),
                self.computer_name,
                self.os_name,
                self.os_type,
                self.os_revision,
                self.ip_v4,
                self.ip_v6,
                self.group_id,
                self.site_id,
                self.agent_version,
                self.scan_started_at.map(|t| t.to_rfc3339()),
                self.scan_finished_at.map(|t| t.to_rfc3339()),
            ],
        )
    }
}

impl Upsertable for Threat {
    const ENTITY: &'static str = "threats";

    fn natural_key(&self) -> String {
        self.threat_id.to_string()
    }

    fn bind(&self, tx: &Transaction) -> rusqlite::Result<usize> {
        tx.execute(
            "INSERT INTO threats (threat_id, storyline, tenant_id, endpoint_id,
                 incident_status, analyst_verdict, detection_type, confidence_level,
                 classification, classification_source, initiated_by,
                 md5, sha1, sha256, file_path, file_size,
                 threat_name, publisher_name, certificate_id,
                 identified_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
                     ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)
             ON CONFLICT(threat_id) DO UPDATE SET
                 storyline = excluded.storyline,
                 endpoint_id = excluded.endpoint_id,
                 incident_status = excluded.incident_status,
                 analyst_verdict = excluded.analyst_verdict,
                 detection_type = excluded.detection_type,
                 confidence_level = excluded.confidence_level,
                 classification = excluded.classification,
                 classification_source = excluded.classification_source,
                 initiated_by = excluded.initiated_by",
            rusqlite::params![
                self.threat_id,
                self.storyline,
                self.tenant_id,
                self.endpoint_id,
                self.incident_status.map(|s| s.as_str()),
                self.analyst_verdict.map(|v| v.as_str()),
                self.detection_type.map(|d| d.as_str()),
                self.confidence_level,
                self.classification,
                self.classification_source,
                self.initiated_by,
                self.md5,
                self.sha1,
                self.sha256,
                self.file_path,
                self.file_size,
                self.threat_name,
                self.publisher_name,
                self.certificate_id,
                self.identified_at.to_rfc3339(),
                self.created_at.to_rfc3339(),
            ],
        )
    }
}

impl Upsertable for Note {
    const ENTITY: &'static str = "threat_notes";

    fn natural_key(&self) -> String {
        self.threat_id.to_string()
    }

    fn bind(&self, tx: &Transaction) -> rusqlite::Result<usize> {
        tx.execute(
            "INSERT INTO threat_notes (threat_id, note) VALUES (?1, ?2)",
            rusqlite::params![self.threat_id, self.note],
        )
    }
}

impl Upsertable for DeepVisEvent {
    const ENTITY: &'static str = "deepvis_events";

    fn natural_key(&self) -> String {
        format!("{}/{}/{}", self.threat_id, self.event_time.to_rfc3339(), self.event_type)
    }

    fn bind(&self, tx: &Transaction) -> rusqlite::Result<usize> {
        tx.execute(
            "INSERT INTO deepvis_events (threat_id, event_time, event_type, event_cat, severity)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(threat_id, event_time, event_type) DO NOTHING",
            rusqlite::params![
                self.threat_id,
                self.event_time.to_rfc3339(),
                self.event_type,
                self.event_cat,
                self.severity,
            ],
        )
    }
}

impl Upsertable for Indicator {
    const ENTITY: &'static str = "threat_indicators";

    fn natural_key(&self) -> String {
        format!("{}/{}", self.threat_id, self.category.as_deref().unwrap_or("-"))
    }

    /// Normalized cascade insert: the indicator row first, then each tactic
    /// referencing its generated id, then each technique. A tactic or
    /// technique that fails only drops itself, never its siblings or the
    /// parent.
    fn bind(&self, tx: &Transaction) -> rusqlite::Result<usize> {
        let ids_json = self
            .ids
            .as_ref()
            .map(|ids| serde_json::to_string(ids).unwrap_or_default());
        let mut written = tx.execute(
            "INSERT INTO threat_indicators (threat_id, category, description, ids)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![self.threat_id, self.category, self.description, ids_json],
        )?;
        let indicator_id = tx.last_insert_rowid();

        for tactic in &self.tactics {
            let inserted = tx.execute(
                "INSERT INTO indicator_tactics (indicator_id, name, source) VALUES (?1, ?2, ?3)",
                rusqlite::params![indicator_id, tactic.name, tactic.source],
            );
            let tactic_id = match inserted {
                Ok(n) => {
                    written += n;
                    tx.last_insert_rowid()
                }
                Err(e) => {
                    warn!(
                        threat_id = self.threat_id,
                        tactic = %tactic.name,
                        error = %truncate_error(&e.to_string()),
                        "Tactic insert failed, skipping its techniques"
                    );
                    continue;
                }
            };
            for tech in &tactic.techniques {
                match tx.execute(
                    "INSERT INTO tactic_techniques (tactic_id, name, link) VALUES (?1, ?2, ?3)",
                    rusqlite::params![tactic_id, tech.name, tech.link],
                ) {
                    Ok(n) => written += n,
                    Err(e) => {
                        warn!(
                            threat_id = self.threat_id,
                            technique = %tech.name,
                            error = %truncate_error(&e.to_string()),
                            "Technique insert failed, skipping"
                        );
                    }
                }
            }
        }
        Ok(written)
    }
}

impl Database {
    /// Run one tiered batch upsert under an exclusively held session.
    pub fn upsert_all<T: Upsertable>(&self, records: &[T], chunk_size: usize) -> UpsertOutcome {
        let mut conn = self.conn.lock().unwrap();
        upsert_batch(&mut conn, records, chunk_size)
    }
}
