use rusqlite::OptionalExtension;

use crate::errors::SiftError;

use super::Database;

macro_rules! count_fn {
    ($name:ident, $table:literal) => {
        pub fn $name(&self) -> Result<i64, SiftError> {
            let conn = self.conn.lock().unwrap();
            conn.query_row(concat!("SELECT COUNT(*) FROM ", $table), [], |row| row.get(0))
                .map_err(|e| SiftError::Database(format!("Count query failed: {}", e)))
        }
    };
}

impl Database {
    count_fn!(tenant_count, "tenants");
    count_fn!(endpoint_count, "endpoints");
    count_fn!(threat_count, "threats");
    count_fn!(note_count, "threat_notes");
    count_fn!(indicator_count, "threat_indicators");
    count_fn!(tactic_count, "indicator_tactics");
    count_fn!(technique_count, "tactic_techniques");
    count_fn!(event_count, "deepvis_events");

    /// Administrative delete; the pipeline itself never removes rows.
    pub fn delete_tenant(&self, tenant_id: i64) -> Result<usize, SiftError> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM tenants WHERE tenant_id = ?1", rusqlite::params![tenant_id])
            .map_err(|e| SiftError::Database(format!("Delete failed: {}", e)))
    }

    pub fn delete_threat(&self, threat_id: i64) -> Result<usize, SiftError> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM threats WHERE threat_id = ?1", rusqlite::params![threat_id])
            .map_err(|e| SiftError::Database(format!("Delete failed: {}", e)))
    }

    pub fn threat_sha256(&self, threat_id: i64) -> Result<Option<Vec<u8>>, SiftError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT sha256 FROM threats WHERE threat_id = ?1",
            rusqlite::params![threat_id],
            |row| row.get(0),
        )
        .optional()
        .map(Option::flatten)
        .map_err(|e| SiftError::Database(format!("Query failed: {}", e)))
    }

    pub fn threat_verdict(&self, threat_id: i64) -> Result<Option<String>, SiftError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT analyst_verdict FROM threats WHERE threat_id = ?1",
            rusqlite::params![threat_id],
            |row| row.get(0),
        )
        .optional()
        .map(Option::flatten)
        .map_err(|e| SiftError::Database(format!("Query failed: {}", e)))
    }

    pub fn threat_last_updated(&self, threat_id: i64) -> Result<Option<String>, SiftError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT last_updated_at FROM threats WHERE threat_id = ?1",
            rusqlite::params![threat_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| SiftError::Database(format!("Query failed: {}", e)))
    }

    pub fn notes_for_threat(&self, threat_id: i64) -> Result<Vec<String>, SiftError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT note FROM threat_notes WHERE threat_id = ?1 ORDER BY note_id")
            .map_err(|e| SiftError::Database(format!("Query failed: {}", e)))?;
        let rows = stmt
            .query_map(rusqlite::params![threat_id], |row| row.get(0))
            .map_err(|e| SiftError::Database(format!("Query error: {}", e)))?;
        let mut notes = Vec::new();
        for row in rows {
            notes.push(row.map_err(|e| SiftError::Database(format!("Row error: {}", e)))?);
        }
        Ok(notes)
    }
}
