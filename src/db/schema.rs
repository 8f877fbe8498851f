pub const CREATE_TABLES: &str = "
CREATE TABLE IF NOT EXISTS tenants (
    tenant_id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    ingested_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now'))
);

CREATE TABLE IF NOT EXISTS endpoints (
    endpoint_id INTEGER PRIMARY KEY,
    tenant_id INTEGER NOT NULL REFERENCES tenants(tenant_id) ON DELETE CASCADE,
    agent_uuid TEXT NOT NULL,
    computer_name TEXT,
    os_name TEXT,
    os_type TEXT,
    os_revision TEXT,
    ip_v4 TEXT,
    ip_v6 TEXT,
    group_id INTEGER,
    site_id INTEGER,
    agent_version TEXT,
    scan_started_at TEXT,
    scan_finished_at TEXT,
    ingested_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
    UNIQUE (tenant_id, agent_uuid)
);

CREATE TABLE IF NOT EXISTS threats (
    threat_id INTEGER PRIMARY KEY,
    storyline TEXT,
    tenant_id INTEGER NOT NULL REFERENCES tenants(tenant_id) ON DELETE CASCADE,
    endpoint_id INTEGER REFERENCES endpoints(endpoint_id) ON DELETE SET NULL,
    incident_status TEXT CHECK (incident_status IN ('unresolved','in_progress','resolved')),
    analyst_verdict TEXT CHECK (analyst_verdict IN ('undefined','true_positive','false_positive')),
    detection_type TEXT CHECK (detection_type IN ('static','dynamic')),
    confidence_level TEXT,
    classification TEXT,
    classification_source TEXT,
    initiated_by TEXT,
    md5 BLOB,
    sha1 BLOB,
    sha256 BLOB,
    file_path TEXT,
    file_size INTEGER CHECK (file_size >= 0),
    threat_name TEXT,
    publisher_name TEXT,
    certificate_id TEXT,
    identified_at TEXT NOT NULL,
    created_at TEXT NOT NULL,
    ingested_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
    last_updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
    UNIQUE (tenant_id, sha256, identified_at)
);

CREATE TABLE IF NOT EXISTS threat_notes (
    note_id INTEGER PRIMARY KEY AUTOINCREMENT,
    threat_id INTEGER NOT NULL REFERENCES threats(threat_id) ON DELETE CASCADE,
    note TEXT NOT NULL,
    ingested_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now'))
);

CREATE TABLE IF NOT EXISTS threat_indicators (
    indicator_id INTEGER PRIMARY KEY AUTOINCREMENT,
    threat_id INTEGER NOT NULL REFERENCES threats(threat_id) ON DELETE CASCADE,
    category TEXT,
    description TEXT,
    ids TEXT,
    ingested_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now'))
);

CREATE TABLE IF NOT EXISTS indicator_tactics (
    tactic_id INTEGER PRIMARY KEY AUTOINCREMENT,
    indicator_id INTEGER NOT NULL REFERENCES threat_indicators(indicator_id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    source TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tactic_techniques (
    technique_id INTEGER PRIMARY KEY AUTOINCREMENT,
    tactic_id INTEGER NOT NULL REFERENCES indicator_tactics(tactic_id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    link TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS deepvis_events (
    dvevent_id INTEGER PRIMARY KEY AUTOINCREMENT,
    threat_id INTEGER NOT NULL REFERENCES threats(threat_id) ON DELETE CASCADE,
    event_time TEXT NOT NULL,
    event_type TEXT NOT NULL,
    event_cat TEXT,
    severity INTEGER,
    ingested_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
    UNIQUE (threat_id, event_time, event_type)
);

CREATE INDEX IF NOT EXISTS ix_endpoints_tenant ON endpoints(tenant_id);
CREATE INDEX IF NOT EXISTS ix_threats_sha256 ON threats(sha256);
CREATE INDEX IF NOT EXISTS ix_threats_sha1 ON threats(sha1);
CREATE INDEX IF NOT EXISTS ix_threats_md5 ON threats(md5);
CREATE INDEX IF NOT EXISTS ix_threats_tenant_date ON threats(tenant_id, identified_at);
CREATE INDEX IF NOT EXISTS ix_notes_threat ON threat_notes(threat_id);
CREATE INDEX IF NOT EXISTS ix_indicators_threat ON threat_indicators(threat_id);
CREATE INDEX IF NOT EXISTS ix_tactics_indicator ON indicator_tactics(indicator_id);
CREATE INDEX IF NOT EXISTS ix_techniques_tactic ON tactic_techniques(tactic_id);
CREATE INDEX IF NOT EXISTS ix_dv_threat_time ON deepvis_events(threat_id, event_time);
CREATE INDEX IF NOT EXISTS ix_dv_event_type ON deepvis_events(event_type);

CREATE TRIGGER IF NOT EXISTS trg_threats_touch_insert
AFTER INSERT ON threats
FOR EACH ROW
BEGIN
    UPDATE threats SET last_updated_at = strftime('%Y-%m-%dT%H:%M:%fZ','now')
    WHERE threat_id = NEW.threat_id;
END;

CREATE TRIGGER IF NOT EXISTS trg_threats_touch_update
AFTER UPDATE OF incident_status, analyst_verdict, detection_type,
    confidence_level, classification, classification_source, initiated_by,
    endpoint_id, storyline
ON threats
FOR EACH ROW
BEGIN
    UPDATE threats SET last_updated_at = strftime('%Y-%m-%dT%H:%M:%fZ','now')
    WHERE threat_id = NEW.threat_id;
END;
";
