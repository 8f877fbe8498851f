use serde::Serialize;

/// Process-wide configuration, built once at startup and passed by
/// reference. Never mutated after validation.
#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub api: ApiSettings,
    pub etl: EtlSettings,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseSettings {
    pub path: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self { path: "./data/threatsift.db".to_string() }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiSettings {
    pub base_url: String,
    #[serde(skip_serializing)]
    pub token: String,
    pub page_limit: u32,
    pub note_page_limit: u32,
    pub request_timeout_secs: u64,
    pub deepvis_lookback_days: i64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token: String::new(),
            page_limit: 1000,
            note_page_limit: 1000,
            request_timeout_secs: 120,
            deepvis_lookback_days: 90,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EtlSettings {
    pub since_days: i64,
    pub max_since_days: i64,
    pub verdicts: Vec<String>,
    pub workers: usize,
    pub chunk_size: usize,
    pub progress: bool,
}

impl Default for EtlSettings {
    fn default() -> Self {
        Self {
            since_days: 1,
            max_since_days: 365,
            verdicts: vec!["true_positive".to_string(), "false_positive".to_string()],
            workers: 50,
            chunk_size: 100,
            progress: true,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: DatabaseSettings::default(),
            api: ApiSettings::default(),
            etl: EtlSettings::default(),
        }
    }
}

impl Settings {
    /// Effective lookback, clamped to the configured ceiling.
    pub fn effective_since_days(&self) -> i64 {
        self.etl.since_days.min(self.etl.max_since_days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.etl.workers, 50);
        assert_eq!(s.etl.chunk_size, 100);
        assert_eq!(s.api.page_limit, 1000);
        assert_eq!(s.etl.verdicts.len(), 2);
    }

    #[test]
    fn test_since_days_clamped() {
        let mut s = Settings::default();
        s.etl.since_days = 10_000;
        assert_eq!(s.effective_since_days(), 365);
    }

    #[test]
    fn test_token_not_serialized() {
        let mut s = Settings::default();
        s.api.token = "secret".into();
        let dump = serde_json::to_string(&s).unwrap();
        assert!(!dump.contains("secret"));
    }
}
