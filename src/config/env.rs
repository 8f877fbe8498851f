//! Environment loader for `Settings`. All variables use the `SIFT_` prefix;
//! parsing happens exactly once at startup and any malformed value is a
//! fatal configuration error.

use crate::errors::SiftError;

use super::credentials::resolve_credential;
use super::types::Settings;

impl Settings {
    pub fn from_env() -> Result<Self, SiftError> {
        let mut settings = Settings::default();

        if let Some(path) = read("SIFT_DB_PATH") {
            settings.database.path = path;
        }
        if let Some(url) = read("SIFT_API_URL") {
            settings.api.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(token) = read("SIFT_API_TOKEN") {
            settings.api.token = resolve_credential(&token);
        }
        if let Some(v) = read("SIFT_PAGE_LIMIT") {
            settings.api.page_limit = parse_num("SIFT_PAGE_LIMIT", &v)?;
        }
        if let Some(v) = read("SIFT_NOTE_PAGE_LIMIT") {
            settings.api.note_page_limit = parse_num("SIFT_NOTE_PAGE_LIMIT", &v)?;
        }
        if let Some(v) = read("SIFT_REQUEST_TIMEOUT_SECS") {
            settings.api.request_timeout_secs = parse_num("SIFT_REQUEST_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = read("SIFT_DEEPVIS_LOOKBACK_DAYS") {
            settings.api.deepvis_lookback_days = parse_num("SIFT_DEEPVIS_LOOKBACK_DAYS", &v)?;
        }
        if let Some(v) = read("SIFT_SINCE_DAYS") {
            settings.etl.since_days = parse_num("SIFT_SINCE_DAYS", &v)?;
        }
        if let Some(v) = read("SIFT_MAX_SINCE_DAYS") {
            settings.etl.max_since_days = parse_num("SIFT_MAX_SINCE_DAYS", &v)?;
        }
        if let Some(v) = read("SIFT_WORKERS") {
            settings.etl.workers = parse_num("SIFT_WORKERS", &v)?;
        }
        if let Some(v) = read("SIFT_CHUNK_SIZE") {
            settings.etl.chunk_size = parse_num("SIFT_CHUNK_SIZE", &v)?;
        }
        if let Some(v) = read("SIFT_VERDICTS") {
            settings.etl.verdicts = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), SiftError> {
        if self.etl.workers == 0 {
            return Err(SiftError::Config("SIFT_WORKERS must be at least 1".into()));
        }
        if self.etl.chunk_size == 0 {
            return Err(SiftError::Config("SIFT_CHUNK_SIZE must be at least 1".into()));
        }
        if self.etl.since_days < 0 {
            return Err(SiftError::Config("SIFT_SINCE_DAYS must not be negative".into()));
        }
        if self.etl.verdicts.is_empty() {
            return Err(SiftError::Config("SIFT_VERDICTS must name at least one verdict".into()));
        }
        Ok(())
    }

    /// Network commands additionally need upstream credentials; offline
    /// commands (init-db, ingest, features) do not.
    pub fn require_api(&self) -> Result<(), SiftError> {
        if self.api.base_url.is_empty() {
            return Err(SiftError::Config("SIFT_API_URL is not set".into()));
        }
        if self.api.token.is_empty() {
            return Err(SiftError::Config("SIFT_API_TOKEN is not set".into()));
        }
        Ok(())
    }
}

fn read(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.is_empty())
}

fn parse_num<T: std::str::FromStr>(var: &str, value: &str) -> Result<T, SiftError> {
    value
        .parse()
        .map_err(|_| SiftError::Config(format!("{} has invalid value {:?}", var, value)))
}
