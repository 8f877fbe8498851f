use serde_json::Value;

use crate::cli::commands::IngestArgs;
use crate::config::Settings;
use crate::db::Database;
use crate::errors::SiftError;
use crate::etl::extract::extract_payloads;
use crate::pipeline::persist_batch;

pub async fn handle_ingest(args: IngestArgs) -> Result<(), SiftError> {
    let settings = Settings::from_env()?;
    let payloads = read_snapshot(&args.input)?;

    let db = Database::new(&settings.database.path)?;
    let batch = extract_payloads(&payloads);
    let mut report = persist_batch(&db, &batch, settings.etl.chunk_size);
    report.fetched = payloads.len();
    report.extraction_dropped = batch.dropped;

    println!(
        "Ingested {}: {} threats read, {} rows written, {} records dropped",
        args.input,
        report.fetched,
        report.total_written(),
        report.total_dropped()
    );
    Ok(())
}

/// Accepts the fetch envelope, a bare list of threats, or a single threat
/// object.
pub(super) fn read_snapshot(path: &str) -> Result<Vec<Value>, SiftError> {
    let raw = std::fs::read_to_string(path)?;
    let parsed: Value = serde_json::from_str(&raw)?;
    match parsed {
        Value::Object(mut obj) if obj.contains_key("threats") => match obj.remove("threats") {
            Some(Value::Array(threats)) => Ok(threats),
            _ => Err(SiftError::Validation(
                crate::etl::validation::ValidationError::new(
                    "threats",
                    "snapshot 'threats' key must hold a list".to_string(),
                ),
            )),
        },
        Value::Array(threats) => Ok(threats),
        single @ Value::Object(_) => Ok(vec![single]),
        _ => Err(SiftError::Validation(crate::etl::validation::ValidationError::new(
            "snapshot",
            "expected an object or list of threat records".to_string(),
        ))),
    }
}
