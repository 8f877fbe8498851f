pub mod extract;
pub mod upsert;
pub mod validation;

pub use extract::{extract_payloads, ExtractedBatch};
pub use upsert::{upsert_batch, Upsertable, UpsertOutcome, DEFAULT_CHUNK_SIZE};
pub use validation::ValidationError;
