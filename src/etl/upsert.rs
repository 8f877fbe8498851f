//! Batch persistence with tiered fallback. One batch call always runs to
//! completion: bulk write first, failed batches retried per chunk, failed
//! chunks retried per record, and a record that still fails is logged with
//! its natural key and dropped. The caller never sees an error for an
//! individual record.

use rusqlite::{Connection, Transaction};
use tracing::{debug, error, info};

use crate::utils::truncation::{truncate_error, truncate_payload};

pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// A validated entity record that knows how to write itself inside a
/// transaction. `bind` returns the number of rows changed (0 for an ignored
/// conflict).
pub trait Upsertable: std::fmt::Debug {
    const ENTITY: &'static str;

    /// Natural key for drop logging.
    fn natural_key(&self) -> String;

    fn bind(&self, tx: &Transaction) -> rusqlite::Result<usize>;
}

/// Per-entity counts for one batch call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub attempted: usize,
    pub written: usize,
    pub dropped: usize,
}

impl UpsertOutcome {
    pub fn merge(&mut self, other: UpsertOutcome) {
        self.attempted += other.attempted;
        self.written += other.written;
        self.dropped += other.dropped;
    }
}

/// Persist one batch of records with the three-tier strategy.
pub fn upsert_batch<T: Upsertable>(
    conn: &mut Connection,
    records: &[T],
    chunk_size: usize,
) -> UpsertOutcome {
    let mut outcome = UpsertOutcome { attempted: records.len(), ..Default::default() };
    if records.is_empty() {
        return outcome;
    }

    // Tier 1: one transaction over the whole batch
    match write_group(conn, records) {
        Ok(written) => {
            outcome.written = written;
            debug!(entity = T::ENTITY, records = records.len(), written, "Bulk upsert committed");
            return outcome;
        }
        Err(e) => {
            error!(
                entity = T::ENTITY,
                records = records.len(),
                error = %truncate_error(&e.to_string()),
                "Bulk upsert failed, retrying in chunks"
            );
        }
    }

    // Tier 2: per-chunk transactions, each committing independently
    let chunk_size = chunk_size.max(1);
    for (idx, chunk) in records.chunks(chunk_size).enumerate() {
        match write_group(conn, chunk) {
            Ok(written) => outcome.written += written,
            Err(e) => {
                error!(
                    entity = T::ENTITY,
                    chunk = idx,
                    records = chunk.len(),
                    error = %truncate_error(&e.to_string()),
                    "Chunk upsert failed, retrying per record"
                );
                // Tier 3: per-record transactions; a record failing here is
                // logged and permanently dropped from this batch
                for rec in chunk {
                    match write_group(conn, std::slice::from_ref(rec)) {
                        Ok(written) => outcome.written += written,
                        Err(rec_err) => {
                            outcome.dropped += 1;
                            error!(
                                entity = T::ENTITY,
                                key = %rec.natural_key(),
                                payload = %truncate_payload(&format!("{:?}", rec)),
                                error = %truncate_error(&rec_err.to_string()),
                                "Record upsert failed, dropping"
                            );
                        }
                    }
                }
            }
        }
    }

    info!(
        entity = T::ENTITY,
        attempted = outcome.attempted,
        written = outcome.written,
        dropped = outcome.dropped,
        "Batch upsert complete"
    );
    outcome
}

fn write_group<T: Upsertable>(conn: &mut Connection, records: &[T]) -> rusqlite::Result<usize> {
    let tx = conn.transaction()?;
    let mut written = 0;
    for rec in records {
        written += rec.bind(&tx)?;
    }
    tx.commit()?;
    Ok(written)
}
