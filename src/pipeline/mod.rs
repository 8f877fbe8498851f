pub mod runner;

pub use runner::{enrich_payloads, persist_batch, Pipeline, RunReport};
