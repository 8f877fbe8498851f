pub mod commands;
pub mod features;
pub mod fetch;
pub mod ingest;
pub mod initdb;
pub mod run;

pub use commands::{Cli, Commands};
