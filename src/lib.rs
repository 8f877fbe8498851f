pub mod cli;
pub mod client;
pub mod config;
pub mod db;
pub mod errors;
pub mod etl;
pub mod features;
pub mod models;
pub mod pipeline;
pub mod utils;
