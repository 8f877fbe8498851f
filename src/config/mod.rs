pub mod credentials;
pub mod env;
pub mod types;

pub use types::{ApiSettings, DatabaseSettings, EtlSettings, Settings};
