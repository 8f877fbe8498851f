pub mod classification;
pub mod retry;
pub mod types;

pub use classification::ErrorClassification;
pub use retry::with_backoff;
pub use types::SiftError;
