pub mod export;
pub mod rows;

pub use export::write_csv;
pub use rows::{featurize, FeatureRow};
