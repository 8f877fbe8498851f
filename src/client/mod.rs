pub mod api;
pub mod feed;

pub use api::ApiClient;
pub use feed::ThreatFeed;
