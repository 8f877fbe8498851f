pub mod endpoint;
pub mod event;
pub mod indicator;
pub mod note;
pub mod tenant;
pub mod threat;

pub use endpoint::Endpoint;
pub use event::DeepVisEvent;
pub use indicator::{Indicator, Tactic, Technique};
pub use note::Note;
pub use tenant::Tenant;
pub use threat::{DetectionType, IncidentStatus, Threat, Verdict};
