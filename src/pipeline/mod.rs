pub mod analysis;
pub mod external;
pub mod orchestrator;
pub mod redaction;

pub use orchestrator::{DraftOutcome, DraftPipeline};
