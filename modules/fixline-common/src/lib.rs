pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use config::{EngineConfig, ScoringWeights};
pub use error::FixlineError;
pub use events::{StatusEvent, StatusEventKind};
pub use types::*;
