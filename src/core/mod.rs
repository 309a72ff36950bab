pub mod oracle;
pub mod orchestrator;
pub mod requests;
pub mod responses;
pub mod scenario;
pub mod services;
pub mod transport;

pub use crate::domain::model::{Profile, ScoreEntry, ScoreTable, Submission};
pub use crate::domain::ports::{CardService, FacilityService, Transport};
pub use crate::utils::error::Result;
pub use orchestrator::{ConformanceOrchestrator, Phase, RunReport};
