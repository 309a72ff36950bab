pub mod config;
pub mod core;
pub mod domain;
pub mod protocol;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use config::VerifierConfig;
pub use crate::core::orchestrator::{ConformanceOrchestrator, Phase, RunReport};
pub use crate::core::services::{NodeCardService, NodeFacilityService};
pub use crate::core::transport::HttpTransport;
pub use protocol::Node;
pub use utils::error::{Result, VerifyError};
