pub mod toml_config;

pub use toml_config::VerifierConfig;

#[cfg(feature = "cli")]
use clap::Parser;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "copula-verify")]
#[command(about = "Conformance verifier for the cabinet tree protocol")]
pub struct CliConfig {
    /// Path to the verifier configuration file; defaults are used when omitted
    #[arg(short, long)]
    pub config: Option<String>,

    /// Existing card ID; a fresh card is generated and registered when omitted
    #[arg(long)]
    pub card_id: Option<String>,

    /// Override the service endpoint from the configuration file
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Execution ID used in logs and the run summary
    #[arg(long)]
    pub execution_id: Option<String>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// 載入設定檔並套用命令列覆寫
    pub fn load_verifier_config(&self) -> crate::utils::error::Result<VerifierConfig> {
        let mut config = match &self.config {
            Some(path) => VerifierConfig::from_file(path)?,
            None => VerifierConfig::default(),
        };

        if let Some(endpoint) = &self.endpoint {
            config.service.endpoint = endpoint.clone();
        }

        Ok(config)
    }
}

#[cfg(feature = "cli")]
impl crate::utils::validation::Validate for CliConfig {
    fn validate(&self) -> crate::utils::error::Result<()> {
        if let Some(card_id) = &self.card_id {
            crate::utils::validation::validate_card_id("card_id", card_id)?;
        }
        if let Some(endpoint) = &self.endpoint {
            crate::utils::validation::validate_url("endpoint", endpoint)?;
        }
        Ok(())
    }
}
