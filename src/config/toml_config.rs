use crate::utils::error::{Result, VerifyError};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 同一秒內送出的成績在服務端歷史中無法區分
pub const MIN_SCORE_PAUSE_MS: u64 = 1000;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifierConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub cabinet: CabinetConfig,
    #[serde(default)]
    pub profile: ProfileConfig,
    #[serde(default)]
    pub scenario: ScenarioConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CabinetConfig {
    #[serde(default = "default_pcbid")]
    pub pcbid: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// 店舖所在地區代碼 (pid)
    #[serde(default = "default_shop_pid")]
    pub shop_pid: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// 註冊時使用、讀取時應被原樣回傳的玩家名稱
    #[serde(default = "default_profile_name")]
    pub name: String,
    #[serde(default = "default_pin")]
    pub pin: String,
    #[serde(default = "default_wrong_pin")]
    pub wrong_pin: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    #[serde(default = "default_score_pause_ms")]
    pub score_pause_ms: u64,
    #[serde(default = "default_expected_services")]
    pub expected_services: Vec<String>,
}

fn default_endpoint() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_pcbid() -> String {
    "01201000000000000000".to_string()
}

fn default_model() -> String {
    "LDJ:J:A:A:2015101300".to_string()
}

fn default_shop_pid() -> i32 {
    51
}

fn default_profile_name() -> String {
    "TEST".to_string()
}

fn default_pin() -> String {
    "1234".to_string()
}

fn default_wrong_pin() -> String {
    "4321".to_string()
}

fn default_score_pause_ms() -> u64 {
    MIN_SCORE_PAUSE_MS
}

fn default_expected_services() -> Vec<String> {
    [
        "pcbtracker",
        "pcbevent",
        "local",
        "message",
        "facility",
        "cardmng",
        "package",
        "posevent",
        "pkglist",
        "dlstatus",
        "eacoin",
        "lobby",
        "ntp",
        "keepalive",
    ]
    .iter()
    .map(|name| name.to_string())
    .collect()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl Default for CabinetConfig {
    fn default() -> Self {
        Self {
            pcbid: default_pcbid(),
            model: default_model(),
            shop_pid: default_shop_pid(),
        }
    }
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            name: default_profile_name(),
            pin: default_pin(),
            wrong_pin: default_wrong_pin(),
        }
    }
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            score_pause_ms: default_score_pause_ms(),
            expected_services: default_expected_services(),
        }
    }
}

impl VerifierConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(VerifyError::Io)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| VerifyError::ConfigError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${COPULA_ENDPOINT})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| VerifyError::ConfigError {
            field: "env_substitution".to_string(),
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_url("service.endpoint", &self.service.endpoint)?;
        validation::validate_minimum("service.timeout_seconds", self.service.timeout_seconds, 1)?;

        validation::validate_non_empty_string("cabinet.pcbid", &self.cabinet.pcbid)?;
        validation::validate_non_empty_string("cabinet.model", &self.cabinet.model)?;

        validation::validate_non_empty_string("profile.name", &self.profile.name)?;
        validation::validate_pin("profile.pin", &self.profile.pin)?;
        validation::validate_pin("profile.wrong_pin", &self.profile.wrong_pin)?;
        if self.profile.pin == self.profile.wrong_pin {
            return Err(VerifyError::InvalidConfigValue {
                field: "profile.wrong_pin".to_string(),
                value: self.profile.wrong_pin.clone(),
                reason: "Wrong PIN must differ from the correct PIN".to_string(),
            });
        }

        validation::validate_minimum(
            "scenario.score_pause_ms",
            self.scenario.score_pause_ms,
            MIN_SCORE_PAUSE_MS,
        )?;

        Ok(())
    }
}

impl Validate for VerifierConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
