use thiserror::Error;

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("Path not found: {path}")]
    PathNotFound { path: String },

    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Contract violation in {operation}: required path '{path}' missing from response")]
    ContractViolation { operation: String, path: String },

    #[error("Invalid response from {operation}: {reason}")]
    InvalidResponse { operation: String, reason: String },

    #[error(
        "[{phase}] {operation}: expected {subject} to be {expected} but got {actual}"
    )]
    ValueMismatch {
        phase: String,
        operation: String,
        subject: String,
        expected: String,
        actual: String,
    },

    #[error("Transport failure calling '{endpoint}': {message}")]
    TransportFailure { endpoint: String, message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("[{phase}] scenario state '{field}' is not available yet")]
    MissingState { phase: String, field: String },

    #[error("Configuration error in '{field}': {message}")]
    ConfigError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// 回應結構不符合協議
    Protocol,
    /// 觀察值與預期不一致
    Oracle,
    Transport,
    Configuration,
    System,
}

impl VerifyError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            VerifyError::PathNotFound { .. }
            | VerifyError::InvalidPath { .. }
            | VerifyError::ContractViolation { .. }
            | VerifyError::InvalidResponse { .. } => ErrorCategory::Protocol,
            VerifyError::ValueMismatch { .. } | VerifyError::MissingState { .. } => {
                ErrorCategory::Oracle
            }
            VerifyError::TransportFailure { .. } | VerifyError::Http(_) => {
                ErrorCategory::Transport
            }
            VerifyError::ConfigError { .. } | VerifyError::InvalidConfigValue { .. } => {
                ErrorCategory::Configuration
            }
            VerifyError::Io(_) | VerifyError::Serialization(_) => ErrorCategory::System,
        }
    }

    /// 依錯誤類別決定程序結束碼
    pub fn exit_code(&self) -> i32 {
        match self.category() {
            ErrorCategory::Oracle => 1,
            ErrorCategory::Protocol => 2,
            ErrorCategory::Transport => 3,
            ErrorCategory::Configuration => 4,
            ErrorCategory::System => 5,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Oracle => "The service stored or aggregated data differently than expected; compare the reported values against the service implementation",
            ErrorCategory::Protocol => "The service response is missing nodes the cabinet relies on; check the handler for the named operation",
            ErrorCategory::Transport => "Check that the service endpoint is reachable and accepts the configured cabinet",
            ErrorCategory::Configuration => "Fix the configuration file or command line arguments",
            ErrorCategory::System => "Check file permissions and payload encoding",
        }
    }

    pub(crate) fn contract(operation: &str, path: &str) -> Self {
        VerifyError::ContractViolation {
            operation: operation.to_string(),
            path: path.to_string(),
        }
    }

    pub(crate) fn invalid_response(operation: &str, reason: impl Into<String>) -> Self {
        VerifyError::InvalidResponse {
            operation: operation.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, VerifyError>;
