use crate::utils::error::{Result, VerifyError};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(VerifyError::InvalidConfigValue {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(VerifyError::InvalidConfigValue {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(VerifyError::InvalidConfigValue {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_minimum(field_name: &str, value: u64, min_value: u64) -> Result<()> {
    if value < min_value {
        return Err(VerifyError::InvalidConfigValue {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(VerifyError::InvalidConfigValue {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

/// 卡號為 16 位十六進位字元
pub fn validate_card_id(field_name: &str, card_id: &str) -> Result<()> {
    if card_id.len() != 16 || !card_id.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(VerifyError::InvalidConfigValue {
            field: field_name.to_string(),
            value: card_id.to_string(),
            reason: "Card ID must be 16 hexadecimal characters".to_string(),
        });
    }
    Ok(())
}

/// PIN 為 4 位數字
pub fn validate_pin(field_name: &str, pin: &str) -> Result<()> {
    if pin.len() != 4 || !pin.chars().all(|c| c.is_ascii_digit()) {
        return Err(VerifyError::InvalidConfigValue {
            field: field_name.to_string(),
            value: pin.to_string(),
            reason: "PIN must be exactly 4 digits".to_string(),
        });
    }
    Ok(())
}
