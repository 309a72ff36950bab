use crate::config::toml_config::ServiceConfig;
use crate::domain::ports::Transport;
use crate::protocol::Node;
use crate::utils::error::{Result, VerifyError};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// 以 JSON 承載樹狀訊息的 HTTP 傳輸
///
/// 每次交換都是一次 POST，等待回應後才返回；不重試。
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: config.endpoint.clone(),
        })
    }

    pub fn url_for(&self, endpoint: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let endpoint = endpoint.trim_start_matches('/');
        if endpoint.is_empty() {
            base.to_string()
        } else {
            format!("{}/{}", base, endpoint)
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn exchange(&self, endpoint: &str, request: Node) -> Result<Node> {
        let url = self.url_for(endpoint);
        let operation = request
            .children()
            .first()
            .map(|op| op.name().to_string())
            .unwrap_or_else(|| request.name().to_string());

        tracing::debug!("📡 POST {} ({})", url, operation);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| VerifyError::TransportFailure {
                endpoint: url.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        tracing::debug!("📡 {} responded with {}", operation, status);

        if !status.is_success() {
            return Err(VerifyError::TransportFailure {
                endpoint: url,
                message: format!("HTTP status {}", status),
            });
        }

        let node: Node = response.json().await?;
        Ok(node)
    }
}
