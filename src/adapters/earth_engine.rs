use crate::adapters::credentials::{self, TokenSource};
use crate::config::toml_config::EarthEngineConfig;
use crate::core::query::Expression;
use crate::domain::ports::EarthEngine;
use crate::utils::error::{ImpactError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;

/// Earth Engine REST client (`projects.value.compute`).
pub struct RestEarthEngine {
    client: Client,
    compute_url: String,
    project: String,
    tokens: Arc<dyn TokenSource>,
    retry_attempts: u32,
    retry_delay: Duration,
}

impl RestEarthEngine {
    /// Client with the token source chosen by `config.credentials`.
    pub fn from_config(config: &EarthEngineConfig) -> Result<Self> {
        Self::new(config, credentials::token_source(config)?)
    }

    pub fn new(config: &EarthEngineConfig, tokens: Arc<dyn TokenSource>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            compute_url: format!(
                "{}/v1/projects/{}/value:compute",
                config.endpoint.trim_end_matches('/'),
                config.project
            ),
            project: config.project.clone(),
            tokens,
            retry_attempts: config.retry_attempts,
            retry_delay: Duration::from_secs(config.retry_delay_seconds),
        })
    }

    pub fn compute_url(&self) -> &str {
        &self.compute_url
    }

    async fn send_once(&self, body: &serde_json::Value, token: &str) -> Result<serde_json::Value> {
        let response = self
            .client
            .post(&self.compute_url)
            .bearer_auth(token)
            .header("x-goog-user-project", &self.project)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        tracing::debug!("Earth Engine response status: {}", status);

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ImpactError::RemoteError {
                status: status.as_u16(),
                message: remote_message(&text),
            });
        }

        let mut payload: serde_json::Value = response.json().await?;
        match payload.get_mut("result") {
            Some(result) => Ok(result.take()),
            None => Err(ImpactError::ProcessingError {
                message: "Earth Engine response has no 'result' member".to_string(),
            }),
        }
    }
}

/// 擷取平台錯誤訊息 `{"error": {"message": ...}}`，否則回傳原始內容
fn remote_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

fn is_retryable(error: &ImpactError) -> bool {
    match error {
        ImpactError::ApiError(e) => e.is_timeout() || e.is_connect() || e.is_request(),
        ImpactError::RemoteError { status, .. } => {
            *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || *status >= 500
        }
        _ => false,
    }
}

#[async_trait]
impl EarthEngine for RestEarthEngine {
    async fn compute_value(&self, expression: &Expression) -> Result<serde_json::Value> {
        let body = serde_json::json!({ "expression": expression });

        let mut token = self.tokens.access_token(false).await?;
        let mut refreshed = false;
        let mut attempt = 0;
        loop {
            let outcome = self.send_once(&body, &token).await;
            match outcome {
                Ok(value) => return Ok(value),
                // 401 只重新取得一次 token，不計入重試次數
                Err(e @ ImpactError::RemoteError { status: 401, .. }) if !refreshed => {
                    refreshed = true;
                    let fresh = self.tokens.access_token(true).await?;
                    if fresh == token {
                        return Err(e);
                    }
                    tracing::warn!("🔑 Access token rejected, retrying with a refreshed token");
                    token = fresh;
                }
                Err(e) if attempt < self.retry_attempts && is_retryable(&e) => {
                    attempt += 1;
                    tracing::warn!(
                        "⚠️ Earth Engine call failed ({}), retry {}/{}",
                        e,
                        attempt,
                        self.retry_attempts
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
