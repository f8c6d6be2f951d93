use crate::config::toml_config::{CredentialsMode, EarthEngineConfig};
use crate::utils::error::{ImpactError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// 提前一分鐘視為過期
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Supplies bearer tokens for Earth Engine requests.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Token for the next request. With `refresh`, any cached token is
    /// discarded first (the platform rejected it).
    async fn access_token(&self, refresh: bool) -> Result<String>;
}

/// A fixed token from configuration.
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self, _refresh: bool) -> Result<String> {
        Ok(self.token.clone())
    }
}

#[derive(Debug, Deserialize)]
struct MetadataTokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Service-account tokens from the Google Cloud metadata server, cached
/// until shortly before they expire.
pub struct MetadataServerToken {
    client: Client,
    url: String,
    cached: Mutex<Option<CachedToken>>,
}

impl MetadataServerToken {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            cached: Mutex::new(None),
        })
    }

    async fn fetch(&self) -> Result<CachedToken> {
        let response = self
            .client
            .get(&self.url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ImpactError::CredentialError {
                message: format!("metadata server returned {}: {}", status, text.trim()),
            });
        }

        let token: MetadataTokenResponse = response.json().await?;
        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(EXPIRY_MARGIN);
        tracing::debug!("🔑 Fetched access token valid for {}s", token.expires_in);
        Ok(CachedToken {
            value: token.access_token,
            expires_at: Instant::now() + lifetime,
        })
    }
}

#[async_trait]
impl TokenSource for MetadataServerToken {
    async fn access_token(&self, refresh: bool) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if !refresh {
            if let Some(token) = cached.as_ref().filter(|t| t.expires_at > Instant::now()) {
                return Ok(token.value.clone());
            }
        }

        let token = self.fetch().await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }
}

/// 依設定選擇 token 來源
pub fn token_source(config: &EarthEngineConfig) -> Result<Arc<dyn TokenSource>> {
    match config.effective_credentials() {
        CredentialsMode::Metadata => {
            tracing::info!("🔑 Using metadata server credentials");
            Ok(Arc::new(MetadataServerToken::new(
                config.metadata_url.clone(),
                Duration::from_secs(config.timeout_seconds),
            )?))
        }
        _ => Ok(Arc::new(StaticToken::new(config.access_token.clone()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_token_ignores_refresh() {
        let source = StaticToken::new("abc");
        assert_eq!(source.access_token(false).await.unwrap(), "abc");
        assert_eq!(source.access_token(true).await.unwrap(), "abc");
    }

    #[tokio::test]
    async fn test_unreachable_metadata_server_is_an_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let source = MetadataServerToken::new(
            format!("http://127.0.0.1:{}/token", port),
            Duration::from_secs(1),
        )
        .unwrap();
        assert!(matches!(
            source.access_token(false).await,
            Err(ImpactError::ApiError(_))
        ));
    }
}
