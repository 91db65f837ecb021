//! Network reachability checks

use crate::{config::PlayerConfig, Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Trait for connectivity checks run before network playback
#[async_trait]
pub trait Reachability: Send + Sync {
    /// `Ok(false)` means offline; `Err` means the check itself could not run
    async fn is_reachable(&self) -> Result<bool>;
}

/// Probe that issues a `HEAD` request against a known endpoint
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
    url: Url,
}

impl HttpProbe {
    pub fn new(config: &PlayerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.probe_timeout_ms))
            .build()
            .map_err(|e| Error::InvalidConfig(format!("HTTP client: {}", e)))?;
        let url = Url::parse(&config.probe_url)
            .map_err(|e| Error::InvalidConfig(format!("probe_url: {}", e)))?;
        Ok(Self { client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl Reachability for HttpProbe {
    async fn is_reachable(&self) -> Result<bool> {
        match self.client.head(self.url.clone()).send().await {
            // Any HTTP answer proves the network path works
            Ok(response) => {
                debug!(status = response.status().as_u16(), "Reachability probe answered");
                Ok(true)
            }
            Err(e) if e.is_connect() || e.is_timeout() => {
                debug!(error = %e, "Reachability probe failed to connect");
                Ok(false)
            }
            Err(e) => Err(Error::Probe(e)),
        }
    }
}

/// Check that always succeeds, for local sources and tests
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysReachable;

#[async_trait]
impl Reachability for AlwaysReachable {
    async fn is_reachable(&self) -> Result<bool> {
        Ok(true)
    }
}

/// Returns true for URLs that need the network (`http`/`https`)
pub fn is_network_url(url: &str) -> bool {
    Url::parse(url.trim())
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}
