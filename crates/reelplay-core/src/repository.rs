//! Catalogue access
//!
//! [`VideoRepository`] is the seam between the player and the backend.
//! [`HttpRepository`] talks to the REST API:
//!
//! - `GET  {base}/videos/{id}`
//! - `GET  {base}/videos?category=..&limit=..&offset=..`
//! - `POST {base}/videos/{id}/play`

use crate::{config::PlayerConfig, types::Video, Error, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Trait for catalogue backends
#[async_trait]
pub trait VideoRepository: Send + Sync {
    /// Fetch a single video by ID
    async fn fetch_video(&self, id: i64) -> Result<Video>;

    /// Fetch one page of a category
    async fn fetch_videos_by_category(
        &self,
        category: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Video>>;

    /// Record one play of a video
    async fn increment_play_count(&self, id: i64) -> Result<()>;
}

/// REST implementation of [`VideoRepository`]
#[derive(Debug, Clone)]
pub struct HttpRepository {
    client: Client,
    base_url: Url,
}

impl HttpRepository {
    pub fn new(config: &PlayerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| Error::InvalidConfig(format!("HTTP client: {}", e)))?;
        Self::with_client(client, &config.api_base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> Result<Self> {
        // Url::join drops the last path segment unless it ends with '/'
        let mut base = base_url.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        Ok(Self {
            client,
            base_url: Url::parse(&base)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn video_url(&self, id: i64) -> Result<Url> {
        Ok(self.base_url.join(&format!("videos/{}", id))?)
    }

    fn category_url(&self, category: &str, limit: u32, offset: u32) -> Result<Url> {
        let mut url = self.base_url.join("videos")?;
        url.query_pairs_mut()
            .append_pair("category", category)
            .append_pair("limit", &limit.to_string())
            .append_pair("offset", &offset.to_string());
        Ok(url)
    }

    fn play_url(&self, id: i64) -> Result<Url> {
        Ok(self.base_url.join(&format!("videos/{}/play", id))?)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| Error::Api {
                url: url.to_string(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::ApiStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.json::<T>().await.map_err(|e| Error::Api {
            url: url.to_string(),
            source: e,
        })
    }
}

#[async_trait]
impl VideoRepository for HttpRepository {
    #[instrument(skip(self))]
    async fn fetch_video(&self, id: i64) -> Result<Video> {
        let url = self.video_url(id)?;
        match self.get_json::<Video>(url).await {
            Err(Error::ApiStatus { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                Err(Error::VideoNotFound { id })
            }
            other => other,
        }
    }

    #[instrument(skip(self))]
    async fn fetch_videos_by_category(
        &self,
        category: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Video>> {
        let url = self.category_url(category, limit, offset)?;
        let videos: Vec<Video> = self.get_json(url).await?;
        debug!(count = videos.len(), "Category page fetched");
        Ok(videos)
    }

    #[instrument(skip(self))]
    async fn increment_play_count(&self, id: i64) -> Result<()> {
        let url = self.play_url(id)?;
        let response = self
            .client
            .post(url.clone())
            .send()
            .await
            .map_err(|e| Error::Api {
                url: url.to_string(),
                source: e,
            })?;

        if !response.status().is_success() {
            return Err(Error::ApiStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }
}
