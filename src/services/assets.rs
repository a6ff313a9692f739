/// Asset retrieval: background (local file or URL) and member avatar (URL).
/// Bytes only; decoding happens in the compositor.
use serenity::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::config::BackgroundKind;
use crate::render::{AssetKind, AssetSource, RenderError};

#[async_trait]
pub trait AssetProvider: Send + Sync + 'static {
    async fn fetch_background(
        &self,
        kind: BackgroundKind,
        location: &str,
    ) -> Result<Vec<u8>, RenderError>;

    async fn fetch_avatar(&self, url: &str) -> Result<Vec<u8>, RenderError>;
}

/// Fetches over HTTP with `reqwest` and from disk with `tokio::fs`
#[derive(Clone)]
pub struct HttpAssetProvider {
    client: reqwest::Client,
}

impl HttpAssetProvider {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("welcome-bot/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    async fn get(&self, asset: AssetKind, url: &str) -> Result<Vec<u8>, RenderError> {
        debug!("Fetching {} from {}", asset, url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| RenderError::asset(asset, e))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RenderError::asset(asset, e))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl AssetProvider for HttpAssetProvider {
    async fn fetch_background(
        &self,
        kind: BackgroundKind,
        location: &str,
    ) -> Result<Vec<u8>, RenderError> {
        match kind {
            BackgroundKind::Local => tokio::fs::read(location)
                .await
                .map_err(|e| RenderError::asset(AssetKind::Background, AssetSource::Io(e))),
            BackgroundKind::Url => self.get(AssetKind::Background, location).await,
        }
    }

    async fn fetch_avatar(&self, url: &str) -> Result<Vec<u8>, RenderError> {
        self.get(AssetKind::Avatar, url).await
    }
}
