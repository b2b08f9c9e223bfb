use std::time::Duration;

use color_eyre::Result;
use color_eyre::eyre::Context;

use crate::ports::artwork::ArtworkSource;

/// Cover images fetched over HTTP.
pub struct HttpArtwork {
    client: reqwest::Client,
}

impl HttpArtwork {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl ArtworkSource for HttpArtwork {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let bytes = self
            .client
            .get(url)
            .timeout(Duration::from_secs(20))
            .send()
            .await
            .wrap_err_with(|| format!("Request to {url} failed"))?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(bytes.to_vec())
    }
}
