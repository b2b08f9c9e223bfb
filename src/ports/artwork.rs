use color_eyre::eyre::Result;

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ArtworkSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}
