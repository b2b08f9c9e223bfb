use thiserror::Error;

#[derive(Debug, Error)]
pub enum LyricsError {
    #[error("no lyrics found")]
    NotFound,
    #[error("lyrics request failed: {0}")]
    Request(#[from] reqwest::Error),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait LyricsSource: Send + Sync {
    fn name(&self) -> &'static str;
    async fn query(&self, title: &str, artist: &str) -> Result<String, LyricsError>;
}
