use std::path::Path;

use color_eyre::eyre::Result;

use crate::track::Track;

/// Metadata read back from an audio file previously written by this tool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredTags {
    pub remote_id: Option<String>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub year: Option<i32>,
    pub origin_url: Option<String>,
    pub duration_ms: Option<u32>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait TagStore: Send + Sync {
    /// `Ok(None)` when the file carries no tag at all.
    async fn read(&self, path: &Path) -> Result<Option<StoredTags>>;

    /// Embed title, artists, album, lyrics, artwork and identity of `track` into `path`.
    async fn flush(&self, track: &Track, path: &Path) -> Result<()>;
}
