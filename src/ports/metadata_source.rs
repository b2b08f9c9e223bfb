use color_eyre::eyre::Result;
use serde::{Deserialize, Serialize};

use crate::track::Track;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUser {
    pub id: String,
    pub display_name: Option<String>,
}

/// Name and owner of a remote playlist, fetched separately from its tracks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistHeader {
    pub name: String,
    pub owner: String,
}

/// Port trait over the remote library the local folder is synchronized with.
///
/// Paging is the implementation's concern; every list is returned whole and in
/// the order the remote service reports it.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MetadataSource: Send + Sync {
    async fn current_user(&self) -> Result<RemoteUser>;
    async fn library_tracks(&self) -> Result<Vec<Track>>;
    async fn album_tracks(&self, album_id: &str) -> Result<Vec<Track>>;
    async fn playlist_header(&self, playlist_id: &str) -> Result<PlaylistHeader>;
    async fn playlist_tracks(&self, playlist_id: &str) -> Result<Vec<Track>>;
}
