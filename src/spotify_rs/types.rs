use serde::{Deserialize, Serialize};

use crate::track::Track;

/// Spotify user profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyUser {
    pub id: String,
    pub display_name: Option<String>,
}

/// Paging object, followed through `next`
#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyPage<T> {
    pub items: Vec<T>,
    pub next: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyArtist {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyImage {
    pub url: String,
    pub width: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyAlbum {
    pub name: String,
    pub release_date: Option<String>,
    #[serde(default)]
    pub images: Vec<SpotifyImage>,
}

impl SpotifyAlbum {
    pub fn year(&self) -> Option<i32> {
        self.release_date.as_deref()?.get(..4)?.parse().ok()
    }

    /// Largest cover available.
    pub fn artwork_url(&self) -> Option<String> {
        self.images
            .iter()
            .max_by_key(|image| image.width.unwrap_or_default())
            .map(|image| image.url.clone())
    }
}

/// Spotify track from API. Local files and unavailable tracks come without ID.
#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyTrack {
    pub id: Option<String>,
    pub name: String,
    pub artists: Vec<SpotifyArtist>,
    /// Missing on album track listings
    pub album: Option<SpotifyAlbum>,
    pub duration_ms: u32,
    #[serde(default)]
    pub is_local: bool,
}

impl SpotifyTrack {
    /// `album` fills in for listings whose tracks do not embed it.
    pub fn into_track(self, album: Option<&SpotifyAlbum>) -> Option<Track> {
        if self.is_local {
            return None;
        }
        let id = self.id?;
        let album = self.album.as_ref().or(album);

        Some(Track {
            id,
            title: self.name,
            artists: self.artists.into_iter().map(|artist| artist.name).collect(),
            album: album.map(|album| album.name.clone()).unwrap_or_default(),
            year: album.and_then(SpotifyAlbum::year),
            duration_ms: self.duration_ms,
            artwork_url: album.and_then(SpotifyAlbum::artwork_url),
            url: None,
            lyrics: None,
            artwork: None,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SavedTrack {
    pub track: SpotifyTrack,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistItem {
    pub track: Option<SpotifyTrack>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FullAlbum {
    #[serde(flatten)]
    pub album: SpotifyAlbum,
    pub tracks: SpotifyPage<SpotifyTrack>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistOwner {
    pub id: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistDetails {
    pub name: String,
    pub owner: PlaylistOwner,
}
