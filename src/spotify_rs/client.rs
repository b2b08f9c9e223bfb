use std::time::Duration;

use color_eyre::Result;
use color_eyre::eyre::Context;
use serde::de::DeserializeOwned;

use crate::ports::metadata_source::{MetadataSource, PlaylistHeader, RemoteUser};
use crate::spotify_rs::types::{
    FullAlbum, PlaylistDetails, PlaylistItem, SavedTrack, SpotifyPage, SpotifyTrack, SpotifyUser,
};
use crate::track::Track;

const API_BASE: &str = "https://api.spotify.com/v1";

/// Spotify API client
pub struct SpotifyClient {
    access_token: String,
    client: reqwest::Client,
}

impl SpotifyClient {
    pub fn new(access_token: String) -> Self {
        Self {
            access_token,
            client: reqwest::Client::new(),
        }
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .wrap_err_with(|| format!("Request to {url} failed"))?
            .error_for_status()?;

        Ok(response.json().await?)
    }

    /// Follow `next` links from `first_url` and collect every item.
    async fn get_all<T: DeserializeOwned>(&self, first_url: String) -> Result<Vec<T>> {
        let mut all_items = Vec::new();
        let mut next_url = Some(first_url);

        while let Some(url) = next_url {
            let page: SpotifyPage<T> = self.get(&url).await?;
            all_items.extend(page.items);
            next_url = page.next;
        }

        Ok(all_items)
    }
}

#[async_trait::async_trait]
impl MetadataSource for SpotifyClient {
    async fn current_user(&self) -> Result<RemoteUser> {
        let user: SpotifyUser = self.get(&format!("{API_BASE}/me")).await?;
        Ok(RemoteUser {
            id: user.id,
            display_name: user.display_name,
        })
    }

    async fn library_tracks(&self) -> Result<Vec<Track>> {
        let saved: Vec<SavedTrack> = self
            .get_all(format!("{API_BASE}/me/tracks?limit=50"))
            .await
            .wrap_err("Failed to fetch saved tracks")?;
        Ok(saved
            .into_iter()
            .filter_map(|item| item.track.into_track(None))
            .collect())
    }

    async fn album_tracks(&self, album_id: &str) -> Result<Vec<Track>> {
        let full: FullAlbum = self
            .get(&format!("{API_BASE}/albums/{album_id}"))
            .await
            .wrap_err_with(|| format!("Failed to fetch album {album_id}"))?;

        let mut items = full.tracks.items;
        if let Some(next) = full.tracks.next {
            let rest: Vec<SpotifyTrack> = self.get_all(next).await?;
            items.extend(rest);
        }

        Ok(items
            .into_iter()
            .filter_map(|track| track.into_track(Some(&full.album)))
            .collect())
    }

    async fn playlist_header(&self, playlist_id: &str) -> Result<PlaylistHeader> {
        let details: PlaylistDetails = self
            .get(&format!(
                "{API_BASE}/playlists/{playlist_id}?fields=name,owner(id,display_name)"
            ))
            .await?;
        Ok(PlaylistHeader {
            name: details.name,
            owner: details.owner.display_name.unwrap_or(details.owner.id),
        })
    }

    async fn playlist_tracks(&self, playlist_id: &str) -> Result<Vec<Track>> {
        let items: Vec<PlaylistItem> = self
            .get_all(format!(
                "{API_BASE}/playlists/{playlist_id}/tracks?limit=100"
            ))
            .await
            .wrap_err_with(|| format!("Failed to fetch playlist {playlist_id}"))?;
        Ok(items
            .into_iter()
            .filter_map(|item| item.track?.into_track(None))
            .collect())
    }
}
