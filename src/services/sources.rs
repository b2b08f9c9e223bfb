use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::ports::metadata_source::{MetadataSource, PlaylistHeader};
use crate::services::metadata_cache::{CacheError, CacheKey, MetadataCache};
use crate::track::{Playlist, Track};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRequest {
    Library,
    Album(String),
    Playlist(String),
}

impl SourceRequest {
    pub fn cache_key(&self, user: &str) -> CacheKey {
        match self {
            SourceRequest::Library => CacheKey::library(user),
            SourceRequest::Album(id) => CacheKey::album(user, id),
            SourceRequest::Playlist(id) => CacheKey::playlist(user, id),
        }
    }
}

#[derive(Debug, Error)]
#[error("unable to fetch {what}: {reason}")]
pub struct SourceError {
    pub what: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct FetchedSource {
    pub request: SourceRequest,
    pub tracks: Vec<Track>,
    pub playlist: Option<Playlist>,
    pub from_cache: bool,
}

/// Fetches sources from the metadata cache, falling back to the remote service.
pub struct SourceLoader {
    remote: Arc<dyn MetadataSource>,
    cache: MetadataCache,
    bypass_cache: bool,
}

impl SourceLoader {
    pub fn new(remote: Arc<dyn MetadataSource>, cache: MetadataCache, bypass_cache: bool) -> Self {
        Self {
            remote,
            cache,
            bypass_cache,
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn load(&self, user: &str, request: &SourceRequest) -> Result<FetchedSource, SourceError> {
        let key = request.cache_key(user);

        if self.bypass_cache {
            if let Err(err) = self.cache.invalidate(&key) {
                warn!("Unable to drop {} cache: {}", key, err);
            }
        } else {
            match self.cache.fetch(&key) {
                Ok(snapshot) => {
                    let age = Duration::from_secs(snapshot.age_at(chrono::Utc::now()).as_secs());
                    info!(
                        "{} cache: {} / {}",
                        key,
                        humantime::format_duration(age),
                        humantime::format_duration(self.cache.ttl())
                    );
                    let playlist = match request {
                        SourceRequest::Playlist(id) => {
                            let header = snapshot
                                .playlist
                                .unwrap_or_else(|| fallback_header(id, user));
                            Some(make_playlist(id, header, &snapshot.tracks))
                        }
                        _ => None,
                    };
                    return Ok(FetchedSource {
                        request: request.clone(),
                        tracks: snapshot.tracks,
                        playlist,
                        from_cache: true,
                    });
                }
                Err(CacheError::NotFound | CacheError::Expired) => {
                    debug!("{} cache miss", key);
                }
                Err(err) => warn!("Ignoring {} cache: {}", key, err),
            }
        }

        let fetched = match request {
            SourceRequest::Library => self.remote.library_tracks().await,
            SourceRequest::Album(id) => self.remote.album_tracks(id).await,
            SourceRequest::Playlist(id) => self.remote.playlist_tracks(id).await,
        };
        let tracks = fetched.map_err(|err| SourceError {
            what: key.to_string(),
            reason: format!("{err:#}"),
        })?;

        let header = match request {
            SourceRequest::Playlist(id) => Some(match self.remote.playlist_header(id).await {
                Ok(header) => header,
                Err(err) => {
                    warn!("Unable to fetch playlist {} details: {:#}", id, err);
                    fallback_header(id, user)
                }
            }),
            _ => None,
        };

        if let Err(err) = self.cache.store(&key, &tracks, header.clone()) {
            warn!("Unable to cache {}: {}", key, err);
        }

        let playlist = match (request, header) {
            (SourceRequest::Playlist(id), Some(header)) => Some(make_playlist(id, header, &tracks)),
            _ => None,
        };
        info!("{} fetched: {} tracks", key, tracks.len());

        Ok(FetchedSource {
            request: request.clone(),
            tracks,
            playlist,
            from_cache: false,
        })
    }
}

fn fallback_header(id: &str, user: &str) -> PlaylistHeader {
    PlaylistHeader {
        name: id.to_string(),
        owner: user.to_string(),
    }
}

fn make_playlist(id: &str, header: PlaylistHeader, tracks: &[Track]) -> Playlist {
    Playlist {
        id: id.to_string(),
        name: header.name,
        owner: header.owner,
        tracks: tracks.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::metadata_source::MockMetadataSource;
    use crate::services::metadata_cache::DEFAULT_TTL;
    use crate::test_utils::make_track;
    use color_eyre::eyre::eyre;
    use tempfile::TempDir;

    fn loader(dir: &TempDir, remote: MockMetadataSource, bypass: bool) -> SourceLoader {
        SourceLoader::new(
            Arc::new(remote),
            MetadataCache::new(dir.path(), DEFAULT_TTL),
            bypass,
        )
    }

    #[tokio::test]
    async fn test_second_load_is_served_from_cache() {
        let dir = TempDir::new().unwrap();
        let mut remote = MockMetadataSource::new();
        remote
            .expect_library_tracks()
            .times(1)
            .returning(|| Ok(vec![make_track("1", "Song", "Artist", 200_000)]));
        let loader = loader(&dir, remote, false);

        let first = loader.load("alice", &SourceRequest::Library).await.unwrap();
        let second = loader.load("alice", &SourceRequest::Library).await.unwrap();

        assert!(!first.from_cache);
        assert!(second.from_cache);
        assert_eq!(first.tracks, second.tracks);
    }

    #[tokio::test]
    async fn test_bypass_cache_always_fetches() {
        let dir = TempDir::new().unwrap();
        let mut remote = MockMetadataSource::new();
        remote
            .expect_album_tracks()
            .times(2)
            .returning(|_| Ok(vec![]));
        let loader = loader(&dir, remote, true);
        let request = SourceRequest::Album("a1".to_string());

        loader.load("alice", &request).await.unwrap();
        loader.load("alice", &request).await.unwrap();
    }

    #[tokio::test]
    async fn test_playlist_header_failure_falls_back_to_id() {
        let dir = TempDir::new().unwrap();
        let mut remote = MockMetadataSource::new();
        remote
            .expect_playlist_tracks()
            .returning(|_| Ok(vec![make_track("1", "Song", "Artist", 200_000)]));
        remote
            .expect_playlist_header()
            .returning(|_| Err(eyre!("403")));
        let loader = loader(&dir, remote, false);

        let fetched = loader
            .load("alice", &SourceRequest::Playlist("p1".to_string()))
            .await
            .unwrap();

        let playlist = fetched.playlist.unwrap();
        assert_eq!(playlist.name, "p1");
        assert_eq!(playlist.owner, "alice");
        assert_eq!(playlist.tracks.len(), 1);
    }

    #[tokio::test]
    async fn test_remote_failure_without_cache_is_an_error() {
        let dir = TempDir::new().unwrap();
        let mut remote = MockMetadataSource::new();
        remote
            .expect_library_tracks()
            .returning(|| Err(eyre!("connection reset")));

        let err = loader(&dir, remote, false)
            .load("alice", &SourceRequest::Library)
            .await
            .unwrap_err();

        assert_eq!(err.what, "library");
        assert!(err.reason.contains("connection reset"));
    }
}
