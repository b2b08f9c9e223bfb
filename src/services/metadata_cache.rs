use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::json_file::{JsonFileError, read_json, write_json_atomic};
use crate::ports::metadata_source::PlaylistHeader;
use crate::track::Track;

pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Library,
    Album,
    Playlist,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Library => "library",
            SourceKind::Album => "album",
            SourceKind::Playlist => "playlist",
        }
    }
}

/// Identity of a cached snapshot: (user, source kind, source id).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    pub user: String,
    pub kind: SourceKind,
    pub id: Option<String>,
}

impl CacheKey {
    pub fn library(user: &str) -> Self {
        Self {
            user: user.to_string(),
            kind: SourceKind::Library,
            id: None,
        }
    }

    pub fn album(user: &str, id: &str) -> Self {
        Self {
            user: user.to_string(),
            kind: SourceKind::Album,
            id: Some(id.to_string()),
        }
    }

    pub fn playlist(user: &str, id: &str) -> Self {
        Self {
            user: user.to_string(),
            kind: SourceKind::Playlist,
            id: Some(id.to_string()),
        }
    }

    pub fn file_name(&self) -> String {
        let stem = match &self.id {
            Some(id) => format!("{}_{}_{}", self.user, self.kind.as_str(), id),
            None => format!("{}_{}", self.user, self.kind.as_str()),
        };
        format!("{}.json", crate::track::sanitize_filename(&stem))
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{} {}", self.kind.as_str(), id),
            None => write!(f, "{}", self.kind.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub fetched_at: DateTime<Utc>,
    pub tracks: Vec<Track>,
    #[serde(default)]
    pub playlist: Option<PlaylistHeader>,
}

impl Snapshot {
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        (now - self.fetched_at).to_std().unwrap_or_default()
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("no cached snapshot")]
    NotFound,
    #[error("cached snapshot expired")]
    Expired,
    #[error("cache i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cache file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

impl From<JsonFileError> for CacheError {
    fn from(err: JsonFileError) -> Self {
        match err {
            JsonFileError::Io(err) if err.kind() == std::io::ErrorKind::NotFound => {
                CacheError::NotFound
            }
            JsonFileError::Io(err) => CacheError::Io(err),
            JsonFileError::Corrupt(err) => CacheError::Corrupt(err),
        }
    }
}

/// TTL-bounded snapshots of fetched sources, one JSON file per key.
#[derive(Debug, Clone)]
pub struct MetadataCache {
    dir: PathBuf,
    ttl: Duration,
}

impl MetadataCache {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    pub fn fetch(&self, key: &CacheKey) -> Result<Snapshot, CacheError> {
        self.fetch_at(key, Utc::now())
    }

    /// An entry older than the TTL is reported as `Expired`, never returned.
    pub fn fetch_at(&self, key: &CacheKey, now: DateTime<Utc>) -> Result<Snapshot, CacheError> {
        let snapshot: Snapshot = read_json(&self.path_for(key))?;
        if snapshot.age_at(now) > self.ttl || snapshot.fetched_at > now {
            return Err(CacheError::Expired);
        }
        Ok(snapshot)
    }

    pub fn store(
        &self,
        key: &CacheKey,
        tracks: &[Track],
        playlist: Option<PlaylistHeader>,
    ) -> Result<(), CacheError> {
        self.store_at(key, tracks, playlist, Utc::now())
    }

    pub fn store_at(
        &self,
        key: &CacheKey,
        tracks: &[Track],
        playlist: Option<PlaylistHeader>,
        now: DateTime<Utc>,
    ) -> Result<(), CacheError> {
        let snapshot = Snapshot {
            fetched_at: now,
            tracks: tracks.to_vec(),
            playlist,
        };
        write_json_atomic(&self.path_for(key), &snapshot)?;
        Ok(())
    }

    pub fn invalidate(&self, key: &CacheKey) -> Result<(), CacheError> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
