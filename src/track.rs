use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// File name suffixes of transient files left behind by downloads and processing.
pub const JUNK_SUFFIXES: &[&str] = &[".part.mp3", ".part", ".ytdl", ".gain.mp3"];

pub const AUDIO_EXTENSION: &str = "mp3";

/// A remote track as fetched from the metadata source.
///
/// Identity is the remote track ID; the canonical filename is derived from
/// the primary artist and the title. Lyrics, artwork and the resolved
/// provider URL are filled in while the run progresses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artists: Vec<String>,
    pub album: String,
    #[serde(default)]
    pub year: Option<i32>,
    pub duration_ms: u32,
    #[serde(default)]
    pub artwork_url: Option<String>,
    /// Provider URL the local copy was downloaded from
    #[serde(default)]
    pub url: Option<String>,
    #[serde(skip)]
    pub lyrics: Option<String>,
    #[serde(skip)]
    pub artwork: Option<Arc<Vec<u8>>>,
}

impl Track {
    pub fn primary_artist(&self) -> &str {
        self.artists.first().map(String::as_str).unwrap_or("Unknown Artist")
    }

    /// Human readable `Artist - Title`, safe to use as a file stem.
    pub fn basename(&self) -> String {
        sanitize_filename(&format!("{} - {}", self.primary_artist(), self.title))
    }

    pub fn filename(&self) -> String {
        format!("{}.{}", self.basename(), AUDIO_EXTENSION)
    }

    /// Working copy name used during post-processing. Also the dedup key of the working set.
    pub fn temporary_filename(&self) -> String {
        format!(".{}.part.{}", self.basename(), AUDIO_EXTENSION)
    }

    pub fn duration_secs(&self) -> u32 {
        self.duration_ms / 1000
    }
}

/// Per-track intent for the current run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    pub needs_source: bool,
    pub needs_metadata_flush: bool,
    pub needs_normalization: bool,
}

impl SyncOptions {
    /// Local copy already satisfies the remote entry.
    pub fn keep() -> Self {
        Self::default()
    }

    /// Track must be acquired and fully processed.
    pub fn fetch(normalize: bool) -> Self {
        Self {
            needs_source: true,
            needs_metadata_flush: true,
            needs_normalization: normalize,
        }
    }

    pub fn metadata_only() -> Self {
        Self {
            needs_metadata_flush: true,
            ..Self::default()
        }
    }

    pub fn is_noop(&self) -> bool {
        !self.needs_source && !self.needs_metadata_flush && !self.needs_normalization
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    pub owner: String,
    pub tracks: Vec<Track>,
}

/// Replace characters that are invalid in file names on common filesystems.
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            _ => c,
        })
        .collect();
    replaced.trim().trim_end_matches('.').to_string()
}

pub fn is_junk(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| JUNK_SUFFIXES.iter().any(|suffix| name.ends_with(suffix)))
}

pub fn is_audio_file(path: &Path) -> bool {
    !is_junk(path)
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(AUDIO_EXTENSION))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::make_track;

    #[test]
    fn test_filenames_derive_from_primary_artist_and_title() {
        let mut track = make_track("id1", "Bohemian Rhapsody", "Queen", 354_000);
        track.artists.push("Freddie Mercury".to_string());

        assert_eq!(track.basename(), "Queen - Bohemian Rhapsody");
        assert_eq!(track.filename(), "Queen - Bohemian Rhapsody.mp3");
        assert_eq!(
            track.temporary_filename(),
            ".Queen - Bohemian Rhapsody.part.mp3"
        );
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("AC/DC - What?"), "AC_DC - What_");
        assert_eq!(sanitize_filename("  Trailing dots... "), "Trailing dots");
    }

    #[test]
    fn test_junk_detection() {
        assert!(is_junk(Path::new(".Queen - Song.part.mp3")));
        assert!(is_junk(Path::new("download.ytdl")));
        assert!(is_junk(Path::new("Queen - Song.gain.mp3")));
        assert!(!is_junk(Path::new("Queen - Song.mp3")));
        assert!(is_audio_file(Path::new("Queen - Song.MP3")));
        assert!(!is_audio_file(Path::new(".Queen - Song.part.mp3")));
        assert!(!is_audio_file(Path::new("cover.jpg")));
    }

    #[test]
    fn test_sync_options_constructors() {
        assert!(SyncOptions::keep().is_noop());
        let fetch = SyncOptions::fetch(false);
        assert!(fetch.needs_source && fetch.needs_metadata_flush && !fetch.needs_normalization);
        let meta = SyncOptions::metadata_only();
        assert!(!meta.needs_source && meta.needs_metadata_flush && !meta.needs_normalization);
    }
}
