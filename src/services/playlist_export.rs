use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use color_eyre::eyre::{Context, Result};
use regex::Regex;
use unaccent::unaccent;

use crate::track::Playlist;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaylistFormat {
    M3u,
    Pls,
}

impl PlaylistFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            PlaylistFormat::M3u => "m3u",
            PlaylistFormat::Pls => "pls",
        }
    }
}

/// Lowercase ASCII file stem: accents removed, non alphanumerics collapsed to `_`.
pub fn slug(name: &str) -> Result<String> {
    let re_invalid = Regex::new(r"[^a-z0-9]+").wrap_err("Failed to create regex")?;
    let lower = unaccent(name).to_lowercase();
    let slug = re_invalid.replace_all(&lower, "_");
    Ok(slug.trim_matches('_').to_string())
}

pub fn render(playlist: &Playlist, format: PlaylistFormat) -> String {
    let mut out = String::new();
    match format {
        PlaylistFormat::M3u => {
            out.push_str("#EXTM3U\n");
            for track in &playlist.tracks {
                let _ = writeln!(out, "#EXTINF:{},{}", track.duration_secs(), track.basename());
                let _ = writeln!(out, "{}", track.filename());
            }
        }
        PlaylistFormat::Pls => {
            out.push_str("[playlist]\n");
            for (i, track) in playlist.tracks.iter().enumerate() {
                let n = i + 1;
                let _ = writeln!(out, "File{}={}", n, track.filename());
                let _ = writeln!(out, "Title{}={}", n, track.basename());
                let _ = writeln!(out, "Length{}={}", n, track.duration_secs());
            }
            let _ = writeln!(out, "NumberOfEntries={}", playlist.tracks.len());
            out.push_str("Version=2\n");
        }
    }
    out
}

/// Write `playlist` next to the tracks in `folder`, replacing any previous export.
pub fn export(folder: &Path, playlist: &Playlist, format: PlaylistFormat) -> Result<PathBuf> {
    let mut stem = slug(&playlist.name)?;
    if stem.is_empty() {
        stem = slug(&playlist.id)?;
    }
    let path = folder.join(format!("{}.{}", stem, format.extension()));

    if path.exists() {
        std::fs::remove_file(&path)
            .wrap_err_with(|| format!("Failed to remove {}", path.display()))?;
    }
    std::fs::write(&path, render(playlist, format))
        .wrap_err_with(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::make_track;
    use tempfile::TempDir;

    fn playlist() -> Playlist {
        Playlist {
            id: "p1".to_string(),
            name: "Été / Road Trip!".to_string(),
            owner: "alice".to_string(),
            tracks: vec![
                make_track("1", "First", "Artist", 61_500),
                make_track("2", "Second", "Band", 120_000),
            ],
        }
    }

    #[test]
    fn test_slug() {
        assert_eq!(slug("Été / Road Trip!").unwrap(), "ete_road_trip");
        assert_eq!(slug("***").unwrap(), "");
    }

    #[test]
    fn test_render_m3u_keeps_playlist_order() {
        let rendered = render(&playlist(), PlaylistFormat::M3u);
        assert_eq!(
            rendered,
            "#EXTM3U\n\
             #EXTINF:61,Artist - First\n\
             Artist - First.mp3\n\
             #EXTINF:120,Band - Second\n\
             Band - Second.mp3\n"
        );
    }

    #[test]
    fn test_render_pls() {
        let rendered = render(&playlist(), PlaylistFormat::Pls);
        assert_eq!(
            rendered,
            "[playlist]\n\
             File1=Artist - First.mp3\n\
             Title1=Artist - First\n\
             Length1=61\n\
             File2=Band - Second.mp3\n\
             Title2=Band - Second\n\
             Length2=120\n\
             NumberOfEntries=2\n\
             Version=2\n"
        );
    }

    #[test]
    fn test_export_replaces_existing_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("ete_road_trip.m3u"), "stale").unwrap();

        let path = export(dir.path(), &playlist(), PlaylistFormat::M3u).unwrap();

        assert_eq!(path, dir.path().join("ete_road_trip.m3u"));
        assert!(std::fs::read_to_string(&path).unwrap().starts_with("#EXTM3U"));
    }
}
