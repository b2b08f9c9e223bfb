use std::path::{Path, PathBuf};

use color_eyre::Result;
use color_eyre::eyre::Context;
use id3::frame::{ExtendedText, Lyrics, Picture, PictureType};
use id3::{Tag, TagLike, Version};

use crate::ports::tags::{StoredTags, TagStore};
use crate::track::Track;

pub const REMOTE_ID_FRAME: &str = "SPOTIFY_ID";
pub const ORIGIN_URL_FRAME: &str = "ORIGIN_URL";

/// ID3v2.4 tags on mp3 files.
pub struct Id3Tags;

fn extended_text(tag: &Tag, description: &str) -> Option<String> {
    tag.extended_texts()
        .find(|frame| frame.description == description)
        .map(|frame| frame.value.clone())
}

fn set_extended_text(tag: &mut Tag, description: &str, value: &str) {
    tag.remove_extended_text(Some(description), None);
    tag.add_frame(ExtendedText {
        description: description.to_string(),
        value: value.to_string(),
    });
}

/// Guess the picture MIME type from its magic bytes.
fn image_mime_type(data: &[u8]) -> &'static str {
    if data.starts_with(&[0x89, b'P', b'N', b'G']) {
        "image/png"
    } else {
        "image/jpeg"
    }
}

fn read_tags(path: &Path) -> Result<Option<StoredTags>> {
    let tag = match Tag::read_from_path(path) {
        Ok(tag) => tag,
        Err(id3::Error {
            kind: id3::ErrorKind::NoTag,
            ..
        }) => return Ok(None),
        Err(err) => {
            return Err(err).wrap_err_with(|| format!("Failed to read tags of {}", path.display()));
        }
    };

    Ok(Some(StoredTags {
        remote_id: extended_text(&tag, REMOTE_ID_FRAME),
        title: tag.title().map(String::from),
        artist: tag.artist().map(String::from),
        album: tag.album().map(String::from),
        year: tag.year(),
        origin_url: extended_text(&tag, ORIGIN_URL_FRAME),
        duration_ms: tag.duration(),
    }))
}

fn write_tags(track: &Track, path: &Path) -> Result<()> {
    let mut tag = match Tag::read_from_path(path) {
        Ok(tag) => tag,
        Err(id3::Error {
            kind: id3::ErrorKind::NoTag,
            ..
        }) => Tag::new(),
        Err(err) => {
            return Err(err).wrap_err_with(|| format!("Failed to read tags of {}", path.display()));
        }
    };

    tag.set_title(&track.title);
    tag.set_artist(track.artists.join(", "));
    tag.set_album(&track.album);
    if let Some(year) = track.year {
        tag.set_year(year);
    }
    if track.duration_ms > 0 {
        tag.set_duration(track.duration_ms);
    }

    set_extended_text(&mut tag, REMOTE_ID_FRAME, &track.id);
    if let Some(url) = &track.url {
        set_extended_text(&mut tag, ORIGIN_URL_FRAME, url);
    }

    if let Some(text) = &track.lyrics {
        tag.remove_all_lyrics();
        tag.add_frame(Lyrics {
            lang: "eng".to_string(),
            description: String::new(),
            text: text.clone(),
        });
    }

    if let Some(artwork) = &track.artwork {
        tag.remove_picture_by_type(PictureType::CoverFront);
        tag.add_frame(Picture {
            mime_type: image_mime_type(artwork).to_string(),
            picture_type: PictureType::CoverFront,
            description: String::new(),
            data: artwork.as_ref().clone(),
        });
    }

    tag.write_to_path(path, Version::Id3v24)
        .wrap_err_with(|| format!("Failed to write tags to {}", path.display()))
}

#[async_trait::async_trait]
impl TagStore for Id3Tags {
    async fn read(&self, path: &Path) -> Result<Option<StoredTags>> {
        let path: PathBuf = path.to_path_buf();
        tokio::task::spawn_blocking(move || read_tags(&path)).await?
    }

    async fn flush(&self, track: &Track, path: &Path) -> Result<()> {
        let track = track.clone();
        let path: PathBuf = path.to_path_buf();
        tokio::task::spawn_blocking(move || write_tags(&track, &path)).await?
    }
}
