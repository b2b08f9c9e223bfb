use chrono::{DateTime, TimeZone, Utc};

use crate::ports::provider::Candidate;
use crate::track::Track;

pub fn make_track(id: &str, title: &str, artist: &str, duration_ms: u32) -> Track {
    Track {
        id: id.to_string(),
        title: title.to_string(),
        artists: vec![artist.to_string()],
        album: format!("{title} (Album)"),
        year: Some(2020),
        duration_ms,
        artwork_url: None,
        url: None,
        lyrics: None,
        artwork: None,
    }
}

pub fn make_candidate(title: &str, uploader: &str, duration_ms: Option<u32>) -> Candidate {
    let slug: String = title
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(11)
        .collect();
    Candidate {
        id: slug.clone(),
        title: title.to_string(),
        uploader: uploader.to_string(),
        duration_ms,
        url: format!("https://www.youtube.com/watch?v={slug}"),
    }
}

/// Fixed instant used where tests reason about elapsed time.
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0)
        .single()
        .unwrap_or_default()
}
