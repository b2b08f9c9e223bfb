use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;

use crate::ports::lyrics::{LyricsError, LyricsSource};

const LRCLIB_GET_URL: &str = "https://lrclib.net/api/get";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LrclibRecord {
    plain_lyrics: Option<String>,
    #[serde(default)]
    instrumental: bool,
}

impl LrclibRecord {
    fn into_text(self) -> Result<String, LyricsError> {
        if self.instrumental {
            return Err(LyricsError::NotFound);
        }
        self.plain_lyrics
            .filter(|text| !text.trim().is_empty())
            .ok_or(LyricsError::NotFound)
    }
}

pub struct Lrclib {
    client: reqwest::Client,
}

impl Lrclib {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl LyricsSource for Lrclib {
    fn name(&self) -> &'static str {
        "lrclib"
    }

    async fn query(&self, title: &str, artist: &str) -> Result<String, LyricsError> {
        let response = self
            .client
            .get(LRCLIB_GET_URL)
            .query(&[("track_name", title), ("artist_name", artist)])
            .timeout(Duration::from_secs(10))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(LyricsError::NotFound);
        }
        let record: LrclibRecord = response.error_for_status()?.json().await?;
        record.into_text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_text() {
        let record: LrclibRecord = serde_json::from_str(
            r#"{"id": 1, "trackName": "Song", "plainLyrics": "line one\nline two", "syncedLyrics": null, "instrumental": false}"#,
        )
        .unwrap();
        assert_eq!(record.into_text().unwrap(), "line one\nline two");
    }

    #[test]
    fn test_instrumental_has_no_lyrics() {
        let record: LrclibRecord =
            serde_json::from_str(r#"{"plainLyrics": null, "instrumental": true}"#).unwrap();
        assert!(matches!(record.into_text(), Err(LyricsError::NotFound)));
    }
}
