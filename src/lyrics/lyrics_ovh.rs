use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;

use crate::ports::lyrics::{LyricsError, LyricsSource};

const LYRICS_OVH_URL: &str = "https://api.lyrics.ovh/v1";

#[derive(Debug, Deserialize)]
struct LyricsOvhResponse {
    lyrics: Option<String>,
}

pub struct LyricsOvh {
    client: reqwest::Client,
}

impl LyricsOvh {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn lyrics_url(title: &str, artist: &str) -> String {
    format!(
        "{}/{}/{}",
        LYRICS_OVH_URL,
        urlencoding::encode(artist),
        urlencoding::encode(title)
    )
}

#[async_trait::async_trait]
impl LyricsSource for LyricsOvh {
    fn name(&self) -> &'static str {
        "lyrics.ovh"
    }

    async fn query(&self, title: &str, artist: &str) -> Result<String, LyricsError> {
        let response = self
            .client
            .get(lyrics_url(title, artist))
            .timeout(Duration::from_secs(10))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(LyricsError::NotFound);
        }
        let body: LyricsOvhResponse = response.error_for_status()?.json().await?;
        body.lyrics
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(LyricsError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lyrics_url_encodes_segments() {
        assert_eq!(
            lyrics_url("What's Up?", "4 Non Blondes"),
            "https://api.lyrics.ovh/v1/4%20Non%20Blondes/What%27s%20Up%3F"
        );
    }
}
