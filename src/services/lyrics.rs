use std::sync::Arc;

use tracing::debug;

use crate::ports::lyrics::LyricsSource;
use crate::track::Track;

/// Lyrics sources tried in order; the first non-empty answer wins.
pub struct LyricsChain {
    sources: Vec<Arc<dyn LyricsSource>>,
}

impl LyricsChain {
    pub fn new(sources: Vec<Arc<dyn LyricsSource>>) -> Self {
        Self { sources }
    }

    pub async fn find(&self, track: &Track) -> Option<String> {
        for source in &self.sources {
            match source.query(&track.title, track.primary_artist()).await {
                Ok(text) if !text.trim().is_empty() => return Some(text),
                Ok(_) => debug!("{} returned empty lyrics for {}", source.name(), track.basename()),
                Err(err) => debug!("{} lyrics for {}: {}", source.name(), track.basename(), err),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::lyrics::{LyricsError, MockLyricsSource};
    use crate::test_utils::make_track;

    fn source(name: &'static str, answer: Option<&'static str>) -> Arc<dyn LyricsSource> {
        let mut source = MockLyricsSource::new();
        source.expect_name().return_const(name);
        source.expect_query().returning(move |_, _| match answer {
            Some(text) => Ok(text.to_string()),
            None => Err(LyricsError::NotFound),
        });
        Arc::new(source)
    }

    #[tokio::test]
    async fn test_first_success_wins() {
        let chain = LyricsChain::new(vec![
            source("lrclib", None),
            source("blank", Some("   ")),
            source("ovh", Some("la la la")),
            source("never", Some("unused")),
        ]);

        let lyrics = chain.find(&make_track("1", "Song", "Artist", 1)).await;

        assert_eq!(lyrics.as_deref(), Some("la la la"));
    }

    #[tokio::test]
    async fn test_no_source_answers() {
        let chain = LyricsChain::new(vec![source("lrclib", None)]);
        assert!(chain.find(&make_track("1", "Song", "Artist", 1)).await.is_none());
    }
}
