use std::sync::Arc;

use color_eyre::Result;
use tracing::{debug, info, warn};

use crate::ports::prompt::Prompter;
use crate::ports::provider::{Candidate, Provider, ProviderError};
use crate::track::Track;

/// How a source for a track was chosen.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Accepted {
        provider: &'static str,
        candidate: Candidate,
    },
    Manual {
        url: String,
    },
    /// The local copy already comes from the accepted candidate.
    AlreadyOptimal {
        url: String,
    },
    NotFound,
}

impl Selection {
    pub fn url(&self) -> Option<&str> {
        match self {
            Selection::Accepted { candidate, .. } => Some(&candidate.url),
            Selection::Manual { url } => Some(url),
            Selection::AlreadyOptimal { .. } | Selection::NotFound => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ChainMode {
    /// Ask before accepting each candidate, and for a URL when nothing matched
    pub interactive: bool,
    /// Skip searching and always ask for a URL
    pub manual_input: bool,
}

/// Providers in priority order.
pub struct ProviderChain {
    providers: Vec<Arc<dyn Provider>>,
    prompter: Option<Arc<dyn Prompter>>,
    mode: ChainMode,
}

impl ProviderChain {
    pub fn new(providers: Vec<Arc<dyn Provider>>) -> Self {
        Self {
            providers,
            prompter: None,
            mode: ChainMode::default(),
        }
    }

    pub fn with_prompter(mut self, prompter: Arc<dyn Prompter>, mode: ChainMode) -> Self {
        self.prompter = Some(prompter);
        self.mode = mode;
        self
    }

    /// First provider whose domains include `url`.
    pub fn provider_for(&self, url: &str) -> Result<Arc<dyn Provider>, ProviderError> {
        self.providers
            .iter()
            .find(|provider| provider.supports(url))
            .cloned()
            .ok_or_else(|| ProviderError::UnsupportedUrl {
                url: url.to_string(),
            })
    }

    /// Walk the providers in order and return the first accepted candidate.
    ///
    /// Errors only come from the prompter; provider failures are logged and skipped.
    pub async fn select(&self, track: &Track) -> Result<Selection> {
        if !self.mode.manual_input {
            if let Some((provider, candidate)) = self.search(track).await? {
                if track.url.as_deref() == Some(candidate.url.as_str()) {
                    return Ok(Selection::AlreadyOptimal { url: candidate.url });
                }
                return Ok(Selection::Accepted {
                    provider,
                    candidate,
                });
            }
        }

        if self.mode.interactive || self.mode.manual_input {
            return self.ask_url(track).await;
        }
        Ok(Selection::NotFound)
    }

    async fn search(&self, track: &Track) -> Result<Option<(&'static str, Candidate)>> {
        for provider in &self.providers {
            let candidates = match provider.search(track).await {
                Ok(candidates) => candidates,
                Err(err) => {
                    warn!("{} search failed for {}: {}", provider.name(), track.basename(), err);
                    continue;
                }
            };
            debug!("{} returned {} candidates", provider.name(), candidates.len());

            for candidate in candidates {
                let verdict = provider.validate(&candidate, track);
                if let Err(rejection) = &verdict {
                    debug!(
                        "{} rejected {} \"{}\" ({}): {}",
                        provider.name(),
                        candidate.id,
                        candidate.title,
                        candidate.url,
                        rejection
                    );
                }
                let accepted = match &self.prompter {
                    Some(prompter) if self.mode.interactive => {
                        let message = format!(
                            "Use \"{}\" ({}) for \"{}\"?",
                            candidate.title,
                            candidate.url,
                            track.basename()
                        );
                        prompter.confirm(&message).await?
                    }
                    _ => verdict.is_ok(),
                };
                if accepted {
                    return Ok(Some((provider.name(), candidate)));
                }
            }
            info!("{} has no acceptable result for {}", provider.name(), track.basename());
        }
        Ok(None)
    }

    async fn ask_url(&self, track: &Track) -> Result<Selection> {
        let Some(prompter) = &self.prompter else {
            return Ok(Selection::NotFound);
        };
        let message = format!("Source URL for \"{}\"", track.basename());
        let Some(url) = prompter.input(&message).await? else {
            return Ok(Selection::NotFound);
        };
        let url = url.trim().to_string();
        if self.provider_for(&url).is_err() {
            warn!("No provider recognizes {}", url);
            return Ok(Selection::NotFound);
        }
        Ok(Selection::Manual { url })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::prompt::MockPrompter;
    use crate::ports::provider::{MockProvider, Rejection};
    use crate::test_utils::{make_candidate, make_track};

    fn provider(
        name: &'static str,
        domain: &'static str,
        candidates: Vec<Candidate>,
        accept: bool,
    ) -> MockProvider {
        let mut provider = MockProvider::new();
        provider.expect_name().return_const(name);
        provider
            .expect_search()
            .returning(move |_| Ok(candidates.clone()));
        provider.expect_validate().returning(move |_, _| {
            if accept {
                Ok(())
            } else {
                Err(Rejection::LowScore { score: 0.1 })
            }
        });
        provider
            .expect_supports()
            .returning(move |url| url.contains(domain));
        provider
    }

    fn track() -> Track {
        make_track("1", "Song", "Artist", 200_000)
    }

    #[tokio::test]
    async fn test_falls_back_to_next_provider_on_rejection() {
        let p1 = provider(
            "p1",
            "youtube.com",
            vec![make_candidate("Other - Thing", "Other", Some(200_000))],
            false,
        );
        let p2_candidate = Candidate {
            url: "https://soundcloud.com/artist/song".to_string(),
            ..make_candidate("Artist - Song", "Artist", Some(200_000))
        };
        let p2 = provider("p2", "soundcloud.com", vec![p2_candidate.clone()], true);
        let chain = ProviderChain::new(vec![Arc::new(p1), Arc::new(p2)]);

        let selection = chain.select(&track()).await.unwrap();

        assert_eq!(
            selection,
            Selection::Accepted {
                provider: "p2",
                candidate: p2_candidate
            }
        );
    }

    #[tokio::test]
    async fn test_search_error_skips_provider() {
        let mut failing = MockProvider::new();
        failing.expect_name().return_const("broken");
        failing
            .expect_search()
            .returning(|_| Err(ProviderError::Search("network down".to_string())));
        failing.expect_validate().never();
        let candidate = make_candidate("Artist - Song", "Artist", Some(200_000));
        let working = provider("p2", "youtube.com", vec![candidate.clone()], true);
        let chain = ProviderChain::new(vec![Arc::new(failing), Arc::new(working)]);

        let selection = chain.select(&track()).await.unwrap();

        assert_eq!(selection.url(), Some(candidate.url.as_str()));
    }

    #[tokio::test]
    async fn test_exhausted_chain_is_not_found() {
        let p1 = provider("p1", "youtube.com", vec![], true);
        let p2 = provider(
            "p2",
            "soundcloud.com",
            vec![make_candidate("x", "y", None)],
            false,
        );
        let chain = ProviderChain::new(vec![Arc::new(p1), Arc::new(p2)]);

        assert_eq!(chain.select(&track()).await.unwrap(), Selection::NotFound);
    }

    #[tokio::test]
    async fn test_same_url_is_already_optimal() {
        let candidate = make_candidate("Artist - Song", "Artist", Some(200_000));
        let p1 = provider("p1", "youtube.com", vec![candidate.clone()], true);
        let chain = ProviderChain::new(vec![Arc::new(p1)]);
        let mut track = track();
        track.url = Some(candidate.url.clone());

        assert_eq!(
            chain.select(&track).await.unwrap(),
            Selection::AlreadyOptimal { url: candidate.url }
        );
    }

    #[tokio::test]
    async fn test_interactive_confirmation_overrides_validation() {
        let rejected = make_candidate("Artist - Song (Live)", "Artist", Some(200_000));
        let p1 = provider("p1", "youtube.com", vec![rejected.clone()], false);
        let mut prompter = MockPrompter::new();
        prompter.expect_confirm().times(1).returning(|_| Ok(true));
        let chain = ProviderChain::new(vec![Arc::new(p1)]).with_prompter(
            Arc::new(prompter),
            ChainMode {
                interactive: true,
                manual_input: false,
            },
        );

        assert_eq!(
            chain.select(&track()).await.unwrap(),
            Selection::Accepted {
                provider: "p1",
                candidate: rejected
            }
        );
    }

    #[tokio::test]
    async fn test_manual_input_skips_search() {
        let mut p1 = MockProvider::new();
        p1.expect_search().never();
        p1.expect_supports()
            .returning(|url| url.contains("youtube.com"));
        let mut prompter = MockPrompter::new();
        prompter
            .expect_input()
            .returning(|_| Ok(Some(" https://www.youtube.com/watch?v=abc ".to_string())));
        let chain = ProviderChain::new(vec![Arc::new(p1)]).with_prompter(
            Arc::new(prompter),
            ChainMode {
                interactive: false,
                manual_input: true,
            },
        );

        assert_eq!(
            chain.select(&track()).await.unwrap(),
            Selection::Manual {
                url: "https://www.youtube.com/watch?v=abc".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_manual_url_with_unknown_domain_is_refused() {
        let p1 = provider("p1", "youtube.com", vec![], true);
        let mut prompter = MockPrompter::new();
        prompter
            .expect_input()
            .returning(|_| Ok(Some("https://example.org/song.mp3".to_string())));
        let chain = ProviderChain::new(vec![Arc::new(p1)]).with_prompter(
            Arc::new(prompter),
            ChainMode {
                interactive: true,
                manual_input: false,
            },
        );

        assert_eq!(chain.select(&track()).await.unwrap(), Selection::NotFound);
    }

    #[test]
    fn test_provider_for() {
        let chain = ProviderChain::new(vec![
            Arc::new(provider("youtube", "youtube.com", vec![], true)),
            Arc::new(provider("soundcloud", "soundcloud.com", vec![], true)),
        ]);

        assert_eq!(
            chain
                .provider_for("https://soundcloud.com/a/b")
                .unwrap()
                .name(),
            "soundcloud"
        );
        assert!(matches!(
            chain.provider_for("https://example.org"),
            Err(ProviderError::UnsupportedUrl { .. })
        ));
    }
}
