use std::path::Path;

use thiserror::Error;

use crate::track::Track;

/// A search hit returned by a content provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: String,
    pub title: String,
    pub uploader: String,
    /// Not every provider reports a duration for flat search results
    pub duration_ms: Option<u32>,
    pub url: String,
}

/// Why a candidate was not accepted for a track.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
    #[error("duration mismatch: expected {expected_ms}ms, got {actual_ms}ms")]
    Duration { expected_ms: u32, actual_ms: u32 },
    #[error("match score {score:.2} below threshold")]
    LowScore { score: f64 },
    #[error("unwanted version ({keyword})")]
    UnwantedVersion { keyword: String },
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{tool} is not installed or not in PATH")]
    ToolMissing { tool: String },
    #[error("search failed: {0}")]
    Search(String),
    #[error("download failed: {0}")]
    Download(String),
    #[error("no provider handles {url}")]
    UnsupportedUrl { url: String },
}

/// Port trait for a search/download backend.
///
/// Providers are iterated in a fixed priority order by the provider chain, so
/// implementations should not retry internally.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Ranked candidates, best first.
    async fn search(&self, track: &Track) -> Result<Vec<Candidate>, ProviderError>;

    fn validate(&self, candidate: &Candidate, track: &Track) -> Result<(), Rejection>;

    /// Whether `url` belongs to one of the domains this provider can download from.
    fn supports(&self, url: &str) -> bool;

    async fn download(&self, url: &str, destination: &Path) -> Result<(), ProviderError>;
}
