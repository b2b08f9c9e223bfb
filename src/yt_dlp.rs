//! `yt-dlp` backed providers.
//!
//! The same binary serves every site; a provider is a search prefix plus the
//! domains its URLs live on.

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Deserialize;
use tokio::process::Command;
use unaccent::unaccent;

use crate::matcher::validate_candidate;
use crate::ports::provider::{Candidate, Provider, ProviderError, Rejection};
use crate::track::{AUDIO_EXTENSION, Track};

const RESULTS_PER_SEARCH: usize = 10;

pub struct YtDlpProvider {
    name: &'static str,
    search_prefix: &'static str,
    domains: &'static [&'static str],
    binary: String,
}

impl YtDlpProvider {
    pub fn youtube(binary: &str) -> Self {
        Self {
            name: "youtube",
            search_prefix: "ytsearch",
            domains: &["youtube.com", "youtu.be"],
            binary: binary.to_string(),
        }
    }

    pub fn soundcloud(binary: &str) -> Self {
        Self {
            name: "soundcloud",
            search_prefix: "scsearch",
            domains: &["soundcloud.com"],
            binary: binary.to_string(),
        }
    }

    fn locate(&self) -> Result<PathBuf, ProviderError> {
        which::which(&self.binary).map_err(|_| ProviderError::ToolMissing {
            tool: self.binary.clone(),
        })
    }

    fn query(&self, track: &Track) -> String {
        format!(
            "{}{}:{}",
            self.search_prefix,
            RESULTS_PER_SEARCH,
            search_terms(track)
        )
    }
}

/// `Artist Title` stripped of accents and punctuation.
pub fn search_terms(track: &Track) -> String {
    let raw = unaccent(&format!("{} {}", track.primary_artist(), track.title));
    let cleaned = match Regex::new(r"[^\p{L}\p{N}\s]") {
        Ok(re) => re.replace_all(&raw, " ").to_string(),
        Err(_) => raw,
    };
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// One line of `--dump-json --flat-playlist` output.
#[derive(Debug, Deserialize)]
struct SearchEntry {
    id: String,
    title: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
    duration: Option<f64>,
    webpage_url: Option<String>,
    url: Option<String>,
}

impl SearchEntry {
    fn into_candidate(self) -> Option<Candidate> {
        Some(Candidate {
            title: self.title?,
            uploader: self.uploader.or(self.channel).unwrap_or_default(),
            duration_ms: self
                .duration
                .filter(|secs| *secs > 0.0)
                .map(|secs| (secs * 1000.0) as u32),
            url: self.webpage_url.or(self.url)?,
            id: self.id,
        })
    }
}

fn parse_search_output(stdout: &str) -> Vec<Candidate> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<SearchEntry>(line) {
            Ok(entry) => entry.into_candidate(),
            Err(err) => {
                tracing::debug!("Skipping unparsable yt-dlp line: {}", err);
                None
            }
        })
        .collect()
}

fn host_matches(url: &str, domain: &str) -> bool {
    url::Url::parse(url)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .is_some_and(|host| host == domain || host.ends_with(&format!(".{domain}")))
}

/// Move `from` to `to`, copying when they sit on different filesystems.
async fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    tracing::debug!("Rename failed, copying file across filesystems");
    tokio::fs::copy(from, to).await?;
    tokio::fs::remove_file(from).await
}

#[async_trait::async_trait]
impl Provider for YtDlpProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn search(&self, track: &Track) -> Result<Vec<Candidate>, ProviderError> {
        let binary = self.locate()?;
        let query = self.query(track);
        tracing::debug!("{} search: {}", self.name, query);

        let output = Command::new(binary)
            .args(["--dump-json", "--flat-playlist", "--no-warnings", "--ignore-errors"])
            .arg(&query)
            .output()
            .await
            .map_err(|err| ProviderError::Search(err.to_string()))?;

        if !output.status.success() && output.stdout.is_empty() {
            return Err(ProviderError::Search(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(parse_search_output(&String::from_utf8_lossy(&output.stdout)))
    }

    fn validate(&self, candidate: &Candidate, track: &Track) -> Result<(), Rejection> {
        validate_candidate(candidate, track)
    }

    fn supports(&self, url: &str) -> bool {
        self.domains.iter().any(|domain| host_matches(url, domain))
    }

    async fn download(&self, url: &str, destination: &Path) -> Result<(), ProviderError> {
        if !self.supports(url) {
            return Err(ProviderError::UnsupportedUrl {
                url: url.to_string(),
            });
        }
        let binary = self.locate()?;
        let temp_dir = tempfile::tempdir().map_err(|err| ProviderError::Download(err.to_string()))?;
        let template = temp_dir.path().join("%(id)s.%(ext)s");

        let output = Command::new(binary)
            .args([
                "--no-playlist",
                "--no-warnings",
                "--extract-audio",
                "--audio-format",
                AUDIO_EXTENSION,
                "--audio-quality",
                "0",
                "--output",
            ])
            .arg(&template)
            .arg(url)
            .output()
            .await
            .map_err(|err| ProviderError::Download(err.to_string()))?;

        if !output.status.success() {
            return Err(ProviderError::Download(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let downloaded = walkdir::WalkDir::new(temp_dir.path())
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.into_path())
            .find(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext == AUDIO_EXTENSION)
            })
            .ok_or_else(|| ProviderError::Download(format!("yt-dlp produced no file for {url}")))?;

        move_file(&downloaded, destination)
            .await
            .map_err(|err| ProviderError::Download(err.to_string()))
    }
}
