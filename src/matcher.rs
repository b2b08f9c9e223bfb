//! Fuzzy comparison between a remote track and a provider candidate.
//!
//! Titles coming from providers are noisy ("Artist - Title (Official Video)",
//! uploader names instead of artists, missing durations), so both sides are
//! normalized before being scored on title, artist, album, duration and
//! version indicators.

use std::collections::HashSet;

use unicode_normalization::UnicodeNormalization;

use crate::ports::provider::{Candidate, Rejection};
use crate::track::Track;

/// Minimum score for a provider candidate to be accepted automatically.
pub const MIN_SCORE_THRESHOLD: f64 = 0.50;

/// Version keywords that make a candidate unacceptable unless the remote title carries them too.
const UNWANTED_KEYWORDS: &[&str] = &[
    "cover",
    "karaoke",
    "live",
    "remix",
    "instrumental",
    "acoustic",
    "nightcore",
    "slowed",
    "sped up",
    "reverb",
    "8d",
];

const VERSION_INDICATORS: &[&str] = &[
    "remix",
    "remastered",
    "remaster",
    "live",
    "acoustic",
    "unplugged",
    "radio edit",
    "extended mix",
    "extended",
    "instrumental",
    "karaoke",
    "demo",
    "club mix",
    "edit",
];

const FEATURING_PATTERNS: &[&str] = &["feat.", "feat ", "ft.", "ft ", "featuring", "with "];

/// Fields taking part in a comparison.
#[derive(Debug, Clone)]
pub struct MatchFields {
    pub title: String,
    pub primary_artist: String,
    pub secondary_artists: Vec<String>,
    pub album: String,
    pub duration_ms: u32,
}

impl From<&Track> for MatchFields {
    fn from(track: &Track) -> Self {
        Self {
            title: track.title.clone(),
            primary_artist: track.primary_artist().to_string(),
            secondary_artists: track.artists.iter().skip(1).cloned().collect(),
            album: track.album.clone(),
            duration_ms: track.duration_ms,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NormalizedFields {
    pub title: String,
    pub primary_artist: String,
    pub all_artists: HashSet<String>,
    pub album: String,
    pub duration_ms: u32,
    pub version_indicator: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationMatch {
    Exact,
    Close,
    Mismatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionMatch {
    Match,
    Ambiguous,
    Mismatch,
}

#[derive(Debug, Clone)]
pub struct MatchResult {
    pub title_similarity: f64,
    pub artist_similarity: f64,
    pub duration_match: DurationMatch,
    pub version_match: VersionMatch,
    /// Overall score from 0.0 to 1.0
    pub score: f64,
}

/// NFKC, lowercase, punctuation dropped, whitespace collapsed.
pub fn normalize_string(s: &str) -> String {
    let folded: String = s.nfkc().collect::<String>().to_lowercase();
    folded
        .chars()
        .filter(|&c| c != '\'')
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split `Title (feat. X) [Remastered]` into the bare title and its bracketed parts.
fn split_brackets(s: &str) -> (String, Vec<String>) {
    let mut bare = String::new();
    let mut groups = Vec::new();
    let mut current = String::new();
    let mut closing: Option<char> = None;

    for c in s.chars() {
        match (closing, c) {
            (None, '(') => closing = Some(')'),
            (None, '[') => closing = Some(']'),
            (None, '【') => closing = Some('】'),
            (Some(close), c) if c == close => {
                if !current.trim().is_empty() {
                    groups.push(current.trim().to_string());
                }
                current.clear();
                closing = None;
            }
            (Some(_), c) => current.push(c),
            (None, c) => bare.push(c),
        }
    }

    (bare.trim().to_string(), groups)
}

fn version_indicator(groups: &[String]) -> Option<String> {
    groups.iter().find_map(|group| {
        let lower = group.to_lowercase();
        VERSION_INDICATORS
            .iter()
            .find(|indicator| lower.contains(*indicator))
            .map(|indicator| indicator.to_string())
    })
}

fn featuring_artists(s: &str) -> Vec<String> {
    let lower = s.to_lowercase();
    FEATURING_PATTERNS
        .iter()
        .filter_map(|pattern| {
            let idx = lower.find(pattern)?;
            s.get(idx + pattern.len()..)?
                .split([',', '&', ')', ']'])
                .next()
                .map(str::trim)
                .filter(|artist| !artist.is_empty())
                .map(normalize_string)
        })
        .collect()
}

fn strip_leading_the(s: &str) -> &str {
    match s.get(..4) {
        Some(prefix) if prefix.eq_ignore_ascii_case("the ") => &s[4..],
        _ => s,
    }
}

fn cut_featuring(title: &str) -> &str {
    let lower = title.to_lowercase();
    FEATURING_PATTERNS
        .iter()
        .filter_map(|pattern| lower.find(pattern))
        .min()
        .and_then(|idx| title.get(..idx))
        .unwrap_or(title)
}

pub fn normalize_fields(fields: &MatchFields) -> NormalizedFields {
    let (bare_title, groups) = split_brackets(&fields.title);

    let mut all_artists: HashSet<String> = HashSet::new();
    all_artists.insert(normalize_string(strip_leading_the(&fields.primary_artist)));
    for artist in &fields.secondary_artists {
        all_artists.insert(normalize_string(strip_leading_the(artist)));
    }
    all_artists.extend(featuring_artists(&fields.title));
    all_artists.retain(|artist| !artist.is_empty());

    NormalizedFields {
        title: normalize_string(strip_leading_the(cut_featuring(&bare_title))),
        primary_artist: normalize_string(strip_leading_the(&fields.primary_artist)),
        all_artists,
        album: normalize_string(strip_leading_the(&fields.album)),
        duration_ms: fields.duration_ms,
        version_indicator: version_indicator(&groups),
    }
}

pub fn jaro_winkler_similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    jaro_winkler::jaro_winkler(a, b)
}

/// Jaccard similarity over whitespace tokens, robust to word reordering.
pub fn token_similarity(a: &str, b: &str) -> f64 {
    let left: HashSet<&str> = a.split_whitespace().collect();
    let right: HashSet<&str> = b.split_whitespace().collect();
    if left.is_empty() && right.is_empty() {
        return 1.0;
    }
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    left.intersection(&right).count() as f64 / left.union(&right).count() as f64
}

pub fn combined_similarity(a: &str, b: &str) -> f64 {
    jaro_winkler_similarity(a, b).max(token_similarity(a, b) * 0.95)
}

/// Tight tolerance is max(5s, 3%), loose tolerance max(15s, 8%) of the shorter duration.
pub fn check_duration_match(a_ms: u32, b_ms: u32) -> DurationMatch {
    let shorter = a_ms.min(b_ms) as f64;
    let diff = a_ms.abs_diff(b_ms);
    let tight = 5_000_u32.max((shorter * 0.03) as u32);
    let loose = 15_000_u32.max((shorter * 0.08) as u32);

    if diff <= tight {
        DurationMatch::Exact
    } else if diff <= loose {
        DurationMatch::Close
    } else {
        DurationMatch::Mismatch
    }
}

fn compare_artists(candidate: &NormalizedFields, remote: &NormalizedFields) -> f64 {
    let primary = jaro_winkler_similarity(&candidate.primary_artist, &remote.primary_artist);
    if candidate.all_artists.is_empty() || remote.all_artists.is_empty() {
        return primary * 0.7;
    }

    let overlap = candidate
        .all_artists
        .iter()
        .map(|artist| {
            remote
                .all_artists
                .iter()
                .map(|other| jaro_winkler_similarity(artist, other))
                .fold(0.0_f64, f64::max)
        })
        .sum::<f64>()
        / candidate.all_artists.len() as f64;

    primary * 0.7 + overlap * 0.3
}

fn compare_versions(candidate: &NormalizedFields, remote: &NormalizedFields) -> VersionMatch {
    match (&candidate.version_indicator, &remote.version_indicator) {
        (None, None) => VersionMatch::Match,
        (Some(a), Some(b)) if a == b => VersionMatch::Match,
        (Some(_), Some(_)) => VersionMatch::Mismatch,
        _ => VersionMatch::Ambiguous,
    }
}

pub fn compare(candidate: &NormalizedFields, remote: &NormalizedFields) -> MatchResult {
    let title_similarity = combined_similarity(&candidate.title, &remote.title);
    let artist_similarity = compare_artists(candidate, remote);
    let album_similarity = combined_similarity(&candidate.album, &remote.album);
    let duration_match = check_duration_match(candidate.duration_ms, remote.duration_ms);
    let version_match = compare_versions(candidate, remote);

    let mut score = title_similarity * 0.45 + artist_similarity * 0.40;
    if album_similarity > 0.8 {
        score += 0.10 * album_similarity;
    }
    score *= match duration_match {
        DurationMatch::Exact => 1.0,
        DurationMatch::Close => 0.85,
        DurationMatch::Mismatch => 0.5,
    };
    score *= match version_match {
        VersionMatch::Match => 1.0,
        VersionMatch::Ambiguous => 0.9,
        VersionMatch::Mismatch => 0.6,
    };

    MatchResult {
        title_similarity,
        artist_similarity,
        duration_match,
        version_match,
        score,
    }
}

/// Provider titles are usually `Artist - Title`; otherwise the uploader stands in for the artist.
pub fn split_candidate_title(title: &str, uploader: &str) -> (String, String) {
    if let Some((artist, song)) = title.split_once(" - ") {
        let (artist, song) = (artist.trim(), song.trim());
        if !artist.is_empty() && !song.is_empty() {
            return (artist.to_string(), song.to_string());
        }
    }
    let uploader = uploader.trim_end_matches(" - Topic").trim();
    (uploader.to_string(), title.trim().to_string())
}

fn contains_word(haystack: &str, needle: &str) -> bool {
    let haystack = format!(" {haystack} ");
    haystack.contains(&format!(" {needle} "))
}

/// Decide whether a provider candidate is an acceptable source for `track`.
pub fn validate_candidate(candidate: &Candidate, track: &Track) -> Result<(), Rejection> {
    let candidate_title = normalize_string(&candidate.title);
    let remote_title = normalize_string(&track.title);
    if let Some(keyword) = UNWANTED_KEYWORDS.iter().find(|keyword| {
        contains_word(&candidate_title, keyword) && !contains_word(&remote_title, keyword)
    }) {
        return Err(Rejection::UnwantedVersion {
            keyword: keyword.to_string(),
        });
    }

    // Unknown durations are neutral rather than a mismatch.
    let candidate_duration = candidate.duration_ms.unwrap_or(track.duration_ms);
    if track.duration_ms > 0
        && check_duration_match(candidate_duration, track.duration_ms) == DurationMatch::Mismatch
    {
        return Err(Rejection::Duration {
            expected_ms: track.duration_ms,
            actual_ms: candidate_duration,
        });
    }

    let (artist, title) = split_candidate_title(&candidate.title, &candidate.uploader);
    let candidate_fields = normalize_fields(&MatchFields {
        title,
        primary_artist: artist,
        secondary_artists: vec![],
        album: String::new(),
        duration_ms: candidate_duration,
    });
    let remote_fields = normalize_fields(&MatchFields::from(track));
    let result = compare(&candidate_fields, &remote_fields);
    tracing::debug!(
        "\"{}\": title {:.2}, artist {:.2}, duration {:?}, version {:?}, score {:.2}",
        candidate.title,
        result.title_similarity,
        result.artist_similarity,
        result.duration_match,
        result.version_match,
        result.score
    );

    if result.score < MIN_SCORE_THRESHOLD {
        return Err(Rejection::LowScore {
            score: result.score,
        });
    }
    Ok(())
}
