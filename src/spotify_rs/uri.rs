use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UriKind {
    Album,
    Playlist,
}

impl UriKind {
    fn as_str(&self) -> &'static str {
        match self {
            UriKind::Album => "album",
            UriKind::Playlist => "playlist",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UriError {
    #[error("`{input}` is not a Spotify {kind} URI, URL or ID")]
    Unrecognized { input: String, kind: &'static str },
}

fn is_id(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Extract the ID from `spotify:<kind>:<id>`, `spotify:user:<u>:<kind>:<id>`,
/// `https://open.spotify.com/[intl-xx/]<kind>/<id>` or a bare ID.
pub fn parse_id(kind: UriKind, input: &str) -> Result<String, UriError> {
    let input = input.trim();
    let unrecognized = || UriError::Unrecognized {
        input: input.to_string(),
        kind: kind.as_str(),
    };

    if is_id(input) {
        return Ok(input.to_string());
    }

    if let Some(rest) = input.strip_prefix("spotify:") {
        let parts: Vec<&str> = rest.split(':').collect();
        return match parts.as_slice() {
            [k, id] | ["user", _, k, id] if *k == kind.as_str() && is_id(id) => Ok(id.to_string()),
            _ => Err(unrecognized()),
        };
    }

    let url = Url::parse(input).map_err(|_| unrecognized())?;
    if url.host_str() != Some("open.spotify.com") {
        return Err(unrecognized());
    }
    let segments: Vec<&str> = url
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();
    segments
        .windows(2)
        .find(|pair| pair[0] == kind.as_str() && is_id(pair[1]))
        .map(|pair| pair[1].to_string())
        .ok_or_else(unrecognized)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "37i9dQZF1DXcBWIGoYBM5M";

    #[test]
    fn test_accepted_forms() {
        for input in [
            ID.to_string(),
            format!("spotify:playlist:{ID}"),
            format!("spotify:user:alice:playlist:{ID}"),
            format!("https://open.spotify.com/playlist/{ID}?si=abc"),
            format!("https://open.spotify.com/intl-it/playlist/{ID}"),
        ] {
            assert_eq!(parse_id(UriKind::Playlist, &input).unwrap(), ID, "{input}");
        }
    }

    #[test]
    fn test_kind_must_match() {
        assert!(parse_id(UriKind::Album, &format!("spotify:playlist:{ID}")).is_err());
        assert!(
            parse_id(
                UriKind::Album,
                &format!("https://open.spotify.com/playlist/{ID}")
            )
            .is_err()
        );
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(parse_id(UriKind::Album, "https://example.com/album/abc").is_err());
        assert!(parse_id(UriKind::Album, "not an id").is_err());
    }
}
