use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use color_eyre::Result;
use color_eyre::eyre::{Context, OptionExt};
use serde::{Deserialize, Serialize};

use crate::services::metadata_cache::DEFAULT_TTL;
use crate::services::pool::DEFAULT_CAPACITY;

const APP_DIR: &str = "music-sync";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Music folder used when `--folder` is not given
    folder: Option<String>,
    cache_dir: Option<String>,
    pub concurrency: usize,
    /// Humantime duration, e.g. `30m`
    cache_ttl: String,
    /// Short names for album and playlist URIs
    pub aliases: HashMap<String, String>,
    pub spotify: SpotifyConfig,
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpotifyConfig {
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub yt_dlp: String,
    pub ffmpeg: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            yt_dlp: "yt-dlp".to_string(),
            ffmpeg: "ffmpeg".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            folder: None,
            cache_dir: None,
            concurrency: DEFAULT_CAPACITY,
            cache_ttl: humantime::format_duration(DEFAULT_TTL).to_string(),
            aliases: HashMap::new(),
            spotify: SpotifyConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .wrap_err_with(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|path| path.join(APP_DIR).join("config.toml"))
    }

    /// Load the default config file, or the built-in defaults when there is none.
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.is_file() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn create_default() -> Result<PathBuf> {
        let path = Self::config_path().ok_or_eyre("No config directory on this platform")?;
        Self::create_default_at(&path)?;
        Ok(path)
    }

    /// Write the default config to `path` unless a file already exists there.
    pub fn create_default_at(path: &Path) -> Result<()> {
        if path.exists() {
            tracing::info!("Config already exists at {}", path.display());
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .wrap_err_with(|| format!("Failed to create {}", parent.display()))?;
        }
        let contents =
            toml::to_string_pretty(&Self::default()).wrap_err("Failed to serialize config")?;
        std::fs::write(path, contents)
            .wrap_err_with(|| format!("Failed to write config file: {}", path.display()))
    }

    /// Expand ~ to home directory
    fn expand_path(&self, path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        PathBuf::from(path)
    }

    pub fn folder_path(&self) -> Option<PathBuf> {
        self.folder.as_deref().map(|folder| self.expand_path(folder))
    }

    pub fn cache_dir_path(&self) -> PathBuf {
        match &self.cache_dir {
            Some(dir) => self.expand_path(dir),
            None => dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join(APP_DIR),
        }
    }

    pub fn cache_ttl(&self) -> Result<Duration> {
        humantime::parse_duration(&self.cache_ttl)
            .wrap_err_with(|| format!("Invalid cache_ttl `{}`", self.cache_ttl))
    }

    /// Configured token, falling back to `SPOTIFY_ACCESS_TOKEN`.
    pub fn spotify_access_token(&self) -> Option<String> {
        self.spotify
            .access_token
            .clone()
            .filter(|token| !token.is_empty())
            .or_else(|| std::env::var("SPOTIFY_ACCESS_TOKEN").ok())
    }

    pub fn resolve_alias<'a>(&'a self, value: &'a str) -> &'a str {
        self.aliases.get(value).map(String::as_str).unwrap_or(value)
    }
}
