mod artwork;
mod cli_prompt;
mod config;
mod ffmpeg;
mod id3_tags;
mod json_file;
mod logging;
mod lyrics;
mod matcher;
mod ports;
mod services;
mod spotify_rs;
mod track;
mod yt_dlp;

#[cfg(test)]
mod test_utils;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args as ClapArgs, Parser, Subcommand};
use color_eyre::{
    Result,
    eyre::{Context, OptionExt, bail},
};

use crate::{
    artwork::HttpArtwork,
    cli_prompt::StdinPrompter,
    config::Config,
    ffmpeg::Ffmpeg,
    id3_tags::Id3Tags,
    logging::init_tracing,
    lyrics::{Lrclib, LyricsOvh},
    ports::{provider::Provider, tags::TagStore},
    services::{
        junk::clean_junks,
        lyrics::LyricsChain,
        metadata_cache::MetadataCache,
        pipeline::PostProcessPipeline,
        playlist_export::PlaylistFormat,
        provider_chain::{ChainMode, ProviderChain},
        sources::SourceRequest,
        sync::{Services, SyncEngine, SyncSettings},
    },
    spotify_rs::{
        SpotifyClient,
        uri::{UriKind, parse_id},
    },
    yt_dlp::YtDlpProvider,
};

/// Exit status after an interrupt, as a shell reports SIGINT.
const INTERRUPTED_EXIT_CODE: i32 = 130;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The config file to use
    #[arg(short, long, env = "MUSIC_SYNC_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Log level or tracing filter directives
    #[arg(long, default_value = "info", global = true, env = "LOG_LEVEL")]
    log_level: String,

    /// Also write logs to this file
    #[arg(long, env = "MUSIC_SYNC_LOG_FILE", global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

fn is_directory(s: &str) -> Result<PathBuf, String> {
    let p: PathBuf = s.into();
    if p.is_dir() {
        Ok(p)
    } else {
        Err(format!("`{}` is not an existing directory", s))
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Synchronize the remote library, albums or playlists into a local folder
    Sync(SyncArgs),
    /// Remove transient download files from a folder
    CleanJunks {
        /// The folder to clean
        #[arg(short, long, value_parser = is_directory, default_value = ".")]
        folder: PathBuf,
    },
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(ClapArgs, Debug)]
struct SyncArgs {
    /// Folder to synchronize into (defaults to the configured folder, then `.`)
    #[arg(short, long, value_parser = is_directory)]
    folder: Option<PathBuf>,

    /// Synchronize saved library tracks (the default when no other source is given)
    #[arg(short, long)]
    library: bool,

    /// Album URI, URL, ID or alias to synchronize
    #[arg(short, long = "album")]
    albums: Vec<String>,

    /// Playlist URI, URL, ID or alias to synchronize
    #[arg(short, long = "playlist")]
    playlists: Vec<String>,

    /// Local file whose metadata should be refreshed from its own tags
    #[arg(long = "fix")]
    fixes: Vec<PathBuf>,

    /// Ignore cached remote metadata
    #[arg(long)]
    flush_cache: bool,

    /// Download again tracks already present locally
    #[arg(long)]
    flush_local: bool,

    /// Rewrite metadata of tracks already present locally
    #[arg(long)]
    flush_metadata: bool,

    #[arg(long)]
    disable_normalization: bool,

    #[arg(long)]
    disable_playlist_file: bool,

    /// Export playlists as .pls instead of .m3u
    #[arg(long)]
    pls_file: bool,

    #[arg(long)]
    disable_lyrics: bool,

    /// Do not track local renames
    #[arg(long)]
    disable_indexing: bool,

    /// Confirm every search result
    #[arg(long)]
    interactive: bool,

    /// Skip searching and ask for every source URL
    #[arg(long)]
    input: bool,

    /// Verbose logging and one track processed at a time
    #[arg(long)]
    debug: bool,

    /// Search only: no download, no file changes
    #[arg(long)]
    simulate: bool,

    /// Maximum tracks post-processed in parallel
    #[arg(long)]
    concurrency: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Create a default config file, if it doesn't exist
    CreateDefault,
    /// Print the path to the config file
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    let log_level = match &args.command {
        Commands::Sync(sync) if sync.debug => "debug",
        _ => args.log_level.as_str(),
    };
    init_tracing(log_level, args.log_file.as_deref())?;

    tracing::debug!("Loading configuration");
    let config = {
        if let Some(config) = &args.config {
            Config::from_file(config)
        } else {
            Config::load()
        }
    }
    .wrap_err("Failed to load music-sync config")?;

    match args.command {
        Commands::Sync(sync) => run_sync(sync, &config).await?,
        Commands::CleanJunks { folder } => {
            let removed = clean_junks(&folder)?;
            tracing::info!("Removed {} transient files from {}", removed, folder.display());
        }
        Commands::Config(config_commands) => match config_commands {
            ConfigCommands::CreateDefault => {
                tracing::debug!("Creating default config");
                let path = Config::create_default()?;
                tracing::info!("Default config available at {}", path.display());
            }
            ConfigCommands::Path => match Config::config_path() {
                Some(path) => println!("{}", path.display()),
                None => println!("No default config path found"),
            },
        },
    }

    Ok(())
}

fn source_requests(sync: &SyncArgs, config: &Config) -> Result<Vec<SourceRequest>> {
    let mut requests = Vec::new();
    if sync.library || (sync.albums.is_empty() && sync.playlists.is_empty() && sync.fixes.is_empty())
    {
        requests.push(SourceRequest::Library);
    }
    for album in &sync.albums {
        let id = parse_id(UriKind::Album, config.resolve_alias(album))?;
        requests.push(SourceRequest::Album(id));
    }
    for playlist in &sync.playlists {
        let id = parse_id(UriKind::Playlist, config.resolve_alias(playlist))?;
        requests.push(SourceRequest::Playlist(id));
    }
    Ok(requests)
}

async fn run_sync(sync: SyncArgs, config: &Config) -> Result<()> {
    let folder = match sync.folder.clone().or_else(|| config.folder_path()) {
        Some(folder) => folder,
        None => PathBuf::from("."),
    };
    if !folder.is_dir() {
        bail!("`{}` is not an existing directory", folder.display());
    }

    let cache_dir = config.cache_dir_path();
    std::fs::create_dir_all(&cache_dir)
        .wrap_err_with(|| format!("Failed to create cache directory {}", cache_dir.display()))?;

    let sources = source_requests(&sync, config)?;
    let fixes = sync
        .fixes
        .iter()
        .map(|fix| {
            std::path::absolute(fix).wrap_err_with(|| format!("Invalid path {}", fix.display()))
        })
        .collect::<Result<Vec<_>>>()?;

    let access_token = config
        .spotify_access_token()
        .ok_or_eyre("No Spotify access token: set [spotify] access_token or SPOTIFY_ACCESS_TOKEN")?;

    let http = reqwest::Client::new();
    let tags: Arc<dyn TagStore> = Arc::new(Id3Tags);
    let providers: Vec<Arc<dyn Provider>> = vec![
        Arc::new(YtDlpProvider::youtube(&config.tools.yt_dlp)),
        Arc::new(YtDlpProvider::soundcloud(&config.tools.yt_dlp)),
    ];
    let chain = ProviderChain::new(providers).with_prompter(
        Arc::new(StdinPrompter),
        ChainMode {
            interactive: sync.interactive,
            manual_input: sync.input,
        },
    );

    let settings = SyncSettings {
        folder: folder.clone(),
        cache_dir: cache_dir.clone(),
        sources,
        fixes,
        flush_cache: sync.flush_cache,
        flush_local: sync.flush_local,
        flush_metadata: sync.flush_metadata,
        normalize: !sync.disable_normalization,
        playlist_format: match (sync.disable_playlist_file, sync.pls_file) {
            (true, _) => None,
            (false, true) => Some(PlaylistFormat::Pls),
            (false, false) => Some(PlaylistFormat::M3u),
        },
        lyrics: !sync.disable_lyrics,
        indexing: !sync.disable_indexing,
        simulate: sync.simulate,
        debug: sync.debug,
        concurrency: sync.concurrency.unwrap_or(config.concurrency),
    };

    let engine = SyncEngine::new(
        settings,
        Services {
            remote: Arc::new(SpotifyClient::new(access_token)),
            cache: MetadataCache::new(cache_dir, config.cache_ttl()?),
            chain,
            lyrics: LyricsChain::new(vec![
                Arc::new(Lrclib::new(http.clone())),
                Arc::new(LyricsOvh::new(http.clone())),
            ]),
            artwork: Arc::new(HttpArtwork::new(http)),
            tags: tags.clone(),
            pipeline: PostProcessPipeline::new(Arc::new(Ffmpeg::new(&config.tools.ffmpeg)), tags),
        },
    );

    tokio::select! {
        report = engine.run() => {
            report?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, removing transient files");
            if let Err(err) = clean_junks(&folder) {
                tracing::warn!("Unable to clean transient files: {:#}", err);
            }
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> SyncArgs {
        let mut argv = vec!["music-sync", "sync"];
        argv.extend_from_slice(args);
        match Args::try_parse_from(argv).unwrap().command {
            Commands::Sync(sync) => sync,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_library_is_the_default_source() {
        let requests = source_requests(&parse(&[]), &Config::default()).unwrap();
        assert_eq!(requests, vec![SourceRequest::Library]);
    }

    #[test]
    fn test_albums_and_playlist_aliases() {
        let mut config = Config::default();
        config.aliases.insert(
            "gym".to_string(),
            "spotify:playlist:37i9dQZF1DXcBWIGoYBM5M".to_string(),
        );
        let sync = parse(&[
            "--album",
            "https://open.spotify.com/album/4aawyAB9vmqN3uQ7FjRGTy",
            "--playlist",
            "gym",
        ]);

        let requests = source_requests(&sync, &config).unwrap();

        assert_eq!(
            requests,
            vec![
                SourceRequest::Album("4aawyAB9vmqN3uQ7FjRGTy".to_string()),
                SourceRequest::Playlist("37i9dQZF1DXcBWIGoYBM5M".to_string()),
            ]
        );
    }

    #[test]
    fn test_library_flag_combines_with_playlists() {
        let sync = parse(&["--library", "--playlist", "37i9dQZF1DXcBWIGoYBM5M"]);
        let requests = source_requests(&sync, &Config::default()).unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0], SourceRequest::Library);
    }

    #[test]
    fn test_invalid_playlist_is_rejected() {
        let sync = parse(&["--playlist", "https://example.com/nope"]);
        assert!(source_requests(&sync, &Config::default()).is_err());
    }

    #[test]
    fn test_config_is_accepted_after_the_subcommand() {
        let args =
            Args::try_parse_from(["music-sync", "sync", "--config", "x.toml", "--simulate"]).unwrap();

        assert_eq!(args.config, Some(PathBuf::from("x.toml")));
        assert!(matches!(args.command, Commands::Sync(sync) if sync.simulate));
    }
}
