use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use color_eyre::eyre::{Context, OptionExt, Result};
use tracing::{debug, error, info, warn};

use crate::ports::artwork::ArtworkSource;
use crate::ports::metadata_source::MetadataSource;
use crate::ports::tags::TagStore;
use crate::services::junk::clean_junks_except;
use crate::services::lyrics::LyricsChain;
use crate::services::metadata_cache::MetadataCache;
use crate::services::pipeline::{
    PostProcessJob, PostProcessOutcome, PostProcessPipeline, StageFailure,
};
use crate::services::planner::{self, SyncPlanner, WorkingSet};
use crate::services::playlist_export::{self, PlaylistFormat};
use crate::services::pool::ConcurrencyPool;
use crate::services::provider_chain::{ProviderChain, Selection};
use crate::services::rename_index::{IndexMatch, RenameIndex};
use crate::services::report::SyncReport;
use crate::services::sources::{SourceLoader, SourceRequest};
use crate::track::{Playlist, Track};

pub const INDEX_FILE: &str = "index.json";

#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub folder: PathBuf,
    pub cache_dir: PathBuf,
    pub sources: Vec<SourceRequest>,
    pub fixes: Vec<PathBuf>,
    pub flush_cache: bool,
    pub flush_local: bool,
    pub flush_metadata: bool,
    pub normalize: bool,
    /// `None` disables playlist export
    pub playlist_format: Option<PlaylistFormat>,
    pub lyrics: bool,
    pub indexing: bool,
    pub simulate: bool,
    /// Run post-processing inline to keep logs ordered
    pub debug: bool,
    pub concurrency: usize,
}

pub struct SyncEngine {
    settings: SyncSettings,
    remote: Arc<dyn MetadataSource>,
    loader: SourceLoader,
    chain: ProviderChain,
    lyrics: LyricsChain,
    artwork: Arc<dyn ArtworkSource>,
    tags: Arc<dyn TagStore>,
    pipeline: PostProcessPipeline,
}

/// Collaborators the engine drives.
pub struct Services {
    pub remote: Arc<dyn MetadataSource>,
    pub cache: MetadataCache,
    pub chain: ProviderChain,
    pub lyrics: LyricsChain,
    pub artwork: Arc<dyn ArtworkSource>,
    pub tags: Arc<dyn TagStore>,
    pub pipeline: PostProcessPipeline,
}

impl SyncEngine {
    pub fn new(settings: SyncSettings, services: Services) -> Self {
        let loader = SourceLoader::new(services.remote.clone(), services.cache, settings.flush_cache);
        Self {
            settings,
            remote: services.remote,
            loader,
            chain: services.chain,
            lyrics: services.lyrics,
            artwork: services.artwork,
            tags: services.tags,
            pipeline: services.pipeline,
        }
    }

    fn index_path(&self) -> PathBuf {
        self.settings.cache_dir.join(INDEX_FILE)
    }

    #[tracing::instrument(skip_all, fields(folder = %self.settings.folder.display()))]
    pub async fn run(&self) -> Result<SyncReport> {
        let user = self
            .remote
            .current_user()
            .await
            .wrap_err("Unable to authenticate against the remote library")?;
        info!(
            "Authenticated as {}",
            user.display_name.as_deref().unwrap_or(&user.id)
        );

        let mut tracks: Vec<Track> = Vec::new();
        let mut playlists: Vec<Playlist> = Vec::new();
        for request in &self.settings.sources {
            let fetched = self.loader.load(&user.id, request).await?;
            debug!(
                "{:?}: {} tracks from {}",
                fetched.request,
                fetched.tracks.len(),
                if fetched.from_cache { "cache" } else { "remote" }
            );
            tracks.extend(fetched.tracks);
            playlists.extend(fetched.playlist);
        }

        let mut index = self.build_index().await;
        let mut set = self.plan(tracks).await;

        if set.is_empty() {
            info!("No song needs to be downloaded.");
            return Ok(SyncReport::default());
        }

        let counts = planner::counts(&set);
        info!(
            "{} will be downloaded, {} flushed and {} ignored",
            counts.fetch, counts.flush, counts.ignore
        );

        let mut report = SyncReport::new(set.len());
        let mut pool = if self.settings.debug {
            ConcurrencyPool::sequential(self.settings.concurrency)
        } else {
            ConcurrencyPool::new(self.settings.concurrency)
        };

        for position in 0..set.len() {
            let entry = set.entries()[position].clone();
            info!("{}/{}: \"{}\"", position + 1, set.len(), entry.track.basename());

            let Some(job) = self.prepare(entry, &mut index, &mut set, &mut report).await else {
                continue;
            };
            let pipeline = self.pipeline.clone();
            let track = job.track.clone();
            pool.dispatch(track, async move { pipeline.run(job).await }).await;
        }

        // Working copies of tracks that never reached their final name stay on disk.
        let mut keep: HashSet<PathBuf> = HashSet::new();
        for (track, outcome) in pool.join().await {
            let Some(outcome) = outcome else {
                error!("Post-processing of {} did not complete", track.basename());
                keep.insert(self.settings.folder.join(track.temporary_filename()));
                report.fail(track);
                continue;
            };
            if matches!(outcome.failure(), Some(StageFailure::Finalize(_))) {
                keep.insert(self.settings.folder.join(outcome.track.temporary_filename()));
            }
            self.settle(outcome, &mut index, &mut report);
        }

        if !self.settings.simulate {
            self.export_playlists(&playlists);
            if self.settings.indexing {
                if let Err(err) = index.persist(&self.index_path()) {
                    warn!("Unable to save index: {}", err);
                }
            }
        }

        match clean_junks_except(&self.settings.folder, &keep) {
            Ok(0) => {}
            Ok(removed) => debug!("Removed {} transient files", removed),
            Err(err) => warn!("Unable to clean transient files: {:#}", err),
        }

        for line in report.to_string().lines() {
            info!("{}", line);
        }
        Ok(report)
    }

    async fn build_index(&self) -> RenameIndex {
        if !self.settings.indexing {
            return RenameIndex::default();
        }
        let previous = RenameIndex::load(&self.index_path());
        match RenameIndex::build(&self.settings.folder, self.tags.as_ref(), previous).await {
            Ok(index) => {
                debug!("Indexed {} local tracks", index.len());
                index
            }
            Err(err) => {
                warn!("Unable to index {}: {}", self.settings.folder.display(), err);
                RenameIndex::default()
            }
        }
    }

    /// Probe the folder for every fetched track and build the working set.
    async fn plan(&self, tracks: Vec<Track>) -> WorkingSet {
        let mut planner = SyncPlanner::new(self.settings.normalize);

        for mut track in tracks {
            if planner.working_set().contains(&track) {
                continue;
            }
            let path = self.settings.folder.join(track.filename());
            if !path.is_file() {
                planner.ingest(track, None);
                continue;
            }
            match self.tags.read(&path).await {
                Ok(Some(stored)) => track.url = stored.origin_url,
                Ok(None) => {}
                Err(err) => debug!("Unable to read tags of {}: {:#}", path.display(), err),
            }
            planner.ingest(track, Some(path));
        }

        for path in &self.settings.fixes {
            match self.track_from_file(path).await {
                Ok(track) => {
                    planner.ingest_fix(track, path.clone());
                }
                Err(err) => warn!("Skipping fix of {}: {:#}", path.display(), err),
            }
        }

        planner.apply_overrides(self.settings.flush_local, self.settings.flush_metadata);
        planner.finish()
    }

    async fn track_from_file(&self, path: &Path) -> Result<Track> {
        let stored = self
            .tags
            .read(path)
            .await
            .wrap_err_with(|| format!("Unable to read tags of {}", path.display()))?
            .ok_or_eyre(format!("{} has no tags to fix from", path.display()))?;

        let title = stored
            .title
            .ok_or_eyre(format!("{} has no title tag", path.display()))?;
        let artist = stored
            .artist
            .ok_or_eyre(format!("{} has no artist tag", path.display()))?;

        Ok(Track {
            id: stored.remote_id.unwrap_or_else(|| title.clone()),
            title,
            artists: artist.split(", ").map(str::to_string).collect(),
            album: stored.album.unwrap_or_default(),
            year: stored.year,
            duration_ms: stored.duration_ms.unwrap_or_default(),
            artwork_url: None,
            url: stored.origin_url,
            lyrics: None,
            artwork: None,
        })
    }

    /// Sequential part of a track: rename repair, source selection and download,
    /// lyrics and artwork. Returns the job to post-process, if any.
    async fn prepare(
        &self,
        entry: planner::WorkingEntry,
        index: &mut RenameIndex,
        set: &mut WorkingSet,
        report: &mut SyncReport,
    ) -> Option<PostProcessJob> {
        let folder = &self.settings.folder;
        let planner::WorkingEntry {
            mut track,
            mut options,
            mut local_path,
        } = entry;

        if self.settings.indexing {
            if let Some(repaired) = self.repair_rename(&track, index) {
                local_path = Some(repaired);
                if !self.settings.flush_local {
                    options.needs_source = false;
                    options.needs_normalization = false;
                }
            }
        }

        if options.needs_source {
            let selection = match self.chain.select(&track).await {
                Ok(selection) => selection,
                Err(err) => {
                    error!("Unable to select a source for {}: {:#}", track.basename(), err);
                    report.fail(track);
                    return None;
                }
            };

            match selection {
                Selection::NotFound => {
                    error!("No result found for {}", track.basename());
                    report.fail(track);
                    return None;
                }
                Selection::AlreadyOptimal { url } => {
                    info!("Local copy from {} is still the best result", url);
                    options.needs_source = false;
                    options.needs_normalization = false;
                    options.needs_metadata_flush = self.settings.flush_metadata;
                }
                Selection::Accepted { .. } | Selection::Manual { .. } => {
                    let url = selection.url().unwrap_or_default().to_string();
                    if self.settings.simulate {
                        info!("Would download {} from {}", track.basename(), url);
                        report.skipped += 1;
                        return None;
                    }
                    let temp_path = folder.join(track.temporary_filename());
                    if let Err(err) = self.download(&url, &temp_path).await {
                        error!("Unable to download {}: {:#}", track.basename(), err);
                        report.fail(track);
                        return None;
                    }
                    track.url = Some(url);
                }
            }
        }

        if options.is_noop() {
            report.skipped += 1;
            return None;
        }
        if self.settings.simulate {
            info!("Would update {}", track.basename());
            report.skipped += 1;
            return None;
        }

        if options.needs_metadata_flush {
            self.attach_lyrics(&mut track).await;
            self.attach_artwork(&mut track, set).await;
        }

        Some(PostProcessJob {
            temp_path: folder.join(track.temporary_filename()),
            final_path: folder.join(track.filename()),
            local_source: local_path,
            track,
            options,
        })
    }

    /// Move a renamed local file to its expected name. Returns the new path on success.
    fn repair_rename(&self, track: &Track, index: &mut RenameIndex) -> Option<PathBuf> {
        let folder = &self.settings.folder;
        let expected = track.filename();
        let recorded = match index.match_track(folder, &track.id, &expected) {
            Ok(IndexMatch::Renamed { recorded }) => recorded,
            Ok(IndexMatch::Matches) => return None,
            Err(err) => {
                debug!("{}: {}", track.basename(), err);
                return None;
            }
        };

        if folder.join(&expected).exists() {
            warn!(
                "Track {} was renamed but {} already exists",
                recorded.display(),
                expected
            );
            return None;
        }
        if self.settings.simulate {
            info!("Would move {} to {}", recorded.display(), expected);
            return None;
        }

        info!("Track has been renamed: moving {} to {}", recorded.display(), expected);
        match index.repair(folder, &track.id, &recorded, &expected) {
            Ok(path) => Some(path),
            Err(err) => {
                warn!("Unable to rename {}: {}", recorded.display(), err);
                None
            }
        }
    }

    async fn download(&self, url: &str, destination: &Path) -> Result<()> {
        let provider = self.chain.provider_for(url)?;
        debug!("Downloading {} with {}", url, provider.name());
        provider.download(url, destination).await?;
        Ok(())
    }

    async fn attach_lyrics(&self, track: &mut Track) {
        if !self.settings.lyrics || track.lyrics.is_some() {
            return;
        }
        track.lyrics = self.lyrics.find(track).await;
        if track.lyrics.is_none() {
            debug!("No lyrics found for {}", track.basename());
        }
    }

    async fn attach_artwork(&self, track: &mut Track, set: &mut WorkingSet) {
        let Some(url) = track.artwork_url.clone() else {
            return;
        };
        if let Some(bytes) = set.artwork(&url) {
            track.artwork = Some(bytes);
            return;
        }
        match self.artwork.fetch(&url).await {
            Ok(bytes) => track.artwork = Some(set.insert_artwork(&url, bytes)),
            Err(err) => warn!("Unable to download artwork {}: {:#}", url, err),
        }
    }

    fn settle(&self, outcome: PostProcessOutcome, index: &mut RenameIndex, report: &mut SyncReport) {
        if outcome.is_finalized() && self.settings.indexing {
            index.rename(&outcome.track.id, &outcome.track.filename());
        }
        if !outcome.skipped.is_empty() {
            debug!("{}: skipped {:?}", outcome.track.basename(), outcome.skipped);
        }
        for warning in &outcome.warnings {
            debug!("{}: {}", outcome.track.basename(), warning);
        }
        report.record(outcome);
    }

    fn export_playlists(&self, playlists: &[Playlist]) {
        let Some(format) = self.settings.playlist_format else {
            return;
        };
        for playlist in playlists {
            match playlist_export::export(&self.settings.folder, playlist, format) {
                Ok(path) => info!(
                    "Playlist {} by {} written to {}",
                    playlist.name,
                    playlist.owner,
                    path.display()
                ),
                Err(err) => warn!("Unable to write playlist {}: {:#}", playlist.name, err),
            }
        }
    }
}
