//! Per-track post-processing.
//!
//! Every job walks `Pending → Staged → Normalized → MetadataFlushed → Finalized`
//! in order. Normalization and metadata flush are skipped when the job's options
//! do not ask for them; only staging and finalizing can move a job to `Failed`.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::ports::loudness::LoudnessTool;
use crate::ports::tags::TagStore;
use crate::track::{SyncOptions, Track};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageFailure {
    #[error("neither a downloaded file nor a local copy is available")]
    NothingToStage,
    #[error("unable to create working copy: {0}")]
    Staging(String),
    #[error("unable to move working copy into place: {0}")]
    Finalize(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Pending,
    Staged,
    Normalized,
    MetadataFlushed,
    Finalized,
    Failed(StageFailure),
}

impl Stage {
    fn next(&self) -> Option<Stage> {
        match self {
            Stage::Pending => Some(Stage::Staged),
            Stage::Staged => Some(Stage::Normalized),
            Stage::Normalized => Some(Stage::MetadataFlushed),
            Stage::MetadataFlushed => Some(Stage::Finalized),
            Stage::Finalized | Stage::Failed(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PostProcessJob {
    pub track: Track,
    pub options: SyncOptions,
    /// Working copy, where a provider download lands
    pub temp_path: PathBuf,
    pub final_path: PathBuf,
    /// Existing file to stage from when nothing was downloaded
    pub local_source: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct PostProcessOutcome {
    pub track: Track,
    pub options: SyncOptions,
    pub stage: Stage,
    pub skipped: Vec<Stage>,
    pub warnings: Vec<String>,
}

impl PostProcessOutcome {
    pub fn is_finalized(&self) -> bool {
        self.stage == Stage::Finalized
    }

    pub fn failure(&self) -> Option<&StageFailure> {
        match &self.stage {
            Stage::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    fn advance(&mut self) {
        if let Some(next) = self.stage.next() {
            self.stage = next;
        }
    }

    fn skip(&mut self) {
        if let Some(next) = self.stage.next() {
            self.skipped.push(next.clone());
            self.stage = next;
        }
    }

    fn fail(&mut self, failure: StageFailure) {
        self.stage = Stage::Failed(failure);
    }
}

#[derive(Clone)]
pub struct PostProcessPipeline {
    loudness: Arc<dyn LoudnessTool>,
    tags: Arc<dyn TagStore>,
}

impl PostProcessPipeline {
    pub fn new(loudness: Arc<dyn LoudnessTool>, tags: Arc<dyn TagStore>) -> Self {
        Self { loudness, tags }
    }

    pub async fn run(&self, job: PostProcessJob) -> PostProcessOutcome {
        let mut outcome = PostProcessOutcome {
            track: job.track.clone(),
            options: job.options,
            stage: Stage::Pending,
            skipped: Vec::new(),
            warnings: Vec::new(),
        };

        while let Some(next) = outcome.stage.next() {
            match next {
                Stage::Staged => self.stage(&job, &mut outcome).await,
                Stage::Normalized => self.normalize(&job, &mut outcome).await,
                Stage::MetadataFlushed => self.flush_metadata(&job, &mut outcome).await,
                Stage::Finalized => self.finalize(&job, &mut outcome).await,
                Stage::Pending | Stage::Failed(_) => break,
            }
        }

        debug!("{} post-processing ended in {:?}", job.track.basename(), outcome.stage);
        outcome
    }

    async fn stage(&self, job: &PostProcessJob, outcome: &mut PostProcessOutcome) {
        if job.temp_path.is_file() {
            outcome.advance();
            return;
        }
        let Some(source) = job.local_source.as_ref().filter(|path| path.is_file()) else {
            outcome.fail(StageFailure::NothingToStage);
            return;
        };
        match tokio::fs::copy(source, &job.temp_path).await {
            Ok(_) => outcome.advance(),
            Err(err) => outcome.fail(StageFailure::Staging(err.to_string())),
        }
    }

    async fn normalize(&self, job: &PostProcessJob, outcome: &mut PostProcessOutcome) {
        if !job.options.needs_normalization {
            outcome.skip();
            return;
        }

        match self.loudness.measure(&job.temp_path).await {
            Ok(volume) if volume < 0.0 => {
                if let Err(err) = self.loudness.apply_gain(volume.abs(), &job.temp_path).await {
                    warn!("Unable to normalize {}: {:#}", job.track.basename(), err);
                    outcome.warnings.push(format!("normalization: {err}"));
                }
            }
            Ok(volume) => debug!("{} already peaks at {} dB", job.track.basename(), volume),
            Err(err) => {
                warn!("Unable to measure {}: {:#}", job.track.basename(), err);
                outcome.warnings.push(format!("loudness measurement: {err}"));
            }
        }
        outcome.advance();
    }

    async fn flush_metadata(&self, job: &PostProcessJob, outcome: &mut PostProcessOutcome) {
        if !job.options.needs_metadata_flush {
            outcome.skip();
            return;
        }
        if let Err(err) = self.tags.flush(&job.track, &job.temp_path).await {
            warn!("Unable to write tags of {}: {:#}", job.track.basename(), err);
            outcome.warnings.push(format!("metadata flush: {err}"));
        }
        outcome.advance();
    }

    async fn finalize(&self, job: &PostProcessJob, outcome: &mut PostProcessOutcome) {
        if job.final_path.exists() {
            if let Err(err) = tokio::fs::remove_file(&job.final_path).await {
                outcome.fail(StageFailure::Finalize(err.to_string()));
                return;
            }
        }
        match tokio::fs::rename(&job.temp_path, &job.final_path).await {
            Ok(()) => outcome.advance(),
            Err(err) => outcome.fail(StageFailure::Finalize(err.to_string())),
        }
    }
}
