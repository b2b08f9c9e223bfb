use std::fmt;

use crate::services::pipeline::{PostProcessOutcome, StageFailure};
use crate::track::Track;

/// Run summary. A run with failures is still a completed run.
#[derive(Debug, Default, Clone)]
pub struct SyncReport {
    pub total: usize,
    pub downloaded: usize,
    pub flushed: usize,
    pub skipped: usize,
    pub failed: Vec<Track>,
    /// Processed but not moved into place; their working copy is kept.
    pub unfinished: Vec<Track>,
}

impl SyncReport {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn fail(&mut self, track: Track) {
        self.failed.push(track);
    }

    pub fn synced(&self) -> usize {
        self.downloaded + self.flushed
    }

    /// Fold a post-processing outcome into the counters.
    pub fn record(&mut self, outcome: PostProcessOutcome) {
        match outcome.failure() {
            None if outcome.options.needs_source => self.downloaded += 1,
            None => self.flushed += 1,
            Some(StageFailure::Finalize(err)) => {
                tracing::warn!(
                    "{} not moved into place, working copy {} kept: {}",
                    outcome.track.basename(),
                    outcome.track.temporary_filename(),
                    err
                );
                self.unfinished.push(outcome.track);
            }
            Some(err) => {
                tracing::error!("{} failed: {}", outcome.track.basename(), err);
                self.fail(outcome.track);
            }
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "{} track(s) synced, {} failed.",
            self.synced(),
            self.failed.len()
        )
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} downloaded, {} flushed, {} skipped out of {}",
            self.downloaded, self.flushed, self.skipped, self.total
        )?;
        if !self.failed.is_empty() {
            writeln!(f, "Failed tracks:")?;
            for track in &self.failed {
                writeln!(f, " - {}", track.basename())?;
            }
        }
        if !self.unfinished.is_empty() {
            writeln!(f, "Not moved into place:")?;
            for track in &self.unfinished {
                writeln!(f, " - {} ({})", track.basename(), track.temporary_filename())?;
            }
        }
        write!(f, "{}", self.summary())
    }
}
