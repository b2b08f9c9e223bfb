use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use crate::track::{SyncOptions, Track};

#[derive(Debug, Clone, PartialEq)]
pub struct WorkingEntry {
    pub track: Track,
    pub options: SyncOptions,
    /// Existing local copy to stage from when no download happens
    pub local_path: Option<PathBuf>,
}

/// Deduplicated tracks of the run with their intent, plus the artwork bytes
/// downloaded so far keyed by URL.
#[derive(Debug, Default)]
pub struct WorkingSet {
    entries: Vec<WorkingEntry>,
    keys: HashSet<String>,
    artworks: HashMap<String, Arc<Vec<u8>>>,
}

impl WorkingSet {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, track: &Track) -> bool {
        self.keys.contains(&track.temporary_filename())
    }

    pub fn entries(&self) -> &[WorkingEntry] {
        &self.entries
    }

    pub fn artwork(&self, url: &str) -> Option<Arc<Vec<u8>>> {
        self.artworks.get(url).cloned()
    }

    pub fn insert_artwork(&mut self, url: &str, bytes: Vec<u8>) -> Arc<Vec<u8>> {
        self.artworks
            .entry(url.to_string())
            .or_insert_with(|| Arc::new(bytes))
            .clone()
    }

    fn push(&mut self, entry: WorkingEntry) -> bool {
        if !self.keys.insert(entry.track.temporary_filename()) {
            return false;
        }
        self.entries.push(entry);
        true
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanCounts {
    pub fetch: usize,
    pub flush: usize,
    pub ignore: usize,
}

/// Builds the working set from every fetched source.
#[derive(Debug)]
pub struct SyncPlanner {
    normalize: bool,
    set: WorkingSet,
}

impl SyncPlanner {
    pub fn new(normalize: bool) -> Self {
        Self {
            normalize,
            set: WorkingSet::default(),
        }
    }

    /// Add `track` unless a track with the same temporary filename is already planned.
    ///
    /// `local_path` is the existing canonical file when the track is already present.
    pub fn ingest(&mut self, track: Track, local_path: Option<PathBuf>) -> bool {
        let options = if local_path.is_some() {
            SyncOptions::keep()
        } else {
            SyncOptions::fetch(self.normalize)
        };
        self.set.push(WorkingEntry {
            track,
            options,
            local_path,
        })
    }

    /// A user supplied file: metadata refresh only, staged from `path`.
    pub fn ingest_fix(&mut self, track: Track, path: PathBuf) -> bool {
        self.set.push(WorkingEntry {
            track,
            options: SyncOptions::metadata_only(),
            local_path: Some(path),
        })
    }

    /// Second pass applying global flush flags to every entry.
    pub fn apply_overrides(&mut self, flush_local: bool, flush_metadata: bool) {
        for entry in &mut self.set.entries {
            if flush_local {
                entry.options.needs_source = true;
                entry.options.needs_metadata_flush = true;
                entry.options.needs_normalization = self.normalize;
            }
            if flush_metadata {
                entry.options.needs_metadata_flush = true;
            }
        }
    }

    pub fn working_set(&self) -> &WorkingSet {
        &self.set
    }

    pub fn finish(self) -> WorkingSet {
        self.set
    }
}

/// Tracks to download, to only re-tag and to leave untouched.
pub fn counts(set: &WorkingSet) -> PlanCounts {
    set.entries
        .iter()
        .fold(PlanCounts::default(), |mut counts, entry| {
            if entry.options.needs_source {
                counts.fetch += 1;
            } else if entry.options.needs_metadata_flush || entry.options.needs_normalization {
                counts.flush += 1;
            } else {
                counts.ignore += 1;
            }
            counts
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::make_track;

    fn local(track: &Track) -> Option<PathBuf> {
        Some(PathBuf::from("/music").join(track.filename()))
    }

    #[test]
    fn test_track_in_two_sources_is_planned_once() {
        let mut planner = SyncPlanner::new(true);
        let library_track = make_track("1", "Song", "Artist", 200_000);
        let playlist_track = library_track.clone();

        assert!(planner.ingest(library_track, None));
        assert!(!planner.ingest(playlist_track, None));

        assert_eq!(planner.working_set().len(), 1);
    }

    #[test]
    fn test_same_filename_different_id_is_deduplicated() {
        let mut planner = SyncPlanner::new(true);
        planner.ingest(make_track("1", "Song", "Artist", 200_000), None);
        planner.ingest(make_track("2", "Song", "Artist", 201_000), None);

        assert_eq!(planner.working_set().len(), 1);
        assert_eq!(planner.working_set().entries()[0].track.id, "1");
    }

    #[test]
    fn test_library_with_one_local_track() {
        let mut planner = SyncPlanner::new(true);
        let present = make_track("1", "One", "Artist", 200_000);
        let present_path = local(&present);
        planner.ingest(present, present_path);
        planner.ingest(make_track("2", "Two", "Artist", 200_000), None);
        planner.ingest(make_track("3", "Three", "Artist", 200_000), None);
        planner.apply_overrides(false, false);

        let set = planner.finish();
        assert_eq!(set.len(), 3);
        assert_eq!(
            set.entries()
                .iter()
                .filter(|entry| entry.options.is_noop())
                .count(),
            1
        );
        assert_eq!(
            set.entries()
                .iter()
                .filter(|entry| entry.options.needs_source)
                .count(),
            2
        );
        assert_eq!(
            counts(&set),
            PlanCounts {
                fetch: 2,
                flush: 0,
                ignore: 1
            }
        );
    }

    #[test]
    fn test_unchanged_collection_plans_no_work() {
        let tracks = vec![
            make_track("1", "One", "Artist", 200_000),
            make_track("2", "Two", "Artist", 200_000),
        ];
        for _ in 0..2 {
            let mut planner = SyncPlanner::new(true);
            for track in &tracks {
                planner.ingest(track.clone(), local(track));
            }
            planner.apply_overrides(false, false);
            assert!(
                planner
                    .working_set()
                    .entries()
                    .iter()
                    .all(|entry| entry.options.is_noop())
            );
        }
    }

    #[test]
    fn test_overrides() {
        let track = make_track("1", "One", "Artist", 200_000);

        let mut planner = SyncPlanner::new(false);
        planner.ingest(track.clone(), local(&track));
        planner.apply_overrides(false, true);
        assert_eq!(
            planner.working_set().entries()[0].options,
            SyncOptions::metadata_only()
        );

        let mut planner = SyncPlanner::new(true);
        planner.ingest(track.clone(), local(&track));
        planner.apply_overrides(true, false);
        assert_eq!(
            planner.working_set().entries()[0].options,
            SyncOptions::fetch(true)
        );
    }

    #[test]
    fn test_fix_is_metadata_only() {
        let mut planner = SyncPlanner::new(true);
        let track = make_track("1", "One", "Artist", 200_000);
        planner.ingest_fix(track, PathBuf::from("/tmp/one.mp3"));

        let entry = &planner.working_set().entries()[0];
        assert_eq!(entry.options, SyncOptions::metadata_only());
        assert_eq!(entry.local_path, Some(PathBuf::from("/tmp/one.mp3")));
        assert_eq!(counts(planner.working_set()).flush, 1);
    }

    #[test]
    fn test_artwork_cache_keeps_first_download() {
        let mut set = WorkingSet::default();
        let first = set.insert_artwork("https://img/1", vec![1, 2, 3]);
        let second = set.insert_artwork("https://img/1", vec![9]);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(set.artwork("https://img/1").unwrap().as_slice(), &[1, 2, 3]);
        assert!(set.artwork("https://img/2").is_none());
    }
}
