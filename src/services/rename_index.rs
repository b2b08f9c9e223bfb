use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use walkdir::WalkDir;

use crate::json_file::{JsonFileError, read_json, write_json_atomic};
use crate::matcher::{jaro_winkler_similarity, normalize_string};
use crate::ports::tags::TagStore;
use crate::track::is_audio_file;

/// Minimum signature similarity for a vanished file to be matched to a new name.
const RELOCATE_THRESHOLD: f64 = 0.92;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("track {0} is not indexed")]
    NotIndexed(String),
    #[error("indexed file {0} no longer exists")]
    Missing(String),
    #[error("index i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("index file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

impl From<JsonFileError> for IndexError {
    fn from(err: JsonFileError) -> Self {
        match err {
            JsonFileError::Io(err) => IndexError::Io(err),
            JsonFileError::Corrupt(err) => IndexError::Corrupt(err),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub filename: String,
    pub signature: String,
}

impl IndexEntry {
    pub fn new(filename: &str) -> Self {
        Self {
            filename: filename.to_string(),
            signature: signature(filename),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexMatch {
    /// The recorded filename is the expected one.
    Matches,
    /// The track lives on disk under `recorded` and has to be renamed.
    Renamed { recorded: PathBuf },
}

/// Normalized file stem used to recognize a file after small edits to its name.
pub fn signature(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(filename);
    normalize_string(stem)
}

/// Remote track ID to last known local filename.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameIndex {
    entries: HashMap<String, IndexEntry>,
}

impl RenameIndex {
    /// Restore a persisted index. A missing or unreadable file yields an empty index.
    pub fn load(path: &Path) -> Self {
        match read_json(path) {
            Ok(index) => index,
            Err(JsonFileError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
                Self::default()
            }
            Err(err) => {
                tracing::warn!("Ignoring unreadable index {}: {}", path.display(), err);
                Self::default()
            }
        }
    }

    pub fn persist(&self, path: &Path) -> Result<(), IndexError> {
        write_json_atomic(path, self)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, remote_id: &str) -> Option<&IndexEntry> {
        self.entries.get(remote_id)
    }

    /// Scan the audio files directly under `root` and associate each with the remote
    /// ID recovered from its tags.
    ///
    /// Entries of `previous` whose file vanished are carried over to an untagged file
    /// with a near-identical signature when one exists, otherwise dropped.
    pub async fn build(
        root: &Path,
        tags: &dyn TagStore,
        previous: RenameIndex,
    ) -> Result<Self, IndexError> {
        let mut entries: HashMap<String, IndexEntry> = HashMap::new();
        let mut untagged: Vec<String> = Vec::new();

        for entry in WalkDir::new(root).min_depth(1).max_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|err| IndexError::Io(err.into()))?;
            let path = entry.path();
            if !entry.file_type().is_file() || !is_audio_file(path) {
                continue;
            }
            let Some(filename) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };

            let remote_id = match tags.read(path).await {
                Ok(stored) => stored.and_then(|stored| stored.remote_id),
                Err(err) => {
                    tracing::debug!("Unable to read tags of {}: {}", path.display(), err);
                    None
                }
            };

            match remote_id {
                Some(id) => {
                    // Two files claiming the same ID: keep the one already recorded.
                    let keep_existing = entries.contains_key(&id)
                        && previous.get(&id).is_none_or(|prev| prev.filename != filename);
                    if !keep_existing {
                        entries.insert(id, IndexEntry::new(filename));
                    }
                }
                None => untagged.push(filename.to_string()),
            }
        }

        let mut claimed: HashSet<String> = HashSet::new();
        for (id, prev) in previous.entries {
            if entries.contains_key(&id) {
                continue;
            }
            if root.join(&prev.filename).is_file() {
                claimed.insert(prev.filename.clone());
                entries.insert(id, prev);
                continue;
            }

            let relocated = untagged
                .iter()
                .filter(|filename| !claimed.contains(*filename))
                .map(|filename| {
                    let score = jaro_winkler_similarity(&prev.signature, &signature(filename));
                    (filename, score)
                })
                .filter(|(_, score)| *score >= RELOCATE_THRESHOLD)
                .max_by(|a, b| a.1.total_cmp(&b.1));

            match relocated {
                Some((filename, _)) => {
                    tracing::debug!("{} relocated to {}", prev.filename, filename);
                    claimed.insert(filename.clone());
                    entries.insert(id, IndexEntry::new(filename));
                }
                None => tracing::debug!("Dropping index entry for vanished {}", prev.filename),
            }
        }

        Ok(Self { entries })
    }

    /// Compare the recorded filename of `remote_id` with `expected`.
    pub fn match_track(
        &self,
        root: &Path,
        remote_id: &str,
        expected: &str,
    ) -> Result<IndexMatch, IndexError> {
        let entry = self
            .entries
            .get(remote_id)
            .ok_or_else(|| IndexError::NotIndexed(remote_id.to_string()))?;

        if entry.filename == expected {
            return Ok(IndexMatch::Matches);
        }

        let recorded = root.join(&entry.filename);
        if !recorded.is_file() {
            return Err(IndexError::Missing(entry.filename.clone()));
        }
        Ok(IndexMatch::Renamed { recorded })
    }

    /// Record `new_filename` for `remote_id`. Call only once the file is on disk under that name.
    pub fn rename(&mut self, remote_id: &str, new_filename: &str) {
        self.entries
            .insert(remote_id.to_string(), IndexEntry::new(new_filename));
    }

    /// Move `recorded` to `root/expected` and update the entry of `remote_id`.
    pub fn repair(
        &mut self,
        root: &Path,
        remote_id: &str,
        recorded: &Path,
        expected: &str,
    ) -> Result<PathBuf, IndexError> {
        let destination = root.join(expected);
        std::fs::rename(recorded, &destination)?;
        self.rename(remote_id, expected);
        Ok(destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::tags::{MockTagStore, StoredTags};
    use tempfile::TempDir;

    fn tags_with_ids(ids: &[(&'static str, &'static str)]) -> MockTagStore {
        let ids: HashMap<&'static str, &'static str> = ids.iter().copied().collect();
        let mut tags = MockTagStore::new();
        tags.expect_read().returning(move |path| {
            let filename = path.file_name().unwrap().to_str().unwrap();
            Ok(ids.get(filename).map(|id| StoredTags {
                remote_id: Some(id.to_string()),
                ..Default::default()
            }))
        });
        tags
    }

    fn touch(dir: &TempDir, name: &str) {
        std::fs::write(dir.path().join(name), b"audio").unwrap();
    }

    // ---- build ----

    #[tokio::test]
    async fn test_build_indexes_tagged_audio_files_only() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "Queen - Bohemian Rhapsody.mp3");
        touch(&dir, "Untagged.mp3");
        touch(&dir, "cover.jpg");
        touch(&dir, ".Queen - Bohemian Rhapsody.part.mp3");
        let tags = tags_with_ids(&[("Queen - Bohemian Rhapsody.mp3", "x1")]);

        let index = RenameIndex::build(dir.path(), &tags, RenameIndex::default())
            .await
            .unwrap();

        assert_eq!(index.len(), 1);
        assert_eq!(
            index.get("x1").unwrap().filename,
            "Queen - Bohemian Rhapsody.mp3"
        );
    }

    #[tokio::test]
    async fn test_build_relocates_vanished_entry_by_signature() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "Queen - Bohemian Rhapsody!.mp3");
        let tags = tags_with_ids(&[]);
        let mut previous = RenameIndex::default();
        previous.rename("x1", "Queen - Bohemian Rhapsody.mp3");
        previous.rename("x2", "Somebody - Else Entirely.mp3");

        let index = RenameIndex::build(dir.path(), &tags, previous).await.unwrap();

        assert_eq!(
            index.get("x1").unwrap().filename,
            "Queen - Bohemian Rhapsody!.mp3"
        );
        assert!(index.get("x2").is_none());
    }

    // ---- match / repair ----

    #[test]
    fn test_rename_repair_then_match() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "A.mp3");
        let mut index = RenameIndex::default();
        index.rename("X", "A.mp3");

        let recorded = match index.match_track(dir.path(), "X", "B.mp3").unwrap() {
            IndexMatch::Renamed { recorded } => recorded,
            other => panic!("expected rename, got {other:?}"),
        };
        assert_eq!(recorded, dir.path().join("A.mp3"));

        let destination = index.repair(dir.path(), "X", &recorded, "B.mp3").unwrap();

        assert!(destination.is_file());
        assert!(!recorded.exists());
        assert_eq!(
            index.match_track(dir.path(), "X", "B.mp3").unwrap(),
            IndexMatch::Matches
        );
    }

    #[test]
    fn test_match_unknown_and_missing() {
        let dir = TempDir::new().unwrap();
        let mut index = RenameIndex::default();
        index.rename("X", "Gone.mp3");

        assert!(matches!(
            index.match_track(dir.path(), "Y", "B.mp3"),
            Err(IndexError::NotIndexed(_))
        ));
        assert!(matches!(
            index.match_track(dir.path(), "X", "B.mp3"),
            Err(IndexError::Missing(_))
        ));
    }

    #[test]
    fn test_failed_repair_keeps_entry() {
        let dir = TempDir::new().unwrap();
        let mut index = RenameIndex::default();
        index.rename("X", "A.mp3");

        let result = index.repair(dir.path(), "X", &dir.path().join("A.mp3"), "B.mp3");

        assert!(matches!(result, Err(IndexError::Io(_))));
        assert_eq!(index.get("X").unwrap().filename, "A.mp3");
    }

    // ---- persistence ----

    #[test]
    fn test_persist_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.json");
        let mut index = RenameIndex::default();
        index.rename("X", "A.mp3");

        index.persist(&path).unwrap();

        assert_eq!(RenameIndex::load(&path), index);
    }

    #[test]
    fn test_load_missing_or_corrupt_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.json");
        assert!(RenameIndex::load(&path).is_empty());

        std::fs::write(&path, "{\"entries\": 12}").unwrap();
        assert!(RenameIndex::load(&path).is_empty());
    }
}
