use std::collections::HashSet;
use std::path::{Path, PathBuf};

use color_eyre::eyre::{Context, Result};
use walkdir::WalkDir;

use crate::track::is_junk;

/// Remove transient download/processing files directly under `folder`.
pub fn clean_junks(folder: &Path) -> Result<usize> {
    clean_junks_except(folder, &HashSet::new())
}

/// Like [`clean_junks`], leaving the files in `keep` on disk.
pub fn clean_junks_except(folder: &Path, keep: &HashSet<PathBuf>) -> Result<usize> {
    let mut removed = 0;
    for entry in WalkDir::new(folder).min_depth(1).max_depth(1) {
        let entry = entry.wrap_err_with(|| format!("Failed to scan {}", folder.display()))?;
        if !entry.file_type().is_file() || !is_junk(entry.path()) {
            continue;
        }
        if keep.contains(entry.path()) {
            tracing::debug!("Keeping {}", entry.path().display());
            continue;
        }
        match std::fs::remove_file(entry.path()) {
            Ok(()) => {
                tracing::debug!("Removed {}", entry.path().display());
                removed += 1;
            }
            Err(err) => tracing::warn!("Unable to remove {}: {}", entry.path().display(), err),
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_only_junk_is_removed() {
        let dir = TempDir::new().unwrap();
        for name in [
            ".Artist - Song.part.mp3",
            "x.part",
            "x.ytdl",
            "Artist - Song.gain.mp3",
            "Artist - Song.mp3",
            "notes.txt",
        ] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }

        assert_eq!(clean_junks(dir.path()).unwrap(), 4);

        let mut left: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        left.sort();
        assert_eq!(left, vec!["Artist - Song.mp3", "notes.txt"]);
    }

    #[test]
    fn test_kept_working_copies_survive() {
        let dir = TempDir::new().unwrap();
        let kept = dir.path().join(".Artist - Song.part.mp3");
        let dropped = dir.path().join(".Artist - Other.part.mp3");
        std::fs::write(&kept, b"").unwrap();
        std::fs::write(&dropped, b"").unwrap();

        let keep = HashSet::from([kept.clone()]);
        assert_eq!(clean_junks_except(dir.path(), &keep).unwrap(), 1);

        assert!(kept.exists());
        assert!(!dropped.exists());
    }
}
