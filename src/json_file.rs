use std::io;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

#[derive(Debug, thiserror::Error)]
pub enum JsonFileError {
    #[error("{0}")]
    Io(#[from] io::Error),
    #[error("{0}")]
    Corrupt(#[from] serde_json::Error),
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, JsonFileError> {
    let contents = std::fs::read(path)?;
    Ok(serde_json::from_slice(&contents)?)
}

/// Serialize `value` to `<path>.tmp` then rename it over `path`.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), JsonFileError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = Path::new(&tmp);

    let contents = serde_json::to_vec_pretty(value)?;
    std::fs::write(tmp, contents)?;
    std::fs::rename(tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("state.json");
        let value = BTreeMap::from([("a".to_string(), 1), ("b".to_string(), 2)]);

        write_json_atomic(&path, &value).unwrap();

        let read: BTreeMap<String, i32> = read_json(&path).unwrap();
        assert_eq!(read, value);
        assert!(!dir.path().join("nested").join("state.json.tmp").exists());
    }

    #[test]
    fn test_corrupt_and_missing_are_distinguished() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");

        assert!(matches!(
            read_json::<Vec<i32>>(&path),
            Err(JsonFileError::Io(_))
        ));

        std::fs::write(&path, b"{ not json").unwrap();
        assert!(matches!(
            read_json::<Vec<i32>>(&path),
            Err(JsonFileError::Corrupt(_))
        ));
    }
}
