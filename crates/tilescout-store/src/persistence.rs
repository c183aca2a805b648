use std::{
    fs::{self, File},
    io::{self, BufReader, BufWriter, Write as _},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// Format version written into every store file.
pub const STORE_FILE_VERSION: u32 = 1;

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum PersistenceError {
    #[display("failed to access {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[display("failed to encode or decode {}: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// On-disk envelope of a flat record collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreFile<E> {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub entries: E,
}

/// Writes `entries` as pretty JSON.
///
/// The file is written next to `path` and renamed over it, so an interrupted
/// write leaves the previous contents intact.
pub fn save_entries<T>(path: &Path, entries: &[T]) -> Result<(), PersistenceError>
where
    T: Serialize,
{
    let io_err = |source| PersistenceError::Io {
        path: path.to_owned(),
        source,
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let tmp_path = path.with_extension("json.tmp");
    let file = File::create(&tmp_path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    let data = StoreFile {
        version: STORE_FILE_VERSION,
        saved_at: Utc::now(),
        entries,
    };
    serde_json::to_writer_pretty(&mut writer, &data).map_err(|source| PersistenceError::Json {
        path: path.to_owned(),
        source,
    })?;
    writer.flush().map_err(io_err)?;
    drop(writer);
    fs::rename(&tmp_path, path).map_err(io_err)?;
    Ok(())
}

/// Reads entries from `path`, or `Ok(None)` if the file does not exist.
pub fn load_entries<T>(path: &Path) -> Result<Option<Vec<T>>, PersistenceError>
where
    T: DeserializeOwned,
{
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(PersistenceError::Io {
                path: path.to_owned(),
                source,
            });
        }
    };
    let data: StoreFile<Vec<T>> =
        serde_json::from_reader(BufReader::new(file)).map_err(|source| PersistenceError::Json {
            path: path.to_owned(),
            source,
        })?;
    Ok(Some(data.entries))
}

/// Like [`load_entries`], but a missing or corrupt file yields no entries.
///
/// Corrupt files are logged and then ignored; their contents are lost on the
/// next save.
#[must_use]
pub fn load_entries_or_empty<T>(path: &Path, kind: &str) -> Vec<T>
where
    T: DeserializeOwned,
{
    match load_entries(path) {
        Ok(Some(entries)) => entries,
        Ok(None) => {
            tracing::info!(path = %path.display(), "no {kind} store file, starting empty");
            Vec::new()
        }
        Err(e) => {
            tracing::warn!("{kind} store unreadable, starting empty: {e}");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_and_envelope() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("values.json");
        save_entries(&path, &[1u32, 2, 3]).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["version"], STORE_FILE_VERSION);
        assert!(!path.with_extension("json.tmp").exists());

        let loaded: Vec<u32> = load_entries(&path).unwrap().unwrap();
        assert_eq!(loaded, vec![1, 2, 3]);
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let loaded: Option<Vec<u32>> = load_entries(&dir.path().join("none.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_corrupt_file_is_error_or_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, r#"{"version": 1, "entries": "#).unwrap();
        assert!(matches!(
            load_entries::<u32>(&path),
            Err(PersistenceError::Json { .. })
        ));
        assert!(load_entries_or_empty::<u32>(&path, "test").is_empty());
    }
}
