//! Keyed artifact storage
//!
//! Artifacts are serialized as JSON. Keys are plain file names, so a key
//! maps to exactly one file inside a [`FileStore`] directory.

use crate::error::{Result, TofError};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Persistent keyed storage for search artifacts
pub trait ArtifactStore: Send + Sync {
    /// Whether an artifact is stored under `key`
    fn exists(&self, key: &str) -> bool;

    /// Load and decode the artifact stored under `key`
    fn load<T: DeserializeOwned>(&self, key: &str) -> Result<T>;

    /// Encode and store `value` under `key`, replacing any previous artifact
    fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<()>;

    /// Drop the artifact under `key`; `false` if there was none
    fn delete(&self, key: &str) -> Result<bool>;

    /// Where `key` lives, for messages
    fn location(&self, key: &str) -> String;
}

pub(crate) fn validate_key(key: &str) -> Result<()> {
    let bad = key.is_empty()
        || key == "."
        || key == ".."
        || key.contains(['/', '\\'])
        || key.starts_with('.');
    if bad {
        Err(TofError::ConfigError(format!("invalid artifact key '{}'", key)))
    } else {
        Ok(())
    }
}

/// Directory-backed store: one JSON file per key
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// The directory is created on first save
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full path of the file holding `key`
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    fn temp_path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!(".{}.tmp", key))
    }

    fn write_json<T: Serialize>(tmp: &Path, path: &Path, value: &T) -> Result<()> {
        let file = fs::File::create(tmp).map_err(|e| TofError::io(tmp, e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, value).map_err(|e| {
            TofError::SerializationError(format!("failed to encode {}: {}", path.display(), e))
        })?;
        writer.flush().map_err(|e| TofError::io(tmp, e))
    }
}

impl ArtifactStore for FileStore {
    fn exists(&self, key: &str) -> bool {
        validate_key(key).is_ok() && self.path_for(key).is_file()
    }

    fn load<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        validate_key(key)?;
        let path = self.path_for(key);
        let file = fs::File::open(&path).map_err(|e| TofError::io(&path, e))?;
        let value = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            TofError::SerializationError(format!("failed to decode {}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), "Loaded artifact");
        Ok(value)
    }

    fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        validate_key(key)?;
        fs::create_dir_all(&self.dir).map_err(|e| TofError::io(&self.dir, e))?;

        let path = self.path_for(key);
        let tmp = self.temp_path_for(key);
        let written = Self::write_json(&tmp, &path, value)
            .and_then(|()| fs::rename(&tmp, &path).map_err(|e| TofError::io(&path, e)));
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }

        debug!(path = %path.display(), "Saved artifact");
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "Removed artifact");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(TofError::io(&path, e)),
        }
    }

    fn location(&self, key: &str) -> String {
        self.path_for(key).display().to_string()
    }
}

/// In-process store that counts its traffic
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
    saves: AtomicU64,
    loads: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful saves
    pub fn saves(&self) -> u64 {
        self.saves.load(Ordering::Relaxed)
    }

    /// Number of successful loads
    pub fn loads(&self) -> u64 {
        self.loads.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl ArtifactStore for MemoryStore {
    fn exists(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    fn load<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let entries = self.entries.read();
        let json = entries.get(key).ok_or_else(|| {
            TofError::io(
                self.location(key),
                std::io::Error::new(std::io::ErrorKind::NotFound, "no artifact stored under this key"),
            )
        })?;
        let value = serde_json::from_str(json)?;
        self.loads.fetch_add(1, Ordering::Relaxed);
        Ok(value)
    }

    fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        validate_key(key)?;
        let json = serde_json::to_string(value)?;
        self.entries.write().insert(key.to_string(), json);
        self.saves.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.entries.write().remove(key).is_some())
    }

    fn location(&self, key: &str) -> String {
        format!("memory://{}", key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Artifact {
        name: String,
        scores: Vec<f64>,
    }

    fn artifact() -> Artifact {
        Artifact {
            name: "rf".to_string(),
            scores: vec![-0.1, 1.0 / 3.0, f64::MIN_POSITIVE],
        }
    }

    #[test]
    fn test_file_store_round_trip_is_exact() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("nested").join("results"));

        assert!(!store.exists("a.json"));
        store.save("a.json", &artifact()).unwrap();
        assert!(store.exists("a.json"));
        assert_eq!(store.load::<Artifact>("a.json").unwrap(), artifact());

        // No temporary file left behind
        let names: Vec<_> = fs::read_dir(store.dir()).unwrap().map(|e| e.unwrap().file_name()).collect();
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn test_file_store_overwrites() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        store.save("a.json", &artifact()).unwrap();
        let replacement = Artifact { name: "other".into(), scores: vec![] };
        store.save("a.json", &replacement).unwrap();
        assert_eq!(store.load::<Artifact>("a.json").unwrap(), replacement);
    }

    #[test]
    fn test_file_store_missing_key_names_path() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        match store.load::<Artifact>("missing.json") {
            Err(TofError::Io { path, .. }) => assert_eq!(path, dir.path().join("missing.json")),
            other => panic!("expected an io error, got {:?}", other),
        }
    }

    #[test]
    fn test_file_store_unwritable_dir() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"not a directory").unwrap();
        let store = FileStore::new(blocker.join("results"));

        let err = store.save("a.json", &artifact()).unwrap_err();
        assert!(matches!(err, TofError::Io { .. }));
    }

    #[test]
    fn test_corrupt_artifact_is_serialization_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("bad.json"), b"{ not json").unwrap();
        let err = FileStore::new(dir.path()).load::<Artifact>("bad.json").unwrap_err();
        assert!(matches!(err, TofError::SerializationError(_)));
    }

    #[test]
    fn test_invalid_keys() {
        let store = MemoryStore::new();
        for key in ["", "..", "../escape.json", "a/b.json", ".hidden"] {
            assert!(store.save(key, &1).is_err(), "key {:?} accepted", key);
        }
    }

    #[test]
    fn test_memory_store_counts() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        store.save("a", &artifact()).unwrap();
        let _: Artifact = store.load("a").unwrap();
        let _: Artifact = store.load("a").unwrap();
        assert_eq!(store.saves(), 1);
        assert_eq!(store.loads(), 2);
        assert!(store.load::<Artifact>("b").is_err());
        assert_eq!(store.loads(), 2);
        assert!(store.delete("a").unwrap());
        assert!(!store.exists("a"));
        assert!(!store.delete("a").unwrap());
    }

    #[test]
    fn test_file_store_delete() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("never-created"));
        assert!(!store.delete("a.json").unwrap());

        let store = FileStore::new(dir.path());
        store.save("a.json", &artifact()).unwrap();
        assert!(store.delete("a.json").unwrap());
        assert!(!store.exists("a.json"));
        assert!(store.delete("../a.json").is_err());
    }

    #[test]
    fn test_failed_encode_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        // serde_json only accepts string-like map keys
        let unencodable: BTreeMap<Vec<u8>, i32> = BTreeMap::from([(vec![1u8], 1)]);

        let err = store.save("a.json", &unencodable).unwrap_err();
        assert!(matches!(err, TofError::SerializationError(_)));
        assert!(!store.exists("a.json"));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_failed_rename_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        // A directory squatting on the key makes the final rename fail
        fs::create_dir(dir.path().join("a.json")).unwrap();
        fs::write(dir.path().join("a.json").join("inner"), b"x").unwrap();
        let store = FileStore::new(dir.path());

        assert!(matches!(store.save("a.json", &artifact()), Err(TofError::Io { .. })));
        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.json"]);
    }
}
