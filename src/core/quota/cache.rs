use anyhow::{Context, Result};
use log::{debug, error, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const CACHE_VERSION: u64 = 1;

#[derive(Debug, Deserialize)]
struct CacheFile<V> {
    #[serde(default)]
    version: u64,
    entries: HashMap<String, V>,
}

#[derive(Serialize)]
struct CacheFileRef<'a, V> {
    version: u64,
    entries: &'a HashMap<String, V>,
}

/// In-memory key/value results for one provider, written to disk only on flush.
#[derive(Debug, Clone)]
pub struct CacheStore<V> {
    path: PathBuf,
    entries: HashMap<String, V>,
}

impl<V> CacheStore<V>
where
    V: Clone + Serialize + DeserializeOwned,
{
    /// Load the cache from disk, or start empty.
    /// A missing file, an unreadable file or a version mismatch all yield an empty store.
    pub fn load(path: impl Into<PathBuf>, provider: &str) -> Self {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<CacheFile<V>>(&content) {
                Ok(file) if file.version == CACHE_VERSION => file.entries,
                Ok(file) => {
                    warn!(
                        "{}: discarding cache {} (version {} != {})",
                        provider,
                        path.display(),
                        file.version,
                        CACHE_VERSION
                    );
                    HashMap::new()
                }
                Err(e) => {
                    warn!("{}: could not parse {}: {}", provider, path.display(), e);
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("{}: no cache at {}", provider, path.display());
                HashMap::new()
            }
            Err(e) => {
                warn!("{}: could not read {}: {}", provider, path.display(), e);
                HashMap::new()
            }
        };
        Self { path, entries }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert or overwrite. Memory only.
    pub fn put(&mut self, key: impl Into<String>, value: V) {
        self.entries.insert(key.into(), value);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write every entry to disk, replacing the previous file.
    /// Failures are logged; the in-memory entries are kept for the next attempt.
    pub fn flush(&self, provider: &str) -> bool {
        match self.write() {
            Ok(()) => {
                debug!(
                    "{}: saved {} entries to {}",
                    provider,
                    self.entries.len(),
                    self.path.display()
                );
                true
            }
            Err(e) => {
                error!("{}: could not save {}: {:#}", provider, self.path.display(), e);
                false
            }
        }
    }

    fn write(&self) -> Result<()> {
        let file = CacheFileRef {
            version: CACHE_VERSION,
            entries: &self.entries,
        };
        let json = serde_json::to_string(&file).context("Failed to serialize cache")?;
        write_atomic(&self.path, json.as_bytes())
    }
}

/// Write to a sibling `.tmp` file, then rename over the target.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, contents)
        .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_empty_store() {
        let dir = TempDir::new().unwrap();
        let store: CacheStore<serde_json::Value> =
            CacheStore::load(dir.path().join("absent.json"), "Test");
        assert!(store.is_empty());
    }

    #[test]
    fn corrupt_file_gives_empty_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "{not json").unwrap();
        let store: CacheStore<serde_json::Value> = CacheStore::load(&path, "Test");
        assert!(store.is_empty());
    }

    #[test]
    fn version_mismatch_gives_empty_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, r#"{"version":99,"entries":{"x":1}}"#).unwrap();
        let store: CacheStore<u32> = CacheStore::load(&path, "Test");
        assert!(store.is_empty());
    }

    #[test]
    fn put_is_memory_only_until_flush() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let mut store = CacheStore::load(&path, "Test");
        store.put("x", json!({"score": 1}));
        assert!(store.contains("x"));
        assert_eq!(store.get("x"), Some(&json!({"score": 1})));
        assert!(!path.exists());

        assert!(store.flush("Test"));
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn flush_then_reload_keeps_nested_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("cache.json");
        let value = json!({
            "title": "CNN",
            "views": 12345,
            "found": true,
            "meta": {"tier": 1, "tags": ["news"]}
        });
        let mut store = CacheStore::load(&path, "Test");
        store.put("cnn_video", value.clone());
        store.put("unknown_audio", json!({"found": false}));
        assert!(store.flush("Test"));

        let reloaded: CacheStore<serde_json::Value> = CacheStore::load(&path, "Test");
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.get("cnn_video"), Some(&value));
    }

    #[test]
    fn flush_failure_keeps_entries() {
        let dir = TempDir::new().unwrap();
        // A directory where the file should be makes the rename fail.
        let path = dir.path().join("cache.json");
        std::fs::create_dir_all(path.join("blocker")).unwrap();
        let mut store = CacheStore::load(&path, "Test");
        store.put("x", 1u32);
        assert!(!store.flush("Test"));
        assert_eq!(store.get("x"), Some(&1));
    }
}
