//! File-backed specialization of [`BoundedCache`].
//!
//! Values are kept in a human-inspectable JSON tree: a key is a sequence of path
//! segments, the last of which names the file (`root/a/b/c.json`). A missing
//! file reads as the store's default value, and a value equal to the default is
//! never written: evicting it deletes the file, so absence always means default.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::store::cache::{BoundedCache, CacheBacking};

/// Extension of every file written by a [`PersistentStore`].
pub const STORE_EXTENSION: &str = "json";

/// Path segments addressing one value.
pub type StoreKey = Vec<String>;

/// Persistent key-value store whose values are written to the file system.
///
/// The most recently used `capacity` values are held in memory and mutated
/// there; a value only reaches disk when it is evicted or the store is saved.
#[derive(Debug)]
pub struct PersistentStore<V> {
    cache: BoundedCache<StoreKey, V>,
    files: JsonFiles<V>,
}

#[derive(Debug)]
struct JsonFiles<V> {
    root: PathBuf,
    default: V,
}

impl<V> PersistentStore<V>
where
    V: Serialize + DeserializeOwned + Clone + PartialEq,
{
    pub fn new(root: impl Into<PathBuf>, default: V, capacity: usize) -> Self {
        Self {
            cache: BoundedCache::new(capacity),
            files: JsonFiles {
                root: root.into(),
                default,
            },
        }
    }

    pub fn root(&self) -> &Path {
        &self.files.root
    }

    /// Number of values currently held in memory.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Returns a mutable handle to the value at `key`, reading it from disk (or
    /// falling back to the default) when it is not in memory.
    pub fn get(&mut self, key: &StoreKey) -> Result<&mut V> {
        validate_key(key)?;
        self.cache.get_with(key, &mut self.files)
    }

    /// Replaces the value at `key` in memory.
    pub fn insert(&mut self, key: StoreKey, value: V) -> Result<&mut V> {
        validate_key(&key)?;
        self.cache.insert_with(key, value, &mut self.files)
    }

    /// Writes every in-memory value to disk and empties the cache.
    pub fn save(&mut self) -> Result<()> {
        self.cache.flush(&mut self.files)
    }

    /// Location of the file backing `key`.
    pub fn file_path(&self, key: &StoreKey) -> Result<PathBuf> {
        file_path(&self.files.root, key)
    }
}

impl<V> CacheBacking<StoreKey, V> for JsonFiles<V>
where
    V: Serialize + DeserializeOwned + Clone + PartialEq,
{
    fn load(&mut self, key: &StoreKey) -> Result<V> {
        let path = file_path(&self.root, key)?;
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no file, using default");
                return Ok(self.default.clone());
            }
            Err(err) => return Err(Error::io(path, err)),
        };

        tracing::debug!(path = %path.display(), "loaded");
        serde_json::from_str(&contents).map_err(|source| Error::Corrupt { path, source })
    }

    fn evict(&mut self, key: &StoreKey, value: &V) -> Result<()> {
        let path = file_path(&self.root, key)?;

        if *value == self.default {
            return match std::fs::remove_file(&path) {
                Ok(()) => {
                    tracing::debug!(path = %path.display(), "default value, file removed");
                    Ok(())
                }
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(err) => Err(Error::io(path, err)),
            };
        }

        let json = serde_json::to_string_pretty(value).map_err(|source| Error::Corrupt {
            path: path.clone(),
            source,
        })?;
        write_atomic(&path, json.as_bytes())?;
        tracing::debug!(path = %path.display(), bytes = json.len(), "written");
        Ok(())
    }
}

/// Writes `contents` to a temporary sibling and renames it over `path`,
/// creating parent folders as needed.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| Error::io(parent, err))?;
    }
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, contents).map_err(|err| Error::io(&tmp_path, err))?;
    std::fs::rename(&tmp_path, path).map_err(|err| Error::io(path, err))
}

fn file_path(root: &Path, key: &StoreKey) -> Result<PathBuf> {
    validate_key(key)?;
    let (last, parents) = key.split_last().ok_or(Error::InvalidStorePath {
        segments: Vec::new(),
        reason: "path must have at least one segment",
    })?;
    let mut path = root.to_path_buf();
    for segment in parents {
        path.push(segment);
    }
    path.push(format!("{last}.{STORE_EXTENSION}"));
    Ok(path)
}

fn validate_key(key: &StoreKey) -> Result<()> {
    let invalid = |reason| Error::InvalidStorePath {
        segments: key.clone(),
        reason,
    };

    let Some(last) = key.last() else {
        return Err(invalid("path must have at least one segment"));
    };
    if key.iter().any(|segment| segment.is_empty()) {
        return Err(invalid("segments may not be empty"));
    }
    if key
        .iter()
        .any(|segment| segment.contains(['/', '\\']) || segment == "." || segment == "..")
    {
        return Err(invalid("segments may not contain path separators"));
    }
    if last.ends_with(&format!(".{STORE_EXTENSION}")) {
        return Err(invalid("last segment may not carry the storage extension"));
    }
    Ok(())
}
