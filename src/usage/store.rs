// SPDX-License-Identifier: MPL-2.0

//! Key-value persistence for usage buckets
//!
//! The accumulator only needs `get`/`set`; backends that can commit several
//! keys at once override [`UsageStore::set_batch`] so a crash never leaves
//! some buckets updated and others stale.

use std::collections::{BTreeMap, HashMap};
use std::ffi::OsStr;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("usage store I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode usage store: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("value for '{key}' is not valid UTF-8")]
    NotUtf8 { key: String },

    #[error("usage store {path} is in use by another speedmeter process")]
    Locked { path: PathBuf },
}

/// Durable key-value store the usage accumulator writes through.
pub trait UsageStore {
    fn get(&self, key: &str) -> Option<Vec<u8>>;

    fn set(&mut self, key: &str, value: Vec<u8>) -> Result<(), StoreError>;

    /// Write several entries as one unit.
    fn set_batch(&mut self, entries: Vec<(String, Vec<u8>)>) -> Result<(), StoreError> {
        for (key, value) in entries {
            self.set(&key, value)?;
        }
        Ok(())
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Volatile store, used when nothing should touch disk.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl UsageStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        self.entries.insert(key.to_owned(), value);
        Ok(())
    }
}

// ============================================================================
// JSON file store
// ============================================================================

/// One JSON object on disk mapping keys to string values.
///
/// Every write rewrites the whole file through a sibling temp file and a
/// rename, so readers see either the old or the new contents.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Open the store at `path`. A missing file is an empty store.
    ///
    /// Entries whose value is not a string are dropped with a warning and
    /// the rest are kept. A file that is not a JSON object at all is moved
    /// aside to `<path>.corrupt` before the store starts empty, so the next
    /// write cannot destroy it.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = match fs::read(&path) {
            Ok(raw) => match serde_json::from_slice::<Map<String, Value>>(&raw) {
                Ok(map) => string_entries(&path, map),
                Err(e) => {
                    let aside = sibling(&path, "corrupt");
                    log::warn!(
                        "Usage store {} is unreadable ({}), moving it to {} and starting empty",
                        path.display(),
                        e,
                        aside.display()
                    );
                    fs::rename(&path, &aside).map_err(|source| StoreError::Io {
                        path: aside.clone(),
                        source,
                    })?;
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        log::debug!("Opened usage store {} ({} keys)", path.display(), entries.len());
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Exclusive lock held by the process that writes this store.
    pub fn lock(&self) -> Result<StoreLock, StoreError> {
        StoreLock::acquire(sibling(&self.path, "lock"))
    }

    fn flush(&self) -> Result<(), StoreError> {
        let io_err = |source: io::Error| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }

        let content = serde_json::to_vec_pretty(&self.entries)?;
        let tmp = sibling(&self.path, "tmp");

        fs::write(&tmp, content).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)
    }
}

impl UsageStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.get(key).map(|v| v.clone().into_bytes())
    }

    fn set(&mut self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        self.set_batch(vec![(key.to_owned(), value)])
    }

    /// Nothing is inserted unless every value is valid UTF-8.
    fn set_batch(&mut self, entries: Vec<(String, Vec<u8>)>) -> Result<(), StoreError> {
        let entries = entries
            .into_iter()
            .map(|(key, value)| match String::from_utf8(value) {
                Ok(value) => Ok((key, value)),
                Err(_) => Err(StoreError::NotUtf8 { key }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.entries.extend(entries);
        self.flush()
    }
}

fn string_entries(path: &Path, map: Map<String, Value>) -> BTreeMap<String, String> {
    map.into_iter()
        .filter_map(|(key, value)| match value {
            Value::String(value) => Some((key, value)),
            other => {
                log::warn!(
                    "Dropping non-string value for '{}' in {}: {}",
                    key,
                    path.display(),
                    other
                );
                None
            }
        })
        .collect()
}

/// `<path>.<suffix>` next to `path`.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(OsStr::new(suffix));
    PathBuf::from(name)
}

// ============================================================================
// Writer lock
// ============================================================================

/// Advisory lock that marks one process as the store's writer.
///
/// Released when dropped, or by the OS when the process dies.
#[derive(Debug)]
pub struct StoreLock {
    path: PathBuf,
    _file: File,
}

impl StoreLock {
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let io_err = |source: io::Error| StoreError::Io {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(io_err)?;
        match fs2::FileExt::try_lock_exclusive(&file) {
            Ok(()) => {}
            Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {
                return Err(StoreError::Locked { path: path.clone() });
            }
            Err(e) => return Err(io_err(e)),
        }

        log::debug!("Holding usage store lock {}", path.display());
        Ok(Self { path, _file: file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
