//! Key/value cache used by the cookie persistence hooks.
//!
//! [`FileCache`] is a sharded on-disk store: entries live at
//! `<dir>/<hash[0..2]>/<hash>.bin` where `hash` is the hex SHA-256 of the
//! logical key. Each file holds a JSON envelope with the value and an optional
//! expiry timestamp. Expired entries are deleted lazily on read.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::util::sha256_hex;

const CACHE_FILE_SUFFIX: &str = ".bin";

/// Errors produced at the cache boundary.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The key has no stored entry.
    #[error("cache miss for key {key:?}")]
    Miss {
        /// The logical key.
        key: String,
    },

    /// The entry existed but its expiry had passed; it has been deleted.
    #[error("cache entry for key {key:?} is expired")]
    Expired {
        /// The logical key.
        key: String,
    },

    /// File system failure while reading or writing an entry.
    #[error("cache IO error at {path}: {source}")]
    Io {
        /// Path of the failing file or directory.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The entry file could not be serialized or parsed.
    #[error("cache entry serialization failed: {source}")]
    Serde {
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

impl CacheError {
    fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// String key/value store with per-entry time-to-live.
pub trait Cache: Send + Sync {
    /// Stores `value` under `key`. `None` means the entry never expires.
    ///
    /// # Errors
    ///
    /// Returns an error when the entry cannot be persisted.
    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError>;

    /// Returns the live value for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Miss`] for absent keys and [`CacheError::Expired`]
    /// for entries past their expiry (which are deleted as a side effect).
    fn get(&self, key: &str) -> Result<String, CacheError>;

    /// Returns `true` when a live entry exists for `key`.
    fn has(&self, key: &str) -> bool {
        self.get(key).is_ok()
    }

    /// Removes the entry for `key`. Removing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error when an existing entry cannot be removed.
    fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Walks the store and deletes every expired entry.
    ///
    /// # Errors
    ///
    /// Returns an error when the store cannot be traversed.
    fn clean_expired(&self) -> Result<(), CacheError>;
}

/// On-disk entry envelope.
#[derive(Debug, Serialize, Deserialize)]
struct CacheItem {
    /// The stored value.
    v: String,
    /// Expiry timestamp; `null` means the entry never expires.
    e: Option<DateTime<Utc>>,
}

impl CacheItem {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.e.is_some_and(|expiry| expiry < now)
    }
}

/// Sharded file-backed [`Cache`].
#[derive(Debug)]
pub struct FileCache {
    dir: PathBuf,
    // serializes all file operations on this instance
    lock: Mutex<()>,
}

impl FileCache {
    /// Creates a cache rooted at `dir`. The directory is created on first use.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    /// Root directory of the store.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Shard path for a logical key: `<dir>/<hash[0..2]>/<hash>.bin`.
    fn entry_path(&self, key: &str) -> PathBuf {
        let hash = sha256_hex(key);
        self.dir
            .join(&hash[..2])
            .join(format!("{hash}{CACHE_FILE_SUFFIX}"))
    }

    /// Reads an entry file, deleting it when expired.
    fn read_entry(path: &Path, key: &str) -> Result<CacheItem, CacheError> {
        let raw = match std::fs::read(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CacheError::Miss {
                    key: key.to_string(),
                });
            }
            Err(e) => return Err(CacheError::io(path, e)),
        };
        let item: CacheItem =
            serde_json::from_slice(&raw).map_err(|source| CacheError::Serde { source })?;
        if item.is_expired(Utc::now()) {
            debug!(?path, "removing expired cache entry");
            let _ = std::fs::remove_file(path);
            return Err(CacheError::Expired {
                key: key.to_string(),
            });
        }
        Ok(item)
    }
}

impl Cache for FileCache {
    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        let _guard = self.lock.lock().map_err(std::sync::PoisonError::into_inner);
        let path = self.entry_path(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))?;
        }
        let expiry = ttl.and_then(|ttl| {
            chrono::Duration::from_std(ttl)
                .ok()
                .and_then(|delta| Utc::now().checked_add_signed(delta))
        });
        let item = CacheItem {
            v: value.to_string(),
            e: expiry,
        };
        let raw = serde_json::to_vec(&item).map_err(|source| CacheError::Serde { source })?;
        std::fs::write(&path, raw).map_err(|e| CacheError::io(path, e))
    }

    fn get(&self, key: &str) -> Result<String, CacheError> {
        let _guard = self.lock.lock().map_err(std::sync::PoisonError::into_inner);
        let path = self.entry_path(key);
        Self::read_entry(&path, key).map(|item| item.v)
    }

    fn delete(&self, key: &str) -> Result<(), CacheError> {
        let _guard = self.lock.lock().map_err(std::sync::PoisonError::into_inner);
        let path = self.entry_path(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::io(path, e)),
        }
    }

    fn clean_expired(&self) -> Result<(), CacheError> {
        let _guard = self.lock.lock().map_err(std::sync::PoisonError::into_inner);
        let shards = match std::fs::read_dir(&self.dir) {
            Ok(shards) => shards,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(CacheError::io(&self.dir, e)),
        };
        for shard in shards.flatten() {
            let shard_path = shard.path();
            if !shard_path.is_dir() {
                continue;
            }
            let entries = std::fs::read_dir(&shard_path)
                .map_err(|e| CacheError::io(&shard_path, e))?;
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|ext| ext.to_str()) == Some("bin") {
                    // read_entry removes the file when it is expired
                    let _ = Self::read_entry(&path, "");
                }
            }
        }
        Ok(())
    }
}
