//! Key-value backends for cache entries.
//!
//! `JsonFileStore` layout: `{cache_dir}/{blake3(key)}.json`, one entry per
//! file. Writes go to a `.tmp` sibling and are renamed into place, so an
//! entry is always replaced whole. Unreadable files are renamed to
//! `.quarantined` and reported as misses.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use super::key::digest_key;
use crate::domain::CanonicalRecord;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error at {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("cache serialization error: {0}")]
    Serialize(String),

    #[error("corrupt cache file {path} quarantined: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

/// One cached fetch result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub payload: Vec<CanonicalRecord>,
    pub fetched_at: DateTime<Utc>,
    /// TTL in force when the entry was written. Reads judge freshness with
    /// the TTL of the reading call.
    pub ttl_secs: u64,
}

impl CacheEntry {
    /// `now - fetched_at < ttl`.
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: std::time::Duration) -> bool {
        now.signed_duration_since(self.fetched_at) < super::to_chrono(ttl)
    }

    pub fn age_secs(&self, now: DateTime<Utc>) -> i64 {
        now.signed_duration_since(self.fetched_at).num_seconds()
    }
}

/// Opaque string-keyed storage for cache entries.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError>;

    /// Replace the entry for `key` as a whole.
    fn put(&self, key: &str, entry: &CacheEntry) -> Result<(), CacheError>;

    fn remove(&self, key: &str) -> Result<(), CacheError>;

    fn entries(&self) -> Result<Vec<CacheEntry>, CacheError>;

    /// Remove every entry, returning how many were removed.
    fn clear(&self) -> Result<usize, CacheError>;

    fn flush(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

/// In-process store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self.map().get(key).cloned())
    }

    fn put(&self, key: &str, entry: &CacheEntry) -> Result<(), CacheError> {
        self.map().insert(key.to_string(), entry.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.map().remove(key);
        Ok(())
    }

    fn entries(&self) -> Result<Vec<CacheEntry>, CacheError> {
        let mut entries: Vec<CacheEntry> = self.map().values().cloned().collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }

    fn clear(&self) -> Result<usize, CacheError> {
        let mut map = self.map();
        let n = map.len();
        map.clear();
        Ok(n)
    }
}

/// One JSON file per entry under a cache directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    cache_dir: PathBuf,
}

impl JsonFileStore {
    /// Open (creating if needed) a store rooted at `cache_dir`.
    pub fn open(cache_dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let cache_dir = cache_dir.into();
        fs::create_dir_all(&cache_dir).map_err(|e| io_error(&cache_dir, e))?;
        Ok(Self { cache_dir })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", digest_key(key)))
    }

    fn read_file(path: &Path) -> Result<CacheEntry, CacheError> {
        let content = fs::read_to_string(path).map_err(|e| io_error(path, e))?;
        serde_json::from_str(&content).map_err(|e| {
            let quarantine = path.with_extension("json.quarantined");
            warn!(path = %path.display(), "quarantining corrupt cache file: {e}");
            let _ = fs::rename(path, &quarantine);
            CacheError::Corrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        })
    }

    fn json_files(&self) -> Result<Vec<PathBuf>, CacheError> {
        let dir = fs::read_dir(&self.cache_dir).map_err(|e| io_error(&self.cache_dir, e))?;
        let mut paths = Vec::new();
        for entry in dir {
            let path = entry.map_err(|e| io_error(&self.cache_dir, e))?.path();
            if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("json") {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

impl CacheStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let path = self.entry_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let entry = Self::read_file(&path)?;
        // Digest collision or hand-edited file: not ours.
        if entry.key != key {
            return Ok(None);
        }
        Ok(Some(entry))
    }

    fn put(&self, key: &str, entry: &CacheEntry) -> Result<(), CacheError> {
        let path = self.entry_path(key);
        let tmp_path = path.with_extension("json.tmp");
        let json = serde_json::to_vec(entry).map_err(|e| CacheError::Serialize(e.to_string()))?;
        fs::write(&tmp_path, json).map_err(|e| io_error(&tmp_path, e))?;
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            io_error(&path, e)
        })
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        let path = self.entry_path(key);
        if path.exists() {
            fs::remove_file(&path).map_err(|e| io_error(&path, e))?;
        }
        Ok(())
    }

    fn entries(&self) -> Result<Vec<CacheEntry>, CacheError> {
        let mut entries = Vec::new();
        for path in self.json_files()? {
            match Self::read_file(&path) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!("skipping cache file: {e}"),
            }
        }
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }

    fn clear(&self) -> Result<usize, CacheError> {
        let paths = self.json_files()?;
        for path in &paths {
            fs::remove_file(path).map_err(|e| io_error(path, e))?;
        }
        Ok(paths.len())
    }
}

fn io_error(path: &Path, e: std::io::Error) -> CacheError {
    CacheError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}
