//! Local key-to-JSON cache
//!
//! Persists a small fixed set of keys (the catalog document, the group code,
//! UI preferences) across restarts, one JSON file per key. Absent or corrupt
//! data falls back to the caller's default; failures are logged and absorbed,
//! never propagated. No TTL, no eviction.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Well-known cache keys
pub mod keys {
    pub const CATALOG_DOCUMENT: &str = "catalog_document";
    pub const GROUP_CODE: &str = "group_code";
}

/// File-backed key-to-JSON store
#[derive(Debug, Clone)]
pub struct LocalCache {
    dir: PathBuf,
}

impl LocalCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if let Err(e) = fs::create_dir_all(&dir) {
            warn!("Could not create cache directory {}: {e}", dir.display());
        }
        Self { dir }
    }

    /// Read the stored value for `key`, or `fallback` when the key is
    /// absent or the stored bytes do not parse
    pub fn read<T: DeserializeOwned>(&self, key: &str, fallback: T) -> T {
        let path = self.path_for(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(_) => return fallback,
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => value,
            Err(e) => {
                warn!("Corrupt cache entry for {key} at {}: {e}", path.display());
                fallback
            }
        }
    }

    /// Serialize and persist `value` under `key`. Write failures (e.g. a
    /// full disk) are logged and absorbed.
    pub fn write<T: Serialize>(&self, key: &str, value: &T) {
        let path = self.path_for(key);
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Could not serialize cache entry for {key}: {e}");
                return;
            }
        };
        if let Err(e) = fs::write(&path, bytes) {
            warn!("Could not persist cache entry for {key}: {e}");
        } else {
            debug!("Cached {key} ({} bytes)", path.display());
        }
    }

    /// Remove the stored value for `key`, if any
    pub fn remove(&self, key: &str) {
        let path = self.path_for(key);
        if path.exists() {
            if let Err(e) = fs::remove_file(&path) {
                warn!("Could not remove cache entry for {key}: {e}");
            }
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        Path::new(&self.dir).join(format!("{safe}.json"))
    }
}
