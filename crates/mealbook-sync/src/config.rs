//! Engine configuration
//!
//! Supplied at build/deploy time through environment variables with
//! hardcoded fallbacks, so a fresh checkout runs against a local store
//! without any setup.

use mealbook_store_client::StoreConfig;
use std::env;
use std::path::PathBuf;
use tracing::info;

/// Sync engine configuration
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base URL of the REST store
    pub base_url: String,
    /// Public (anonymous) access key
    pub api_key: String,
    /// Blob bucket for recipe cover images (consumed by the UI layer)
    pub bucket: String,
    /// Base URL invite links are built against
    pub invite_base_url: String,
    /// Remote request timeout in seconds
    pub timeout_secs: u64,
    /// Quiet interval before a push, in milliseconds
    pub debounce_ms: u64,
    /// Directory for the local cache files
    pub cache_dir: PathBuf,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:54321".to_string(),
            api_key: String::new(),
            bucket: "covers".to_string(),
            invite_base_url: "http://localhost:5173".to_string(),
            timeout_secs: 10,
            debounce_ms: 600,
            cache_dir: PathBuf::from(".mealbook-cache"),
        }
    }
}

impl SyncConfig {
    /// Load configuration from the environment, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: env_or("MEALBOOK_STORE_URL", defaults.base_url),
            api_key: env_or("MEALBOOK_STORE_KEY", defaults.api_key),
            bucket: env_or("MEALBOOK_BUCKET", defaults.bucket),
            invite_base_url: env_or("MEALBOOK_APP_URL", defaults.invite_base_url),
            timeout_secs: defaults.timeout_secs,
            debounce_ms: defaults.debounce_ms,
            cache_dir: PathBuf::from(env_or(
                "MEALBOOK_CACHE_DIR",
                defaults.cache_dir.to_string_lossy().into_owned(),
            )),
        }
    }

    /// Transport configuration for the store client
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            timeout_secs: self.timeout_secs,
        }
    }
}

fn env_or(key: &str, default: String) -> String {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => {
            info!("{key} not set, using default");
            default
        }
    }
}
