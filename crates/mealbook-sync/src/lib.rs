//! Mealbook Sync - Catalog Synchronization Engine
//!
//! Keeps a device-local recipe catalog in sync with a shared REST store.
//!
//! # Architecture
//!
//! One JSON catalog document per group, last-write-wins:
//! - **Local first**: every edit lands in memory and the file cache
//!   immediately; the network is never on the edit path
//! - **Debounced push**: a burst of edits becomes one write after a
//!   quiet interval
//! - **Passive pull**: bootstrap, window focus and manual refresh pull
//!   the remote copy, but only while no local change is pending
//!
//! Groups are identified by a human-typable code, shareable as an
//! invite URL. A code that does not exist remotely is created on first
//! use, so two devices entering the same code converge on one group.
//!
//! # Example
//!
//! ```rust,ignore
//! use mealbook_sync::{SyncConfig, SyncCoordinator};
//!
//! let coordinator = SyncCoordinator::from_config(SyncConfig::from_env());
//! coordinator.start().await;
//!
//! // Edits are local and cheap; a debounced push follows
//! coordinator.update_recipes(|recipes| recipes.push(new_recipe)).await;
//!
//! // The host forwards focus events to trigger a resync
//! coordinator.handle_focus().await;
//! ```

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod debounce;
pub mod error;
pub mod group;
pub mod status;
pub mod versioned;

#[cfg(test)]
pub(crate) mod testutil;

pub use cache::LocalCache;
pub use config::SyncConfig;
pub use coordinator::SyncCoordinator;
pub use debounce::Debouncer;
pub use error::{Result, SyncError};
pub use status::{SyncState, SyncStatus};
pub use versioned::Versioned;

// Store types callers handle directly
pub use mealbook_store_client::{
    CatalogDocument, CookbookEntry, Group, LogEntry, Recipe, StoreError,
};
