//! HTTP client for the mealbook shared-catalog REST store
//!
//! The store is a multi-tenant REST endpoint exposing three logical tables:
//! a single-row-per-key settings table, a groups table keyed by a unique
//! human-shareable code, and a documents table holding one JSON catalog
//! per group. All access is anonymous behind a shared public key.
//!
//! # Example
//!
//! ```rust,no_run
//! use mealbook_store_client::{CatalogRepository, RestTransport, StoreConfig};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = RestTransport::new(StoreConfig {
//!     base_url: "https://store.example.com".into(),
//!     api_key: "public-anon-key".into(),
//!     ..Default::default()
//! });
//! let repo = CatalogRepository::new(Arc::new(transport));
//!
//! if let Some(group) = repo.fetch_group_by_code("group-abc1").await? {
//!     let document = repo.fetch_catalog_document(&group.id).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod model;
pub mod repository;
pub mod transport;

pub use error::{Result, StoreError};
pub use model::{CatalogDocument, CookbookEntry, Group, LogEntry, Recipe};
pub use repository::CatalogRepository;
pub use transport::{Filter, FilterOp, RestTransport, StoreConfig, TableTransport};
