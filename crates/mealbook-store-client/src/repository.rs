//! Typed catalog operations over the table transport
//!
//! Thin façade: transport errors propagate unchanged, absent rows are not
//! errors, and cardinality ("first row or none") is decided here rather
//! than assumed by the transport.

use crate::error::Result;
use crate::model::{CatalogDocument, Group};
use crate::transport::{Filter, TableTransport};
use serde_json::{json, Value};
use std::sync::Arc;

const SETTINGS_TABLE: &str = "settings";
const GROUPS_TABLE: &str = "groups";
const DOCUMENTS_TABLE: &str = "documents";

/// Settings-table key holding the shared password hash
const ACCESS_PASSWORD_KEY: &str = "access_password";

/// Typed façade over the REST store's three tables:
/// `settings(key, value)`, `groups(id, code, name)` and
/// `documents(group_id, data, updated_at)`.
pub struct CatalogRepository {
    transport: Arc<dyn TableTransport>,
}

impl CatalogRepository {
    pub fn new(transport: Arc<dyn TableTransport>) -> Self {
        Self { transport }
    }

    /// Read the shared password hash. An absent row is `Ok(None)`.
    pub async fn fetch_shared_secret_hash(&self) -> Result<Option<String>> {
        let rows = self
            .transport
            .select(
                SETTINGS_TABLE,
                "value",
                &[Filter::eq("key", ACCESS_PASSWORD_KEY)],
            )
            .await?;

        Ok(rows
            .into_iter()
            .next()
            .and_then(|row| row.get("value").and_then(Value::as_str).map(str::to_string)))
    }

    /// Write the shared password hash (single logical row, merged on `key`)
    pub async fn write_shared_secret_hash(&self, hash: &str) -> Result<()> {
        self.transport
            .upsert(
                SETTINGS_TABLE,
                json!({ "key": ACCESS_PASSWORD_KEY, "value": hash }),
                "key",
            )
            .await?;
        Ok(())
    }

    /// Resolve a group code to its internal id and name.
    /// An absent group is `Ok(None)`.
    pub async fn fetch_group_by_code(&self, code: &str) -> Result<Option<Group>> {
        let rows = self
            .transport
            .select(GROUPS_TABLE, "id,code,name", &[Filter::eq("code", code)])
            .await?;

        match rows.into_iter().next() {
            Some(row) => Ok(Some(serde_json::from_value(row)?)),
            None => Ok(None),
        }
    }

    /// Insert a new group row.
    ///
    /// A duplicate code surfaces as a store error with
    /// `is_duplicate() == true` so the caller can fall back to
    /// [`fetch_group_by_code`](Self::fetch_group_by_code).
    pub async fn create_group(&self, code: &str, name: &str) -> Result<Group> {
        let rows = self
            .transport
            .insert(GROUPS_TABLE, json!({ "code": code, "name": name }))
            .await?;

        let row = rows.into_iter().next().unwrap_or(Value::Null);
        Ok(serde_json::from_value(row)?)
    }

    /// Read the catalog document for a group. An absent row is `Ok(None)`;
    /// a row with a null payload decodes to the empty default.
    pub async fn fetch_catalog_document(&self, group_id: &str) -> Result<Option<CatalogDocument>> {
        let rows = self
            .transport
            .select(
                DOCUMENTS_TABLE,
                "data",
                &[Filter::eq("group_id", group_id)],
            )
            .await?;

        let Some(row) = rows.into_iter().next() else {
            return Ok(None);
        };

        match row.get("data") {
            None | Some(Value::Null) => Ok(Some(CatalogDocument::default())),
            Some(data) => Ok(Some(serde_json::from_value(data.clone())?)),
        }
    }

    /// Replace the catalog document for a group, stamping `updated_at`
    pub async fn write_catalog_document(
        &self,
        group_id: &str,
        document: &CatalogDocument,
    ) -> Result<()> {
        self.transport
            .upsert(
                DOCUMENTS_TABLE,
                json!({
                    "group_id": group_id,
                    "data": document,
                    "updated_at": chrono::Utc::now().to_rfc3339(),
                }),
                "group_id",
            )
            .await?;
        Ok(())
    }
}
