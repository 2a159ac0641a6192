//! In-memory table store used by coordinator tests

use async_trait::async_trait;
use mealbook_store_client::{Filter, FilterOp, Result, StoreError, TableTransport};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Fake store backing three tables in memory. Honors equality filters,
/// enforces a unique `code` on the groups table, merges upserts on the
/// conflict column, counts every call, and can stall writes or reads to
/// widen race windows under a paused clock.
#[derive(Default)]
pub struct MemoryTransport {
    tables: Mutex<HashMap<String, Vec<Value>>>,
    calls: Mutex<HashMap<String, usize>>,
    next_id: AtomicU64,
    pub upsert_delay: Mutex<Option<Duration>>,
    pub select_delay: Mutex<Option<Duration>>,
    /// When set, every select fails with a network error
    pub fail_selects: Mutex<bool>,
    /// When set, every upsert fails with a network error
    pub fail_upserts: Mutex<bool>,
    /// When set, the next select on the groups table returns no rows,
    /// simulating the losing side of a create race
    pub hide_groups_once: Mutex<bool>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, table: &str, rows: Vec<Value>) {
        self.tables.lock().unwrap().insert(table.to_string(), rows);
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn call_count(&self, op: &str, table: &str) -> usize {
        *self
            .calls
            .lock()
            .unwrap()
            .get(&format!("{op}:{table}"))
            .unwrap_or(&0)
    }

    pub fn set_upsert_delay(&self, delay: Option<Duration>) {
        *self.upsert_delay.lock().unwrap() = delay;
    }

    pub fn set_select_delay(&self, delay: Option<Duration>) {
        *self.select_delay.lock().unwrap() = delay;
    }

    fn record(&self, op: &str, table: &str) {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(format!("{op}:{table}"))
            .or_insert(0) += 1;
    }

    fn matches(row: &Value, filters: &[Filter]) -> bool {
        filters.iter().all(|f| {
            let cell = row.get(&f.column).and_then(Value::as_str).unwrap_or("");
            match f.op {
                FilterOp::Eq => cell == f.value,
                FilterOp::Like => {
                    // Minimal LIKE: treat % as a wildcard suffix/prefix
                    let pattern = f.value.trim_matches('%');
                    cell.contains(pattern)
                }
            }
        })
    }
}

#[async_trait]
impl TableTransport for MemoryTransport {
    async fn select(&self, table: &str, _columns: &str, filters: &[Filter]) -> Result<Vec<Value>> {
        self.record("select", table);
        if *self.fail_selects.lock().unwrap() {
            return Err(StoreError::Network("connection reset by peer".into()));
        }
        if table == "groups" {
            let mut hide = self.hide_groups_once.lock().unwrap();
            if *hide {
                *hide = false;
                return Ok(Vec::new());
            }
        }
        let delay = *self.select_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| Self::matches(row, filters))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn insert(&self, table: &str, payload: Value) -> Result<Vec<Value>> {
        self.record("insert", table);
        let mut tables = self.tables.lock().unwrap();
        let rows = tables.entry(table.to_string()).or_default();

        if table == "groups" {
            let code = payload.get("code").and_then(Value::as_str).unwrap_or("");
            if rows
                .iter()
                .any(|row| row.get("code").and_then(Value::as_str) == Some(code))
            {
                return Err(StoreError::Api {
                    status: 409,
                    code: Some("23505".into()),
                    message: "duplicate key value violates unique constraint".into(),
                });
            }
        }

        let mut row = payload;
        if row.get("id").is_none() {
            let n = self.next_id.fetch_add(1, Ordering::SeqCst);
            row["id"] = json!(format!("mem-{n}"));
        }
        rows.push(row.clone());
        Ok(vec![row])
    }

    async fn update(&self, table: &str, payload: Value, filters: &[Filter]) -> Result<Vec<Value>> {
        self.record("update", table);
        let mut tables = self.tables.lock().unwrap();
        let rows = tables.entry(table.to_string()).or_default();
        let mut updated = Vec::new();
        for row in rows.iter_mut().filter(|row| Self::matches(row, filters)) {
            if let (Value::Object(target), Value::Object(source)) = (&mut *row, &payload) {
                for (k, v) in source {
                    target.insert(k.clone(), v.clone());
                }
            }
            updated.push(row.clone());
        }
        Ok(updated)
    }

    async fn upsert(&self, table: &str, payload: Value, conflict: &str) -> Result<Vec<Value>> {
        self.record("upsert", table);
        if *self.fail_upserts.lock().unwrap() {
            return Err(StoreError::Network("connection reset by peer".into()));
        }
        let delay = *self.upsert_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut tables = self.tables.lock().unwrap();
        let rows = tables.entry(table.to_string()).or_default();

        let key = payload.get(conflict).cloned().unwrap_or(Value::Null);
        if let Some(existing) = rows.iter_mut().find(|row| {
            row.get(conflict).cloned().unwrap_or(Value::Null) == key && !key.is_null()
        }) {
            // Merge on the conflict key: columns absent from the payload
            // (like a generated id) keep their original values
            if let (Value::Object(target), Value::Object(source)) = (&mut *existing, &payload) {
                for (k, v) in source {
                    target.insert(k.clone(), v.clone());
                }
            }
            Ok(vec![existing.clone()])
        } else {
            rows.push(payload.clone());
            Ok(vec![payload])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn repeated_upsert_on_the_same_code_keeps_one_row_and_its_id() {
        let store = MemoryTransport::new();
        store.seed(
            "groups",
            vec![json!({ "id": "g-original", "code": "group-42", "name": "First" })],
        );

        let rows = store
            .upsert("groups", json!({ "code": "group-42", "name": "Renamed" }), "code")
            .await
            .unwrap();

        assert_eq!(store.rows("groups").len(), 1);
        assert_eq!(rows[0]["id"], "g-original");
        assert_eq!(rows[0]["name"], "Renamed");
    }
}
