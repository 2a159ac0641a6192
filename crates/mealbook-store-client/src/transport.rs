//! PostgREST-style table transport
//!
//! Translates table-oriented CRUD intent into single HTTP requests with a
//! bounded timeout and one error shape regardless of failure point. The
//! transport never assumes row cardinality; callers that expect exactly one
//! row take it off the returned list themselves.

use crate::error::{Result, StoreError};
use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

/// Transport configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Base URL of the REST store (without the `/rest/v1` suffix)
    pub base_url: String,
    /// Public (anonymous) access key sent with every request
    pub api_key: String,
    /// Request timeout in seconds (default: 10)
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:54321".to_string(),
            api_key: String::new(),
            timeout_secs: 10,
        }
    }
}

/// Filter predicate operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    /// Exact equality
    Eq,
    /// SQL LIKE pattern match
    Like,
}

/// One column predicate; multiple filters on a request are AND-ed
#[derive(Debug, Clone)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: String,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            op: FilterOp::Eq,
            value: value.into(),
        }
    }

    pub fn like(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            op: FilterOp::Like,
            value: pattern.into(),
        }
    }

    /// Render as a query-string pair, e.g. `code=eq.group-abc1`
    fn query_param(&self) -> String {
        let op = match self.op {
            FilterOp::Eq => "eq",
            FilterOp::Like => "like",
        };
        format!("{}={}.{}", self.column, op, urlencoding::encode(&self.value))
    }
}

/// Table-oriented CRUD transport.
///
/// The seam for substituting a fake store in tests: the repository and the
/// sync coordinator only ever see this trait, never a concrete HTTP client.
#[async_trait]
pub trait TableTransport: Send + Sync {
    /// Read zero or more rows matching all filters
    async fn select(&self, table: &str, columns: &str, filters: &[Filter]) -> Result<Vec<Value>>;

    /// Insert one row, returning its stored representation
    async fn insert(&self, table: &str, payload: Value) -> Result<Vec<Value>>;

    /// Update rows matching all filters, returning the updated representations
    async fn update(&self, table: &str, payload: Value, filters: &[Filter]) -> Result<Vec<Value>>;

    /// Insert-or-merge on the given conflict column, so repeated writes
    /// against the same logical row never create duplicates
    async fn upsert(&self, table: &str, payload: Value, conflict_column: &str)
        -> Result<Vec<Value>>;
}

/// HTTP transport against a PostgREST-compatible endpoint
pub struct RestTransport {
    config: StoreConfig,
    client: Client,
}

impl RestTransport {
    /// Create a new transport
    pub fn new(config: StoreConfig) -> Self {
        let mut headers = header::HeaderMap::new();
        if !config.api_key.is_empty() {
            if let Ok(value) = header::HeaderValue::from_str(&config.api_key) {
                headers.insert("apikey", value);
            }
            if let Ok(value) =
                header::HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            {
                headers.insert(header::AUTHORIZATION, value);
            }
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to build HTTP client");

        Self { config, client }
    }

    fn table_url(&self, table: &str, params: &[String]) -> String {
        let mut url = format!("{}/rest/v1/{}", self.config.base_url, table);
        if !params.is_empty() {
            url.push('?');
            url.push_str(&params.join("&"));
        }
        url
    }

    /// Send a request with the timeout guard and normalize the outcome.
    ///
    /// An expired request is aborted and reported as a timeout, never left
    /// hanging; callers must not assume a request eventually resolves.
    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<Vec<Value>> {
        let secs = self.config.timeout_secs;
        let timeout = Duration::from_secs(secs);
        let response = tokio::time::timeout(timeout, request.send())
            .await
            .map_err(|_| {
                warn!("Store request timed out after {secs}s");
                StoreError::Timeout(secs)
            })?
            .map_err(|e| map_reqwest_error(e, secs))?;

        let status = response.status();
        let body = tokio::time::timeout(timeout, response.text())
            .await
            .map_err(|_| {
                warn!("Store response body timed out after {secs}s");
                StoreError::Timeout(secs)
            })?
            .map_err(|e| map_reqwest_error(e, secs))?;

        if !status.is_success() {
            warn!("Store request failed with status {status}");
            return Err(api_error(status, &body));
        }

        if body.trim().is_empty() {
            return Ok(Vec::new());
        }

        match serde_json::from_str::<Value>(&body)? {
            Value::Array(rows) => Ok(rows),
            Value::Null => Ok(Vec::new()),
            single => Ok(vec![single]),
        }
    }
}

#[async_trait]
impl TableTransport for RestTransport {
    async fn select(&self, table: &str, columns: &str, filters: &[Filter]) -> Result<Vec<Value>> {
        let mut params = vec![format!("select={}", urlencoding::encode(columns))];
        params.extend(filters.iter().map(Filter::query_param));

        let url = self.table_url(table, &params);
        self.execute(self.client.get(&url)).await
    }

    async fn insert(&self, table: &str, payload: Value) -> Result<Vec<Value>> {
        let url = self.table_url(table, &[]);
        let request = self
            .client
            .post(&url)
            .header("Prefer", "return=representation")
            .json(&payload);
        self.execute(request).await
    }

    async fn update(&self, table: &str, payload: Value, filters: &[Filter]) -> Result<Vec<Value>> {
        let params: Vec<String> = filters.iter().map(Filter::query_param).collect();
        let url = self.table_url(table, &params);
        let request = self
            .client
            .patch(&url)
            .header("Prefer", "return=representation")
            .json(&payload);
        self.execute(request).await
    }

    async fn upsert(
        &self,
        table: &str,
        payload: Value,
        conflict_column: &str,
    ) -> Result<Vec<Value>> {
        let params = vec![format!(
            "on_conflict={}",
            urlencoding::encode(conflict_column)
        )];
        let url = self.table_url(table, &params);
        let request = self
            .client
            .post(&url)
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&payload);
        self.execute(request).await
    }
}

fn map_reqwest_error(err: reqwest::Error, timeout_secs: u64) -> StoreError {
    warn!("Store request failed: {err}");
    if err.is_timeout() {
        // The client-level timeout fired before the outer guard
        StoreError::Timeout(timeout_secs)
    } else {
        StoreError::Network(err.to_string())
    }
}

/// Parse a PostgREST error body (`{"message": ..., "code": ...}`), falling
/// back to the raw body when it is not structured
fn api_error(status: StatusCode, body: &str) -> StoreError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let code = parsed
        .as_ref()
        .and_then(|v| v.get("code"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let message = parsed
        .as_ref()
        .and_then(|v| v.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string());

    StoreError::Api {
        status: status.as_u16(),
        code,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn filters_render_as_conjunctive_params() {
        let transport = RestTransport::new(StoreConfig::default());
        let params = vec![
            Filter::eq("code", "group-abc1").query_param(),
            Filter::eq("name", "week night").query_param(),
        ];
        let url = transport.table_url("groups", &params);
        assert_eq!(
            url,
            "http://localhost:54321/rest/v1/groups?code=eq.group-abc1&name=eq.week%20night"
        );
    }

    #[test]
    fn like_filter_renders_pattern() {
        assert_eq!(
            Filter::like("code", "group-%").query_param(),
            "code=like.group-%25"
        );
    }

    #[test]
    fn api_error_parses_structured_body() {
        let err = api_error(
            StatusCode::CONFLICT,
            r#"{"message":"duplicate key value","code":"23505"}"#,
        );
        assert!(err.is_duplicate());
        match err {
            StoreError::Api { status, code, message } => {
                assert_eq!(status, 409);
                assert_eq!(code.as_deref(), Some("23505"));
                assert_eq!(message, "duplicate key value");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn api_error_keeps_raw_body_when_unstructured() {
        let err = api_error(StatusCode::BAD_GATEWAY, "upstream unavailable");
        match err {
            StoreError::Api { status, code, message } => {
                assert_eq!(status, 502);
                assert!(code.is_none());
                assert_eq!(message, "upstream unavailable");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn upsert_targets_the_conflict_column_and_asks_for_a_merge() {
        // Capture the raw request headers, then answer with an empty row set
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&chunk[..n]);
                if request.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\ncontent-length: 2\r\nconnection: close\r\n\r\n[]",
                )
                .await
                .unwrap();
            let _ = tx.send(String::from_utf8_lossy(&request).into_owned());
        });

        let transport = RestTransport::new(StoreConfig {
            base_url: format!("http://{}", addr),
            api_key: "test-key".into(),
            timeout_secs: 1,
        });
        let rows = transport
            .upsert(
                "documents",
                serde_json::json!({ "group_id": "g1" }),
                "group_id",
            )
            .await
            .unwrap();
        assert!(rows.is_empty());

        let request = rx.await.unwrap().to_lowercase();
        assert!(
            request.starts_with("post /rest/v1/documents?on_conflict=group_id http/1.1"),
            "unexpected request line: {request}"
        );
        assert!(request.contains("prefer: resolution=merge-duplicates,return=representation"));
        assert!(request.contains("apikey: test-key"));
        assert!(request.contains("authorization: bearer test-key"));
    }

    #[tokio::test]
    async fn stalled_server_resolves_as_timeout() {
        // A server that accepts the connection and never responds
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            loop {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        });

        let transport = RestTransport::new(StoreConfig {
            base_url: format!("http://{}", addr),
            api_key: "test-key".into(),
            timeout_secs: 1,
        });

        let started = std::time::Instant::now();
        let result = transport.select("groups", "*", &[]).await;
        let elapsed = started.elapsed();

        let err = result.unwrap_err();
        assert!(
            matches!(err, StoreError::Timeout(_)),
            "expected timeout, got {err:?}"
        );
        assert!(err.is_network());
        assert!(elapsed < Duration::from_secs(5));
    }
}
