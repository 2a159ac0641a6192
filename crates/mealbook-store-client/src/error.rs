//! Error types for the store client

use thiserror::Error;

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Store client error
///
/// Splits into two classes the coordinator treats differently:
/// network-layer failures (`Network`, `Timeout`) and application-layer
/// failures (`Api`, `Decode`).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Transport-layer failure (DNS, connection reset, TLS)
    #[error("network error: {0}")]
    Network(String),

    /// Request exceeded the configured timeout and was aborted
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// Store returned a non-2xx response with a structured body
    #[error("store error {status}: {message}")]
    Api {
        status: u16,
        /// Machine code from the response body, when present (e.g. "23505")
        code: Option<String>,
        message: String,
    },

    /// Response body could not be decoded
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Network(err.to_string())
    }
}

impl StoreError {
    /// Whether this is a network-layer failure (retryable by nature)
    pub fn is_network(&self) -> bool {
        matches!(self, StoreError::Network(_) | StoreError::Timeout(_))
    }

    /// Whether this error marks a unique-key violation.
    ///
    /// Create-group races resolve by treating this as "already exists,
    /// fetch instead" rather than as fatal.
    pub fn is_duplicate(&self) -> bool {
        match self {
            StoreError::Api { status, code, .. } => {
                *status == 409 || code.as_deref() == Some("23505")
            }
            _ => false,
        }
    }

    /// Whether this error points at missing tables or denied access,
    /// as opposed to a generic failure
    pub fn is_schema_or_access(&self) -> bool {
        match self {
            StoreError::Api { status, code, .. } => {
                matches!(status, 401 | 403 | 404) || code.as_deref() == Some("42P01")
            }
            _ => false,
        }
    }
}
