//! User-visible sync status
//!
//! Derived, never stored: the coordinator rebuilds it on every transition.

use mealbook_store_client::StoreError;
use serde::Serialize;
use serde_json::json;

/// Coarse synchronization state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    /// A group code is set and bootstrap has not completed
    Connecting,
    /// Group resolved, document pulled at least once, resync active
    Ready,
    /// No group code; working from the local copy only
    Waiting,
    /// A remote operation failed; local state left untouched
    Error,
}

/// Status surfaced to the UI layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncStatus {
    pub state: SyncState,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl SyncStatus {
    pub fn waiting() -> Self {
        Self {
            state: SyncState::Waiting,
            message: "No group code set. Changes stay on this device.".into(),
            details: None,
        }
    }

    pub fn connecting() -> Self {
        Self {
            state: SyncState::Connecting,
            message: "Connecting to the shared catalog...".into(),
            details: None,
        }
    }

    pub fn ready() -> Self {
        Self {
            state: SyncState::Ready,
            message: "Catalog synced.".into(),
            details: None,
        }
    }

    /// Build an error status, distinguishing missing-schema/access problems
    /// from generic failures
    pub fn from_store_error(err: &StoreError) -> Self {
        let message = if err.is_schema_or_access() {
            "Store tables are missing or access was denied. Check the store setup.".to_string()
        } else if err.is_network() {
            "Could not reach the shared catalog. Changes stay on this device until it is back."
                .to_string()
        } else {
            format!("Sync failed: {err}")
        };

        Self {
            state: SyncState::Error,
            message,
            details: Some(json!({
                "error": err.to_string(),
                "network": err.is_network(),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_errors_get_a_specific_message() {
        let err = StoreError::Api {
            status: 404,
            code: Some("42P01".into()),
            message: "relation \"groups\" does not exist".into(),
        };
        let status = SyncStatus::from_store_error(&err);
        assert_eq!(status.state, SyncState::Error);
        assert!(status.message.contains("missing"));
    }

    #[test]
    fn network_errors_are_flagged_in_details() {
        let status = SyncStatus::from_store_error(&StoreError::Timeout(10));
        assert_eq!(status.details.unwrap()["network"], true);
    }
}
