//! Admin service port
//!
//! The only boundary of the provisioning core. Two capabilities:
//!
//! - `create_index`: submit a composite index, get back a long-running operation
//! - `get_index`: read the current state of an index by resource name
//!
//! Adapters:
//!
//! - [`RestAdminGateway`]: HTTP/JSON against the admin REST surface (or an emulator)
//! - [`InMemoryAdminGateway`]: scripted in-process double

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{GatewayError, StatusCode};
use crate::spec::{CollectionScope, IndexField, IndexSpec, QueryScope};

pub mod memory;
pub mod rest;

pub use memory::InMemoryAdminGateway;
pub use rest::RestAdminGateway;

/// Index lifecycle state as reported by the admin service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexState {
    Unspecified,
    Creating,
    Ready,
    NeedsRepair,
    Error,
}

impl IndexState {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexState::Unspecified => "STATE_UNSPECIFIED",
            IndexState::Creating => "CREATING",
            IndexState::Ready => "READY",
            IndexState::NeedsRepair => "NEEDS_REPAIR",
            IndexState::Error => "ERROR",
        }
    }

    /// Unknown names map to `Unspecified`, which keeps the index pending
    pub fn from_wire(s: &str) -> Self {
        match s {
            "CREATING" => IndexState::Creating,
            "READY" => IndexState::Ready,
            "NEEDS_REPAIR" => IndexState::NeedsRepair,
            "ERROR" => IndexState::Error,
            _ => IndexState::Unspecified,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            IndexState::Ready | IndexState::NeedsRepair | IndexState::Error
        )
    }

    /// Terminal but not usable for queries
    pub fn is_failure(&self) -> bool {
        self.is_terminal() && *self != IndexState::Ready
    }
}

impl fmt::Display for IndexState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Index definition sent with a create request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexDefinition {
    pub query_scope: QueryScope,
    pub fields: Vec<IndexField>,
}

impl From<&IndexSpec> for IndexDefinition {
    fn from(spec: &IndexSpec) -> Self {
        Self {
            query_scope: spec.query_scope(),
            fields: spec.fields().to_vec(),
        }
    }
}

/// Error status attached to a finished operation
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct OperationStatus {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

impl From<OperationStatus> for GatewayError {
    fn from(status: OperationStatus) -> Self {
        GatewayError::new(StatusCode::from_rpc_code(status.code), status.message)
    }
}

/// Long-running operation handle returned by `create_index`
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Operation {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub done: bool,
    /// Opaque payload; decode with [`Operation::index_metadata`]
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<OperationStatus>,
}

impl Operation {
    /// Decode the index-creation metadata carried by this operation
    pub fn index_metadata(&self) -> Result<IndexOperationMetadata, GatewayError> {
        let payload = self.metadata.as_ref().ok_or_else(|| {
            GatewayError::decode(format!("operation '{}' carries no metadata", self.name))
        })?;
        let meta: IndexOperationMetadata = serde_json::from_value(payload.clone())?;
        if meta.index.is_empty() {
            return Err(GatewayError::decode(format!(
                "operation '{}' metadata names no index",
                self.name
            )));
        }
        Ok(meta)
    }
}

/// Metadata of an index-creation operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexOperationMetadata {
    /// Resource name of the index being built
    #[serde(default)]
    pub index: String,
    /// Operation progress state (`INITIALIZING`, `PROCESSING`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

/// Result of `get_index`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexStatus {
    pub name: String,
    pub state: IndexState,
}

/// Admin service capability surface
#[async_trait]
pub trait AdminGateway: Send + Sync {
    /// Submit a composite index under `parent`
    ///
    /// Fails with [`StatusCode::AlreadyExists`] when an equivalent index exists.
    async fn create_index(
        &self,
        parent: &CollectionScope,
        index: &IndexDefinition,
    ) -> Result<Operation, GatewayError>;

    /// Fetch the current state of an index by resource name
    async fn get_index(&self, name: &str) -> Result<IndexStatus, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_index_state_terminality() {
        assert!(!IndexState::Creating.is_terminal());
        assert!(!IndexState::Unspecified.is_terminal());
        assert!(IndexState::Ready.is_terminal());
        assert!(!IndexState::Ready.is_failure());
        assert!(IndexState::NeedsRepair.is_failure());
        assert!(IndexState::Error.is_failure());
        assert_eq!(IndexState::from_wire("BOGUS"), IndexState::Unspecified);
    }

    #[test]
    fn test_decode_operation_metadata() {
        let op: Operation = serde_json::from_value(json!({
            "name": "projects/p/databases/(default)/operations/op-1",
            "metadata": {
                "@type": "type.googleapis.com/google.firestore.admin.v1.IndexOperationMetadata",
                "index": "projects/p/databases/(default)/collectionGroups/people/indexes/idx-1",
                "state": "INITIALIZING",
                "startTime": "2024-01-01T00:00:00Z"
            }
        }))
        .unwrap();

        assert!(!op.done);
        let meta = op.index_metadata().unwrap();
        assert_eq!(
            meta.index,
            "projects/p/databases/(default)/collectionGroups/people/indexes/idx-1"
        );
        assert_eq!(meta.state.as_deref(), Some("INITIALIZING"));
    }

    #[test]
    fn test_decode_operation_without_metadata() {
        let op = Operation {
            name: "op-2".to_string(),
            ..Default::default()
        };
        let err = op.index_metadata().unwrap_err();
        assert_eq!(err.code, StatusCode::Decode);

        let op = Operation {
            name: "op-3".to_string(),
            metadata: Some(json!({"state": "PROCESSING"})),
            ..Default::default()
        };
        assert!(op.index_metadata().is_err());
    }

    #[test]
    fn test_operation_status_into_gateway_error() {
        let err: GatewayError = OperationStatus {
            code: 9,
            message: "index build aborted".to_string(),
        }
        .into();
        assert_eq!(err.code, StatusCode::FailedPrecondition);
    }
}
