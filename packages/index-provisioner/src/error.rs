//! Error types for index-provisioner

use std::fmt;
use thiserror::Error;

use crate::config::ConfigError;
use crate::gateway::IndexState;
use crate::spec::SpecKey;

/// Status codes reported by the admin service
///
/// Mirrors the canonical RPC codes the remote service uses, trimmed to the
/// ones this crate distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// The index (or an equivalent one) already exists
    AlreadyExists,
    NotFound,
    InvalidArgument,
    FailedPrecondition,
    PermissionDenied,
    Unauthenticated,
    /// Quota or rate limit hit
    ResourceExhausted,
    /// Service temporarily unreachable
    Unavailable,
    DeadlineExceeded,
    Cancelled,
    Internal,
    /// Malformed or unexpected response payload
    Decode,
    Unknown,
}

impl StatusCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCode::AlreadyExists => "ALREADY_EXISTS",
            StatusCode::NotFound => "NOT_FOUND",
            StatusCode::InvalidArgument => "INVALID_ARGUMENT",
            StatusCode::FailedPrecondition => "FAILED_PRECONDITION",
            StatusCode::PermissionDenied => "PERMISSION_DENIED",
            StatusCode::Unauthenticated => "UNAUTHENTICATED",
            StatusCode::ResourceExhausted => "RESOURCE_EXHAUSTED",
            StatusCode::Unavailable => "UNAVAILABLE",
            StatusCode::DeadlineExceeded => "DEADLINE_EXCEEDED",
            StatusCode::Cancelled => "CANCELLED",
            StatusCode::Internal => "INTERNAL",
            StatusCode::Decode => "DECODE",
            StatusCode::Unknown => "UNKNOWN",
        }
    }

    /// Parse the textual status used in Google-style error bodies
    pub fn from_status_name(s: &str) -> Self {
        match s {
            "ALREADY_EXISTS" => StatusCode::AlreadyExists,
            "NOT_FOUND" => StatusCode::NotFound,
            "INVALID_ARGUMENT" => StatusCode::InvalidArgument,
            "FAILED_PRECONDITION" => StatusCode::FailedPrecondition,
            "PERMISSION_DENIED" => StatusCode::PermissionDenied,
            "UNAUTHENTICATED" => StatusCode::Unauthenticated,
            "RESOURCE_EXHAUSTED" => StatusCode::ResourceExhausted,
            "UNAVAILABLE" => StatusCode::Unavailable,
            "DEADLINE_EXCEEDED" => StatusCode::DeadlineExceeded,
            "CANCELLED" => StatusCode::Cancelled,
            "INTERNAL" => StatusCode::Internal,
            _ => StatusCode::Unknown,
        }
    }

    /// Map a numeric RPC code (as carried in operation error statuses)
    pub fn from_rpc_code(code: i32) -> Self {
        match code {
            1 => StatusCode::Cancelled,
            3 => StatusCode::InvalidArgument,
            4 => StatusCode::DeadlineExceeded,
            5 => StatusCode::NotFound,
            6 => StatusCode::AlreadyExists,
            7 => StatusCode::PermissionDenied,
            8 => StatusCode::ResourceExhausted,
            9 => StatusCode::FailedPrecondition,
            13 => StatusCode::Internal,
            14 => StatusCode::Unavailable,
            16 => StatusCode::Unauthenticated,
            _ => StatusCode::Unknown,
        }
    }

    /// Fallback mapping when only an HTTP status is available
    pub fn from_http_status(status: u16) -> Self {
        match status {
            400 => StatusCode::InvalidArgument,
            401 => StatusCode::Unauthenticated,
            403 => StatusCode::PermissionDenied,
            404 => StatusCode::NotFound,
            409 => StatusCode::AlreadyExists,
            429 => StatusCode::ResourceExhausted,
            499 => StatusCode::Cancelled,
            500 => StatusCode::Internal,
            503 => StatusCode::Unavailable,
            504 => StatusCode::DeadlineExceeded,
            _ => StatusCode::Unknown,
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned by an [`AdminGateway`](crate::gateway::AdminGateway) call
#[derive(Debug, Error)]
#[error("[{code}] {message}")]
pub struct GatewayError {
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    pub code: StatusCode,
    pub message: String,
}

impl GatewayError {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    // Convenience constructors
    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(StatusCode::AlreadyExists, message)
    }

    pub fn not_found(name: impl Into<String>) -> Self {
        Self::new(
            StatusCode::NotFound,
            format!("Index not found: {}", name.into()),
        )
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Unavailable, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Decode, message)
    }

    pub fn is_already_exists(&self) -> bool {
        self.code == StatusCode::AlreadyExists
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::decode(format!("JSON error: {}", err)).with_source(err)
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        let code = if err.is_timeout() {
            StatusCode::DeadlineExceeded
        } else if err.is_decode() {
            StatusCode::Decode
        } else if err.is_connect() || err.is_request() {
            StatusCode::Unavailable
        } else {
            StatusCode::Unknown
        };
        GatewayError::new(code, format!("HTTP error: {}", err)).with_source(err)
    }
}

/// Which part of a batch a cancellation interrupted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Submission,
    Reconciliation,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Submission => "submission",
            Phase::Reconciliation => "reconciliation",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub type Result<T> = std::result::Result<T, ProvisionError>;

/// Terminal outcome of a failed provisioning batch
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Invalid index spec: {0}")]
    InvalidSpec(String),

    #[error("Invalid collection scope '{path}': {reason}")]
    InvalidScope { path: String, reason: String },

    #[error("Index creation failed for spec {spec} ({fields}): {source}")]
    Submission {
        spec: SpecKey,
        fields: String,
        #[source]
        source: GatewayError,
    },

    #[error("Malformed operation for spec {spec}: {reason}")]
    MalformedOperation { spec: SpecKey, reason: String },

    #[error("Index {index} for spec {spec} reached terminal state {state}")]
    TerminalState {
        spec: SpecKey,
        index: String,
        state: IndexState,
    },

    #[error("Cancelled during {phase}")]
    Cancelled { phase: Phase },

    #[error("Gave up after {rounds} poll rounds with {pending} indexes still pending")]
    RoundsExhausted { rounds: u32, pending: usize },

    #[error("Deadline of {deadline_secs}s exceeded with {pending} indexes still pending")]
    DeadlineExceeded { deadline_secs: u64, pending: usize },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ProvisionError {
    pub fn invalid_spec<E: fmt::Display>(e: E) -> Self {
        Self::InvalidSpec(e.to_string())
    }

    /// The spec that triggered the failure, where one did
    pub fn spec(&self) -> Option<SpecKey> {
        match self {
            ProvisionError::Submission { spec, .. }
            | ProvisionError::MalformedOperation { spec, .. }
            | ProvisionError::TerminalState { spec, .. } => Some(*spec),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_gateway_error_display() {
        let err = GatewayError::already_exists("index already exists");
        assert_eq!(err.to_string(), "[ALREADY_EXISTS] index already exists");
        assert!(err.is_already_exists());
        assert!(err.source.is_none());
    }

    #[test]
    fn test_gateway_error_with_source() {
        use std::io;

        let io_err = io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused");
        let err = GatewayError::unavailable("admin endpoint down").with_source(io_err);

        assert_eq!(err.code, StatusCode::Unavailable);
        let source = err.source().unwrap();
        assert!(source.to_string().contains("connection refused"));
    }

    #[test]
    fn test_status_code_mappings() {
        assert_eq!(
            StatusCode::from_status_name("ALREADY_EXISTS"),
            StatusCode::AlreadyExists
        );
        assert_eq!(StatusCode::from_status_name("SOMETHING"), StatusCode::Unknown);
        assert_eq!(StatusCode::from_rpc_code(6), StatusCode::AlreadyExists);
        assert_eq!(StatusCode::from_http_status(409), StatusCode::AlreadyExists);
        assert_eq!(StatusCode::from_http_status(429), StatusCode::ResourceExhausted);
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json")
            .err()
            .unwrap();
        let err: GatewayError = json_err.into();
        assert_eq!(err.code, StatusCode::Decode);
        assert!(err.message.contains("JSON error"));
    }

    #[test]
    fn test_provision_error_identifies_spec() {
        let err = ProvisionError::Submission {
            spec: SpecKey(1),
            fields: "name ASC, employer ASC".to_string(),
            source: GatewayError::new(StatusCode::PermissionDenied, "denied"),
        };
        assert_eq!(err.spec(), Some(SpecKey(1)));
        assert!(err.to_string().contains("spec #1"));
        assert!(err.to_string().contains("PERMISSION_DENIED"));

        let cancelled = ProvisionError::Cancelled {
            phase: Phase::Reconciliation,
        };
        assert_eq!(cancelled.spec(), None);
        assert_eq!(cancelled.to_string(), "Cancelled during reconciliation");
    }
}
