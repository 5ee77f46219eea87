//! # Client Error Types
//!
//! Error types for storefront client operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Client Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │    ApiError     │  │   ConfigError   │  │     StorageError        │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  NetworkFailure │  │  LoadFailed     │  │  Io                     │ │
//! │  │  Unauthorized   │  │  SaveFailed     │  │  Serialization          │ │
//! │  │  ServerRejected │  │  Invalid        │  │  Unavailable            │ │
//! │  │  Validation     │  │                 │  │                         │ │
//! │  │  Cart           │  │                 │  │                         │ │
//! │  │  Decode         │  │                 │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Display Is the Toast
//! `ApiError`'s `Display` output is what the user reads: a retry hint for
//! network failures, the server's own message when it sent one, and a
//! generic fallback otherwise. Transport detail goes to the logs only.

use peelo_core::{CoreError, ValidationError};
use serde_json::Value;
use thiserror::Error;

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type alias for persisted-state operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type for opening a storefront.
pub type StartupResult<T> = Result<T, StartupError>;

/// Shown when the server rejected a request without a readable message.
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong. Please try again.";

/// Shown for every transport-level failure.
pub const NETWORK_FAILURE_MESSAGE: &str =
    "Unable to reach the server. Please check your connection and try again.";

/// Shown when a session is rejected and has been discarded.
pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please log in again.";

/// Body fields the API uses for human-readable error text, in priority order.
const MESSAGE_FIELDS: [&str; 3] = ["message", "detail", "error"];

// =============================================================================
// API Error
// =============================================================================

/// Every expected way a store operation can fail.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// No response: connection refused, DNS failure, timeout.
    #[error("Unable to reach the server. Please check your connection and try again.")]
    NetworkFailure { detail: String },

    /// The server rejected the credential (HTTP 401).
    ///
    /// By the time a caller sees this the session has already been cleared.
    #[error("{message}")]
    Unauthorized { message: String },

    /// Any other non-2xx response.
    #[error("{message}")]
    ServerRejected { status: u16, message: String },

    /// Client-side validation failed; no request was sent.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// A cart rule refused the change.
    #[error("{0}")]
    Cart(CoreError),

    /// A 2xx body that does not match the expected shape.
    #[error("Unexpected response from server: {0}")]
    Decode(String),
}

/// Coarse classification pages branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    NetworkFailure,
    Unauthorized,
    ServerRejected,
    ValidationFailure,
    Decode,
}

impl ApiError {
    pub fn kind(&self) -> ApiErrorKind {
        match self {
            ApiError::NetworkFailure { .. } => ApiErrorKind::NetworkFailure,
            ApiError::Unauthorized { .. } => ApiErrorKind::Unauthorized,
            ApiError::ServerRejected { .. } => ApiErrorKind::ServerRejected,
            ApiError::Validation(_) | ApiError::Cart(_) => ApiErrorKind::ValidationFailure,
            ApiError::Decode(_) => ApiErrorKind::Decode,
        }
    }

    /// Returns true if retrying the same request later could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::NetworkFailure { .. } => true,
            ApiError::ServerRejected { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Text shown to the user in a toast.
    pub fn user_message(&self) -> String {
        self.to_string()
    }

    /// Builds the error for a non-2xx response.
    pub fn from_response(status: u16, body: &Value) -> Self {
        let message = server_message(body);
        if status == 401 {
            ApiError::Unauthorized {
                message: message.unwrap_or_else(|| SESSION_EXPIRED_MESSAGE.to_string()),
            }
        } else {
            ApiError::ServerRejected {
                status,
                message: message.unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string()),
            }
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(v) => ApiError::Validation(v),
            other => ApiError::Cart(other),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::NetworkFailure {
                detail: err.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err.to_string())
    }
}

/// Extracts the first non-empty known message field from an error body.
///
/// DRF field errors (`{"email": ["Enter a valid email."]}`) carry no known
/// field and fall back to the generic message.
pub fn server_message(body: &Value) -> Option<String> {
    MESSAGE_FIELDS.iter().find_map(|field| match body.get(field)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Array(items) => items
            .iter()
            .find_map(|item| item.as_str().filter(|s| !s.trim().is_empty()))
            .map(str::to_string),
        _ => None,
    })
}

// =============================================================================
// Config Error
// =============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read or parse the config file.
    #[error("Failed to load config: {0}")]
    LoadFailed(String),

    /// Failed to write the config file.
    #[error("Failed to save config: {0}")]
    SaveFailed(String),

    /// The merged configuration is unusable.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::LoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::LoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(err: toml::ser::Error) -> Self {
        ConfigError::SaveFailed(err.to_string())
    }
}

impl From<url::ParseError> for ConfigError {
    fn from(err: url::ParseError) -> Self {
        ConfigError::Invalid(err.to_string())
    }
}

// =============================================================================
// Startup Error
// =============================================================================

/// Failures opening a storefront on the local machine.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

// =============================================================================
// Storage Error
// =============================================================================

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored value for {key} is corrupt: {reason}")]
    Serialization { key: String, reason: String },

    /// No platform data directory could be resolved.
    #[error("No storage directory available")]
    Unavailable,
}
