//! Error Types for the FunPDBe API
//!
//! - `ErrorCode` names each failure and fixes its HTTP status
//! - `ApiError` is the JSON body every failing handler returns
//! - Domain errors from funpdbe-core convert into `ApiError`
//!
//! Malformed or mismatched input is 400, missing permission is 403,
//! bad credentials are 401 and an empty lookup is 404.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use funpdbe_core::{ConfigError, DepositionError, FunpdbeError, StorageError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Authentication Errors (401, 403)
    // ========================================================================
    /// Credentials were presented but could not be verified
    Unauthorized,

    /// Bearer token is malformed or carries a bad signature
    InvalidToken,

    /// Bearer token has expired
    TokenExpired,

    /// Caller is not a member of the group named after the resource
    NoPermission,

    // ========================================================================
    // Validation Errors (400)
    // ========================================================================
    /// PDB id does not match digit, letter, two alphanumerics
    InvalidPdbPattern,

    /// Resource is not on the whitelist
    InvalidResource,

    /// Payload has no `data_resource`
    MissingResourceField,

    /// Payload `data_resource` differs from the path resource
    ResourceMismatch,

    /// Payload `pdb_id` differs from the path PDB id
    PdbMismatch,

    /// An entry for this (pdb_id, data_resource) already exists
    DuplicateEntry,

    /// Payload is not a well-formed entry document
    MalformedDocument,

    /// Request is invalid for another reason
    InvalidInput,

    // ========================================================================
    // Not Found Errors (404)
    // ========================================================================
    /// Valid query with an empty result, or nothing to delete or replace
    NoEntries,

    /// Requested entity does not exist
    EntityNotFound,

    // ========================================================================
    // Server Errors (500, 503)
    // ========================================================================
    /// Internal server error
    InternalError,

    /// Database operation failed
    DatabaseError,

    /// Service is temporarily unavailable
    ServiceUnavailable,

    /// Database connection pool exhausted
    ConnectionPoolExhausted,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::Unauthorized | ErrorCode::InvalidToken | ErrorCode::TokenExpired => {
                StatusCode::UNAUTHORIZED
            }

            ErrorCode::NoPermission => StatusCode::FORBIDDEN,

            ErrorCode::InvalidPdbPattern
            | ErrorCode::InvalidResource
            | ErrorCode::MissingResourceField
            | ErrorCode::ResourceMismatch
            | ErrorCode::PdbMismatch
            | ErrorCode::DuplicateEntry
            | ErrorCode::MalformedDocument
            | ErrorCode::InvalidInput => StatusCode::BAD_REQUEST,

            ErrorCode::NoEntries | ErrorCode::EntityNotFound => StatusCode::NOT_FOUND,

            ErrorCode::ServiceUnavailable | ErrorCode::ConnectionPoolExhausted => {
                StatusCode::SERVICE_UNAVAILABLE
            }

            ErrorCode::InternalError | ErrorCode::DatabaseError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::Unauthorized => "Invalid credentials",
            ErrorCode::InvalidToken => "Invalid authentication token",
            ErrorCode::TokenExpired => "Authentication token has expired",
            ErrorCode::NoPermission => "No permission to modify this resource",

            ErrorCode::InvalidPdbPattern => "Invalid PDB identifier",
            ErrorCode::InvalidResource => "Invalid data resource",
            ErrorCode::MissingResourceField => "Payload does not declare a data_resource",
            ErrorCode::ResourceMismatch => "Payload resource does not match the path",
            ErrorCode::PdbMismatch => "Payload PDB id does not match the path",
            ErrorCode::DuplicateEntry => "Entry already exists",
            ErrorCode::MalformedDocument => "Malformed entry document",
            ErrorCode::InvalidInput => "Invalid input data",

            ErrorCode::NoEntries => "No entries found",
            ErrorCode::EntityNotFound => "Entity not found",

            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database operation failed",
            ErrorCode::ServiceUnavailable => "Service temporarily unavailable",
            ErrorCode::ConnectionPoolExhausted => "Connection pool exhausted",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response for API operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Offending values, when there are any
    #[serde(skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors
    // ========================================================================

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidToken, message)
    }

    pub fn token_expired() -> Self {
        Self::from_code(ErrorCode::TokenExpired)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn entity_not_found(entity_type: &str, id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::EntityNotFound,
            format!("{} {} not found", entity_type, id),
        )
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn database_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }

    pub fn connection_pool_exhausted() -> Self {
        Self::from_code(ErrorCode::ConnectionPoolExhausted)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(self)).into_response()
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

impl From<DepositionError> for ApiError {
    fn from(err: DepositionError) -> Self {
        let message = err.to_string();
        match err {
            DepositionError::InvalidPdbPattern { pdb_id } => {
                Self::new(ErrorCode::InvalidPdbPattern, message)
                    .with_details(json!({ "pdb_id": pdb_id }))
            }
            DepositionError::InvalidResource { resource } => {
                Self::new(ErrorCode::InvalidResource, message)
                    .with_details(json!({ "resource": resource }))
            }
            DepositionError::MissingResourceField => {
                Self::new(ErrorCode::MissingResourceField, message)
            }
            DepositionError::ResourceMismatch { path, payload } => {
                Self::new(ErrorCode::ResourceMismatch, message)
                    .with_details(json!({ "path": path, "payload": payload }))
            }
            DepositionError::PdbMismatch { path, payload } => {
                Self::new(ErrorCode::PdbMismatch, message)
                    .with_details(json!({ "path": path, "payload": payload }))
            }
            DepositionError::NoPermission { resource, .. } => {
                Self::new(ErrorCode::NoPermission, message)
                    .with_details(json!({ "resource": resource }))
            }
            DepositionError::NoEntries { .. } => Self::new(ErrorCode::NoEntries, message),
            DepositionError::DuplicateEntry { resource, pdb_id } => {
                Self::new(ErrorCode::DuplicateEntry, message)
                    .with_details(json!({ "resource": resource, "pdb_id": pdb_id }))
            }
            DepositionError::MalformedDocument { .. } => {
                Self::new(ErrorCode::MalformedDocument, message)
            }
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        tracing::error!(error = %err, "Storage error");
        match err {
            StorageError::Unavailable { .. } => {
                ApiError::service_unavailable("Storage is unavailable")
            }
            StorageError::QueryFailed { .. } | StorageError::TransactionFailed { .. } => {
                ApiError::database_error("Database operation failed")
            }
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        tracing::error!(error = %err, "Configuration error");
        ApiError::internal_error("Server misconfigured")
    }
}

impl From<FunpdbeError> for ApiError {
    fn from(err: FunpdbeError) -> Self {
        match err {
            FunpdbeError::Deposition(e) => e.into(),
            FunpdbeError::Storage(e) => e.into(),
            FunpdbeError::Config(e) => e.into(),
        }
    }
}

/// Driver errors are logged in full and reported generically.
impl From<tokio_postgres::Error> for ApiError {
    fn from(err: tokio_postgres::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        ApiError::database_error("Database operation failed")
    }
}

impl From<deadpool_postgres::PoolError> for ApiError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        tracing::error!("Connection pool error: {:?}", err);

        match err {
            deadpool_postgres::PoolError::Timeout(_) => ApiError::connection_pool_exhausted(),
            deadpool_postgres::PoolError::Closed => {
                ApiError::service_unavailable("Database connection pool is closed")
            }
            _ => ApiError::database_error("Failed to acquire database connection"),
        }
    }
}

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;
