//! Error types for FunPDBe deposition operations

use thiserror::Error;

/// Failures of the deposition pipeline: validation, authorization, lookup and
/// uniqueness. Every variant is detected before, or rolled back together
/// with, any storage mutation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DepositionError {
    #[error("Invalid PDB identifier: {pdb_id:?}")]
    InvalidPdbPattern { pdb_id: String },

    #[error("Invalid data resource: {resource:?}")]
    InvalidResource { resource: String },

    #[error("Payload does not declare a data_resource")]
    MissingResourceField,

    #[error("Resource mismatch: path names {path:?} but payload declares {payload:?}")]
    ResourceMismatch { path: String, payload: String },

    #[error("PDB id mismatch: path names {path:?} but payload declares {payload:?}")]
    PdbMismatch { path: String, payload: String },

    #[error("{} has no permission to modify {resource:?}", principal_label(.principal))]
    NoPermission {
        principal: Option<String>,
        resource: String,
    },

    #[error("No entries found{}", lookup_scope(.resource, .pdb_id))]
    NoEntries {
        resource: Option<String>,
        pdb_id: Option<String>,
    },

    #[error("Entry with PDB id {pdb_id:?} from {resource:?} already exists")]
    DuplicateEntry { resource: String, pdb_id: String },

    #[error("Malformed document: {reason}")]
    MalformedDocument { reason: String },
}

fn principal_label(principal: &Option<String>) -> String {
    match principal {
        Some(p) => format!("User {:?}", p),
        None => "Anonymous user".to_string(),
    }
}

fn lookup_scope(resource: &Option<String>, pdb_id: &Option<String>) -> String {
    match (resource, pdb_id) {
        (Some(r), Some(p)) => format!(" for {} in {}", p, r),
        (Some(r), None) => format!(" in {}", r),
        (None, Some(p)) => format!(" for {}", p),
        (None, None) => String::new(),
    }
}

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Storage unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Query failed: {reason}")]
    QueryFailed { reason: String },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all FunPDBe errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FunpdbeError {
    #[error("Deposition error: {0}")]
    Deposition(#[from] DepositionError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl FunpdbeError {
    /// The deposition failure behind this error, if it is one.
    pub fn as_deposition(&self) -> Option<&DepositionError> {
        match self {
            FunpdbeError::Deposition(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type alias for FunPDBe operations.
pub type FunpdbeResult<T> = Result<T, FunpdbeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_entries_display_scopes() {
        let err = DepositionError::NoEntries {
            resource: Some("funsites".to_string()),
            pdb_id: Some("2abc".to_string()),
        };
        assert_eq!(err.to_string(), "No entries found for 2abc in funsites");

        let err = DepositionError::NoEntries {
            resource: None,
            pdb_id: None,
        };
        assert_eq!(err.to_string(), "No entries found");
    }

    #[test]
    fn test_no_permission_display_anonymous() {
        let err = DepositionError::NoPermission {
            principal: None,
            resource: "nod".to_string(),
        };
        assert!(err.to_string().starts_with("Anonymous user"));
    }

    #[test]
    fn test_master_error_from_deposition() {
        let err: FunpdbeError = DepositionError::MissingResourceField.into();
        assert_eq!(
            err.as_deposition(),
            Some(&DepositionError::MissingResourceField)
        );
        assert!(err.to_string().contains("data_resource"));
    }
}
