//! Custom error types for Picsou
//!
//! This module defines the error hierarchy for the application using thiserror
//! for ergonomic error definitions.

use thiserror::Error;

/// The main error type for Picsou operations
#[derive(Error, Debug)]
pub enum PicsouError {
    /// A sibling entity already uses this name
    #[error("{entity_type} already exists: {name}")]
    DuplicateName {
        entity_type: &'static str,
        name: String,
    },

    /// Entity not found errors
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    /// Mutation attempted on an archived account
    #[error("Cannot modify an archived account: {0}")]
    Archived(String),

    /// Wrong password or a wrapped key that does not authenticate
    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    /// Malformed wrapped blob or JSON violating the key-set contract
    #[error("Corrupt data: {0}")]
    CorruptData(String),

    /// A cryptographic primitive could not be initialized
    #[error("Crypto primitive unavailable: {0}")]
    CryptoUnavailable(String),

    /// The secure random source failed
    #[error("Random source failure: {0}")]
    RandomSourceFailure(String),

    /// The user's protected subtree has not been unlocked
    #[error("User is locked: {0}")]
    Locked(String),

    /// Validation errors for data models
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// Storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Import errors
    #[error("Import error: {0}")]
    Import(String),

    /// Export errors
    #[error("Export error: {0}")]
    Export(String),
}

impl PicsouError {
    /// Create a "duplicate name" error
    pub fn duplicate(entity_type: &'static str, name: impl Into<String>) -> Self {
        Self::DuplicateName {
            entity_type,
            name: name.into(),
        }
    }

    /// Create a "not found" error for users
    pub fn user_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "User",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for budgets
    pub fn budget_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Budget",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for accounts
    pub fn account_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Account",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for payment methods
    pub fn payment_method_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Payment method",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for operations
    pub fn operation_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Operation",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for scheduled operations
    pub fn scheduled_operation_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Scheduled operation",
            identifier: identifier.into(),
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a "duplicate name" error
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateName { .. })
    }

    /// Check if this is a credential error
    pub fn is_invalid_credential(&self) -> bool {
        matches!(self, Self::InvalidCredential(_))
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<std::io::Error> for PicsouError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for PicsouError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Result type alias for Picsou operations
pub type PicsouResult<T> = Result<T, PicsouError>;
