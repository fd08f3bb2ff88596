//! Error types for the validation engine
//!
//! Errors never escape the orchestrator as a failed validation call: they are
//! converted into error outcomes at the boundary. These types exist for the
//! administrative surface (rule management, alerts, config loading) and for
//! the storage collaborators.

use thiserror::Error;

/// Main error type for engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    /// Unknown domain, rule or alert
    #[error("Not found: {0}")]
    NotFound(String),

    /// An active rule with the same name already exists in the domain
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Rule definition is malformed
    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    /// Invalid caller input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Backing store failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Operation exceeded its time budget
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// File access or I/O error
    #[error("File error: {0}")]
    File(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        EngineError::NotFound(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        EngineError::InvalidInput(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        EngineError::Config(msg.into())
    }

    /// Check if this is a user-facing error (vs internal)
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            EngineError::NotFound(_)
                | EngineError::Conflict(_)
                | EngineError::InvalidRule(_)
                | EngineError::InvalidInput(_)
                | EngineError::Config(_)
                | EngineError::File(_)
        )
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::File(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(format!("JSON error: {}", err))
    }
}

impl From<serde_yaml::Error> for EngineError {
    fn from(err: serde_yaml::Error) -> Self {
        EngineError::Serialization(format!("YAML error: {}", err))
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(err: toml::de::Error) -> Self {
        EngineError::Serialization(format!("TOML error: {}", err))
    }
}

impl From<prometheus::Error> for EngineError {
    fn from(err: prometheus::Error) -> Self {
        EngineError::Internal(format!("Metrics error: {}", err))
    }
}

/// Errors raised by storage collaborators
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store timeout: {0}")]
    Timeout(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Store conflict: {0}")]
    Conflict(String),

    #[error("Store serialization error: {0}")]
    Serialization(String),

    #[error("HTTP error: {0}")]
    Http(String),
}

impl StoreError {
    /// Errors worth retrying
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Unavailable(_) | StoreError::Timeout(_) | StoreError::Http(_)
        )
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Result type alias for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::NotFound("domain 'invoice'".to_string());
        assert_eq!(err.to_string(), "Not found: domain 'invoice'");
    }

    #[test]
    fn test_is_user_error() {
        assert!(EngineError::invalid_input("test").is_user_error());
        assert!(EngineError::Conflict("test".to_string()).is_user_error());
        assert!(!EngineError::Internal("test".to_string()).is_user_error());
        assert!(!EngineError::Store(StoreError::Timeout("slow".to_string())).is_user_error());
    }

    #[test]
    fn test_store_error_conversion() {
        let err: EngineError = StoreError::Unavailable("down".to_string()).into();
        assert!(matches!(err, EngineError::Store(StoreError::Unavailable(_))));
    }

    #[test]
    fn test_transient_store_errors() {
        assert!(StoreError::Timeout("t".to_string()).is_transient());
        assert!(!StoreError::Conflict("c".to_string()).is_transient());
    }
}
