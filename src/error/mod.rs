//! Error types for the mapping and query-construction layer

use thiserror::Error;

/// Result type alias for mapper operations
pub type Result<T> = std::result::Result<T, MapperError>;

/// Backend message fragment that marks a recoverable load failure
pub const COLLECTION_NOT_LOADED: &str = "collection not loaded";

/// Main error type for the mapper
///
/// Errors are `Clone` so a builder can record the first validation
/// failure and keep returning it from `build()` without being consumed.
#[derive(Error, Debug, Clone)]
pub enum MapperError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Domain error: {0}")]
    Domain(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

impl MapperError {
    /// Whether this is the one backend failure the retry coordinator
    /// recovers from automatically.
    pub fn is_collection_not_loaded(&self) -> bool {
        matches!(self, MapperError::Backend(msg) if msg.contains(COLLECTION_NOT_LOADED))
    }
}

impl From<config::ConfigError> for MapperError {
    fn from(err: config::ConfigError) -> Self {
        MapperError::Configuration(err.to_string())
    }
}

impl From<serde_json::Error> for MapperError {
    fn from(err: serde_json::Error) -> Self {
        MapperError::Schema(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_loaded_recognition() {
        let transient = MapperError::Backend("rpc failed: collection not loaded yet".to_string());
        assert!(transient.is_collection_not_loaded());

        let fatal = MapperError::Backend("permission denied".to_string());
        assert!(!fatal.is_collection_not_loaded());

        let validation = MapperError::Validation("collection not loaded".to_string());
        assert!(!validation.is_collection_not_loaded());
    }
}
