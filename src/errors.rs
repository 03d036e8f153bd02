//! Error types for the daily run service
//!
//! One root error for every service operation, with the storage and
//! configuration layers carrying their own detail.

use thiserror::Error;

/// Root error type for all service operations
#[derive(Debug, Error)]
pub enum ArcadeError {
    /// No valid caller identity was supplied
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The run does not exist or belongs to another player
    #[error("Run {0} not found")]
    RunNotFound(String),

    /// The run was already verified and is immutable
    #[error("Run {0} has already been finalized")]
    RunAlreadyFinalized(String),

    /// Missing or malformed request fields
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Game identifier with no simulator behind it
    #[error("Unknown game: {0}")]
    UnknownGame(String),

    /// A day's seed stays secret until the day is over
    #[error("Seed for {game} on {date} cannot be revealed before the day is over")]
    SeedNotRevealable { game: String, date: String },

    /// Persistence layer errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

/// Storage system errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database open failed: {0}")]
    OpenFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Corrupted data: {0}")]
    CorruptedData(String),

    #[error("Transaction aborted after {attempts} conflicting attempts")]
    Contention { attempts: u32 },

    #[error("Storage call exceeded {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

/// Configuration and validation errors
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Missing required field: {0}")]
    MissingRequired(String),

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),
}

impl ArcadeError {
    /// Whether the caller may retry the same request unchanged
    pub fn is_retryable(&self) -> bool {
        match self {
            ArcadeError::Storage(e) => matches!(
                e,
                StorageError::Contention { .. }
                    | StorageError::Timeout { .. }
                    | StorageError::ReadFailed(_)
                    | StorageError::WriteFailed(_)
            ),
            _ => false,
        }
    }

    /// Short machine-readable label, used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            ArcadeError::Unauthorized(_) => "unauthorized",
            ArcadeError::RunNotFound(_) => "run_not_found",
            ArcadeError::RunAlreadyFinalized(_) => "run_already_finalized",
            ArcadeError::InvalidInput(_) => "invalid_input",
            ArcadeError::UnknownGame(_) => "unknown_game",
            ArcadeError::SeedNotRevealable { .. } => "seed_not_revealable",
            ArcadeError::Storage(_) => "storage",
            ArcadeError::Configuration(_) => "configuration",
        }
    }
}

// External error conversions
impl From<toml::de::Error> for ConfigurationError {
    fn from(e: toml::de::Error) -> Self {
        ConfigurationError::LoadFailed(e.to_string())
    }
}

// Convenience type alias for Results
pub type ArcadeResult<T> = Result<T, ArcadeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;

    #[test]
    fn test_error_display() {
        let config_error = ConfigurationError::ValidationFailed("test".to_string());
        let error = ArcadeError::Configuration(config_error);

        assert!(error.to_string().contains("Configuration error"));
        assert!(error.to_string().contains("test"));
    }

    #[test]
    fn test_invalid_value_details() {
        let error = ConfigurationError::InvalidValue {
            field: "fairness.timezone".to_string(),
            value: "Mars/Olympus".to_string(),
            reason: "unknown zone".to_string(),
        };

        assert!(error.to_string().contains("fairness.timezone"));
        assert!(error.to_string().contains("Mars/Olympus"));
    }

    #[test]
    fn test_error_conversion() {
        let error: ArcadeError = StorageError::Contention { attempts: 8 }.into();

        match error {
            ArcadeError::Storage(StorageError::Contention { attempts }) => assert_eq!(attempts, 8),
            _ => panic!("Expected storage contention error"),
        }
    }

    #[test]
    fn test_error_source() {
        let error = ArcadeError::Storage(StorageError::ReadFailed("disk".to_string()));
        assert!(error.source().is_some());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ArcadeError::Storage(StorageError::Timeout { timeout_ms: 10 }).is_retryable());
        assert!(ArcadeError::Storage(StorageError::Contention { attempts: 3 }).is_retryable());
        assert!(!ArcadeError::Storage(StorageError::CorruptedData("x".into())).is_retryable());
        assert!(!ArcadeError::RunNotFound("r".into()).is_retryable());
        assert!(!ArcadeError::Unauthorized("none".into()).is_retryable());
    }
}
