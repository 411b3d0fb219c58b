//! Error types for TALLY operations

use thiserror::Error;

/// Registry (table) errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Registry lock poisoned: {table}")]
    LockPoisoned { table: &'static str },

    #[error("Cleanup task failed to start: {reason}")]
    CleanupSpawnFailed { reason: String },
}

/// Label parsing errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LabelError {
    #[error("Malformed label input {input:?}: {reason}")]
    Malformed { input: String, reason: String },

    #[error("Label name must not be empty")]
    EmptyName,

    #[error("Duplicate label name: {name}")]
    DuplicateName { name: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all TALLY errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TallyError {
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Label error: {0}")]
    Label(#[from] LabelError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for TALLY operations.
pub type TallyResult<T> = Result<T, TallyError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_poisoned_display() {
        let err = RegistryError::LockPoisoned { table: "quorum" };
        assert_eq!(err.to_string(), "Registry lock poisoned: quorum");
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InvalidValue {
            field: "cleanup_every_checks".to_string(),
            value: "0".to_string(),
            reason: "must be positive".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("cleanup_every_checks"));
        assert!(msg.contains("must be positive"));
    }

    #[test]
    fn test_tally_error_from_registry() {
        let err: TallyError = RegistryError::LockPoisoned { table: "freshness" }.into();
        assert!(matches!(err, TallyError::Registry(_)));
        assert!(err.to_string().starts_with("Registry error:"));
    }

    #[test]
    fn test_tally_error_from_label() {
        let err: TallyError = LabelError::EmptyName.into();
        assert!(matches!(err, TallyError::Label(LabelError::EmptyName)));
    }
}
