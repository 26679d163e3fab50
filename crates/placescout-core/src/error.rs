//! Core error types for placescout.
//!
//! This module defines the central error type shared by all crates, plus the
//! configuration-specific error returned while loading `config.toml`.

use thiserror::Error;

/// Central error type for placescout operations.
#[derive(Error, Debug)]
pub enum ScoutError {
    /// Configuration errors (file loading, parsing, validation)
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors (invalid identifiers, coordinates, geometry)
    #[error("validation error: {0}")]
    Validation(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to determine config directory path
    #[error("could not determine config directory (XDG base directories not available)")]
    NoConfigDir,

    /// Failed to parse TOML
    #[error("failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize config
    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// I/O error reading/writing config
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Field name
        field: String,
        /// Reason for invalidity
        reason: String,
    },
}

/// Result type alias using `ScoutError`.
pub type Result<T> = std::result::Result<T, ScoutError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ScoutError::Validation("latitude out of range".to_string());
        assert_eq!(err.to_string(), "validation error: latitude out of range");

        let err = ConfigError::InvalidValue {
            field: "timing.settle_min_ms".to_string(),
            reason: "greater than settle_max_ms".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid config value for timing.settle_min_ms: greater than settle_max_ms"
        );
    }

    #[test]
    fn test_error_from_config() {
        let scout_err: ScoutError = ConfigError::NoConfigDir.into();
        assert!(matches!(scout_err, ScoutError::Config(_)));
    }
}
