//! Configuration errors and validation helpers.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field holds a value outside its accepted domain.
    #[error("invalid value for '{field}': {message}")]
    InvalidValue {
        /// Field name.
        field: &'static str,
        /// What was wrong.
        message: String,
    },

    /// The configuration file could not be read.
    #[error("failed to read config '{path}'")]
    Read {
        /// Path of the file.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for the expected schema.
    #[error("failed to parse config '{path}'")]
    Parse {
        /// Path of the file.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

/// Implemented by every configuration struct.
pub trait ConfigValidator {
    /// Checks all fields, returning the first violation.
    fn validate(&self) -> Result<(), ConfigError>;
}

/// Ensures `value` lies in `[min, max]`.
pub fn validate_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < min || value > max {
        return Err(ConfigError::InvalidValue {
            field,
            message: format!("expected a value in [{min}, {max}], got {value}"),
        });
    }
    Ok(())
}

/// Ensures `value` is strictly positive.
pub fn validate_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::InvalidValue {
            field,
            message: format!("expected a positive value, got {value}"),
        });
    }
    Ok(())
}

/// Ensures an integer setting is at least `min`.
pub fn validate_at_least(field: &'static str, value: usize, min: usize) -> Result<(), ConfigError> {
    if value < min {
        return Err(ConfigError::InvalidValue {
            field,
            message: format!("expected at least {min}, got {value}"),
        });
    }
    Ok(())
}
