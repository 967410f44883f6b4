//! # Application Error Types
//!
//! This module defines the error types shared by the extraction, validation and
//! fuzzy matching pipelines. Only precondition violations (configuration and
//! thresholds) are errors: per-record problems degrade to "nothing found".

use std::fmt;

/// General application error type for consistent error handling
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    /// Malformed or missing configuration (keys, regexes, ratios, enum values)
    Config(String),
    /// Fuzzy or validation threshold outside of `[0, 1]`
    InvalidThreshold(String),
    /// Malformed batch input handed to a pipeline driver
    Input(String),
    /// File system errors
    FileSystem(String),
    /// Internal application errors
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(msg) => write!(f, "[CONFIG] {}", msg),
            AppError::InvalidThreshold(msg) => write!(f, "[THRESHOLD] {}", msg),
            AppError::Input(msg) => write!(f, "[INPUT] {}", msg),
            AppError::FileSystem(msg) => write!(f, "[FILESYSTEM] {}", msg),
            AppError::Internal(msg) => write!(f, "[INTERNAL] {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<regex::Error> for AppError {
    fn from(err: regex::Error) -> Self {
        AppError::Config(format!("invalid pattern: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(format!("malformed json: {}", err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::FileSystem(err.to_string())
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

/// Ensure a threshold-like value lies within `[0, 1]`.
pub fn check_unit_interval(name: &str, value: f64) -> AppResult<f64> {
    if !(0.0..=1.0).contains(&value) || value.is_nan() {
        let err = AppError::InvalidThreshold(format!(
            "{} must be within [0, 1], got {}",
            name, value
        ));
        error_logging::log_threshold_error(&err, name, value);
        return Err(err);
    }
    Ok(value)
}

/// Standardized error logging utilities for consistent error reporting across the application
pub mod error_logging {
    use tracing::error;

    /// Log configuration errors during startup/initialization
    pub fn log_config_error(error: &impl std::fmt::Display, config_key: &str, operation: &str) {
        error!(
            error = %error,
            config_key = %config_key,
            operation = %operation,
            "Configuration error"
        );
    }

    /// Log a rejected threshold together with the offending value
    pub fn log_threshold_error(error: &impl std::fmt::Display, threshold: &str, value: f64) {
        error!(
            error = %error,
            threshold = %threshold,
            value = %value,
            "Threshold out of range"
        );
    }

    /// Log file system errors with path and operation context
    pub fn log_filesystem_error(
        error: &impl std::fmt::Display,
        operation: &str,
        path: Option<&str>,
        file_size: Option<u64>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            path = ?path,
            file_size_bytes = ?file_size,
            "File system operation failed"
        );
    }
}
