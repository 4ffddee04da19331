//! Configuration validation.
//!
//! This module provides validation logic for configuration values,
//! ensuring they are within acceptable ranges.

use super::Config;
use crate::error::ConfigError;

/// Largest accepted per-string limit (16 MiB of characters).
pub const MAX_PROPERTIES_STRING_LENGTH: usize = 16 * 1024 * 1024;

/// Accepted log levels.
pub const LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

/// Validate configuration values.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] if any value is out of range:
/// - `PROPERTIES_STRING_MAX_LENGTH` must not exceed [`MAX_PROPERTIES_STRING_LENGTH`]
/// - `LOG_LEVEL` must be one of [`LOG_LEVELS`]
#[must_use = "validation result should be checked"]
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if let Some(limit) = config.max_string_length {
        if limit > MAX_PROPERTIES_STRING_LENGTH {
            return Err(ConfigError::InvalidValue {
                var: "PROPERTIES_STRING_MAX_LENGTH".into(),
                reason: format!("must be at most {MAX_PROPERTIES_STRING_LENGTH}"),
            });
        }
    }

    if !LOG_LEVELS.contains(&config.log_level.as_str()) {
        return Err(ConfigError::InvalidValue {
            var: "LOG_LEVEL".into(),
            reason: format!("must be one of {}", LOG_LEVELS.join(", ")),
        });
    }

    Ok(())
}
