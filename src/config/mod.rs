//! Configuration management.
//!
//! This module handles:
//! - Environment variable loading
//! - Configuration validation
//! - Default value handling
//!
//! # Example
//!
//! ```
//! use telemetry_sanitizer::config::{Config, DEFAULT_MAX_STRING_LENGTH};
//!
//! // Create a config directly (use Config::from_env() in production)
//! let config = Config {
//!     max_string_length: Some(DEFAULT_MAX_STRING_LENGTH),
//!     custom_blocked_useragents: vec!["testington".to_string()],
//!     opt_out_useragent_filter: false,
//!     log_level: "info".to_string(),
//! };
//!
//! assert_eq!(config.max_string_length, Some(65_535));
//! assert_eq!(config, Config::default().with_blocked(["testington"]));
//! ```

mod validation;

pub use validation::{validate_config, LOG_LEVELS, MAX_PROPERTIES_STRING_LENGTH};

use crate::error::ConfigError;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default per-string limit applied to event properties, in characters.
pub const DEFAULT_MAX_STRING_LENGTH: usize = 65_535;

/// Application configuration.
///
/// Use [`Config::from_env`] to load configuration from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Per-string limit for event properties; `None` disables truncation.
    pub max_string_length: Option<usize>,
    /// Extra deny patterns on top of the built-in bot list.
    pub custom_blocked_useragents: Vec<String>,
    /// Capture events from every user agent, bots included.
    pub opt_out_useragent_filter: bool,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_string_length: Some(DEFAULT_MAX_STRING_LENGTH),
            custom_blocked_useragents: Vec::new(),
            opt_out_useragent_filter: false,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Optional environment variables (with defaults):
    /// - `PROPERTIES_STRING_MAX_LENGTH`: Per-string limit, or `none`/`off` (default: `65535`)
    /// - `CUSTOM_BLOCKED_USERAGENTS`: Comma-separated extra deny patterns (default: empty)
    /// - `OPT_OUT_USERAGENT_FILTER`: Skip bot filtering (default: `false`)
    /// - `LOG_LEVEL`: Logging level (default: `info`)
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if:
    /// - `PROPERTIES_STRING_MAX_LENGTH` is not a non-negative integer or `none`
    /// - `OPT_OUT_USERAGENT_FILTER` is not a boolean
    /// - Any value fails validation (see [`validate_config`])
    #[must_use = "configuration should be used"]
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();

        let max_string_length = parse_env_limit(
            "PROPERTIES_STRING_MAX_LENGTH",
            Some(DEFAULT_MAX_STRING_LENGTH),
        )?;

        let custom_blocked_useragents = std::env::var("CUSTOM_BLOCKED_USERAGENTS")
            .map(|val| parse_pattern_list(&val))
            .unwrap_or_default();

        let opt_out_useragent_filter = parse_env_bool("OPT_OUT_USERAGENT_FILTER", false)?;

        let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| DEFAULT_LOG_LEVEL.into());

        let config = Self {
            max_string_length,
            custom_blocked_useragents,
            opt_out_useragent_filter,
            log_level,
        };

        validate_config(&config)?;
        Ok(config)
    }

    /// Replace the custom deny patterns.
    #[must_use]
    pub fn with_blocked<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.custom_blocked_useragents = patterns.into_iter().map(Into::into).collect();
        self
    }
}

/// Split a comma-separated list, trimming entries and dropping empties.
fn parse_pattern_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}

/// Parse a string limit, where `none` or `off` disables it.
fn parse_env_limit(name: &str, default: Option<usize>) -> Result<Option<usize>, ConfigError> {
    std::env::var(name).map_or(Ok(default), |val| {
        let val = val.trim();
        if val.eq_ignore_ascii_case("none") || val.eq_ignore_ascii_case("off") {
            return Ok(None);
        }
        val.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
            var: name.into(),
            reason: "must be a non-negative integer or 'none'".into(),
        })
    })
}

/// Parse an environment variable as bool, using a default if not set.
fn parse_env_bool(name: &str, default: bool) -> Result<bool, ConfigError> {
    std::env::var(name).map_or(Ok(default), |val| {
        match val.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(ConfigError::InvalidValue {
                var: name.into(),
                reason: "must be true, false, 1 or 0".into(),
            }),
        }
    })
}
