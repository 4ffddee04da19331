//! Event capture gate.
//!
//! [`EventCapture`] decides whether an event from a given client is kept and
//! prepares its properties for sending:
//!
//! 1. Drop the event if the user agent matches a deny pattern (unless the
//!    filter is opted out).
//! 2. Merge device properties derived from the user agent with the caller's
//!    properties; the caller wins on conflicting keys.
//! 3. Deep-copy the result, truncating long strings and breaking cycles.
//! 4. Stamp it with a fresh UUID and the current time.
//!
//! # Example
//!
//! ```
//! use telemetry_sanitizer::capture::{CaptureOutcome, CaptureRequest, EventCapture};
//! use telemetry_sanitizer::config::Config;
//! use telemetry_sanitizer::traits::RealTimeProvider;
//! use telemetry_sanitizer::value::{Mapping, Value};
//!
//! let capture = EventCapture::new(Config::default(), RealTimeProvider);
//! let request = CaptureRequest::new("$pageview")
//!     .with_properties(Mapping::from_iter([("path", Value::from("/home"))]))
//!     .with_user_agent("Mozilla/5.0 (compatible; Googlebot/2.1)");
//!
//! assert!(matches!(capture.capture(request), CaptureOutcome::Blocked { .. }));
//! ```

mod stream;

pub use stream::{process_stream, StreamConfig, StreamStats};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::blocking::BotClassifier;
use crate::config::Config;
use crate::device;
use crate::metrics::CaptureMetrics;
use crate::sanitize::{sanitize_with_report, SanitizeReport};
use crate::traits::TimeProvider;
use crate::value::{Mapping, Value};

/// An event submitted for capture.
#[derive(Debug, Clone, Deserialize)]
pub struct CaptureRequest {
    /// Event name.
    pub event: String,
    /// Caller properties; anything other than a mapping is discarded.
    #[serde(default)]
    pub properties: Value,
    /// Client user agent, if known.
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl CaptureRequest {
    /// A request with no properties and no user agent.
    #[must_use]
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            properties: Value::Undefined,
            user_agent: None,
        }
    }

    /// Set the caller properties.
    #[must_use]
    pub fn with_properties(mut self, properties: impl Into<Value>) -> Self {
        self.properties = properties.into();
        self
    }

    /// Set the client user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}

/// A sanitized event ready to send.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapturedEvent {
    /// Unique event id.
    pub uuid: Uuid,
    /// Event name.
    pub event: String,
    /// Sanitized properties (always a mapping).
    pub properties: Value,
    /// Capture time.
    pub timestamp: DateTime<Utc>,
}

/// Result of passing an event through the gate.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    /// The event was kept.
    Captured(CapturedEvent),
    /// The client matched a deny pattern.
    Blocked {
        /// The matching pattern.
        pattern: String,
    },
}

impl CaptureOutcome {
    /// The captured event, if any.
    #[must_use]
    pub const fn captured(&self) -> Option<&CapturedEvent> {
        match self {
            Self::Captured(event) => Some(event),
            Self::Blocked { .. } => None,
        }
    }

    /// Returns true if the event was blocked.
    #[must_use]
    pub const fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }
}

/// Capture gate combining bot filtering, device enrichment and sanitization.
pub struct EventCapture<T>
where
    T: TimeProvider,
{
    config: Config,
    classifier: BotClassifier,
    time_provider: T,
    metrics: CaptureMetrics,
}

impl<T> EventCapture<T>
where
    T: TimeProvider,
{
    /// Create a capture gate from `config`.
    #[must_use]
    pub fn new(config: Config, time_provider: T) -> Self {
        let classifier = BotClassifier::new(&config.custom_blocked_useragents);
        Self {
            config,
            classifier,
            time_provider,
            metrics: CaptureMetrics::new(),
        }
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Counters for events seen so far.
    #[must_use]
    pub const fn metrics(&self) -> &CaptureMetrics {
        &self.metrics
    }

    /// Pass `request` through the gate.
    pub fn capture(&self, request: CaptureRequest) -> CaptureOutcome {
        let user_agent = request.user_agent.as_deref().unwrap_or_default();

        if !self.config.opt_out_useragent_filter {
            if let Some(pattern) = self.classifier.matching_pattern(user_agent) {
                tracing::debug!(
                    event = %request.event,
                    pattern = pattern,
                    "Blocked event from bot user agent"
                );
                self.metrics.record_blocked(pattern);
                return CaptureOutcome::Blocked {
                    pattern: pattern.to_string(),
                };
            }
        }

        let (properties, report) = self.build_properties(&request, user_agent);
        self.metrics.record_captured(&report);
        if report.strings_truncated > 0 || report.cycles_broken > 0 {
            tracing::debug!(
                event = %request.event,
                strings_truncated = report.strings_truncated,
                cycles_broken = report.cycles_broken,
                "Sanitized event properties"
            );
        }

        CaptureOutcome::Captured(CapturedEvent {
            uuid: Uuid::new_v4(),
            event: request.event,
            properties,
            timestamp: self.time_provider.now(),
        })
    }

    fn build_properties(
        &self,
        request: &CaptureRequest,
        user_agent: &str,
    ) -> (Value, SanitizeReport) {
        let limit = self.config.max_string_length;

        let device_properties = if user_agent.is_empty() {
            Mapping::new()
        } else {
            device::properties(user_agent)
        };
        let (device_copy, mut report) =
            sanitize_with_report(&Value::Mapping(device_properties), limit);

        let caller = match &request.properties {
            Value::Mapping(_) => request.properties.clone(),
            Value::Undefined | Value::Null => Value::Mapping(Mapping::new()),
            other => {
                tracing::warn!(
                    event = %request.event,
                    kind = other.kind(),
                    "Discarding non-mapping event properties"
                );
                Value::Mapping(Mapping::new())
            }
        };
        let (caller_copy, caller_report) = sanitize_with_report(&caller, limit);
        report += caller_report;

        // Both copies are fresh mappings, so inserting cannot hit a frozen node.
        if let (Some(merged), Some(device_map)) = (caller_copy.as_mapping(), device_copy.as_mapping())
        {
            for (key, value) in device_map.entries() {
                if !merged.contains_key(&key) {
                    if let Err(e) = merged.insert(key, value) {
                        tracing::warn!(error = %e, "Failed to merge device property");
                    }
                }
            }
        }

        (caller_copy, report)
    }
}
