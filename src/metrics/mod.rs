//! Metrics collection.
//!
//! This module provides:
//! - Captured and blocked event counts
//! - Per-pattern block counts
//! - Sanitization counters (strings truncated, cycles broken)
//!
//! # Example
//!
//! ```
//! use telemetry_sanitizer::metrics::CaptureMetrics;
//! use telemetry_sanitizer::sanitize::SanitizeReport;
//!
//! let metrics = CaptureMetrics::new();
//! metrics.record_captured(&SanitizeReport {
//!     strings_truncated: 2,
//!     cycles_broken: 1,
//!     composites_copied: 4,
//! });
//! metrics.record_blocked("googlebot");
//! metrics.record_blocked("googlebot");
//!
//! let summary = metrics.summary();
//! assert_eq!(summary.events_captured, 1);
//! assert_eq!(summary.events_blocked, 2);
//! assert_eq!(summary.blocked_by_pattern["googlebot"], 2);
//! assert!((summary.block_rate - 0.666).abs() < 0.01);
//! ```

// Allow intentional numeric casts for rate calculations
#![allow(clippy::cast_precision_loss)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::sanitize::SanitizeReport;

/// Snapshot of capture counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    /// Events that passed the gate.
    pub events_captured: u64,
    /// Events dropped because the user agent matched a deny pattern.
    pub events_blocked: u64,
    /// Blocked events per matching pattern.
    pub blocked_by_pattern: BTreeMap<String, u64>,
    /// String leaves truncated across all captured events.
    pub strings_truncated: u64,
    /// Repeat visits replaced with `Undefined` across all captured events.
    pub cycles_broken: u64,
    /// Fraction of events blocked (0.0-1.0).
    pub block_rate: f64,
}

#[derive(Debug, Default)]
struct Counters {
    captured: u64,
    strings_truncated: u64,
    cycles_broken: u64,
}

/// Thread-safe capture metrics.
#[derive(Debug, Default)]
pub struct CaptureMetrics {
    counters: RwLock<Counters>,
    blocked: RwLock<BTreeMap<String, u64>>,
}

impl CaptureMetrics {
    /// Create an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a captured event and what sanitizing it changed.
    pub fn record_captured(&self, report: &SanitizeReport) {
        let mut counters = write_recovering(&self.counters, "counters");
        counters.captured += 1;
        counters.strings_truncated += report.strings_truncated;
        counters.cycles_broken += report.cycles_broken;
    }

    /// Record an event blocked by `pattern`.
    pub fn record_blocked(&self, pattern: &str) {
        let mut blocked = write_recovering(&self.blocked, "blocked");
        *blocked.entry(pattern.to_string()).or_insert(0) += 1;
    }

    /// Total events seen, captured or blocked.
    #[must_use]
    pub fn total_events(&self) -> u64 {
        let captured = read_recovering(&self.counters, "counters").captured;
        let blocked: u64 = read_recovering(&self.blocked, "blocked").values().sum();
        captured + blocked
    }

    /// Get summary statistics.
    #[must_use]
    pub fn summary(&self) -> MetricsSummary {
        let (events_captured, strings_truncated, cycles_broken) = {
            let counters = read_recovering(&self.counters, "counters");
            (
                counters.captured,
                counters.strings_truncated,
                counters.cycles_broken,
            )
        };
        let blocked_by_pattern = read_recovering(&self.blocked, "blocked").clone();
        let events_blocked: u64 = blocked_by_pattern.values().sum();
        let total = events_captured + events_blocked;
        let block_rate = if total > 0 {
            events_blocked as f64 / total as f64
        } else {
            0.0
        };

        MetricsSummary {
            events_captured,
            events_blocked,
            blocked_by_pattern,
            strings_truncated,
            cycles_broken,
            block_rate,
        }
    }

    /// Reset all counters.
    pub fn clear(&self) {
        *write_recovering(&self.counters, "counters") = Counters::default();
        write_recovering(&self.blocked, "blocked").clear();
    }
}

fn read_recovering<'a, T>(lock: &'a RwLock<T>, name: &str) -> RwLockReadGuard<'a, T> {
    lock.read().unwrap_or_else(|poison_error| {
        tracing::warn!(
            lock = name,
            error = %poison_error,
            "Reading metrics from poisoned lock, using recovered data"
        );
        poison_error.into_inner()
    })
}

fn write_recovering<'a, T>(lock: &'a RwLock<T>, name: &str) -> RwLockWriteGuard<'a, T> {
    lock.write().unwrap_or_else(|poison_error| {
        tracing::warn!(
            lock = name,
            error = %poison_error,
            "Writing metrics through poisoned lock, using recovered data"
        );
        poison_error.into_inner()
    })
}
