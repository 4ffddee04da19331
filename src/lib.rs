//! Telemetry Sanitizer
//!
//! Payload sanitization core for an analytics client: prepares event
//! properties so they are safe to serialize and send.
//!
//! # Features
//!
//! - Cycle-safe deep copy of property graphs with per-string truncation
//! - Bot and crawler detection from user agent strings
//! - Device, browser and OS properties derived from the user agent
//! - Capture gate combining the above with UUID and timestamp stamping
//! - Small client helpers: cookie scoping, base64, script loading
//!
//! # Quick Start
//!
//! ```bash
//! echo '{"event":"$pageview","properties":{"path":"/"}}' | ./telemetry-sanitizer
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     stdin      ┌──────────────────┐
//! │   Client    │───────────────▶│  Capture gate    │──────▶ stdout (JSON lines)
//! │   events    │                │                  │
//! └─────────────┘                └────────┬─────────┘
//!                                         │
//!                    ┌────────────────────┼────────────────────┐
//!                    ▼                    ▼                    ▼
//!              Bot classifier        Device info       Sanitizing cloner
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod blocking;
pub mod capture;
pub mod config;
pub mod cookies;
pub mod device;
pub mod encoding;
pub mod error;
pub mod loader;
pub mod metrics;
pub mod sanitize;
pub mod traits;
pub mod value;

#[cfg(test)]
mod test_utils;
