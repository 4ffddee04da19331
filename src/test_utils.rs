//! Test utilities and fixtures.
//!
//! This module provides shared testing infrastructure:
//! - Property graph fixtures
//! - Mock factories for traits
//! - Common user agent strings
//!
//! Only compiled for tests (`#[cfg(test)]`).

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::{DateTime, Utc};

use crate::traits::MockTimeProvider;
use crate::value::{Mapping, Sequence, Value};

/// Windows desktop Chrome.
pub const DESKTOP_CHROME_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/74.0.3729.157 Safari/537.36";

/// iPhone Mobile Safari.
pub const IPHONE_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 13_3 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/13.0.4 Mobile/15E148 Safari/604.1";

/// Googlebot smartphone crawler.
pub const GOOGLEBOT_UA: &str = "Mozilla/5.0 AppleWebKit/537.36 (KHTML, like Gecko; compatible; Googlebot/2.1; +http://www.google.com/bot.html) Chrome/W.X.Y.Z Safari/537.36";

/// `{key: "value", 5: "looongvalue", nested: {keeeey: ["vaaaaaalue", 1, 99999999999.4]}}`
#[must_use]
pub fn truncation_target() -> Value {
    let keeeey = Sequence::from_iter([
        Value::from("vaaaaaalue"),
        Value::from(1),
        Value::from(99_999_999_999.4),
    ]);
    let nested = Mapping::from_iter([("keeeey", Value::from(keeeey))]);
    Value::from(Mapping::from_iter([
        ("key".to_string(), Value::from("value")),
        (5.to_string(), Value::from("looongvalue")),
        ("nested".to_string(), Value::from(nested)),
    ]))
}

/// `{key: "vaaaaalue", values: ["fooobar", <self>], ref: <self>}`
#[must_use]
pub fn recursive_object() -> Value {
    let values = Sequence::from_iter([Value::from("fooobar")]);
    let root = Mapping::from_iter([
        ("key", Value::from("vaaaaalue")),
        ("values", Value::from(values.clone())),
    ]);
    values.push(Value::from(root.clone())).unwrap();
    root.insert("ref", Value::from(root.clone())).unwrap();
    Value::from(root)
}

/// Create a mock time provider that always returns `time`.
#[must_use]
pub fn mock_time(time: DateTime<Utc>) -> MockTimeProvider {
    let mut mock = MockTimeProvider::new();
    mock.expect_now().return_const(time);
    mock
}

/// Create a mock time provider from an RFC 3339 timestamp.
///
/// # Panics
///
/// Panics if the timestamp string is invalid.
#[must_use]
pub fn mock_time_str(timestamp: &str) -> MockTimeProvider {
    let time = DateTime::parse_from_rfc3339(timestamp)
        .expect("valid RFC 3339 timestamp")
        .with_timezone(&Utc);
    mock_time(time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::TimeProvider;

    #[test]
    fn test_recursive_object_references_itself() {
        let root = recursive_object();
        let map = root.as_mapping().unwrap();
        assert_eq!(map.get("ref").and_then(|v| v.node_id()), Some(map.id()));
    }

    #[test]
    fn test_mock_time_str() {
        let mock = mock_time_str("2024-01-15T12:00:00Z");
        assert_eq!(mock.now().to_rfc3339(), "2024-01-15T12:00:00+00:00");
    }
}
