//! Base64 text encoding for payload strings.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::value::Value;

/// Base64-encode the UTF-8 bytes of `data`.
///
/// `None` stays `None` and the empty string stays empty.
///
/// # Example
///
/// ```
/// use telemetry_sanitizer::encoding::base64_encode;
///
/// assert_eq!(base64_encode(Some("Hello, World!")).as_deref(), Some("SGVsbG8sIFdvcmxkIQ=="));
/// assert_eq!(base64_encode(None), None);
/// ```
#[must_use]
pub fn base64_encode(data: Option<&str>) -> Option<String> {
    data.map(|text| STANDARD.encode(text.as_bytes()))
}

/// Encode a string value; `Null`, `Undefined` and non-strings pass through.
#[must_use]
pub fn base64_encode_value(value: &Value) -> Value {
    match value {
        Value::String(text) => Value::String(STANDARD.encode(text.as_bytes())),
        other => other.clone(),
    }
}
