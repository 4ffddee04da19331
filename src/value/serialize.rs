//! JSON conversion for [`Value`].
//!
//! Serialization follows `JSON.stringify`: mapping entries holding
//! `Undefined` are skipped, `Undefined` inside a sequence becomes `null`,
//! and non-finite numbers become `null`. A cyclic graph fails with a
//! serialization error.

use serde::de::{Deserialize, Deserializer};
use serde::ser::{self, Serialize, SerializeMap, SerializeSeq, Serializer};

use super::{Ancestors, Value};

/// Largest integer an `f64` represents exactly (2^53 - 1).
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

impl Value {
    /// Convert into a `serde_json::Value`.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph contains a cycle.
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let ancestors = Ancestors::default();
        Guarded {
            value: self,
            ancestors: &ancestors,
        }
        .serialize(serializer)
    }
}

struct Guarded<'a> {
    value: &'a Value,
    ancestors: &'a Ancestors,
}

impl Serialize for Guarded<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.value {
            Value::Undefined | Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => serialize_number(*n, serializer),
            Value::String(s) => serializer.serialize_str(s),
            Value::Sequence(seq) => {
                let _guard = self
                    .ancestors
                    .enter(seq.id())
                    .ok_or_else(circular::<S::Error>)?;
                let items = seq.to_vec();
                let mut out = serializer.serialize_seq(Some(items.len()))?;
                for item in &items {
                    out.serialize_element(&Guarded {
                        value: item,
                        ancestors: self.ancestors,
                    })?;
                }
                out.end()
            }
            Value::Mapping(map) => {
                let _guard = self
                    .ancestors
                    .enter(map.id())
                    .ok_or_else(circular::<S::Error>)?;
                let entries: Vec<_> = map
                    .entries()
                    .into_iter()
                    .filter(|(_, v)| !v.is_undefined())
                    .collect();
                let mut out = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in &entries {
                    out.serialize_entry(
                        key,
                        &Guarded {
                            value,
                            ancestors: self.ancestors,
                        },
                    )?;
                }
                out.end()
            }
        }
    }
}

fn circular<E: ser::Error>() -> E {
    E::custom("cannot serialize circular reference")
}

// Integral values are written without a fractional part, as JavaScript does.
#[allow(clippy::cast_possible_truncation)]
fn serialize_number<S: Serializer>(n: f64, serializer: S) -> Result<S::Ok, S::Error> {
    if !n.is_finite() {
        serializer.serialize_unit()
    } else if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        serializer.serialize_i64(n as i64)
    } else {
        serializer.serialize_f64(n)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::Sequence(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => Self::Mapping(
                map.into_iter()
                    .map(|(k, v)| (k, Self::from(v)))
                    .collect(),
            ),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Self::from)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::super::{Mapping, Sequence};
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_undefined_mapping_entries_are_skipped() {
        let map = Mapping::from_iter([("key", Value::from("v")), ("gone", Value::Undefined)]);
        assert_eq!(Value::from(map).to_json().unwrap(), json!({"key": "v"}));
    }

    #[test]
    fn test_undefined_sequence_slots_become_null() {
        let seq = Sequence::from_iter([Value::from("fooob"), Value::Undefined]);
        assert_eq!(Value::from(seq).to_json().unwrap(), json!(["fooob", null]));
    }

    #[test]
    fn test_numbers_follow_javascript_formatting() {
        let seq = Sequence::from_iter([
            Value::from(1),
            Value::from(99_999_999_999.4),
            Value::from(f64::INFINITY),
            Value::from(f64::NAN),
        ]);
        let text = serde_json::to_string(&Value::from(seq)).unwrap();
        assert_eq!(text, "[1,99999999999.4,null,null]");
    }

    #[test]
    fn test_cycle_fails_to_serialize() {
        let seq = Sequence::new();
        seq.push(Value::from(seq.clone())).unwrap();
        let err = Value::from(seq).to_json().unwrap_err();
        assert!(err.to_string().contains("circular reference"));
    }

    #[test]
    fn test_aliases_serialize_twice() {
        let shared = Mapping::from_iter([("a", Value::from(1))]);
        let root = Mapping::from_iter([
            ("x", Value::from(shared.clone())),
            ("y", Value::from(shared)),
        ]);
        assert_eq!(
            Value::from(root).to_json().unwrap(),
            json!({"x": {"a": 1}, "y": {"a": 1}})
        );
    }

    #[test]
    fn test_from_json_builds_fresh_graph() {
        let value = Value::from(json!({
            "key": "value",
            "5": "looongvalue",
            "nested": {"keeeey": ["vaaaaaalue", 1, 99_999_999_999.4]}
        }));
        let map = value.as_mapping().unwrap();
        assert_eq!(map.get("5"), Some(Value::from("looongvalue")));
        let nested = map.get("nested").unwrap();
        let keeeey = nested.as_mapping().unwrap().get("keeeey").unwrap();
        assert_eq!(keeeey.as_sequence().unwrap().len(), 3);
    }

    #[test]
    fn test_deserialize_from_str() {
        let value: Value = serde_json::from_str(r#"{"a": [true, null]}"#).unwrap();
        assert_eq!(value.to_json().unwrap(), json!({"a": [true, null]}));
    }
}
