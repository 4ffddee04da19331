//! Cycle-safe deep copy with string truncation.
//!
//! [`copy_and_truncate_strings`] copies an event property graph so that:
//! - every composite in the output is freshly allocated (nothing aliases
//!   the input, and the copy is mutable even when the input was frozen)
//! - every string leaf is cut to at most `max_string_length` characters
//! - every other leaf is copied by value
//! - a composite reached a second time during the same copy, whether
//!   through a cycle or through an alias, becomes [`Value::Undefined`]
//!
//! The input is only ever read.
//!
//! # Depth
//!
//! The traversal keeps its work stack on the heap, so deeply nested input
//! cannot overflow the thread stack inside the copy. Memory grows with the
//! number of distinct composites. Dropping or serializing an extremely deep
//! tree is still recursive.
//!
//! # Example
//!
//! ```
//! use telemetry_sanitizer::sanitize::copy_and_truncate_strings;
//! use telemetry_sanitizer::value::{Mapping, Sequence, Value};
//!
//! let values = Sequence::from_iter([Value::from("fooobar")]);
//! let root = Mapping::from_iter([
//!     ("key", Value::from("vaaaaalue")),
//!     ("values", Value::from(values.clone())),
//! ]);
//! values.push(Value::from(root.clone())).unwrap();
//!
//! let copy = copy_and_truncate_strings(&Value::from(root), Some(5));
//! assert_eq!(
//!     copy.to_json().unwrap(),
//!     serde_json::json!({"key": "vaaaa", "values": ["fooob", null]})
//! );
//! ```

use std::collections::{btree_map, HashSet};
use std::vec;

use serde::{Deserialize, Serialize};

use crate::value::{Mapping, MappingData, NodeId, Sequence, SequenceData, Value};

/// Counters describing what one copy changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanitizeReport {
    /// String leaves that were shortened.
    pub strings_truncated: u64,
    /// Repeat visits (cycles or aliases) replaced with `Undefined`.
    pub cycles_broken: u64,
    /// Composites freshly allocated in the output.
    pub composites_copied: u64,
}

impl std::ops::AddAssign for SanitizeReport {
    fn add_assign(&mut self, other: Self) {
        self.strings_truncated += other.strings_truncated;
        self.cycles_broken += other.cycles_broken;
        self.composites_copied += other.composites_copied;
    }
}

/// Deep-copy `value`, truncating strings and breaking cycles.
///
/// `None` disables truncation; `Some(0)` empties every string.
#[must_use]
pub fn copy_and_truncate_strings(value: &Value, max_string_length: Option<usize>) -> Value {
    sanitize_with_report(value, max_string_length).0
}

/// Same as [`copy_and_truncate_strings`], also returning a [`SanitizeReport`].
#[must_use]
pub fn sanitize_with_report(
    value: &Value,
    max_string_length: Option<usize>,
) -> (Value, SanitizeReport) {
    let mut copier = Copier::new(max_string_length);
    let copy = copier.run(value);
    (copy, copier.report)
}

/// Cut `input` to at most `max_chars` characters.
///
/// Returns the (possibly shortened) string and whether it was shortened.
/// Never splits a character.
#[must_use]
pub fn truncate_chars(input: &str, max_chars: Option<usize>) -> (String, bool) {
    match max_chars.and_then(|max| input.char_indices().nth(max)) {
        Some((byte_index, _)) => (input[..byte_index].to_string(), true),
        None => (input.to_string(), false),
    }
}

/// A composite whose children are still being copied.
enum Frame {
    Sequence {
        source: vec::IntoIter<Value>,
        copy: SequenceData,
    },
    Mapping {
        source: btree_map::IntoIter<String, Value>,
        copy: MappingData,
        pending_key: Option<String>,
    },
}

impl Frame {
    fn sequence(seq: &Sequence) -> Self {
        let items = seq.to_vec();
        Self::Sequence {
            copy: Vec::with_capacity(items.len()),
            source: items.into_iter(),
        }
    }

    fn mapping(map: &Mapping) -> Self {
        Self::Mapping {
            source: map.with(Clone::clone).into_iter(),
            copy: MappingData::new(),
            pending_key: None,
        }
    }

    fn next_child(&mut self) -> Option<Value> {
        match self {
            Self::Sequence { source, .. } => source.next(),
            Self::Mapping {
                source,
                pending_key,
                ..
            } => source.next().map(|(key, value)| {
                *pending_key = Some(key);
                value
            }),
        }
    }

    fn accept(&mut self, value: Value) {
        match self {
            Self::Sequence { copy, .. } => copy.push(value),
            Self::Mapping {
                copy, pending_key, ..
            } => {
                if let Some(key) = pending_key.take() {
                    copy.insert(key, value);
                }
            }
        }
    }

    fn finish(self) -> Value {
        match self {
            Self::Sequence { copy, .. } => Value::Sequence(Sequence::from_data(copy)),
            Self::Mapping { copy, .. } => Value::Mapping(Mapping::from_data(copy)),
        }
    }
}

enum Visit {
    Leaf(Value),
    Descend(Frame),
}

/// State for one copy. Never outlives the call that created it.
struct Copier {
    max_string_length: Option<usize>,
    visited: HashSet<NodeId>,
    report: SanitizeReport,
}

impl Copier {
    fn new(max_string_length: Option<usize>) -> Self {
        Self {
            max_string_length,
            visited: HashSet::new(),
            report: SanitizeReport::default(),
        }
    }

    fn run(&mut self, root: &Value) -> Value {
        let mut stack = match self.visit(root) {
            Visit::Leaf(value) => return value,
            Visit::Descend(frame) => vec![frame],
        };

        loop {
            if let Some(frame) = stack.last_mut() {
                if let Some(child) = frame.next_child() {
                    match self.visit(&child) {
                        Visit::Leaf(value) => frame.accept(value),
                        Visit::Descend(child_frame) => stack.push(child_frame),
                    }
                    continue;
                }
            }

            let Some(done) = stack.pop() else {
                return Value::Undefined;
            };
            let copy = done.finish();
            match stack.last_mut() {
                Some(parent) => parent.accept(copy),
                None => return copy,
            }
        }
    }

    fn visit(&mut self, value: &Value) -> Visit {
        match value {
            Value::String(s) => {
                let (truncated, shortened) = truncate_chars(s, self.max_string_length);
                if shortened {
                    self.report.strings_truncated += 1;
                }
                Visit::Leaf(Value::String(truncated))
            }
            Value::Sequence(seq) => {
                if self.first_visit(seq.id()) {
                    Visit::Descend(Frame::sequence(seq))
                } else {
                    Visit::Leaf(Value::Undefined)
                }
            }
            Value::Mapping(map) => {
                if self.first_visit(map.id()) {
                    Visit::Descend(Frame::mapping(map))
                } else {
                    Visit::Leaf(Value::Undefined)
                }
            }
            leaf => Visit::Leaf(leaf.clone()),
        }
    }

    fn first_visit(&mut self, id: NodeId) -> bool {
        if self.visited.insert(id) {
            self.report.composites_copied += 1;
            true
        } else {
            tracing::trace!(node = ?id, "Replacing repeated composite with undefined");
            self.report.cycles_broken += 1;
            false
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::test_utils::{recursive_object, truncation_target};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::json;
    use test_case::test_case;

    #[test]
    fn test_truncates_objects() {
        let copy = copy_and_truncate_strings(&truncation_target(), Some(5));
        assert_eq!(
            copy.to_json().unwrap(),
            json!({
                "key": "value",
                "5": "looon",
                "nested": {"keeeey": ["vaaaa", 1, 99_999_999_999.4]}
            })
        );
    }

    #[test]
    fn test_makes_a_copy() {
        let target = truncation_target();
        let copy = copy_and_truncate_strings(&target, Some(5));

        target
            .as_mapping()
            .unwrap()
            .insert("foo", Value::from("bar"))
            .unwrap();

        assert_ne!(copy, target);
        assert!(!copy.as_mapping().unwrap().contains_key("foo"));
    }

    #[test]
    fn test_mutating_copy_leaves_input_untouched() {
        let target = truncation_target();
        let copy = copy_and_truncate_strings(&target, None);

        let nested = copy.as_mapping().unwrap().get("nested").unwrap();
        nested
            .as_mapping()
            .unwrap()
            .insert("keeeey", Value::Null)
            .unwrap();

        let original_nested = target.as_mapping().unwrap().get("nested").unwrap();
        assert!(original_nested
            .as_mapping()
            .unwrap()
            .get("keeeey")
            .unwrap()
            .as_sequence()
            .is_some());
    }

    #[test]
    fn test_does_not_truncate_when_passed_none() {
        let target = truncation_target();
        assert_eq!(copy_and_truncate_strings(&target, None), target);
    }

    #[test]
    fn test_zero_limit_empties_strings() {
        let copy = copy_and_truncate_strings(&truncation_target(), Some(0));
        assert_eq!(
            copy.to_json().unwrap(),
            json!({"key": "", "5": "", "nested": {"keeeey": ["", 1, 99_999_999_999.4]}})
        );
    }

    #[test]
    fn test_handles_recursive_objects() {
        let (copy, report) = sanitize_with_report(&recursive_object(), Some(5));

        let expected = Mapping::from_iter([
            ("key", Value::from("vaaaa")),
            ("ref", Value::Undefined),
            (
                "values",
                Value::from(Sequence::from_iter([Value::from("fooob"), Value::Undefined])),
            ),
        ]);
        assert_eq!(copy, Value::from(expected));
        assert_eq!(
            copy.to_json().unwrap(),
            json!({"key": "vaaaa", "values": ["fooob", null]})
        );
        assert_eq!(report.cycles_broken, 2);
        assert_eq!(report.composites_copied, 2);
        assert_eq!(report.strings_truncated, 2);
    }

    #[test]
    fn test_self_containing_sequence() {
        let seq = Sequence::from_iter([Value::from("abcdefgh")]);
        seq.push(Value::from(seq.clone())).unwrap();
        seq.push(Value::from(7)).unwrap();

        let copy = copy_and_truncate_strings(&Value::from(seq), Some(3));
        assert_eq!(copy.to_json().unwrap(), json!(["abc", null, 7]));
    }

    #[test]
    fn test_mutually_referencing_sequences() {
        let a = Sequence::from_iter([Value::from("a")]);
        let b = Sequence::from_iter([Value::from("b"), Value::from(a.clone())]);
        a.push(Value::from(b)).unwrap();

        let copy = copy_and_truncate_strings(&Value::from(a), None);
        assert_eq!(copy.to_json().unwrap(), json!(["a", ["b", null]]));
    }

    #[test]
    fn test_handles_frozen_objects() {
        let original = Mapping::from_iter([("key", Value::from("vaaaaalue"))]);
        original.freeze();

        let copy = copy_and_truncate_strings(&Value::from(original), Some(5));
        assert_eq!(copy.to_json().unwrap(), json!({"key": "vaaaa"}));

        let copy_map = copy.as_mapping().unwrap();
        assert!(!copy_map.is_frozen());
        assert!(copy_map.insert("added", Value::from(true)).is_ok());
    }

    #[test]
    fn test_aliased_substructure_is_copied_once() {
        let shared = Sequence::from_iter([Value::from("shared")]);
        let root = Mapping::from_iter([
            ("first", Value::from(shared.clone())),
            ("second", Value::from(shared)),
        ]);

        let copy = copy_and_truncate_strings(&Value::from(root), None);
        assert_eq!(
            copy.to_json().unwrap(),
            json!({"first": ["shared"]})
        );
        assert!(copy.as_mapping().unwrap().get("second").unwrap().is_undefined());
    }

    #[test]
    fn test_structurally_equal_distinct_nodes_are_both_copied() {
        let root = Sequence::from_iter([
            Value::from(Mapping::from_iter([("a", Value::from(1))])),
            Value::from(Mapping::from_iter([("a", Value::from(1))])),
        ]);
        let copy = copy_and_truncate_strings(&Value::from(root), None);
        assert_eq!(copy.to_json().unwrap(), json!([{"a": 1}, {"a": 1}]));
    }

    #[test]
    fn test_output_composites_are_fresh() {
        let target = truncation_target();
        let copy = copy_and_truncate_strings(&target, None);
        assert_ne!(copy.node_id(), target.node_id());

        let nested = |v: &Value| v.as_mapping().unwrap().get("nested").unwrap().node_id();
        assert_ne!(nested(&copy), nested(&target));
    }

    #[test]
    fn test_repeated_calls_start_with_empty_visited_set() {
        let target = recursive_object();
        let first = copy_and_truncate_strings(&target, Some(5));
        let second = copy_and_truncate_strings(&target, Some(5));
        assert_eq!(first, second);
        assert_eq!(
            second.to_json().unwrap(),
            json!({"key": "vaaaa", "values": ["fooob", null]})
        );
    }

    /// Drop a single-child chain of sequences top-down.
    fn drop_chain(value: Value) {
        let mut current = Some(value);
        while let Some(Value::Sequence(seq)) = current.take() {
            current = seq.get(0);
        }
    }

    #[test]
    fn test_deep_nesting_does_not_overflow() {
        let depth: u64 = 50_000;
        let root = Sequence::new();
        let mut current = root.clone();
        for _ in 0..depth {
            let next = Sequence::new();
            current.push(Value::from(next.clone())).unwrap();
            current = next;
        }
        current.push(Value::from("leaf-string")).unwrap();
        drop(current);

        let input = Value::from(root);
        let (copy, report) = sanitize_with_report(&input, Some(4));
        assert_eq!(report.composites_copied, depth + 1);
        assert_eq!(report.strings_truncated, 1);

        let mut node = copy.clone();
        for _ in 0..depth {
            node = node.as_sequence().unwrap().get(0).unwrap();
        }
        assert_eq!(node.as_sequence().unwrap().get(0), Some(Value::from("leaf")));

        drop(node);
        drop_chain(copy);
        drop_chain(input);
    }

    #[test_case(Value::Null ; "null")]
    #[test_case(Value::Undefined ; "undefined")]
    #[test_case(Value::from(true) ; "boolean")]
    #[test_case(Value::from(99_999_999_999.4) ; "number")]
    fn test_non_string_leaves_pass_through(value: Value) {
        assert_eq!(copy_and_truncate_strings(&value, Some(0)), value);
    }

    #[test_case("hello", Some(5), "hello", false ; "exact length")]
    #[test_case("hello!", Some(5), "hello", true ; "one over")]
    #[test_case("hello", None, "hello", false ; "no limit")]
    #[test_case("✓ à la mode", Some(3), "✓ à", true ; "multibyte characters")]
    #[test_case("", Some(0), "", false ; "empty")]
    fn test_truncate_chars(input: &str, max: Option<usize>, expected: &str, shortened: bool) {
        assert_eq!(truncate_chars(input, max), (expected.to_string(), shortened));
    }

    #[test]
    fn test_reports_add_up() {
        let (_, mut total) = sanitize_with_report(&truncation_target(), Some(5));
        let (_, other) = sanitize_with_report(&recursive_object(), Some(5));
        total += other;
        assert_eq!(
            total,
            SanitizeReport {
                strings_truncated: 4,
                cycles_broken: 2,
                composites_copied: 5,
            }
        );
    }

    fn arb_json() -> impl Strategy<Value = serde_json::Value> {
        let leaf = prop_oneof![
            Just(serde_json::Value::Null),
            any::<bool>().prop_map(serde_json::Value::Bool),
            any::<i32>().prop_map(|n| json!(n)),
            ".{0,40}".prop_map(serde_json::Value::String),
        ];
        leaf.prop_recursive(4, 64, 8, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..8).prop_map(serde_json::Value::Array),
                prop::collection::btree_map("[a-z0-9]{1,6}", inner, 0..8)
                    .prop_map(|m| serde_json::Value::Object(m.into_iter().collect())),
            ]
        })
    }

    fn max_string_chars(value: &serde_json::Value) -> usize {
        match value {
            serde_json::Value::String(s) => s.chars().count(),
            serde_json::Value::Array(items) => items.iter().map(max_string_chars).max().unwrap_or(0),
            serde_json::Value::Object(map) => map.values().map(max_string_chars).max().unwrap_or(0),
            _ => 0,
        }
    }

    proptest! {
        #[test]
        fn prop_no_limit_is_identity_on_acyclic_input(json in arb_json()) {
            let value = Value::from(json.clone());
            let copy = copy_and_truncate_strings(&value, None);
            prop_assert_eq!(copy.to_json().unwrap(), json);
        }

        #[test]
        fn prop_strings_respect_limit(json in arb_json(), limit in 0usize..12) {
            let copy = copy_and_truncate_strings(&Value::from(json), Some(limit));
            prop_assert!(max_string_chars(&copy.to_json().unwrap()) <= limit);
        }
    }
}
