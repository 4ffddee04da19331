//! Structural equality and cycle-safe `Debug` output.

use std::collections::HashSet;
use std::fmt;

use super::{Ancestors, Composite, MappingData, NodeId, SequenceData, Value};

impl PartialEq for Value {
    /// Structural comparison.
    ///
    /// Composite pairs already under comparison are assumed equal, so two
    /// cyclic graphs with the same shape compare equal instead of recursing
    /// forever. `NaN` equals `NaN`.
    fn eq(&self, other: &Self) -> bool {
        let mut assumed = HashSet::new();
        values_equal(self, other, &mut assumed)
    }
}

#[allow(clippy::float_cmp)]
fn values_equal(a: &Value, b: &Value, assumed: &mut HashSet<(NodeId, NodeId)>) -> bool {
    match (a, b) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x == y || (x.is_nan() && y.is_nan()),
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Sequence(x), Value::Sequence(y)) => {
            if x.ptr_eq(y) || !assumed.insert((x.id(), y.id())) {
                return true;
            }
            let (left, right) = (x.to_vec(), y.to_vec());
            left.len() == right.len()
                && left
                    .iter()
                    .zip(&right)
                    .all(|(l, r)| values_equal(l, r, assumed))
        }
        (Value::Mapping(x), Value::Mapping(y)) => {
            if x.ptr_eq(y) || !assumed.insert((x.id(), y.id())) {
                return true;
            }
            let (left, right) = (x.entries(), y.entries());
            left.len() == right.len()
                && left
                    .iter()
                    .zip(&right)
                    .all(|((lk, lv), (rk, rv))| lk == rk && values_equal(lv, rv, assumed))
        }
        _ => false,
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ancestors = Ancestors::default();
        Tracked {
            value: self,
            ancestors: &ancestors,
        }
        .fmt(f)
    }
}

impl fmt::Debug for Composite<SequenceData> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&Value::Sequence(self.clone()), f)
    }
}

impl fmt::Debug for Composite<MappingData> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&Value::Mapping(self.clone()), f)
    }
}

struct Tracked<'a> {
    value: &'a Value,
    ancestors: &'a Ancestors,
}

impl Tracked<'_> {
    fn child<'b>(&'b self, value: &'b Value) -> Tracked<'b> {
        Tracked {
            value,
            ancestors: self.ancestors,
        }
    }
}

impl fmt::Debug for Tracked<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Sequence(seq) => {
                let Some(_guard) = self.ancestors.enter(seq.id()) else {
                    return f.write_str("[Circular]");
                };
                let items = seq.to_vec();
                f.debug_list()
                    .entries(items.iter().map(|item| self.child(item)))
                    .finish()
            }
            Value::Mapping(map) => {
                let Some(_guard) = self.ancestors.enter(map.id()) else {
                    return f.write_str("[Circular]");
                };
                let entries = map.entries();
                f.debug_map()
                    .entries(entries.iter().map(|(k, v)| (k, self.child(v))))
                    .finish()
            }
        }
    }
}
