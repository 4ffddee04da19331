//! Dynamic value graph for event properties.
//!
//! A [`Value`] is either a primitive leaf or a shared composite
//! ([`Sequence`] or [`Mapping`]). Composites are reference-counted handles,
//! so a graph may alias nodes and contain self references or mutual
//! references. Each composite has an identity ([`NodeId`]) and can be
//! frozen, after which every mutation returns [`ValueError::Frozen`].
//!
//! Equality, `Debug` and serialization all terminate on cyclic graphs.
//!
//! # Cycles and memory
//!
//! Handles are `Arc`s, so a cycle keeps its nodes alive until it is broken
//! (for example with [`Mapping::remove`] or [`Sequence::set`]).
//!
//! # Example
//!
//! ```
//! use telemetry_sanitizer::value::{Mapping, Sequence, Value};
//!
//! let values = Sequence::from_iter([Value::from("fooobar")]);
//! let root = Mapping::from_iter([("values", Value::from(values.clone()))]);
//! values.push(Value::from(root.clone())).unwrap();
//!
//! assert_eq!(values.len(), 2);
//! assert!(format!("{:?}", Value::from(root)).contains("[Circular]"));
//! ```

mod compare;
mod serialize;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::ValueError;

/// Ordered storage of a [`Sequence`].
pub type SequenceData = Vec<Value>;

/// Keyed storage of a [`Mapping`]. Numeric keys are stored stringified.
pub type MappingData = BTreeMap<String, Value>;

/// An ordered, shared list of values.
pub type Sequence = Composite<SequenceData>;

/// A shared string-keyed map of values.
pub type Mapping = Composite<MappingData>;

/// A node in an event property graph.
#[derive(Clone, Default)]
pub enum Value {
    /// Absent value. Omitted from serialized mappings.
    #[default]
    Undefined,
    /// Explicit null.
    Null,
    /// Boolean leaf.
    Bool(bool),
    /// Numeric leaf.
    Number(f64),
    /// String leaf.
    String(String),
    /// Shared ordered list.
    Sequence(Sequence),
    /// Shared string-keyed map.
    Mapping(Mapping),
}

impl Value {
    /// Returns true for [`Value::Sequence`] and [`Value::Mapping`].
    #[must_use]
    pub const fn is_composite(&self) -> bool {
        matches!(self, Self::Sequence(_) | Self::Mapping(_))
    }

    /// Returns true for [`Value::Undefined`].
    #[must_use]
    pub const fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// Identity of the composite, or `None` for leaves.
    #[must_use]
    pub fn node_id(&self) -> Option<NodeId> {
        match self {
            Self::Sequence(seq) => Some(seq.id()),
            Self::Mapping(map) => Some(map.id()),
            _ => None,
        }
    }

    /// Borrow the string contents of a string leaf.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric contents of a number leaf.
    #[must_use]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The sequence handle, if this is a sequence.
    #[must_use]
    pub const fn as_sequence(&self) -> Option<&Sequence> {
        match self {
            Self::Sequence(seq) => Some(seq),
            _ => None,
        }
    }

    /// The mapping handle, if this is a mapping.
    #[must_use]
    pub const fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Self::Mapping(map) => Some(map),
            _ => None,
        }
    }

    /// Short name of the variant.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Sequence(_) => SequenceData::KIND,
            Self::Mapping(_) => MappingData::KIND,
        }
    }

    /// Freeze the top-level composite. Leaves are unaffected.
    ///
    /// Freezing is shallow: nested composites stay mutable.
    pub fn freeze(&self) {
        match self {
            Self::Sequence(seq) => seq.freeze(),
            Self::Mapping(map) => map.freeze(),
            _ => {}
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<Sequence> for Value {
    fn from(value: Sequence) -> Self {
        Self::Sequence(value)
    }
}

impl From<Mapping> for Value {
    fn from(value: Mapping) -> Self {
        Self::Mapping(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Identity of a composite node, stable for the node's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Storage types that can back a [`Composite`].
pub trait CompositeData: Default {
    /// Human-readable kind used in error messages.
    const KIND: &'static str;
}

impl CompositeData for SequenceData {
    const KIND: &'static str = "sequence";
}

impl CompositeData for MappingData {
    const KIND: &'static str = "mapping";
}

struct Node<T> {
    data: RwLock<T>,
    frozen: AtomicBool,
}

/// Shared handle to a composite node.
///
/// Cloning the handle does not copy the node; both handles see the same
/// data and report the same [`NodeId`].
pub struct Composite<T>(Arc<Node<T>>);

impl<T> Clone for Composite<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: CompositeData> Default for Composite<T> {
    fn default() -> Self {
        Self::from_data(T::default())
    }
}

impl<T: CompositeData> Composite<T> {
    /// Create an empty, mutable composite.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap existing storage in a new, mutable composite.
    #[must_use]
    pub fn from_data(data: T) -> Self {
        Self(Arc::new(Node {
            data: RwLock::new(data),
            frozen: AtomicBool::new(false),
        }))
    }

    /// Identity of this node.
    #[must_use]
    pub fn id(&self) -> NodeId {
        NodeId(Arc::as_ptr(&self.0).cast::<()>() as usize)
    }

    /// Returns true if both handles point at the same node.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Make the node reject all further mutation.
    pub fn freeze(&self) {
        self.0.frozen.store(true, Ordering::Release);
    }

    /// Returns true once [`Composite::freeze`] has been called.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.0.frozen.load(Ordering::Acquire)
    }

    /// Run `f` with shared access to the node's storage.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.read())
    }

    fn read(&self) -> RwLockReadGuard<'_, T> {
        match self.0.data.read() {
            Ok(guard) => guard,
            Err(poison_error) => {
                tracing::warn!(
                    kind = T::KIND,
                    error = %poison_error,
                    "Reading composite from poisoned lock, using recovered data"
                );
                poison_error.into_inner()
            }
        }
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, T>, ValueError> {
        if self.is_frozen() {
            return Err(ValueError::Frozen { kind: T::KIND });
        }
        Ok(match self.0.data.write() {
            Ok(guard) => guard,
            Err(poison_error) => {
                tracing::warn!(
                    kind = T::KIND,
                    error = %poison_error,
                    "Writing composite through poisoned lock, using recovered data"
                );
                poison_error.into_inner()
            }
        })
    }
}

impl Composite<SequenceData> {
    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns true if the sequence has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Element at `index`, cloned out of the node.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Value> {
        self.read().get(index).cloned()
    }

    /// Snapshot of all elements.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Value> {
        self.read().clone()
    }

    /// Append an element.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::Frozen`] if the sequence is frozen.
    pub fn push(&self, value: Value) -> Result<(), ValueError> {
        self.write()?.push(value);
        Ok(())
    }

    /// Replace the element at `index`, returning the previous one.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::Frozen`] if the sequence is frozen, or
    /// [`ValueError::IndexOutOfBounds`] if `index >= len`.
    pub fn set(&self, index: usize, value: Value) -> Result<Value, ValueError> {
        let mut items = self.write()?;
        let len = items.len();
        items.get_mut(index).map_or(
            Err(ValueError::IndexOutOfBounds { index, len }),
            |slot| Ok(std::mem::replace(slot, value)),
        )
    }
}

impl FromIterator<Value> for Composite<SequenceData> {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self::from_data(iter.into_iter().collect())
    }
}

impl Composite<MappingData> {
    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns true if the mapping has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Value stored under `key`, cloned out of the node.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.read().get(key).cloned()
    }

    /// Returns true if `key` is present (even when it holds `Undefined`).
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    /// Keys in sorted order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    /// Snapshot of all entries in key order.
    #[must_use]
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Insert or replace an entry, returning the previous value.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::Frozen`] if the mapping is frozen.
    pub fn insert(
        &self,
        key: impl Into<String>,
        value: Value,
    ) -> Result<Option<Value>, ValueError> {
        Ok(self.write()?.insert(key.into(), value))
    }

    /// Remove an entry, returning its value.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::Frozen`] if the mapping is frozen.
    pub fn remove(&self, key: &str) -> Result<Option<Value>, ValueError> {
        Ok(self.write()?.remove(key))
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Composite<MappingData> {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self::from_data(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Composites on the current descent path.
///
/// Used by formatting and serialization to detect re-entry of an ancestor.
#[derive(Debug, Default)]
pub(crate) struct Ancestors(RefCell<Vec<NodeId>>);

impl Ancestors {
    /// Push `id` onto the path, or return `None` if it is already on it.
    pub(crate) fn enter(&self, id: NodeId) -> Option<AncestorGuard<'_>> {
        let mut path = self.0.borrow_mut();
        if path.contains(&id) {
            return None;
        }
        path.push(id);
        Some(AncestorGuard(self))
    }
}

/// Pops its node off the [`Ancestors`] path when dropped.
pub(crate) struct AncestorGuard<'a>(&'a Ancestors);

impl Drop for AncestorGuard<'_> {
    fn drop(&mut self) {
        self.0 .0.borrow_mut().pop();
    }
}
