//! Identity-bearing containers: lists, maps and objects
//!
//! Each handle is cheap to clone and shares its storage. Mutations made
//! through a proxy handle (one created by [`List::proxy`] and friends) are
//! reported to the proxy's [`Interceptor`] before they are applied.

use std::rc::Rc;

use indexmap::IndexMap;

use super::container::{DropHook, Interceptor, Mutation, Node};
use super::gate::AccessWindow;
use super::hashable::MapKey;
use super::Value;
use crate::error::{DifError, Result};

/// Most null fillers a single index write or length change may add.
pub const MAX_LIST_GROWTH: usize = 1 << 16;

/// Length a list of `len` items reaches once `index` is written.
///
/// Fails when the index cannot be represented or would add more than
/// [`MAX_LIST_GROWTH`] fillers.
pub fn grown_len(len: usize, index: usize) -> Result<usize> {
    let new_len = index
        .checked_add(1)
        .ok_or_else(|| DifError::InvalidUpdate(format!("list index {index} out of range")))?;
    check_growth(len, new_len)?;
    Ok(new_len.max(len))
}

fn check_growth(len: usize, new_len: usize) -> Result<()> {
    if new_len.saturating_sub(len) > MAX_LIST_GROWTH {
        return Err(DifError::InvalidUpdate(format!(
            "growing a list of {len} items to {new_len} exceeds {MAX_LIST_GROWTH} fillers"
        )));
    }
    Ok(())
}

macro_rules! container_handle {
    ($name:ident, $data:ty) => {
        impl $name {
            /// A proxy handle onto the same storage that reports mutations to
            /// `interceptor`
            pub fn proxy(&self, interceptor: Rc<dyn Interceptor>) -> Self {
                Self(Rc::new(self.0.proxy(interceptor)))
            }

            /// Whether this handle reports its mutations
            pub fn is_proxy(&self) -> bool {
                self.0.is_proxy()
            }

            /// Restrict non-proxy handles to open access windows
            pub fn seal(&self) {
                self.0.seal();
            }

            /// Whether the storage has been sealed
            pub fn is_sealed(&self) -> bool {
                self.0.is_sealed()
            }

            /// Open an access window on the shared storage
            pub fn open_access(&self) -> AccessWindow {
                self.0.open()
            }

            /// Whether both handles are the same handle
            pub fn ptr_eq(&self, other: &Self) -> bool {
                Rc::ptr_eq(&self.0, &other.0)
            }

            /// Whether both handles share storage (original and proxy)
            pub fn same_storage(&self, other: &Self) -> bool {
                self.0.same_storage(&other.0)
            }

            pub(crate) fn on_drop(&self, hook: DropHook) {
                self.0.on_drop(hook);
            }

            pub(crate) fn node(&self) -> &Rc<Node<$data>> {
                &self.0
            }
        }
    };
}

// ═══════════════════════════════════════════════════════════════════════
// List
// ═══════════════════════════════════════════════════════════════════════

/// An ordered, growable sequence of values.
#[derive(Clone, Debug)]
pub struct List(pub(crate) Rc<Node<Vec<Value>>>);

container_handle!(List, Vec<Value>);

impl List {
    /// Create a list from items
    pub fn new(items: Vec<Value>) -> Self {
        Self(Rc::new(Node::new(items)))
    }

    /// Number of items
    pub fn len(&self) -> Result<usize> {
        self.0.read(Vec::len)
    }

    /// Whether the list has no items
    pub fn is_empty(&self) -> Result<bool> {
        self.0.read(Vec::is_empty)
    }

    /// Item at `index`
    pub fn get(&self, index: usize) -> Result<Option<Value>> {
        self.0.read(|items| items.get(index).cloned())
    }

    /// Snapshot of all items
    pub fn to_vec(&self) -> Result<Vec<Value>> {
        self.0.read(Vec::clone)
    }

    /// Write `value` at `index`, growing the list with nulls if needed.
    pub fn set(&self, index: usize, value: Value) -> Result<()> {
        let len = self.len()?;
        grown_len(len, index)?;
        self.0.intercept(Mutation::ListSet {
            index,
            len,
            value: &value,
        })?;
        self.0.write(|items| {
            if index >= items.len() {
                items.resize(index + 1, Value::Null);
            }
            items[index] = value;
        })
    }

    /// Truncate, or extend with nulls, to `new_len` items.
    pub fn set_len(&self, new_len: usize) -> Result<()> {
        let len = self.len()?;
        check_growth(len, new_len)?;
        self.0
            .intercept(Mutation::ListSetLength { len, new_len })?;
        self.0.write(|items| items.resize(new_len, Value::Null))
    }

    /// Append one item
    pub fn push(&self, value: Value) -> Result<()> {
        self.extend(vec![value])
    }

    /// Append all `items`
    pub fn extend(&self, items: Vec<Value>) -> Result<()> {
        let len = self.len()?;
        self.splice(len, Some(0), items).map(drop)
    }

    /// Insert `items` at the front
    pub fn unshift(&self, items: Vec<Value>) -> Result<()> {
        self.splice(0, Some(0), items).map(drop)
    }

    /// Remove and return the last item
    pub fn pop(&self) -> Result<Option<Value>> {
        let len = self.len()?;
        if len == 0 {
            return Ok(None);
        }
        Ok(self.splice(len - 1, Some(1), Vec::new())?.pop())
    }

    /// Remove `delete_count` items at `start` (all remaining when `None`)
    /// and insert `items` in their place; returns the removed items.
    pub fn splice(
        &self,
        start: usize,
        delete_count: Option<usize>,
        items: Vec<Value>,
    ) -> Result<Vec<Value>> {
        let len = self.len()?;
        let start = start.min(len);
        let delete_count = delete_count.unwrap_or(len - start).min(len - start);
        self.0.intercept(Mutation::ListSplice {
            start,
            delete_count,
            items: &items,
        })?;
        self.0.write(|current| {
            current
                .splice(start..start + delete_count, items)
                .collect()
        })
    }

    /// Overwrite `start..end` (clamped to the list) with `value`.
    pub fn fill(&self, value: Value, start: usize, end: Option<usize>) -> Result<()> {
        let len = self.len()?;
        let start = start.min(len);
        let end = end.unwrap_or(len).min(len);
        if end <= start {
            return Ok(());
        }
        self.splice(start, Some(end - start), vec![value; end - start])
            .map(drop)
    }

    /// Remove all items
    pub fn clear(&self) -> Result<()> {
        self.0.intercept(Mutation::Clear)?;
        self.0.write(Vec::clear)
    }

    /// Reverse the items in place
    pub fn reverse(&self) -> Result<()> {
        let mut items = self.to_vec()?;
        items.reverse();
        let len = items.len();
        self.splice(0, Some(len), items).map(drop)
    }
}

impl From<Vec<Value>> for List {
    fn from(items: Vec<Value>) -> Self {
        List::new(items)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Map
// ═══════════════════════════════════════════════════════════════════════

/// An insertion-ordered map with arbitrary value keys.
///
/// Primitive keys compare by value, container keys by identity.
#[derive(Clone, Debug)]
pub struct Map(pub(crate) Rc<Node<IndexMap<MapKey, Value>>>);

container_handle!(Map, IndexMap<MapKey, Value>);

impl Map {
    /// Create an empty map
    pub fn new() -> Self {
        Self::from_pairs(Vec::new())
    }

    /// Create a map from key/value pairs; later duplicates win
    pub fn from_pairs(pairs: Vec<(Value, Value)>) -> Self {
        let entries = pairs
            .into_iter()
            .map(|(key, value)| (MapKey(key), value))
            .collect();
        Self(Rc::new(Node::new(entries)))
    }

    /// Number of entries
    pub fn len(&self) -> Result<usize> {
        self.0.read(IndexMap::len)
    }

    /// Whether the map has no entries
    pub fn is_empty(&self) -> Result<bool> {
        self.0.read(IndexMap::is_empty)
    }

    /// Value stored under `key`
    pub fn get(&self, key: &Value) -> Result<Option<Value>> {
        let key = MapKey(key.clone());
        self.0.read(|entries| entries.get(&key).cloned())
    }

    /// Whether `key` is present
    pub fn contains_key(&self, key: &Value) -> Result<bool> {
        let key = MapKey(key.clone());
        self.0.read(|entries| entries.contains_key(&key))
    }

    /// Snapshot of all entries in insertion order
    pub fn entries(&self) -> Result<Vec<(Value, Value)>> {
        self.0.read(|entries| {
            entries
                .iter()
                .map(|(k, v)| (k.0.clone(), v.clone()))
                .collect()
        })
    }

    /// Insert or overwrite an entry
    pub fn set(&self, key: Value, value: Value) -> Result<()> {
        self.0.intercept(Mutation::Set {
            key: &key,
            value: &value,
        })?;
        self.0.write(|entries| {
            entries.insert(MapKey(key), value);
        })
    }

    /// Remove an entry; returns whether it was present
    pub fn delete(&self, key: &Value) -> Result<bool> {
        if !self.contains_key(key)? {
            return Ok(false);
        }
        self.0.intercept(Mutation::Delete { key })?;
        let key = MapKey(key.clone());
        self.0
            .write(|entries| entries.shift_remove(&key).is_some())
    }

    /// Remove all entries
    pub fn clear(&self) -> Result<()> {
        self.0.intercept(Mutation::Clear)?;
        self.0.write(IndexMap::clear)
    }
}

impl Default for Map {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Object
// ═══════════════════════════════════════════════════════════════════════

/// A text-keyed record, the native form of shape-inferred wire objects.
#[derive(Clone, Debug)]
pub struct Object(pub(crate) Rc<Node<IndexMap<String, Value>>>);

container_handle!(Object, IndexMap<String, Value>);

impl Object {
    /// Create an empty object
    pub fn new() -> Self {
        Self::from_fields(IndexMap::new())
    }

    /// Create an object from fields
    pub fn from_fields(fields: IndexMap<String, Value>) -> Self {
        Self(Rc::new(Node::new(fields)))
    }

    /// Number of fields
    pub fn len(&self) -> Result<usize> {
        self.0.read(IndexMap::len)
    }

    /// Whether the object has no fields
    pub fn is_empty(&self) -> Result<bool> {
        self.0.read(IndexMap::is_empty)
    }

    /// Field value
    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        self.0.read(|fields| fields.get(key).cloned())
    }

    /// Whether `key` is present
    pub fn contains_key(&self, key: &str) -> Result<bool> {
        self.0.read(|fields| fields.contains_key(key))
    }

    /// Snapshot of all fields in insertion order
    pub fn entries(&self) -> Result<Vec<(String, Value)>> {
        self.0.read(|fields| {
            fields
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
    }

    /// Insert or overwrite a field
    pub fn set(&self, key: impl Into<String>, value: Value) -> Result<()> {
        let key = key.into();
        self.0.intercept(Mutation::Set {
            key: &Value::text(key.as_str()),
            value: &value,
        })?;
        self.0.write(|fields| {
            fields.insert(key, value);
        })
    }

    /// Remove a field; returns whether it was present
    pub fn delete(&self, key: &str) -> Result<bool> {
        if !self.contains_key(key)? {
            return Ok(false);
        }
        self.0.intercept(Mutation::Delete {
            key: &Value::text(key),
        })?;
        self.0.write(|fields| fields.shift_remove(key).is_some())
    }

    /// Remove all fields
    pub fn clear(&self) -> Result<()> {
        self.0.intercept(Mutation::Clear)?;
        self.0.write(IndexMap::clear)
    }
}

impl Default for Object {
    fn default() -> Self {
        Self::new()
    }
}
