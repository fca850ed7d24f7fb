//! Native value representation on the host side of the bridge

mod compound;
mod container;
mod display;
mod endpoint;
mod gate;
mod hashable;
mod impls;
mod refs;

pub use compound::{grown_len, List, Map, Object, MAX_LIST_GROWTH};
pub use container::{Interceptor, Mutation};
pub use endpoint::Endpoint;
pub use gate::AccessWindow;
pub use hashable::MapKey;
pub use refs::Ref;

pub(crate) use container::DropHook;

use std::rc::{Rc, Weak};
use std::sync::Arc;

use indexmap::IndexMap;
use num_bigint::BigInt;

use container::Node;
use refs::RefNode;

/// Host-side value.
///
/// Values are organized into two tiers:
/// - Primitives, compared by value and without identity
/// - Identity-bearing handles (lists, maps, objects and reference cells),
///   which can be registered as references and observed by the runtime
#[derive(Clone)]
pub enum Value {
    // ═══════════════════════════════════════════════════════════════════
    // Primitives
    // ═══════════════════════════════════════════════════════════════════
    /// The host's "absent" value, distinct from `Null`
    Undefined,

    /// `null`
    Null,

    /// Boolean
    Bool(bool),

    /// Integer within the native range
    Integer(i128),

    /// Arbitrary-precision integer
    BigInt(BigInt),

    /// Floating point number
    Decimal(f64),

    /// Text
    Text(Arc<str>),

    /// Interned endpoint
    Endpoint(Endpoint),

    // ═══════════════════════════════════════════════════════════════════
    // Identity-bearing handles
    // ═══════════════════════════════════════════════════════════════════
    /// Ordered sequence
    List(List),

    /// Map with arbitrary keys
    Map(Map),

    /// Text-keyed record
    Object(Object),

    /// Reference cell wrapping a primitive
    Ref(Ref),
}

/// Stable identity of a handle, valid while the handle is alive.
pub type Identity = usize;

impl Value {
    /// Whether this value has no identity of its own
    pub fn is_primitive(&self) -> bool {
        !matches!(
            self,
            Value::List(_) | Value::Map(_) | Value::Object(_) | Value::Ref(_)
        )
    }

    /// Identity of an identity-bearing handle
    pub fn identity(&self) -> Option<Identity> {
        match self {
            Value::List(list) => Some(Rc::as_ptr(list.node()) as *const () as Identity),
            Value::Map(map) => Some(Rc::as_ptr(map.node()) as *const () as Identity),
            Value::Object(object) => Some(Rc::as_ptr(object.node()) as *const () as Identity),
            Value::Ref(cell) => Some(Rc::as_ptr(&cell.0) as *const () as Identity),
            _ => None,
        }
    }

    /// Whether both values are the same handle (primitives never are)
    pub fn same_identity(&self, other: &Value) -> bool {
        self.identity().is_some() && self.identity() == other.identity()
    }

    /// A weak handle that does not keep the value alive
    pub fn downgrade(&self) -> Option<WeakValue> {
        match self {
            Value::List(list) => Some(WeakHandle::List(Rc::downgrade(list.node()))),
            Value::Map(map) => Some(WeakHandle::Map(Rc::downgrade(map.node()))),
            Value::Object(object) => Some(WeakHandle::Object(Rc::downgrade(object.node()))),
            Value::Ref(cell) => Some(WeakHandle::Ref(Rc::downgrade(&cell.0))),
            _ => None,
        }
        .map(WeakValue)
    }

    /// Open an access window on a container's storage
    pub fn open_access(&self) -> Option<AccessWindow> {
        match self {
            Value::List(list) => Some(list.open_access()),
            Value::Map(map) => Some(map.open_access()),
            Value::Object(object) => Some(object.open_access()),
            _ => None,
        }
    }

    /// Register a callback for when the last clone of this handle is
    /// dropped. Returns false for primitives.
    pub(crate) fn on_drop(&self, hook: DropHook) -> bool {
        match self {
            Value::List(list) => list.on_drop(hook),
            Value::Map(map) => map.on_drop(hook),
            Value::Object(object) => object.on_drop(hook),
            Value::Ref(cell) => cell.on_drop(hook),
            _ => return false,
        }
        true
    }
}

/// A non-owning handle onto an identity-bearing value.
#[derive(Clone)]
pub struct WeakValue(WeakHandle);

#[derive(Clone)]
enum WeakHandle {
    List(Weak<Node<Vec<Value>>>),
    Map(Weak<Node<IndexMap<MapKey, Value>>>),
    Object(Weak<Node<IndexMap<String, Value>>>),
    Ref(Weak<RefNode>),
}

impl WeakValue {
    /// The value, if it is still alive
    pub fn upgrade(&self) -> Option<Value> {
        match &self.0 {
            WeakHandle::List(weak) => weak.upgrade().map(|node| Value::List(List(node))),
            WeakHandle::Map(weak) => weak.upgrade().map(|node| Value::Map(Map(node))),
            WeakHandle::Object(weak) => weak.upgrade().map(|node| Value::Object(Object(node))),
            WeakHandle::Ref(weak) => weak.upgrade().map(|node| Value::Ref(Ref(node))),
        }
    }

    /// Whether the value has been dropped
    pub fn is_dead(&self) -> bool {
        let strong = match &self.0 {
            WeakHandle::List(weak) => weak.strong_count(),
            WeakHandle::Map(weak) => weak.strong_count(),
            WeakHandle::Object(weak) => weak.strong_count(),
            WeakHandle::Ref(weak) => weak.strong_count(),
        };
        strong == 0
    }
}

impl std::fmt::Debug for WeakValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.upgrade() {
            Some(value) => write!(f, "Weak({value:?})"),
            None => write!(f, "Weak(<dropped>)"),
        }
    }
}
