//! Shared container storage, mutation interception and drop hooks

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::gate::{AccessGate, AccessWindow};
use super::Value;
use crate::error::Result;

/// A structural change about to be applied to a proxied container.
///
/// Interceptors see the mutation before the storage changes, so a failing
/// interceptor leaves the value untouched.
#[derive(Debug, Clone, Copy)]
pub enum Mutation<'a> {
    /// The whole value of a primitive reference is replaced
    Replace {
        /// New value
        value: &'a Value,
    },
    /// A list element is written; `index` may lie beyond `len`
    ListSet {
        /// Target index
        index: usize,
        /// Length before the write
        len: usize,
        /// Written value
        value: &'a Value,
    },
    /// The list length changes
    ListSetLength {
        /// Length before the change
        len: usize,
        /// Requested length
        new_len: usize,
    },
    /// Items are removed and inserted at `start`
    ListSplice {
        /// First affected index
        start: usize,
        /// Number of removed items
        delete_count: usize,
        /// Inserted items
        items: &'a [Value],
    },
    /// A map or object entry is written
    Set {
        /// Entry key
        key: &'a Value,
        /// Written value
        value: &'a Value,
    },
    /// A map or object entry is removed
    Delete {
        /// Entry key
        key: &'a Value,
    },
    /// All entries are removed
    Clear,
}

/// Observes mutations made through a proxy handle.
pub trait Interceptor {
    /// Called before `mutation` is applied; an error aborts the mutation.
    fn intercept(&self, mutation: Mutation<'_>) -> Result<()>;
}

/// Callback fired once when the last handle to a node is dropped.
pub(crate) type DropHook = Box<dyn FnOnce()>;

#[derive(Default)]
pub(crate) struct DropSlot(RefCell<Option<DropHook>>);

impl DropSlot {
    pub(crate) fn install(&self, hook: DropHook) {
        *self.0.borrow_mut() = Some(hook);
    }

    pub(crate) fn fire(&mut self) {
        if let Some(hook) = self.0.get_mut().take() {
            hook();
        }
    }
}

/// One handle onto container storage.
///
/// An original and its proxy are two nodes sharing `data` and `gate`; only
/// the proxy carries an interceptor and a drop hook.
pub(crate) struct Node<T> {
    data: Rc<RefCell<T>>,
    gate: Rc<AccessGate>,
    interceptor: Option<Rc<dyn Interceptor>>,
    on_drop: DropSlot,
}

impl<T> Node<T> {
    pub(crate) fn new(data: T) -> Self {
        Self {
            data: Rc::new(RefCell::new(data)),
            gate: Rc::new(AccessGate::default()),
            interceptor: None,
            on_drop: DropSlot::default(),
        }
    }

    /// A second handle onto the same storage that reports mutations.
    pub(crate) fn proxy(&self, interceptor: Rc<dyn Interceptor>) -> Self {
        Self {
            data: self.data.clone(),
            gate: self.gate.clone(),
            interceptor: Some(interceptor),
            on_drop: DropSlot::default(),
        }
    }

    pub(crate) fn is_proxy(&self) -> bool {
        self.interceptor.is_some()
    }

    pub(crate) fn seal(&self) {
        self.gate.seal();
    }

    pub(crate) fn is_sealed(&self) -> bool {
        self.gate.is_sealed()
    }

    pub(crate) fn open(&self) -> AccessWindow {
        self.gate.open()
    }

    pub(crate) fn on_drop(&self, hook: DropHook) {
        self.on_drop.install(hook);
    }

    fn proxy_window(&self) -> Option<AccessWindow> {
        self.interceptor.as_ref().map(|_| self.gate.open())
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R> {
        let _window = self.proxy_window();
        self.gate.check()?;
        Ok(f(&self.data.borrow()))
    }

    pub(crate) fn write<R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R> {
        let _window = self.proxy_window();
        self.gate.check()?;
        Ok(f(&mut self.data.borrow_mut()))
    }

    /// Read without consulting the gate; for formatting and equality only.
    pub(crate) fn peek<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.data.borrow())
    }

    /// Report a mutation; originals only check that access is allowed.
    pub(crate) fn intercept(&self, mutation: Mutation<'_>) -> Result<()> {
        match &self.interceptor {
            Some(interceptor) => interceptor.intercept(mutation),
            None => self.gate.check(),
        }
    }

    pub(crate) fn same_storage(&self, other: &Node<T>) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }
}

impl<T> Drop for Node<T> {
    fn drop(&mut self) {
        self.on_drop.fire();
    }
}

impl<T: fmt::Debug> fmt::Debug for Node<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.data.try_borrow() {
            Ok(data) => data.fmt(f),
            Err(_) => write!(f, "<borrowed>"),
        }
    }
}
