//! Reference cells holding primitive values

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::container::{DropHook, DropSlot, Interceptor, Mutation};
use super::Value;
use crate::dif::{PointerAddress, ReferenceMutability};
use crate::error::{DifError, Result};

/// A mutable cell bound to a pointer address.
///
/// Primitive values cannot carry identity, so every primitive reference is
/// represented by one of these. Clones share the cell.
#[derive(Clone)]
pub struct Ref(pub(crate) Rc<RefNode>);

pub(crate) struct RefNode {
    value: RefCell<Value>,
    address: PointerAddress,
    mutability: ReferenceMutability,
    interceptor: Option<Rc<dyn Interceptor>>,
    on_drop: DropSlot,
}

impl Ref {
    pub(crate) fn new(
        value: Value,
        address: impl Into<PointerAddress>,
        mutability: ReferenceMutability,
        interceptor: Option<Rc<dyn Interceptor>>,
    ) -> Self {
        Self(Rc::new(RefNode {
            value: RefCell::new(value),
            address: address.into(),
            mutability,
            interceptor,
            on_drop: DropSlot::default(),
        }))
    }

    /// Current value
    pub fn get(&self) -> Value {
        self.0.value.borrow().clone()
    }

    /// Replace the value and propagate the change
    pub fn set(&self, value: Value) -> Result<()> {
        if self.0.mutability.is_immutable() {
            return Err(DifError::immutable(self.address()));
        }
        if let Some(interceptor) = &self.0.interceptor {
            interceptor.intercept(Mutation::Replace { value: &value })?;
        }
        self.update_silently(value);
        Ok(())
    }

    /// Address of the pointer this cell is bound to
    pub fn address(&self) -> &str {
        &self.0.address
    }

    /// Mutability of the reference
    pub fn mutability(&self) -> ReferenceMutability {
        self.0.mutability
    }

    /// Whether both handles share the cell
    pub fn ptr_eq(&self, other: &Ref) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Store without reporting, used when replaying remote updates
    pub(crate) fn update_silently(&self, value: Value) {
        *self.0.value.borrow_mut() = value;
    }

    pub(crate) fn on_drop(&self, hook: DropHook) {
        self.0.on_drop.install(hook);
    }
}

impl Drop for RefNode {
    fn drop(&mut self) {
        self.on_drop.fire();
    }
}

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.value.try_borrow() {
            Ok(value) => write!(f, "{}${}({:?})", self.0.mutability, self.0.address, value),
            Err(_) => write!(f, "{}${}(<borrowed>)", self.0.mutability, self.0.address),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_immutable_ref_rejects_set() {
        let cell = Ref::new(Value::from(1), "00aa", ReferenceMutability::Immutable, None);
        assert!(matches!(
            cell.set(Value::from(2)),
            Err(DifError::ImmutableReference { .. })
        ));
        assert_eq!(cell.get(), Value::from(1));
    }

    #[test]
    fn test_clones_share_cell() {
        let cell = Ref::new(Value::Null, "00aa", ReferenceMutability::Mutable, None);
        let other = cell.clone();
        other.set(Value::text("x")).unwrap();
        assert_eq!(cell.get(), Value::text("x"));
        assert!(cell.ptr_eq(&other));
    }
}
