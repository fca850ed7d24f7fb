//! Registry mapping type addresses to bindings

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, warn};

use super::{TypeBinding, TypeBindingDefinition};
use crate::dif::PointerAddress;
use crate::error::{DifError, Result};
use crate::handler::WeakDifHandler;

/// Type address → binding lookup owned by a handler.
pub struct TypeRegistry {
    handler: WeakDifHandler,
    bindings: RefCell<HashMap<PointerAddress, Rc<TypeBinding>>>,
}

impl TypeRegistry {
    pub(crate) fn new(handler: WeakDifHandler) -> Self {
        Self {
            handler,
            bindings: RefCell::new(HashMap::new()),
        }
    }

    /// Register a definition; replaces any earlier binding for its type.
    pub fn register_type_binding(
        &self,
        definition: impl TypeBindingDefinition + 'static,
    ) -> Rc<TypeBinding> {
        let definition: Rc<dyn TypeBindingDefinition> = Rc::new(definition);
        let address = definition.type_address().to_string();
        let binding = Rc::new(TypeBinding::new(definition, self.handler.clone()));
        let previous = self
            .bindings
            .borrow_mut()
            .insert(address.clone(), binding.clone());
        if previous.is_some() {
            warn!(type_address = %address, "replaced existing type binding");
        } else {
            debug!(type_address = %address, "registered type binding");
        }
        binding
    }

    /// The binding for a type, if one is registered
    pub fn get_type_binding(&self, type_address: &str) -> Option<Rc<TypeBinding>> {
        self.bindings.borrow().get(type_address).cloned()
    }

    /// The binding for a type, failing when none is registered
    pub fn require_type_binding(&self, type_address: &str) -> Result<Rc<TypeBinding>> {
        self.get_type_binding(type_address).ok_or_else(|| {
            DifError::NotImplemented(format!(
                "Custom type resolution not implemented for ${type_address}"
            ))
        })
    }

    /// Whether a binding is registered for a type
    pub fn has_type_binding(&self, type_address: &str) -> bool {
        self.bindings.borrow().contains_key(type_address)
    }
}
