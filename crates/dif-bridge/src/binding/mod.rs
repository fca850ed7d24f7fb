//! Type bindings: per-type proxying and replay of remote updates
//!
//! A [`TypeBindingDefinition`] decides how values of one nominal type are
//! proxied when they become references, and how each kind of remote update
//! is replayed onto them. The handler wraps every registered definition in a
//! [`TypeBinding`], which supplies the context a definition needs: the
//! handler, per-reference metadata, the original behind a proxy, and the
//! window that allows touching that original.

mod list;
mod map;
mod registry;

pub use list::ListBinding;
pub use map::MapBinding;
pub use registry::TypeRegistry;

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::dif::{DifUpdateData, DifUpdateKind};
use crate::error::{DifError, Result};
use crate::handler::{DifHandler, WeakDifHandler};
use crate::value::Value;

/// Per-reference private state a binding attaches when binding a value.
pub type CustomMetadata = Rc<dyn Any>;

/// Outcome of [`TypeBindingDefinition::bind`].
pub struct BindResult {
    /// The value to hand out, usually a proxy of the input
    pub value: Value,
    /// Private state retrievable via [`TypeBinding::custom_reference_metadata`]
    pub metadata: Option<CustomMetadata>,
}

impl BindResult {
    /// Hand out `value` without metadata
    pub fn new(value: Value) -> Self {
        Self {
            value,
            metadata: None,
        }
    }

    /// Attach private metadata
    pub fn with_metadata(mut self, metadata: CustomMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// How one nominal type is proxied and how remote updates are replayed.
///
/// Handlers receive the proxy as `target` and must apply the change to the
/// original behind it (see [`TypeBinding::original_value`]); the handler
/// already holds the access window open while they run. Only the kinds
/// listed by [`update_kinds`](Self::update_kinds) are dispatched.
pub trait TypeBindingDefinition {
    /// Address of the nominal type this definition binds
    fn type_address(&self) -> &str;

    /// Wrap `value`, which is becoming the reference at `address`
    fn bind(&self, cx: &TypeBinding, value: Value, address: &str) -> Result<BindResult>;

    /// Update kinds this definition can replay
    fn update_kinds(&self) -> &[DifUpdateKind] {
        &[]
    }

    /// Replay `Set`
    fn handle_set(&self, cx: &TypeBinding, target: &Value, key: Value, value: Value) -> Result<()> {
        let _ = (cx, target, key, value);
        Err(self.unhandled(DifUpdateKind::Set))
    }

    /// Replay `Append`
    fn handle_append(&self, cx: &TypeBinding, target: &Value, value: Value) -> Result<()> {
        let _ = (cx, target, value);
        Err(self.unhandled(DifUpdateKind::Append))
    }

    /// Replay `Replace`
    fn handle_replace(&self, cx: &TypeBinding, target: &Value, value: Value) -> Result<()> {
        let _ = (cx, target, value);
        Err(self.unhandled(DifUpdateKind::Replace))
    }

    /// Replay `Delete`
    fn handle_delete(&self, cx: &TypeBinding, target: &Value, key: Value) -> Result<()> {
        let _ = (cx, target, key);
        Err(self.unhandled(DifUpdateKind::Delete))
    }

    /// Replay `Clear`
    fn handle_clear(&self, cx: &TypeBinding, target: &Value) -> Result<()> {
        let _ = (cx, target);
        Err(self.unhandled(DifUpdateKind::Clear))
    }

    /// Replay `ListSplice`
    fn handle_list_splice(
        &self,
        cx: &TypeBinding,
        target: &Value,
        start: usize,
        delete_count: usize,
        items: Vec<Value>,
    ) -> Result<()> {
        let _ = (cx, target, start, delete_count, items);
        Err(self.unhandled(DifUpdateKind::ListSplice))
    }

    #[doc(hidden)]
    fn unhandled(&self, kind: DifUpdateKind) -> DifError {
        DifError::NotImplemented(format!(
            "{kind:?} updates for type ${}",
            self.type_address()
        ))
    }
}

/// A registered definition together with its handler context.
pub struct TypeBinding {
    definition: Rc<dyn TypeBindingDefinition>,
    handler: WeakDifHandler,
}

impl TypeBinding {
    pub(crate) fn new(definition: Rc<dyn TypeBindingDefinition>, handler: WeakDifHandler) -> Self {
        Self {
            definition,
            handler,
        }
    }

    /// Address of the bound type
    pub fn type_address(&self) -> &str {
        self.definition.type_address()
    }

    /// The definition
    pub fn definition(&self) -> &Rc<dyn TypeBindingDefinition> {
        &self.definition
    }

    /// The owning handler
    pub fn handler(&self) -> Result<DifHandler> {
        self.handler.upgrade()
    }

    /// A non-owning handle to the owning handler, for interceptors
    pub fn weak_handler(&self) -> WeakDifHandler {
        self.handler.clone()
    }

    /// Whether bound originals should be sealed
    pub fn guard_original_access(&self) -> bool {
        self.handler
            .upgrade()
            .is_ok_and(|handler| handler.config().guard_original_access)
    }

    /// Metadata attached when `value` was bound
    pub fn custom_reference_metadata(&self, value: &Value) -> Option<CustomMetadata> {
        self.handler
            .upgrade()
            .ok()?
            .reference_metadata(value)?
            .custom
    }

    /// The original behind a bound proxy
    pub fn original_value(&self, target: &Value) -> Result<Value> {
        self.handler()?
            .original_value_from_proxy(target)
            .ok_or_else(|| DifError::InvalidUpdate("value is not a bound proxy".to_string()))
    }

    /// Run `f` with the access window on `target`'s storage open
    pub fn allow_original_value_access<R>(&self, target: &Value, f: impl FnOnce() -> R) -> R {
        let _window = target.open_access();
        f()
    }

    /// Bind `value` as the reference at `address`
    pub fn bind(&self, value: Value, address: &str) -> Result<BindResult> {
        self.definition.bind(self, value, address)
    }

    /// Decode a remote update and replay it onto `target`.
    pub fn handle_dif_update(&self, target: &Value, address: &str, data: &DifUpdateData) -> Result<()> {
        let kind = data.kind();
        if !self.definition.update_kinds().contains(&kind) {
            debug!(%address, ?kind, type_address = self.type_address(), "binding does not replay update kind");
            return Ok(());
        }
        let handler = self.handler()?;
        let def = &self.definition;

        self.allow_original_value_access(target, || match data {
            DifUpdateData::Replace { value } => {
                let value = handler.resolve_value_container_sync(value)?;
                def.handle_replace(self, target, value)
            }
            DifUpdateData::Append { value } => {
                let value = handler.resolve_value_container_sync(value)?;
                def.handle_append(self, target, value)
            }
            DifUpdateData::Set { key, value } => {
                let key = handler.resolve_property_sync(key)?;
                let value = handler.resolve_value_container_sync(value)?;
                def.handle_set(self, target, key, value)
            }
            DifUpdateData::Delete { key } => {
                let key = handler.resolve_property_sync(key)?;
                def.handle_delete(self, target, key)
            }
            DifUpdateData::Clear => def.handle_clear(self, target),
            DifUpdateData::ListSplice {
                start,
                delete_count,
                items,
            } => {
                let items = items
                    .iter()
                    .map(|item| handler.resolve_value_container_sync(item))
                    .collect::<Result<Vec<_>>>()?;
                def.handle_list_splice(self, target, *start, *delete_count, items)
            }
        })
    }
}

impl fmt::Debug for TypeBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeBinding")
            .field("type_address", &self.type_address())
            .field("update_kinds", &self.definition.update_kinds())
            .finish()
    }
}
