//! Binding for the core `map` type

use std::rc::Rc;

use super::{BindResult, TypeBinding, TypeBindingDefinition};
use crate::dif::core::core_type;
use crate::dif::{DifUpdateKind, PointerAddress};
use crate::error::{DifError, Result};
use crate::handler::WeakDifHandler;
use crate::value::{Interceptor, Mutation, Value};

/// Proxies maps and text-keyed objects, emitting `Set`, `Delete` and `Clear`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MapBinding;

const MAP_UPDATE_KINDS: &[DifUpdateKind] = &[
    DifUpdateKind::Replace,
    DifUpdateKind::Set,
    DifUpdateKind::Delete,
    DifUpdateKind::Clear,
];

/// Object fields are text; numeric keys arriving from the wire are
/// rendered the way the runtime renders them.
fn field_name(key: &Value) -> Result<String> {
    match key {
        Value::Text(text) => Ok(text.to_string()),
        Value::Integer(n) => Ok(n.to_string()),
        other => Err(DifError::InvalidUpdate(format!(
            "object keys must be text, got {}",
            other.type_name()
        ))),
    }
}

fn set_entry(target: &Value, key: Value, value: Value) -> Result<()> {
    match target {
        Value::Map(map) => map.set(key, value),
        Value::Object(object) => object.set(field_name(&key)?, value),
        other => Err(unsupported(other)),
    }
}

fn unsupported(value: &Value) -> DifError {
    DifError::InvalidUpdate(format!("map binding applied to {}", value.type_name()))
}

impl TypeBindingDefinition for MapBinding {
    fn type_address(&self) -> &str {
        core_type::MAP
    }

    fn bind(&self, cx: &TypeBinding, value: Value, address: &str) -> Result<BindResult> {
        let sync = Rc::new(MapSync {
            address: address.to_string(),
            handler: cx.weak_handler(),
        });
        let proxy = match &value {
            Value::Map(original) => Value::Map(original.proxy(sync)),
            Value::Object(original) => Value::Object(original.proxy(sync)),
            _ => return Ok(BindResult::new(value)),
        };
        if cx.guard_original_access() {
            match &value {
                Value::Map(original) => original.seal(),
                Value::Object(original) => original.seal(),
                _ => {}
            }
        }
        Ok(BindResult::new(proxy))
    }

    fn update_kinds(&self) -> &[DifUpdateKind] {
        MAP_UPDATE_KINDS
    }

    fn handle_set(&self, cx: &TypeBinding, target: &Value, key: Value, value: Value) -> Result<()> {
        set_entry(&cx.original_value(target)?, key, value)
    }

    fn handle_delete(&self, cx: &TypeBinding, target: &Value, key: Value) -> Result<()> {
        match cx.original_value(target)? {
            Value::Map(map) => map.delete(&key).map(drop),
            Value::Object(object) => object.delete(&field_name(&key)?).map(drop),
            other => Err(unsupported(&other)),
        }
    }

    fn handle_clear(&self, cx: &TypeBinding, target: &Value) -> Result<()> {
        match cx.original_value(target)? {
            Value::Map(map) => map.clear(),
            Value::Object(object) => object.clear(),
            other => Err(unsupported(&other)),
        }
    }

    fn handle_replace(&self, cx: &TypeBinding, target: &Value, value: Value) -> Result<()> {
        let entries = match &value {
            Value::Map(map) => map.entries()?,
            Value::Object(object) => object
                .entries()?
                .into_iter()
                .map(|(k, v)| (Value::text(k), v))
                .collect(),
            other => {
                return Err(DifError::InvalidUpdate(format!(
                    "cannot replace a map with {}",
                    other.type_name()
                )))
            }
        };
        let original = cx.original_value(target)?;
        self.handle_clear(cx, target)?;
        for (key, value) in entries {
            set_entry(&original, key, value)?;
        }
        Ok(())
    }
}

/// Emits map and object mutations made through a proxy.
struct MapSync {
    address: PointerAddress,
    handler: WeakDifHandler,
}

impl Interceptor for MapSync {
    fn intercept(&self, mutation: Mutation<'_>) -> Result<()> {
        let handler = self.handler.upgrade()?;
        let address = self.address.as_str();
        match mutation {
            Mutation::Set { key, value } => handler.trigger_set(address, key, value),
            Mutation::Delete { key } => handler.trigger_delete(address, key),
            Mutation::Clear => handler.trigger_clear(address),
            other => Err(DifError::InvalidUpdate(format!(
                "unexpected map mutation {other:?}"
            ))),
        }
    }
}
