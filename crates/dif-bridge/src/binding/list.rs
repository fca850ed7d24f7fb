//! Binding for the core `list` type

use std::rc::Rc;

use super::{BindResult, TypeBinding, TypeBindingDefinition};
use crate::dif::core::core_type;
use crate::dif::{DifUpdateKind, PointerAddress};
use crate::error::{DifError, Result};
use crate::handler::WeakDifHandler;
use crate::value::{Interceptor, List, Mutation, Value};

/// Proxies lists so every structural change is emitted as a list update.
///
/// Element writes past the end first emit one `Append(null)` per skipped
/// slot, then the indexed `Set`. Length changes emit a splice when
/// shrinking and appends when growing. Bulk operations (push, unshift,
/// splice, fill, reverse) emit a single `ListSplice`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ListBinding;

const LIST_UPDATE_KINDS: &[DifUpdateKind] = &[
    DifUpdateKind::Replace,
    DifUpdateKind::Append,
    DifUpdateKind::Set,
    DifUpdateKind::Delete,
    DifUpdateKind::Clear,
    DifUpdateKind::ListSplice,
];

fn original_list(cx: &TypeBinding, target: &Value) -> Result<List> {
    match cx.original_value(target)? {
        Value::List(list) => Ok(list),
        other => Err(DifError::InvalidUpdate(format!(
            "list binding applied to {}",
            other.type_name()
        ))),
    }
}

fn index_key(key: &Value) -> Result<usize> {
    key.as_index()
        .ok_or_else(|| DifError::InvalidUpdate(format!("invalid list index {key:?}")))
}

impl TypeBindingDefinition for ListBinding {
    fn type_address(&self) -> &str {
        core_type::LIST
    }

    fn bind(&self, cx: &TypeBinding, value: Value, address: &str) -> Result<BindResult> {
        let original = match value {
            Value::List(list) => list,
            other => return Ok(BindResult::new(other)),
        };
        let proxy = original.proxy(Rc::new(ListSync {
            address: address.to_string(),
            handler: cx.weak_handler(),
        }));
        if cx.guard_original_access() {
            original.seal();
        }
        Ok(BindResult::new(Value::List(proxy)))
    }

    fn update_kinds(&self) -> &[DifUpdateKind] {
        LIST_UPDATE_KINDS
    }

    fn handle_set(&self, cx: &TypeBinding, target: &Value, key: Value, value: Value) -> Result<()> {
        original_list(cx, target)?.set(index_key(&key)?, value)
    }

    fn handle_append(&self, cx: &TypeBinding, target: &Value, value: Value) -> Result<()> {
        original_list(cx, target)?.push(value)
    }

    fn handle_replace(&self, cx: &TypeBinding, target: &Value, value: Value) -> Result<()> {
        let items = match &value {
            Value::List(list) => list.to_vec()?,
            other => {
                return Err(DifError::InvalidUpdate(format!(
                    "cannot replace a list with {}",
                    other.type_name()
                )))
            }
        };
        original_list(cx, target)?.splice(0, None, items).map(drop)
    }

    fn handle_delete(&self, cx: &TypeBinding, target: &Value, key: Value) -> Result<()> {
        original_list(cx, target)?
            .splice(index_key(&key)?, Some(1), Vec::new())
            .map(drop)
    }

    fn handle_clear(&self, cx: &TypeBinding, target: &Value) -> Result<()> {
        original_list(cx, target)?.clear()
    }

    fn handle_list_splice(
        &self,
        cx: &TypeBinding,
        target: &Value,
        start: usize,
        delete_count: usize,
        items: Vec<Value>,
    ) -> Result<()> {
        original_list(cx, target)?
            .splice(start, Some(delete_count), items)
            .map(drop)
    }
}

/// Emits list mutations made through a proxy.
struct ListSync {
    address: PointerAddress,
    handler: WeakDifHandler,
}

impl Interceptor for ListSync {
    fn intercept(&self, mutation: Mutation<'_>) -> Result<()> {
        let handler = self.handler.upgrade()?;
        let address = self.address.as_str();
        match mutation {
            Mutation::ListSet { index, len, value } => {
                for _ in len..index {
                    handler.trigger_append(address, &Value::Null)?;
                }
                handler.trigger_index_set(address, index, value)
            }
            Mutation::ListSetLength { len, new_len } if new_len < len => {
                handler.trigger_list_splice(address, new_len, len - new_len, &[])
            }
            Mutation::ListSetLength { len, new_len } => {
                for _ in len..new_len {
                    handler.trigger_append(address, &Value::Null)?;
                }
                Ok(())
            }
            Mutation::ListSplice {
                start,
                delete_count,
                items,
            } => handler.trigger_list_splice(address, start, delete_count, items),
            Mutation::Clear => handler.trigger_clear(address),
            other => Err(DifError::InvalidUpdate(format!(
                "unexpected list mutation {other:?}"
            ))),
        }
    }
}
