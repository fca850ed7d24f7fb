//! In-memory runtime holding pointers as wire values

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

use tracing::{debug, trace};

use super::{DifRuntime, ObserverCallback};
use crate::dif::core::core_type;
use crate::dif::{
    DifProperty, DifReference, DifRepresentationValue, DifTypeDefinition, DifUpdate,
    DifUpdateData, DifValue, DifValueContainer, ObserveOptions, ObserverId, PointerAddress,
    ReferenceMutability, TransceiverId,
};
use crate::error::{DifError, Result};
use crate::maybe_async::MaybeAsync;
use crate::value::grown_len;

type Executor = Box<dyn Fn(&str, Vec<DifValueContainer>) -> Result<DifValueContainer>>;

#[derive(Clone)]
struct RegisteredObserver {
    transceiver_id: TransceiverId,
    options: ObserveOptions,
    callback: ObserverCallback,
}

struct StoredPointer {
    reference: DifReference,
    /// Not resident: only the asynchronous resolve succeeds
    remote: bool,
    observers: BTreeMap<ObserverId, RegisteredObserver>,
    next_observer_id: ObserverId,
}

#[derive(Default)]
struct MemoryState {
    pointers: HashMap<PointerAddress, StoredPointer>,
    next_address: u64,
}

/// A runtime that keeps every pointer in process memory.
///
/// Updates are applied to the stored wire value and then dispatched to
/// observers. Observers registered by the update's own transceiver only see
/// it when they asked for own updates to be relayed.
#[derive(Default)]
pub struct InMemoryRuntime {
    state: RefCell<MemoryState>,
    executor: RefCell<Option<Executor>>,
}

impl InMemoryRuntime {
    /// Create an empty runtime
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a pointer that can only be resolved asynchronously, as if it had
    /// to be fetched from another endpoint.
    pub fn insert_remote_pointer(
        &self,
        value: DifValueContainer,
        allowed_type: Option<DifTypeDefinition>,
        mutability: ReferenceMutability,
    ) -> PointerAddress {
        self.insert(value, allowed_type, mutability, true)
    }

    /// Number of observers registered on a pointer
    pub fn observer_count(&self, address: &str) -> usize {
        self.state
            .borrow()
            .pointers
            .get(address)
            .map_or(0, |pointer| pointer.observers.len())
    }

    /// Options of a registered observer
    pub fn observer_options(&self, address: &str, observer_id: ObserverId) -> Option<ObserveOptions> {
        self.state
            .borrow()
            .pointers
            .get(address)?
            .observers
            .get(&observer_id)
            .map(|observer| observer.options)
    }

    /// Install the script evaluator used by `execute`
    pub fn set_executor(
        &self,
        executor: impl Fn(&str, Vec<DifValueContainer>) -> Result<DifValueContainer> + 'static,
    ) {
        *self.executor.borrow_mut() = Some(Box::new(executor));
    }

    fn insert(
        &self,
        value: DifValueContainer,
        allowed_type: Option<DifTypeDefinition>,
        mutability: ReferenceMutability,
        remote: bool,
    ) -> PointerAddress {
        let mut state = self.state.borrow_mut();
        state.next_address += 1;
        let address = format!("{:010x}", state.next_address);
        let allowed_type = allowed_type.unwrap_or_else(|| infer_allowed_type(&value));
        debug!(%address, allowed_type = %allowed_type, remote, "created pointer");
        state.pointers.insert(
            address.clone(),
            StoredPointer {
                reference: DifReference {
                    value,
                    allowed_type,
                    mutability,
                },
                remote,
                observers: BTreeMap::new(),
                next_observer_id: 0,
            },
        );
        address
    }

    fn is_observing(&self, address: &str, observer_id: ObserverId) -> bool {
        self.state
            .borrow()
            .pointers
            .get(address)
            .is_some_and(|pointer| pointer.observers.contains_key(&observer_id))
    }

    fn with_pointer<R>(
        &self,
        address: &str,
        f: impl FnOnce(&mut StoredPointer) -> Result<R>,
    ) -> Result<R> {
        let mut state = self.state.borrow_mut();
        let pointer = state
            .pointers
            .get_mut(address)
            .ok_or_else(|| DifError::UnknownReference {
                address: address.to_string(),
            })?;
        f(pointer)
    }
}

impl DifRuntime for InMemoryRuntime {
    fn resolve_pointer_address(&self, address: &str) -> Result<MaybeAsync<DifReference>> {
        let (reference, remote) =
            self.with_pointer(address, |pointer| Ok((pointer.reference.clone(), pointer.remote)))?;
        if remote {
            trace!(%address, "resolving remote pointer");
            return Ok(MaybeAsync::pending(async move { Ok(reference) }));
        }
        Ok(MaybeAsync::Ready(reference))
    }

    fn resolve_pointer_address_sync(&self, address: &str) -> Result<DifReference> {
        self.with_pointer(address, |pointer| {
            if pointer.remote {
                return Err(DifError::requires_async(format!(
                    "Resolving remote pointer ${address}"
                )));
            }
            Ok(pointer.reference.clone())
        })
    }

    fn create_pointer(
        &self,
        value: DifValueContainer,
        allowed_type: Option<DifTypeDefinition>,
        mutability: ReferenceMutability,
    ) -> Result<PointerAddress> {
        Ok(self.insert(value, allowed_type, mutability, false))
    }

    fn update(
        &self,
        transceiver_id: TransceiverId,
        address: &str,
        data: DifUpdateData,
    ) -> Result<()> {
        let recipients: Vec<(ObserverId, ObserverCallback)> =
            self.with_pointer(address, |pointer| {
                if pointer.reference.mutability.is_immutable() {
                    return Err(DifError::immutable(address));
                }
                apply_update(&mut pointer.reference.value, &data)?;
                Ok(pointer
                    .observers
                    .iter()
                    .filter(|(_, o)| {
                        o.transceiver_id != transceiver_id || o.options.relay_own_updates
                    })
                    .map(|(id, o)| (*id, o.callback.clone()))
                    .collect())
            })?;

        trace!(%address, source = transceiver_id, kind = ?data.kind(), recipients = recipients.len(), "applied update");
        let update = DifUpdate {
            source_id: transceiver_id,
            data,
        };
        for (observer_id, callback) in recipients {
            // An earlier callback may have unobserved this one
            if self.is_observing(address, observer_id) {
                callback(&update);
            }
        }
        Ok(())
    }

    fn observe_pointer(
        &self,
        transceiver_id: TransceiverId,
        address: &str,
        options: ObserveOptions,
        callback: ObserverCallback,
    ) -> Result<ObserverId> {
        self.with_pointer(address, |pointer| {
            if pointer.reference.mutability.is_immutable() {
                return Err(DifError::immutable(address));
            }
            let observer_id = pointer.next_observer_id;
            pointer.next_observer_id += 1;
            pointer.observers.insert(
                observer_id,
                RegisteredObserver {
                    transceiver_id,
                    options,
                    callback,
                },
            );
            Ok(observer_id)
        })
    }

    fn unobserve_pointer(&self, address: &str, observer_id: ObserverId) -> Result<()> {
        self.with_pointer(address, |pointer| {
            pointer
                .observers
                .remove(&observer_id)
                .map(drop)
                .ok_or_else(|| {
                    DifError::not_found(format!("Observer {observer_id} for ${address}"))
                })
        })
    }

    fn update_observer_options(
        &self,
        address: &str,
        observer_id: ObserverId,
        options: ObserveOptions,
    ) -> Result<()> {
        self.with_pointer(address, |pointer| {
            let observer = pointer.observers.get_mut(&observer_id).ok_or_else(|| {
                DifError::not_found(format!("Observer {observer_id} for ${address}"))
            })?;
            observer.options = options;
            Ok(())
        })
    }

    fn execute(
        &self,
        script: &str,
        args: Vec<DifValueContainer>,
    ) -> Result<MaybeAsync<DifValueContainer>> {
        self.execute_sync(script, args).map(MaybeAsync::Ready)
    }

    fn execute_sync(&self, script: &str, args: Vec<DifValueContainer>) -> Result<DifValueContainer> {
        match self.executor.borrow().as_ref() {
            Some(executor) => executor(script, args),
            None => Err(DifError::Unsupported("script execution".to_string())),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Applying updates to wire values
// ═══════════════════════════════════════════════════════════════════════

fn null_container() -> DifValueContainer {
    DifValueContainer::untyped(DifRepresentationValue::Null)
}

fn infer_allowed_type(value: &DifValueContainer) -> DifTypeDefinition {
    let address = match value {
        DifValueContainer::Address(_) => core_type::UNKNOWN,
        DifValueContainer::Value(DifValue { ty: Some(ty), .. }) => return ty.clone(),
        DifValueContainer::Value(DifValue { ty: None, value }) => match value {
            DifRepresentationValue::Null => core_type::NULL,
            DifRepresentationValue::Bool(_) => core_type::BOOLEAN,
            DifRepresentationValue::Number(n) if n.is_f64() => core_type::DECIMAL_F64,
            DifRepresentationValue::Number(_) => core_type::INTEGER,
            DifRepresentationValue::Text(_) => core_type::TEXT,
            DifRepresentationValue::List(_) => core_type::LIST,
            DifRepresentationValue::Map(_) | DifRepresentationValue::Object(_) => core_type::MAP,
        },
    };
    DifTypeDefinition::reference(address)
}

fn property_index(key: &DifProperty) -> Option<usize> {
    match key {
        DifProperty::Index(index) => Some(*index),
        DifProperty::Text(text) => text.parse().ok(),
        DifProperty::Value(DifValueContainer::Value(DifValue {
            value: DifRepresentationValue::Number(n),
            ..
        })) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        DifProperty::Value(_) => None,
    }
}

fn property_text(key: &DifProperty) -> Option<String> {
    match key {
        DifProperty::Text(text) => Some(text.clone()),
        DifProperty::Index(index) => Some(index.to_string()),
        DifProperty::Value(DifValueContainer::Value(DifValue {
            value: DifRepresentationValue::Text(text),
            ..
        })) => Some(text.clone()),
        DifProperty::Value(_) => None,
    }
}

fn property_container(key: &DifProperty) -> DifValueContainer {
    match key {
        DifProperty::Text(text) => DifValueContainer::untyped(text.as_str()),
        DifProperty::Index(index) => DifValueContainer::untyped(DifRepresentationValue::Number(
            (*index as u64).into(),
        )),
        DifProperty::Value(container) => container.clone(),
    }
}

fn invalid(data: &DifUpdateData, target: &str) -> DifError {
    DifError::InvalidUpdate(format!("cannot apply {:?} to {target}", data.kind()))
}

/// Apply an update to a stored wire value.
fn apply_update(target: &mut DifValueContainer, data: &DifUpdateData) -> Result<()> {
    if let DifUpdateData::Replace { value } = data {
        *target = value.clone();
        return Ok(());
    }
    let DifValueContainer::Value(DifValue { value, .. }) = target else {
        return Err(invalid(data, "a bare address"));
    };

    match (value, data) {
        (DifRepresentationValue::List(items), DifUpdateData::Append { value }) => {
            items.push(value.clone());
        }
        (DifRepresentationValue::List(items), DifUpdateData::Set { key, value }) => {
            let index = property_index(key).ok_or_else(|| invalid(data, "a list"))?;
            let len = grown_len(items.len(), index)?;
            items.resize(len, null_container());
            items[index] = value.clone();
        }
        (DifRepresentationValue::List(items), DifUpdateData::Delete { key }) => {
            let index = property_index(key).ok_or_else(|| invalid(data, "a list"))?;
            if index < items.len() {
                items.remove(index);
            }
        }
        (
            DifRepresentationValue::List(items),
            DifUpdateData::ListSplice {
                start,
                delete_count,
                items: inserted,
            },
        ) => {
            let start = (*start).min(items.len());
            let end = start.saturating_add(*delete_count).min(items.len());
            items.splice(start..end, inserted.iter().cloned());
        }
        (DifRepresentationValue::List(items), DifUpdateData::Clear) => items.clear(),

        (DifRepresentationValue::Map(pairs), DifUpdateData::Set { key, value }) => {
            let key = property_container(key);
            match pairs.iter_mut().find(|(k, _)| *k == key) {
                Some((_, existing)) => *existing = value.clone(),
                None => pairs.push((key, value.clone())),
            }
        }
        (DifRepresentationValue::Map(pairs), DifUpdateData::Delete { key }) => {
            let key = property_container(key);
            pairs.retain(|(k, _)| *k != key);
        }
        (DifRepresentationValue::Map(pairs), DifUpdateData::Clear) => pairs.clear(),

        (DifRepresentationValue::Object(fields), DifUpdateData::Set { key, value }) => {
            let key = property_text(key).ok_or_else(|| invalid(data, "an object"))?;
            fields.insert(key, value.clone());
        }
        (DifRepresentationValue::Object(fields), DifUpdateData::Delete { key }) => {
            let key = property_text(key).ok_or_else(|| invalid(data, "an object"))?;
            fields.shift_remove(&key);
        }
        (DifRepresentationValue::Object(fields), DifUpdateData::Clear) => fields.clear(),

        _ => return Err(invalid(data, "this value")),
    }
    Ok(())
}
