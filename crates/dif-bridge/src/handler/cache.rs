//! Pointer cache, identity tables and finalization

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use tracing::{debug, trace, warn};

use super::observe::LocalObservers;
use super::DifHandler;
use crate::binding::{CustomMetadata, TypeBinding};
use crate::dif::core::core_type_name;
use crate::dif::{
    DifTypeDefinition, DifValueContainer, ObserveOptions, ObserverId, PointerAddress,
    ReferenceMutability,
};
use crate::error::{DifError, Result};
use crate::runtime::ObserverCallback;
use crate::value::{Identity, Interceptor, Mutation, Ref, Value, WeakValue};

/// Cleanup record queued when a proxied value is dropped.
pub(crate) struct Finalized {
    address: PointerAddress,
    generation: u64,
    observer_id: Option<ObserverId>,
    proxy_id: Option<Identity>,
    original_id: Option<Identity>,
}

struct CacheEntry {
    value: WeakValue,
    /// Kept alive for bindings to replay onto; absent when nothing was proxied
    original: Option<Value>,
    observer_id: Option<ObserverId>,
    mutability: ReferenceMutability,
    binding: Option<Rc<TypeBinding>>,
    custom: Option<CustomMetadata>,
    generation: u64,
}

#[derive(Default)]
pub(crate) struct HandlerState {
    cache: HashMap<PointerAddress, CacheEntry>,
    proxies: HashMap<Identity, (PointerAddress, u64)>,
    originals: HashMap<Identity, (PointerAddress, u64)>,
    pub(super) observers: HashMap<PointerAddress, LocalObservers>,
    pub(super) own_update_replay: HashSet<PointerAddress>,
    next_generation: u64,
}

impl HandlerState {
    pub(super) fn cache_len(&self) -> usize {
        self.cache.len()
    }

    fn live_entry(&self, address: &str) -> Option<&CacheEntry> {
        self.cache
            .get(address)
            .filter(|entry| !entry.value.is_dead())
    }

    fn proxy_address(&self, id: Identity) -> Option<&PointerAddress> {
        let (address, generation) = self.proxies.get(&id)?;
        let entry = self.cache.get(address)?;
        let alive = entry.generation == *generation
            && entry
                .value
                .upgrade()
                .is_some_and(|value| value.identity() == Some(id));
        alive.then_some(address)
    }

    fn original_address(&self, id: Identity) -> Option<&PointerAddress> {
        let (address, generation) = self.originals.get(&id)?;
        let entry = self.cache.get(address)?;
        let alive = entry.generation == *generation
            && entry
                .original
                .as_ref()
                .is_some_and(|original| original.identity() == Some(id));
        alive.then_some(address)
    }
}

/// What the handler knows about a live reference.
#[derive(Clone)]
pub struct ReferenceMetadata {
    /// Pointer address
    pub address: PointerAddress,
    /// Mutability the reference was created with
    pub mutability: ReferenceMutability,
    /// Private state attached by the type binding
    pub custom: Option<CustomMetadata>,
}

impl std::fmt::Debug for ReferenceMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceMetadata")
            .field("address", &self.address)
            .field("mutability", &self.mutability)
            .field("custom", &self.custom.is_some())
            .finish()
    }
}

/// Emits `Replace` when a primitive cell is written.
struct RefSync {
    address: PointerAddress,
    handler: super::WeakDifHandler,
}

impl Interceptor for RefSync {
    fn intercept(&self, mutation: Mutation<'_>) -> Result<()> {
        match mutation {
            Mutation::Replace { value } => self.handler.upgrade()?.trigger_replace(&self.address, value),
            other => Err(DifError::InvalidUpdate(format!(
                "unexpected reference mutation {other:?}"
            ))),
        }
    }
}

/// Rejects every mutation of an immutable container.
struct ImmutableGuard {
    address: PointerAddress,
}

impl Interceptor for ImmutableGuard {
    fn intercept(&self, _mutation: Mutation<'_>) -> Result<()> {
        Err(DifError::immutable(self.address.as_str()))
    }
}

impl DifHandler {
    // ═══════════════════════════════════════════════════════════════════
    // Reference creation
    // ═══════════════════════════════════════════════════════════════════

    /// Allocate a pointer in the runtime. Nothing is cached until the value
    /// is materialized through [`init_reference`](Self::init_reference).
    pub fn create_reference(
        &self,
        container: DifValueContainer,
        allowed_type: Option<DifTypeDefinition>,
        mutability: ReferenceMutability,
    ) -> Result<PointerAddress> {
        self.collect_garbage();
        self.inner
            .runtime
            .create_pointer(container, allowed_type, mutability)
    }

    /// Turn a native value into a reference and return its live handle.
    ///
    /// Primitives come back as a [`Ref`] cell; containers come back proxied
    /// when a binding exists for their type. The value passed in must not be
    /// used afterwards when originals are guarded.
    pub fn create_transparent_reference(
        &self,
        value: Value,
        allowed_type: Option<DifTypeDefinition>,
        mutability: ReferenceMutability,
    ) -> Result<Value> {
        self.collect_garbage();
        if let Some(address) = self.address_of(&value) {
            return Err(DifError::AlreadyBound { address });
        }
        let container = self.to_dif_container(&value)?;
        let address = self.create_reference(container, allowed_type.clone(), mutability)?;
        let allowed_type = match allowed_type {
            Some(allowed_type) => allowed_type,
            None => {
                self.inner
                    .runtime
                    .resolve_pointer_address_sync(&address)?
                    .allowed_type
            }
        };
        self.init_reference(&address, value, mutability, &allowed_type)
    }

    /// Materialize `value` as the live reference for `address`.
    ///
    /// Wraps primitives in a cell, binds containers whose allowed type has a
    /// registered binding, registers the remote observer for mutable
    /// references and caches the result. If the address already has a live
    /// value, that value is returned and `value` is discarded.
    pub fn init_reference(
        &self,
        address: &str,
        value: Value,
        mutability: ReferenceMutability,
        allowed_type: &DifTypeDefinition,
    ) -> Result<Value> {
        if let Some(existing) = self.cached_value(address) {
            trace!(%address, "reference already initialized");
            return Ok(existing);
        }
        // a pointer whose value is another live reference resolves to it
        if let Some(target) = self.address_of(&value) {
            trace!(%address, %target, "reference aliases another reference");
            return Ok(value);
        }

        let mut binding = None;
        let mut custom = None;
        let (proxied, original) = if value.is_primitive() {
            let interceptor = (!mutability.is_immutable()).then(|| {
                Rc::new(RefSync {
                    address: address.to_string(),
                    handler: self.downgrade(),
                }) as Rc<dyn Interceptor>
            });
            (Value::Ref(Ref::new(value, address, mutability, interceptor)), None)
        } else if mutability.is_immutable() {
            (self.guard_immutable(&value, address), Some(value))
        } else {
            match allowed_type.as_reference() {
                Some(type_address) => match self.inner.registry.get_type_binding(type_address) {
                    Some(found) => {
                        let result = found.bind(value.clone(), address)?;
                        custom = result.metadata;
                        binding = Some(found);
                        let proxied = result.value;
                        let original = (!proxied.same_identity(&value)).then_some(value);
                        (proxied, original)
                    }
                    None if core_type_name(type_address).is_some() => (value, None),
                    None => {
                        return Err(DifError::NotImplemented(format!(
                            "Custom type resolution not implemented for ${type_address}"
                        )))
                    }
                },
                None => (value, None),
            }
        };

        let observer_id = if mutability.is_immutable() {
            None
        } else {
            let handler = self.downgrade();
            let observed = address.to_string();
            let callback: ObserverCallback = Rc::new(move |update| {
                if let Ok(handler) = handler.upgrade() {
                    handler.on_remote_update(&observed, update);
                }
            });
            let options = ObserveOptions {
                relay_own_updates: self.relay_wanted(address),
            };
            Some(self.inner.runtime.observe_pointer(
                self.transceiver_id(),
                address,
                options,
                callback,
            )?)
        };

        self.commit(address, &proxied, original, observer_id, mutability, binding, custom)?;
        debug!(%address, ?mutability, observed = observer_id.is_some(), "initialized reference");
        Ok(proxied)
    }

    fn guard_immutable(&self, value: &Value, address: &str) -> Value {
        let guard: Rc<dyn Interceptor> = Rc::new(ImmutableGuard {
            address: address.to_string(),
        });
        let seal = self.inner.config.guard_original_access;
        match value {
            Value::List(list) => {
                let proxy = list.proxy(guard);
                if seal {
                    list.seal();
                }
                Value::List(proxy)
            }
            Value::Map(map) => {
                let proxy = map.proxy(guard);
                if seal {
                    map.seal();
                }
                Value::Map(proxy)
            }
            Value::Object(object) => {
                let proxy = object.proxy(guard);
                if seal {
                    object.seal();
                }
                Value::Object(proxy)
            }
            other => other.clone(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn commit(
        &self,
        address: &str,
        proxied: &Value,
        original: Option<Value>,
        observer_id: Option<ObserverId>,
        mutability: ReferenceMutability,
        binding: Option<Rc<TypeBinding>>,
        custom: Option<CustomMetadata>,
    ) -> Result<()> {
        let weak = proxied.downgrade().ok_or_else(|| {
            DifError::InvalidUpdate(format!(
                "binding for ${address} produced a {} without identity",
                proxied.type_name()
            ))
        })?;
        let proxy_id = proxied.identity();
        let original_id = original.as_ref().and_then(Value::identity);

        let (record, displaced) = {
            let mut state = self.inner.state.borrow_mut();
            state.next_generation += 1;
            let generation = state.next_generation;
            if let Some(id) = proxy_id {
                state.proxies.insert(id, (address.to_string(), generation));
            }
            if let Some(id) = original_id {
                state.originals.insert(id, (address.to_string(), generation));
            }
            let displaced = state.cache.insert(
                address.to_string(),
                CacheEntry {
                    value: weak,
                    original,
                    observer_id,
                    mutability,
                    binding,
                    custom,
                    generation,
                },
            );
            let record = Finalized {
                address: address.to_string(),
                generation,
                observer_id,
                proxy_id,
                original_id,
            };
            (record, displaced)
        };
        drop(displaced);

        let queue = Rc::downgrade(&self.inner.finalized);
        proxied.on_drop(Box::new(move || {
            if let Some(queue) = queue.upgrade() {
                queue.borrow_mut().push(record);
            }
        }));
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════
    // Finalization
    // ═══════════════════════════════════════════════════════════════════

    /// Run cleanup for every proxied value dropped since the last call.
    ///
    /// Every handler operation does this first; call it directly to release
    /// remote observers without waiting for the next operation. Returns the
    /// number of records processed.
    pub fn collect_garbage(&self) -> usize {
        let mut processed = 0;
        loop {
            let pending = std::mem::take(&mut *self.inner.finalized.borrow_mut());
            if pending.is_empty() {
                return processed;
            }
            processed += pending.len();
            for record in pending {
                self.finalize(record);
            }
        }
    }

    fn finalize(&self, record: Finalized) {
        let removed = {
            let mut state = self.inner.state.borrow_mut();
            let generation = record.generation;
            if let Some(id) = record.proxy_id {
                if state.proxies.get(&id).is_some_and(|(_, g)| *g == generation) {
                    state.proxies.remove(&id);
                }
            }
            if let Some(id) = record.original_id {
                if state.originals.get(&id).is_some_and(|(_, g)| *g == generation) {
                    state.originals.remove(&id);
                }
            }
            let current = state
                .cache
                .get(&record.address)
                .is_some_and(|entry| entry.generation == generation);
            if current {
                state.own_update_replay.remove(&record.address);
                let observers = state.observers.remove(&record.address);
                let entry = state.cache.remove(&record.address);
                Some((entry, observers))
            } else {
                None
            }
        };
        let removed_entry = removed.is_some();
        drop(removed);

        if let Some(observer_id) = record.observer_id {
            if let Err(err) = self
                .inner
                .runtime
                .unobserve_pointer(&record.address, observer_id)
            {
                warn!(address = %record.address, observer_id, %err, "failed to unobserve finalized reference");
            }
        }
        debug!(address = %record.address, generation = record.generation, removed_entry, "finalized reference");
    }

    // ═══════════════════════════════════════════════════════════════════
    // Lookups
    // ═══════════════════════════════════════════════════════════════════

    /// Whether a live value is cached for `address`
    pub fn is_cached(&self, address: &str) -> bool {
        self.inner.state.borrow().live_entry(address).is_some()
    }

    pub(crate) fn cached_value(&self, address: &str) -> Option<Value> {
        self.inner
            .state
            .borrow()
            .cache
            .get(address)?
            .value
            .upgrade()
    }

    pub(crate) fn cached_with_binding(&self, address: &str) -> Option<(Value, Option<Rc<TypeBinding>>)> {
        let state = self.inner.state.borrow();
        let entry = state.cache.get(address)?;
        Some((entry.value.upgrade()?, entry.binding.clone()))
    }

    /// Observer id and mutability of a live cache entry
    pub(crate) fn cached_observer(&self, address: &str) -> Option<(Option<ObserverId>, ReferenceMutability)> {
        let state = self.inner.state.borrow();
        let entry = state.live_entry(address)?;
        Some((entry.observer_id, entry.mutability))
    }

    /// Address of the reference `value` belongs to, as proxy or as original
    pub fn address_of(&self, value: &Value) -> Option<PointerAddress> {
        let id = value.identity()?;
        let found = {
            let state = self.inner.state.borrow();
            state
                .proxy_address(id)
                .or_else(|| state.original_address(id))
                .cloned()
        };
        match (found, value) {
            (Some(address), _) => Some(address),
            (None, Value::Ref(cell)) => Some(cell.address().to_string()),
            (None, _) => None,
        }
    }

    /// Whether `value` is a live reference handle or the original behind one
    pub fn is_reference(&self, value: &Value) -> bool {
        self.address_of(value).is_some()
    }

    /// Metadata of a live proxied value
    pub fn reference_metadata(&self, value: &Value) -> Option<ReferenceMetadata> {
        let id = value.identity()?;
        let state = self.inner.state.borrow();
        let address = state.proxy_address(id)?;
        let entry = state.cache.get(address)?;
        Some(ReferenceMetadata {
            address: address.clone(),
            mutability: entry.mutability,
            custom: entry.custom.clone(),
        })
    }

    /// The original behind a proxied value; the value itself when nothing
    /// was proxied
    pub fn original_value_from_proxy(&self, value: &Value) -> Option<Value> {
        let id = value.identity()?;
        let state = self.inner.state.borrow();
        let address = state.proxy_address(id)?;
        let entry = state.cache.get(address)?;
        Some(entry.original.clone().unwrap_or_else(|| value.clone()))
    }

    /// The live proxy for an original; proxies map to themselves
    pub fn proxy_value_from_original(&self, value: &Value) -> Option<Value> {
        let id = value.identity()?;
        let state = self.inner.state.borrow();
        if state.proxy_address(id).is_some() {
            return Some(value.clone());
        }
        let address = state.original_address(id)?;
        state.cache.get(address)?.value.upgrade()
    }
}
