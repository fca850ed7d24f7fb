//! Local observers and the own-update relay option
//!
//! Local observers see every update the runtime delivers for an address,
//! including the handler's own writes. While an address has local observers
//! its remote observer asks for own updates to be relayed, so those writes
//! come back to be fanned out.

use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::{debug, error};

use super::DifHandler;
use crate::dif::{DifUpdate, DifUpdateData, ObserveOptions, ObserverId};
use crate::error::{DifError, Result};
use crate::value::Value;

/// Id of a local observer, unique per address.
pub type LocalObserverId = u32;

/// Callback receiving every update delivered for an address.
pub type LocalObserver = Rc<dyn Fn(&DifUpdateData) -> Result<()>>;

#[derive(Default)]
pub(crate) struct LocalObservers {
    /// Holds the reference alive while anything observes it
    keep_alive: Option<Value>,
    next_id: LocalObserverId,
    callbacks: BTreeMap<LocalObserverId, LocalObserver>,
}

impl DifHandler {
    /// Observe a reference locally.
    ///
    /// Resolves the address synchronously if needed. The reference stays
    /// alive until its last local observer is removed.
    pub fn observe(
        &self,
        address: &str,
        callback: impl Fn(&DifUpdateData) -> Result<()> + 'static,
    ) -> Result<LocalObserverId> {
        let value = self.resolve_sync(address)?;
        let (_, mutability) = self
            .cached_observer(address)
            .ok_or_else(|| DifError::not_found(format!("Reference ${address}")))?;
        if mutability.is_immutable() {
            return Err(DifError::immutable(address));
        }

        let (id, first) = {
            let mut state = self.inner.state.borrow_mut();
            let observers = state.observers.entry(address.to_string()).or_default();
            let id = observers.next_id;
            observers.next_id += 1;
            let first = observers.callbacks.is_empty();
            observers.callbacks.insert(id, Rc::new(callback));
            if observers.keep_alive.is_none() {
                observers.keep_alive = Some(value);
            }
            (id, first)
        };
        if first {
            self.sync_relay_option(address)?;
        }
        debug!(%address, observer = id, "added local observer");
        Ok(id)
    }

    /// Remove a local observer; takes effect for the next delivery
    pub fn unobserve(&self, address: &str, id: LocalObserverId) -> Result<()> {
        self.collect_garbage();
        let (removed, released, now_empty) = {
            let mut state = self.inner.state.borrow_mut();
            match state.observers.get_mut(address) {
                Some(observers) => {
                    let removed = observers.callbacks.remove(&id);
                    let now_empty = observers.callbacks.is_empty();
                    let released = if removed.is_some() && now_empty {
                        observers.keep_alive.take()
                    } else {
                        None
                    };
                    (removed, released, now_empty)
                }
                None => (None, None, false),
            }
        };
        if removed.is_none() {
            return Err(DifError::not_found(format!(
                "Observer {id} for ${address}"
            )));
        }
        if now_empty {
            self.sync_relay_option(address)?;
        }
        debug!(%address, observer = id, "removed local observer");
        drop(released);
        Ok(())
    }

    /// Number of local observers on an address
    pub fn local_observer_count(&self, address: &str) -> usize {
        self.inner
            .state
            .borrow()
            .observers
            .get(address)
            .map_or(0, |observers| observers.callbacks.len())
    }

    /// Replay updates this handler produced when the runtime echoes them.
    ///
    /// Echoes arriving while the handler is still emitting the same update
    /// are never replayed.
    pub fn set_own_update_replay(&self, address: &str, enabled: bool) -> Result<()> {
        self.collect_garbage();
        let (_, mutability) = self
            .cached_observer(address)
            .ok_or_else(|| DifError::not_found(format!("Reference ${address}")))?;
        if mutability.is_immutable() {
            return Err(DifError::immutable(address));
        }
        {
            let mut state = self.inner.state.borrow_mut();
            if enabled {
                state.own_update_replay.insert(address.to_string());
            } else {
                state.own_update_replay.remove(address);
            }
        }
        self.sync_relay_option(address)
    }

    /// Whether own-update replay was enabled for an address
    pub fn own_update_replay(&self, address: &str) -> bool {
        self.inner.state.borrow().own_update_replay.contains(address)
    }

    /// Whether the remote observer of `address` should receive own updates
    pub(crate) fn relay_wanted(&self, address: &str) -> bool {
        let state = self.inner.state.borrow();
        state.own_update_replay.contains(address)
            || (self.inner.config.relay_own_updates_on_observe
                && state
                    .observers
                    .get(address)
                    .is_some_and(|observers| !observers.callbacks.is_empty()))
    }

    fn sync_relay_option(&self, address: &str) -> Result<()> {
        let Some((Some(observer_id), _)) = self.cached_observer(address) else {
            return Ok(());
        };
        let options = ObserveOptions {
            relay_own_updates: self.relay_wanted(address),
        };
        debug!(%address, relay_own_updates = options.relay_own_updates, "updating observer options");
        self.inner
            .runtime
            .update_observer_options(address, observer_id, options)
    }

    pub(crate) fn notify_local_observers(&self, address: &str, data: &DifUpdateData) {
        let callbacks: Vec<(LocalObserverId, LocalObserver)> = match self.inner.state.borrow().observers.get(address) {
            Some(observers) => observers
                .callbacks
                .iter()
                .map(|(id, callback)| (*id, callback.clone()))
                .collect(),
            None => return,
        };
        for (id, callback) in callbacks {
            let registered = self
                .inner
                .state
                .borrow()
                .observers
                .get(address)
                .is_some_and(|observers| observers.callbacks.contains_key(&id));
            if !registered {
                continue;
            }
            if let Err(err) = callback(data) {
                error!(%address, observer = id, %err, "local observer failed");
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Direct remote observers
    // ═══════════════════════════════════════════════════════════════════

    /// Register a raw observer with the runtime, bypassing the cache
    pub fn observe_direct(
        &self,
        address: &str,
        options: ObserveOptions,
        callback: impl Fn(&DifUpdate) + 'static,
    ) -> Result<ObserverId> {
        self.inner
            .runtime
            .observe_pointer(self.transceiver_id(), address, options, Rc::new(callback))
    }

    /// Remove a raw observer
    pub fn unobserve_direct(&self, address: &str, observer_id: ObserverId) -> Result<()> {
        self.inner.runtime.unobserve_pointer(address, observer_id)
    }

    /// Change the options of a raw observer
    pub fn update_observer_options(
        &self,
        address: &str,
        observer_id: ObserverId,
        options: ObserveOptions,
    ) -> Result<()> {
        self.inner
            .runtime
            .update_observer_options(address, observer_id, options)
    }
}
