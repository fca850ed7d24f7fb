//! Outbound update emission and inbound update dispatch

use std::cell::RefCell;
use std::collections::HashMap;

use tracing::{debug, error, trace};

use super::DifHandler;
use crate::dif::{DifProperty, DifUpdate, DifUpdateData, PointerAddress};
use crate::error::{DifError, Result};
use crate::value::Value;

/// Marks an address as emitting for the lifetime of the guard.
struct Emitting<'a> {
    addresses: &'a RefCell<HashMap<PointerAddress, usize>>,
    address: PointerAddress,
}

impl<'a> Emitting<'a> {
    fn enter(addresses: &'a RefCell<HashMap<PointerAddress, usize>>, address: &str) -> Self {
        *addresses.borrow_mut().entry(address.to_string()).or_insert(0) += 1;
        Self {
            addresses,
            address: address.to_string(),
        }
    }
}

impl Drop for Emitting<'_> {
    fn drop(&mut self) {
        let mut addresses = self.addresses.borrow_mut();
        if let Some(depth) = addresses.get_mut(&self.address) {
            *depth -= 1;
            if *depth == 0 {
                addresses.remove(&self.address);
            }
        }
    }
}

impl DifHandler {
    // ═══════════════════════════════════════════════════════════════════
    // Outbound
    // ═══════════════════════════════════════════════════════════════════

    /// Emit `Replace`
    pub fn trigger_replace(&self, address: &str, value: &Value) -> Result<()> {
        let value = self.to_dif_container(value)?;
        self.update_reference(address, DifUpdateData::Replace { value })
    }

    /// Emit `Set` for a map key or object field
    pub fn trigger_set(&self, address: &str, key: &Value, value: &Value) -> Result<()> {
        let key = self.property(key)?;
        let value = self.to_dif_container(value)?;
        self.update_reference(address, DifUpdateData::Set { key, value })
    }

    /// Emit `Set` for a list index
    pub fn trigger_index_set(&self, address: &str, index: usize, value: &Value) -> Result<()> {
        let value = self.to_dif_container(value)?;
        self.update_reference(
            address,
            DifUpdateData::Set {
                key: DifProperty::Index(index),
                value,
            },
        )
    }

    /// Emit `Append`
    pub fn trigger_append(&self, address: &str, value: &Value) -> Result<()> {
        let value = self.to_dif_container(value)?;
        self.update_reference(address, DifUpdateData::Append { value })
    }

    /// Emit `Delete`
    pub fn trigger_delete(&self, address: &str, key: &Value) -> Result<()> {
        let key = self.property(key)?;
        self.update_reference(address, DifUpdateData::Delete { key })
    }

    /// Emit `Clear`
    pub fn trigger_clear(&self, address: &str) -> Result<()> {
        self.update_reference(address, DifUpdateData::Clear)
    }

    /// Emit `ListSplice`
    pub fn trigger_list_splice(
        &self,
        address: &str,
        start: usize,
        delete_count: usize,
        items: &[Value],
    ) -> Result<()> {
        let items = items
            .iter()
            .map(|item| self.to_dif_container(item))
            .collect::<Result<Vec<_>>>()?;
        self.update_reference(
            address,
            DifUpdateData::ListSplice {
                start,
                delete_count,
                items,
            },
        )
    }

    /// Submit an update on behalf of this handler's transceiver
    pub fn update_reference(&self, address: &str, data: DifUpdateData) -> Result<()> {
        self.collect_garbage();
        debug!(%address, kind = ?data.kind(), "emitting update");
        let _emitting = Emitting::enter(&self.inner.emitting, address);
        self.inner
            .runtime
            .update(self.transceiver_id(), address, data)
    }

    fn property(&self, key: &Value) -> Result<DifProperty> {
        Ok(DifProperty::Value(self.to_dif_container(key)?))
    }

    pub(crate) fn is_emitting(&self, address: &str) -> bool {
        self.inner.emitting.borrow().contains_key(address)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Inbound
    // ═══════════════════════════════════════════════════════════════════

    /// Entry point of the remote observer registered for every mutable
    /// reference. Replay failures are logged; local observers are always
    /// notified.
    pub(crate) fn on_remote_update(&self, address: &str, update: &DifUpdate) {
        let own = update.source_id == self.transceiver_id();
        let replay = !own || (self.own_update_replay(address) && !self.is_emitting(address));
        debug!(%address, kind = ?update.data.kind(), source = update.source_id, replay, "received update");
        if replay {
            if let Err(err) = self.handle_pointer_update(address, &update.data) {
                error!(%address, kind = ?update.data.kind(), %err, "failed to replay update");
            }
        }
        self.notify_local_observers(address, &update.data);
    }

    /// Apply a remote update to the cached value without re-emitting it.
    ///
    /// Primitive cells accept only `Replace`. Containers are handed to the
    /// binding they were bound with; unbound values are left as they are.
    pub fn handle_pointer_update(&self, address: &str, data: &DifUpdateData) -> Result<()> {
        self.collect_garbage();
        let Some((value, binding)) = self.cached_with_binding(address) else {
            trace!(%address, "update for a reference that is not cached");
            return Ok(());
        };
        match (&value, binding) {
            (Value::Ref(cell), _) => match data {
                DifUpdateData::Replace { value } => {
                    let value = self.resolve_value_container_sync(value)?;
                    cell.update_silently(value);
                    Ok(())
                }
                other => Err(DifError::InvalidUpdate(format!(
                    "{:?} update for primitive reference ${address}",
                    other.kind()
                ))),
            },
            (_, Some(binding)) => binding.handle_dif_update(&value, address, data),
            (_, None) => {
                debug!(%address, kind = ?data.kind(), "no binding to replay update with");
                Ok(())
            }
        }
    }
}
