//! Access gate guarding originals that were moved into a reference

use std::cell::Cell;
use std::rc::Rc;

use crate::error::{DifError, Result};

/// Shared between an original container handle and its proxy.
///
/// Once sealed, the storage may only be touched while at least one
/// [`AccessWindow`] is open.
#[derive(Debug, Default)]
pub(crate) struct AccessGate {
    sealed: Cell<bool>,
    open_windows: Cell<u32>,
}

impl AccessGate {
    pub(crate) fn seal(&self) {
        self.sealed.set(true);
    }

    pub(crate) fn is_sealed(&self) -> bool {
        self.sealed.get()
    }

    pub(crate) fn check(&self) -> Result<()> {
        if self.sealed.get() && self.open_windows.get() == 0 {
            return Err(DifError::OriginalValueAccess);
        }
        Ok(())
    }

    pub(crate) fn open(self: &Rc<Self>) -> AccessWindow {
        self.open_windows.set(self.open_windows.get() + 1);
        AccessWindow { gate: self.clone() }
    }
}

/// RAII guard that keeps an access window open until dropped.
///
/// Windows nest; the gate closes when the last one is dropped, including
/// during unwinding.
#[must_use = "the access window closes as soon as the guard is dropped"]
pub struct AccessWindow {
    gate: Rc<AccessGate>,
}

impl Drop for AccessWindow {
    fn drop(&mut self) {
        let open = self.gate.open_windows.get();
        self.gate.open_windows.set(open.saturating_sub(1));
    }
}
