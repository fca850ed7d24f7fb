//! The seam to the foreign runtime that owns pointers
//!
//! The handler never stores authoritative state: every pointer lives in the
//! runtime, which the handler drives through [`DifRuntime`]. An in-memory
//! implementation is provided for embedding and tests.

mod memory;

pub use memory::InMemoryRuntime;

use std::rc::Rc;

use crate::dif::{
    DifReference, DifTypeDefinition, DifUpdate, DifUpdateData, DifValueContainer, ObserveOptions,
    ObserverId, PointerAddress, ReferenceMutability, TransceiverId,
};
use crate::error::{DifError, Result};
use crate::maybe_async::MaybeAsync;

/// Callback invoked by the runtime for every update delivered to an observer.
pub type ObserverCallback = Rc<dyn Fn(&DifUpdate)>;

/// Operations the foreign runtime offers to the handler.
pub trait DifRuntime {
    /// Dereference a pointer, fetching it if it is not resident
    fn resolve_pointer_address(&self, address: &str) -> Result<MaybeAsync<DifReference>>;

    /// Dereference a resident pointer
    fn resolve_pointer_address_sync(&self, address: &str) -> Result<DifReference>;

    /// Create a pointer holding `value`; the runtime infers the allowed type
    /// when none is given
    fn create_pointer(
        &self,
        value: DifValueContainer,
        allowed_type: Option<DifTypeDefinition>,
        mutability: ReferenceMutability,
    ) -> Result<PointerAddress>;

    /// Apply an update on behalf of `transceiver_id`
    fn update(
        &self,
        transceiver_id: TransceiverId,
        address: &str,
        data: DifUpdateData,
    ) -> Result<()>;

    /// Register an observer; fails for immutable pointers
    fn observe_pointer(
        &self,
        transceiver_id: TransceiverId,
        address: &str,
        options: ObserveOptions,
        callback: ObserverCallback,
    ) -> Result<ObserverId>;

    /// Remove an observer; takes effect immediately
    fn unobserve_pointer(&self, address: &str, observer_id: ObserverId) -> Result<()>;

    /// Change the options of a registered observer
    fn update_observer_options(
        &self,
        address: &str,
        observer_id: ObserverId,
        options: ObserveOptions,
    ) -> Result<()>;

    /// Evaluate a script with wire arguments
    fn execute(
        &self,
        script: &str,
        args: Vec<DifValueContainer>,
    ) -> Result<MaybeAsync<DifValueContainer>> {
        let _ = (script, args);
        Err(DifError::Unsupported("script execution".to_string()))
    }

    /// Evaluate a script synchronously
    fn execute_sync(&self, script: &str, args: Vec<DifValueContainer>) -> Result<DifValueContainer> {
        let _ = (script, args);
        Err(DifError::Unsupported("script execution".to_string()))
    }
}
