//! # dif-bridge
//!
//! Mirrors the mutable references of a foreign runtime as native values.
//!
//! A [`DifHandler`] resolves pointer addresses into [`Value`]s and keeps
//! both sides in sync: writes through a proxied value are sent to the
//! runtime as DIF updates, and updates arriving from the runtime are
//! replayed onto the cached value without being sent back.
//!
//! ## Architecture
//!
//! - **Wire model** ([`dif`]): values, types and updates exchanged with the runtime
//! - **Values** ([`value`]): shared containers, primitive cells and the interception seam
//! - **Type bindings** ([`binding`]): per-type proxying and replay, with list and map bindings
//! - **Handler** ([`handler`]): cache, resolution, update protocol and lifecycle
//! - **Runtime** ([`runtime`]): the interface to the foreign runtime, plus an in-memory one
//!
//! ## Example
//!
//! ```
//! use std::rc::Rc;
//! use dif_bridge::{DifHandler, HandlerConfig, InMemoryRuntime, ReferenceMutability, Value};
//!
//! let runtime = Rc::new(InMemoryRuntime::new());
//! let handler = DifHandler::with_core_bindings(runtime, HandlerConfig::new());
//!
//! let list = handler
//!     .create_transparent_reference(Value::list(vec![1.into()]), None, ReferenceMutability::Mutable)
//!     .unwrap();
//! list.as_list().unwrap().push(2.into()).unwrap();
//!
//! let address = handler.address_of(&list).unwrap();
//! let echoed = handler.runtime().resolve_pointer_address_sync(&address).unwrap();
//! assert_eq!(echoed.value.to_string(), "[1, 2]");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod binding;
pub mod config;
pub mod dif;
pub mod error;
pub mod handler;
pub mod maybe_async;
pub mod runtime;
pub mod value;

// Re-export main types
pub use binding::{BindResult, ListBinding, MapBinding, TypeBinding, TypeBindingDefinition, TypeRegistry};
pub use config::HandlerConfig;
pub use dif::{
    DifProperty, DifReference, DifRepresentationValue, DifTypeDefinition, DifUpdate,
    DifUpdateData, DifValue, DifValueContainer, PointerAddress, ReferenceMutability,
};
pub use error::{DifError, Result};
pub use handler::{DifHandler, LocalObserverId, ReferenceMetadata, WeakDifHandler};
pub use maybe_async::MaybeAsync;
pub use runtime::{DifRuntime, InMemoryRuntime};
pub use value::{Endpoint, List, Map, Object, Ref, Value};

/// dif-bridge version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_exists() {
        assert!(!VERSION.is_empty());
    }
}
