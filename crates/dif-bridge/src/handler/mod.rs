//! The reference handler
//!
//! [`DifHandler`] is the orchestrator between native values and the foreign
//! runtime. It owns:
//!
//! - the pointer cache (address → weakly held proxied value)
//! - the identity tables mapping proxies and originals back to addresses
//! - the finalization queue fed by drop hooks on proxied values
//! - local observers and the own-update relay state
//!
//! Handles are cheap clones of one shared state; everything is
//! single-threaded. No `RefCell` borrow is ever held across a call into the
//! runtime, a binding or an observer callback, so all of them may call back
//! into the handler.

mod cache;
mod convert;
mod observe;
mod resolve;
mod update;

pub use cache::ReferenceMetadata;
pub use convert::to_dif_container_detached;
pub use observe::{LocalObserver, LocalObserverId};

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::binding::{ListBinding, MapBinding, TypeRegistry};
use crate::config::HandlerConfig;
use crate::dif::{PointerAddress, TransceiverId};
use crate::error::{DifError, Result};
use crate::maybe_async::MaybeAsync;
use crate::runtime::DifRuntime;
use crate::value::Value;

use cache::{Finalized, HandlerState};

/// Synchronizes native values with pointers owned by a foreign runtime.
#[derive(Clone)]
pub struct DifHandler {
    inner: Rc<HandlerInner>,
}

/// A non-owning handle to a [`DifHandler`].
#[derive(Clone)]
pub struct WeakDifHandler {
    inner: Weak<HandlerInner>,
}

pub(crate) struct HandlerInner {
    runtime: Rc<dyn DifRuntime>,
    config: HandlerConfig,
    registry: TypeRegistry,
    state: RefCell<HandlerState>,
    finalized: Rc<RefCell<Vec<Finalized>>>,
    /// Addresses with an outbound update in flight, with nesting depth
    emitting: RefCell<HashMap<PointerAddress, usize>>,
}

impl DifHandler {
    /// Create a handler driving `runtime`
    pub fn new(runtime: Rc<dyn DifRuntime>, config: HandlerConfig) -> Self {
        let inner = Rc::new_cyclic(|weak| HandlerInner {
            runtime,
            config,
            registry: TypeRegistry::new(WeakDifHandler {
                inner: weak.clone(),
            }),
            state: RefCell::new(HandlerState::default()),
            finalized: Rc::new(RefCell::new(Vec::new())),
            emitting: RefCell::new(HashMap::new()),
        });
        Self { inner }
    }

    /// Create a handler with the list and map bindings registered
    pub fn with_core_bindings(runtime: Rc<dyn DifRuntime>, config: HandlerConfig) -> Self {
        let handler = Self::new(runtime, config);
        handler.register_core_bindings();
        handler
    }

    /// Register the bindings for the core list and map types
    pub fn register_core_bindings(&self) {
        self.inner.registry.register_type_binding(ListBinding);
        self.inner.registry.register_type_binding(MapBinding);
    }

    /// The type registry
    pub fn type_registry(&self) -> &TypeRegistry {
        &self.inner.registry
    }

    /// The runtime this handler drives
    pub fn runtime(&self) -> &Rc<dyn DifRuntime> {
        &self.inner.runtime
    }

    /// The handler configuration
    pub fn config(&self) -> &HandlerConfig {
        &self.inner.config
    }

    /// Transceiver id stamped on outbound updates
    pub fn transceiver_id(&self) -> TransceiverId {
        self.inner.config.transceiver_id
    }

    /// A non-owning handle
    pub fn downgrade(&self) -> WeakDifHandler {
        WeakDifHandler {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Whether both handles share one handler
    pub fn ptr_eq(&self, other: &DifHandler) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Script execution
    // ═══════════════════════════════════════════════════════════════════

    /// Evaluate a script in the runtime with native arguments
    pub fn execute(&self, script: &str, args: &[Value]) -> Result<MaybeAsync<Value>> {
        let args = self.containers(args)?;
        let handler = self.clone();
        self.inner
            .runtime
            .execute(script, args)?
            .and_then(move |container| handler.resolve_value_container(&container))
    }

    /// Evaluate a script synchronously
    pub fn execute_sync(&self, script: &str, args: &[Value]) -> Result<Value> {
        let args = self.containers(args)?;
        let container = self.inner.runtime.execute_sync(script, args)?;
        self.resolve_value_container_sync(&container)
    }

    fn containers(&self, values: &[Value]) -> Result<Vec<crate::dif::DifValueContainer>> {
        values.iter().map(|v| self.to_dif_container(v)).collect()
    }
}

impl WeakDifHandler {
    /// The handler, if it is still alive
    pub fn upgrade(&self) -> Result<DifHandler> {
        self.inner
            .upgrade()
            .map(|inner| DifHandler { inner })
            .ok_or_else(|| DifError::Runtime("reference handler has been dropped".to_string()))
    }
}

impl std::fmt::Debug for DifHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cached = self.inner.state.try_borrow().map(|state| state.cache_len()).ok();
        f.debug_struct("DifHandler")
            .field("transceiver_id", &self.transceiver_id())
            .field("cached", &cached)
            .finish()
    }
}
