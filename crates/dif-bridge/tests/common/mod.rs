//! Shared setup for the integration tests

#![allow(dead_code)]

use std::rc::Rc;

use dif_bridge::dif::{DifUpdateData, TransceiverId};
use dif_bridge::handler::to_dif_container_detached;
use dif_bridge::{DifHandler, DifRuntime, HandlerConfig, InMemoryRuntime, Value};

/// Transceiver id of the handler under test
pub const LOCAL: TransceiverId = 7;

/// Transceiver id standing in for another endpoint
pub const REMOTE: TransceiverId = 99;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::TRACE)
        .try_init();
}

pub fn setup_with(config: HandlerConfig) -> (Rc<InMemoryRuntime>, DifHandler) {
    init_tracing();
    let runtime = Rc::new(InMemoryRuntime::new());
    let handler = DifHandler::with_core_bindings(runtime.clone(), config);
    (runtime, handler)
}

pub fn setup() -> (Rc<InMemoryRuntime>, DifHandler) {
    setup_with(HandlerConfig::with_transceiver_id(LOCAL))
}

/// The runtime's copy of a pointer's value, as JSON
pub fn stored(runtime: &InMemoryRuntime, address: &str) -> serde_json::Value {
    let reference = runtime
        .resolve_pointer_address_sync(address)
        .expect("pointer exists");
    serde_json::to_value(reference.value).expect("serializable")
}

/// A native value encoded without address substitution, as JSON
pub fn wire(value: &Value) -> serde_json::Value {
    serde_json::to_value(to_dif_container_detached(value).expect("encodable")).expect("serializable")
}

/// Deliver an update as if another endpoint had made it
pub fn remote_update(runtime: &InMemoryRuntime, address: &str, data: DifUpdateData) {
    runtime
        .update(REMOTE, address, data)
        .expect("update applies");
}
