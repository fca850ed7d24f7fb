//! Reference handler tests

mod common;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use common::*;
use dif_bridge::dif::{DifUpdateKind, ObserveOptions};
use dif_bridge::*;
use pretty_assertions::assert_eq;
use serde_json::json;

fn create(handler: &DifHandler, value: Value) -> (Value, String) {
    let proxied = handler
        .create_transparent_reference(value, None, ReferenceMutability::Mutable)
        .expect("reference created");
    let address = handler.address_of(&proxied).expect("registered");
    (proxied, address)
}

fn counter() -> (Rc<Cell<usize>>, impl Fn(&DifUpdateData) -> Result<()>) {
    let seen = Rc::new(Cell::new(0));
    let inner = seen.clone();
    (seen, move |_: &DifUpdateData| {
        inner.set(inner.get() + 1);
        Ok(())
    })
}

// ═══════════════════════════════════════════════════════════════════════
// Cache identity
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_resolve_twice_yields_same_value() -> anyhow::Result<()> {
    let (runtime, handler) = setup();
    let address = runtime.create_pointer(
        DifValueContainer::untyped(vec![DifValueContainer::untyped(1i64)]),
        None,
        ReferenceMutability::Mutable,
    )?;

    let first = handler.resolve_sync(&address)?;
    let second = handler.resolve_sync(&address)?;
    let third = handler.resolve(&address)?.into_ready("resolve")?;

    assert!(first.same_identity(&second));
    assert!(first.same_identity(&third));
    assert_eq!(first, Value::list(vec![Value::Integer(1)]));
    Ok(())
}

#[test]
fn test_created_reference_is_cached() -> anyhow::Result<()> {
    let (_runtime, handler) = setup();
    let (proxied, address) = create(&handler, Value::list(vec!["a".into()]));

    assert!(handler.is_cached(&address));
    assert!(handler.resolve_sync(&address)?.same_identity(&proxied));
    assert!(handler.is_reference(&proxied));
    Ok(())
}

#[test]
fn test_pointer_to_pointer_resolves_to_target() -> anyhow::Result<()> {
    let (runtime, handler) = setup();
    let (proxied, address) = create(&handler, Value::list(vec![]));
    let alias = runtime.create_pointer(
        DifValueContainer::address(address.as_str()),
        None,
        ReferenceMutability::Mutable,
    )?;

    assert!(handler.resolve_sync(&alias)?.same_identity(&proxied));
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════
// Primitive references
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_primitive_becomes_ref_cell() -> anyhow::Result<()> {
    let (runtime, handler) = setup();
    let (value, address) = create(&handler, Value::from("hello"));

    let cell = value.as_ref_cell().expect("primitive references are cells");
    assert_eq!(cell.get(), Value::from("hello"));
    assert_eq!(cell.address(), address);

    cell.set(Value::from("world"))?;
    assert_eq!(stored(&runtime, &address), json!({ "value": "world" }));
    assert_eq!(cell.get(), Value::from("world"));
    Ok(())
}

#[test]
fn test_remote_replace_updates_cell() -> anyhow::Result<()> {
    let (runtime, handler) = setup();
    let (value, address) = create(&handler, Value::Integer(1));

    remote_update(
        &runtime,
        &address,
        DifUpdateData::Replace {
            value: DifValueContainer::untyped(2i64),
        },
    );

    assert_eq!(value.deref_cell(), Value::Integer(2));
    Ok(())
}

#[test]
fn test_wide_integer_reference_round_trips() -> anyhow::Result<()> {
    let (runtime, handler) = setup();
    let wide = Value::Integer(i128::MAX);
    let (value, address) = create(&handler, wide.clone());

    assert_eq!(
        stored(&runtime, &address),
        json!({ "type": "6e0000", "value": i128::MAX.to_string() })
    );
    assert_eq!(value.deref_cell(), wide);
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════
// Immutability & double binding
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_immutable_reference_rejects_observe_and_set() -> anyhow::Result<()> {
    let (runtime, handler) = setup();
    let value = handler.create_transparent_reference(
        Value::Integer(5),
        None,
        ReferenceMutability::Immutable,
    )?;
    let address = handler.address_of(&value).expect("registered");
    let cell = value.as_ref_cell().expect("cell");

    assert!(matches!(
        cell.set(Value::Integer(6)),
        Err(DifError::ImmutableReference { .. })
    ));
    assert!(matches!(
        handler.observe(&address, |_| Ok(())),
        Err(DifError::ImmutableReference { .. })
    ));
    assert!(matches!(
        handler.set_own_update_replay(&address, true),
        Err(DifError::ImmutableReference { .. })
    ));
    assert_eq!(runtime.observer_count(&address), 0);
    assert_eq!(cell.get(), Value::Integer(5));
    Ok(())
}

#[test]
fn test_immutable_container_rejects_mutation() -> anyhow::Result<()> {
    let (runtime, handler) = setup();
    let value = handler.create_transparent_reference(
        Value::list(vec![Value::Integer(1)]),
        None,
        ReferenceMutability::Immutable,
    )?;
    let address = handler.address_of(&value).expect("registered");
    let list = value.as_list().expect("list");

    assert!(matches!(
        list.push(Value::Integer(2)),
        Err(DifError::ImmutableReference { .. })
    ));
    assert_eq!(list.len()?, 1);
    assert_eq!(stored(&runtime, &address), json!({ "value": [{ "value": 1 }] }));
    Ok(())
}

#[test]
fn test_double_binding_fails_for_proxy_and_original() -> anyhow::Result<()> {
    let (_runtime, handler) = setup_with(
        HandlerConfig::with_transceiver_id(LOCAL).guard_original_access(true),
    );
    let original = Value::list(vec![Value::Integer(1)]);
    let (proxied, address) = create(&handler, original.clone());

    let again = handler.create_transparent_reference(proxied, None, ReferenceMutability::Mutable);
    assert!(matches!(again, Err(DifError::AlreadyBound { address: a }) if a == address));

    let again = handler.create_transparent_reference(original, None, ReferenceMutability::Mutable);
    assert!(matches!(again, Err(DifError::AlreadyBound { address: a }) if a == address));
    Ok(())
}

#[test]
fn test_ref_cell_cannot_be_rebound() -> anyhow::Result<()> {
    let (_runtime, handler) = setup();
    let (cell, _) = create(&handler, Value::Bool(true));

    let again = handler.create_transparent_reference(cell, None, ReferenceMutability::Mutable);
    assert!(matches!(again, Err(DifError::AlreadyBound { .. })));
    Ok(())
}

#[test]
fn test_proxy_and_original_lookup() -> anyhow::Result<()> {
    let (_runtime, handler) = setup();
    let original = Value::list(vec![]);
    let (proxied, _) = create(&handler, original.clone());

    let found = handler.original_value_from_proxy(&proxied).expect("proxied");
    assert!(found.same_identity(&original));
    let found = handler.proxy_value_from_original(&original).expect("bound");
    assert!(found.same_identity(&proxied));
    assert!(handler.original_value_from_proxy(&Value::list(vec![])).is_none());
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════
// Own-update relay
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_own_echo_not_replayed_by_default() -> anyhow::Result<()> {
    let (runtime, handler) = setup();
    let (proxied, address) = create(&handler, Value::list(vec!["a".into()]));
    let (seen, callback) = counter();
    handler.observe(&address, callback)?;

    runtime.update(
        LOCAL,
        &address,
        DifUpdateData::Append {
            value: DifValueContainer::untyped("b"),
        },
    )?;

    assert_eq!(seen.get(), 1);
    assert_eq!(proxied.as_list().expect("list").len()?, 1);
    Ok(())
}

#[test]
fn test_own_echo_replayed_when_enabled() -> anyhow::Result<()> {
    let (runtime, handler) = setup();
    let (proxied, address) = create(&handler, Value::list(vec!["a".into()]));
    let (seen, callback) = counter();
    handler.observe(&address, callback)?;
    handler.set_own_update_replay(&address, true)?;

    runtime.update(
        LOCAL,
        &address,
        DifUpdateData::Append {
            value: DifValueContainer::untyped("b"),
        },
    )?;

    assert_eq!(seen.get(), 1);
    assert_eq!(
        proxied.as_list().expect("list").to_vec()?,
        vec![Value::from("a"), Value::from("b")]
    );
    Ok(())
}

#[test]
fn test_local_write_applied_once_with_replay_enabled() -> anyhow::Result<()> {
    let (runtime, handler) = setup();
    let (proxied, address) = create(&handler, Value::list(vec![]));
    let (seen, callback) = counter();
    handler.observe(&address, callback)?;
    handler.set_own_update_replay(&address, true)?;

    proxied.as_list().expect("list").push("x".into())?;

    assert_eq!(seen.get(), 1);
    assert_eq!(proxied.as_list().expect("list").to_vec()?, vec![Value::from("x")]);
    assert_eq!(stored(&runtime, &address), json!({ "value": [{ "value": "x" }] }));
    Ok(())
}

#[test]
fn test_relay_option_follows_local_observers() -> anyhow::Result<()> {
    let (runtime, handler) = setup();
    let (_proxied, address) = create(&handler, Value::list(vec![]));
    let relay = || {
        runtime
            .observer_options(&address, 0)
            .map(|options| options.relay_own_updates)
    };

    assert_eq!(relay(), Some(false));
    let id = handler.observe(&address, |_| Ok(()))?;
    assert_eq!(relay(), Some(true));
    handler.unobserve(&address, id)?;
    assert_eq!(relay(), Some(false));

    handler.set_own_update_replay(&address, true)?;
    assert_eq!(relay(), Some(true));
    assert!(handler.own_update_replay(&address));
    Ok(())
}

#[test]
fn test_relay_on_observe_can_be_disabled() -> anyhow::Result<()> {
    let (runtime, handler) = setup_with(
        HandlerConfig::with_transceiver_id(LOCAL).relay_own_updates_on_observe(false),
    );
    let (_proxied, address) = create(&handler, Value::list(vec![]));

    handler.observe(&address, |_| Ok(()))?;
    assert_eq!(
        runtime.observer_options(&address, 0),
        Some(ObserveOptions {
            relay_own_updates: false
        })
    );
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════
// Local observers
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_local_observer_sees_remote_updates() -> anyhow::Result<()> {
    let (runtime, handler) = setup();
    let (_proxied, address) = create(&handler, Value::list(vec![]));
    let kinds = Rc::new(RefCell::new(Vec::new()));
    let recorded = kinds.clone();
    handler.observe(&address, move |data| {
        recorded.borrow_mut().push(data.kind());
        Ok(())
    })?;

    remote_update(&runtime, &address, DifUpdateData::Clear);
    remote_update(
        &runtime,
        &address,
        DifUpdateData::Append {
            value: DifValueContainer::untyped(true),
        },
    );

    assert_eq!(*kinds.borrow(), vec![DifUpdateKind::Clear, DifUpdateKind::Append]);
    Ok(())
}

#[test]
fn test_unobserve_unknown_observer_fails() -> anyhow::Result<()> {
    let (_runtime, handler) = setup();
    let (_proxied, address) = create(&handler, Value::list(vec![]));

    assert!(matches!(
        handler.unobserve(&address, 42),
        Err(DifError::NotFound { .. })
    ));
    let id = handler.observe(&address, |_| Ok(()))?;
    handler.unobserve(&address, id)?;
    assert!(matches!(
        handler.unobserve(&address, id),
        Err(DifError::NotFound { .. })
    ));
    assert!(matches!(
        handler.unobserve("ffffffffff", 0),
        Err(DifError::NotFound { .. })
    ));
    Ok(())
}

#[test]
fn test_unobserve_stops_delivery_and_ids_are_not_reused() -> anyhow::Result<()> {
    let (runtime, handler) = setup();
    let (_proxied, address) = create(&handler, Value::list(vec![]));
    let (seen, callback) = counter();

    let first = handler.observe(&address, callback)?;
    handler.unobserve(&address, first)?;
    remote_update(&runtime, &address, DifUpdateData::Clear);
    assert_eq!(seen.get(), 0);

    let second = handler.observe(&address, |_| Ok(()))?;
    assert_ne!(first, second);
    assert_eq!(handler.local_observer_count(&address), 1);
    Ok(())
}

#[test]
fn test_failing_observer_does_not_block_others() -> anyhow::Result<()> {
    let (runtime, handler) = setup();
    let (proxied, address) = create(&handler, Value::list(vec!["a".into()]));
    handler.observe(&address, |_| Err(DifError::Runtime("observer failed".to_string())))?;
    let (seen, callback) = counter();
    handler.observe(&address, callback)?;

    remote_update(&runtime, &address, DifUpdateData::Clear);

    assert_eq!(seen.get(), 1);
    assert!(proxied.as_list().expect("list").is_empty()?);
    Ok(())
}

#[test]
fn test_direct_observer_receives_source_id() -> anyhow::Result<()> {
    let (runtime, handler) = setup();
    let (_proxied, address) = create(&handler, Value::list(vec![]));
    let sources = Rc::new(RefCell::new(Vec::new()));
    let recorded = sources.clone();
    let id = handler.observe_direct(
        &address,
        ObserveOptions {
            relay_own_updates: true,
        },
        move |update| recorded.borrow_mut().push(update.source_id),
    )?;

    remote_update(&runtime, &address, DifUpdateData::Clear);
    handler.update_reference(&address, DifUpdateData::Clear)?;
    handler.unobserve_direct(&address, id)?;
    remote_update(&runtime, &address, DifUpdateData::Clear);

    assert_eq!(*sources.borrow(), vec![REMOTE, LOCAL]);
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════
// Lifecycle
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_dropping_value_unregisters_observer() -> anyhow::Result<()> {
    let (runtime, handler) = setup();
    let (proxied, address) = create(&handler, Value::list(vec![Value::Integer(1)]));
    assert_eq!(runtime.observer_count(&address), 1);

    drop(proxied);
    assert_eq!(handler.collect_garbage(), 1);

    assert_eq!(runtime.observer_count(&address), 0);
    assert!(!handler.is_cached(&address));
    assert_eq!(handler.collect_garbage(), 0);
    Ok(())
}

#[test]
fn test_reresolve_after_finalization() -> anyhow::Result<()> {
    let (runtime, handler) = setup();
    let (proxied, address) = create(&handler, Value::list(vec![Value::Integer(1)]));
    drop(proxied);

    let again = handler.resolve_sync(&address)?;
    assert_eq!(again, Value::list(vec![Value::Integer(1)]));
    assert_eq!(runtime.observer_count(&address), 1);
    assert!(handler.is_cached(&address));
    Ok(())
}

#[test]
fn test_stale_finalizer_leaves_reinitialized_entry() -> anyhow::Result<()> {
    let (runtime, handler) = setup();
    let (proxied, address) = create(&handler, Value::list(vec![Value::Integer(1)]));
    drop(proxied);

    // the dropped entry is still queued when the address is initialized again
    let fresh = handler.init_reference(
        &address,
        Value::list(vec![Value::Integer(2)]),
        ReferenceMutability::Mutable,
        &DifTypeDefinition::reference("090000"),
    )?;
    assert_eq!(runtime.observer_count(&address), 2);

    assert_eq!(handler.collect_garbage(), 1);

    assert!(handler.is_cached(&address));
    assert_eq!(runtime.observer_count(&address), 1);
    assert!(runtime.observer_options(&address, 0).is_none());
    assert!(runtime.observer_options(&address, 1).is_some());
    assert!(handler.resolve_sync(&address)?.same_identity(&fresh));

    remote_update(
        &runtime,
        &address,
        DifUpdateData::Append {
            value: DifValueContainer::untyped(3i64),
        },
    );
    assert_eq!(fresh, Value::list(vec![Value::Integer(2), Value::Integer(3)]));
    Ok(())
}

#[test]
fn test_local_observer_keeps_reference_alive() -> anyhow::Result<()> {
    let (runtime, handler) = setup();
    let (proxied, address) = create(&handler, Value::list(vec![]));
    let id = handler.observe(&address, |_| Ok(()))?;

    drop(proxied);
    handler.collect_garbage();
    assert!(handler.is_cached(&address));

    handler.unobserve(&address, id)?;
    handler.collect_garbage();
    assert!(!handler.is_cached(&address));
    assert_eq!(runtime.observer_count(&address), 0);
    Ok(())
}

#[test]
fn test_weak_handler_fails_after_drop() {
    let (_runtime, handler) = setup();
    let weak = handler.downgrade();
    assert!(weak.upgrade().is_ok_and(|h| h.ptr_eq(&handler)));

    drop(handler);
    assert!(matches!(weak.upgrade(), Err(DifError::Runtime(_))));
}

// ═══════════════════════════════════════════════════════════════════════
// Asynchronous resolution
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_remote_pointer_requires_async() -> anyhow::Result<()> {
    let (runtime, handler) = setup();
    let address = runtime.insert_remote_pointer(
        DifValueContainer::untyped("far"),
        None,
        ReferenceMutability::Mutable,
    );

    assert!(matches!(
        handler.resolve_sync(&address),
        Err(DifError::RequiresAsync { .. })
    ));

    let pending = handler.resolve(&address)?;
    assert!(!pending.is_ready());
    let value = pending.resolve().await?;
    assert_eq!(value.deref_cell(), Value::from("far"));

    // now cached, so the synchronous path works
    assert!(handler.resolve_sync(&address)?.same_identity(&value));
    Ok(())
}

#[tokio::test]
async fn test_nested_remote_pointer_makes_list_async() -> anyhow::Result<()> {
    let (runtime, handler) = setup();
    let remote = runtime.insert_remote_pointer(
        DifValueContainer::untyped(3i64),
        None,
        ReferenceMutability::Mutable,
    );
    let address = runtime.create_pointer(
        DifValueContainer::untyped(vec![
            DifValueContainer::untyped("near"),
            DifValueContainer::address(remote.as_str()),
        ]),
        None,
        ReferenceMutability::Mutable,
    )?;

    assert!(matches!(
        handler.resolve_sync(&address),
        Err(DifError::RequiresAsync { .. })
    ));

    let value = handler.resolve(&address)?.resolve().await?;
    let items = value.as_list().expect("list").to_vec()?;
    assert_eq!(items[0], Value::from("near"));
    assert_eq!(items[1].deref_cell(), Value::Integer(3));
    assert!(handler.is_cached(&remote));
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════
// Type bindings & conversion
// ═══════════════════════════════════════════════════════════════════════

struct TaggedBinding;

impl TypeBindingDefinition for TaggedBinding {
    fn type_address(&self) -> &str {
        "c0ffee"
    }

    fn bind(&self, _cx: &TypeBinding, value: Value, _address: &str) -> Result<BindResult> {
        Ok(BindResult::new(value).with_metadata(Rc::new(5u32)))
    }
}

#[test]
fn test_custom_binding_metadata() -> anyhow::Result<()> {
    let (_runtime, handler) = setup();
    let binding = handler.type_registry().register_type_binding(TaggedBinding);
    let value = handler.create_transparent_reference(
        Value::object([("n", Value::Integer(1))]),
        Some(DifTypeDefinition::reference("c0ffee")),
        ReferenceMutability::Mutable,
    )?;

    let metadata = handler.reference_metadata(&value).expect("metadata");
    assert_eq!(metadata.custom.as_ref().and_then(|m| m.downcast_ref::<u32>()), Some(&5));
    let custom = binding.custom_reference_metadata(&value).expect("custom");
    assert_eq!(custom.downcast_ref::<u32>(), Some(&5));
    Ok(())
}

#[test]
fn test_unbound_custom_type_is_not_implemented() {
    let (_runtime, handler) = setup();
    let result = handler.create_transparent_reference(
        Value::list(vec![]),
        Some(DifTypeDefinition::reference("abcdef")),
        ReferenceMutability::Mutable,
    );
    assert!(matches!(result, Err(DifError::NotImplemented(_))));

    let wire = DifValue::typed(DifTypeDefinition::reference("abcdef"), "x");
    assert!(matches!(
        handler.resolve_value_sync(&wire),
        Err(DifError::NotImplemented(_))
    ));
}

#[test]
fn test_nested_references_encode_as_addresses() -> anyhow::Result<()> {
    let (_runtime, handler) = setup();
    let (proxied, address) = create(&handler, Value::list(vec![]));
    let outer = Value::list(vec![proxied, Value::Null]);

    let container = handler.to_dif_container(&outer)?;
    assert_eq!(
        serde_json::to_value(container)?,
        json!({ "value": [address, { "value": null }] })
    );
    Ok(())
}

#[test]
fn test_execute_passes_values_through_runtime() -> anyhow::Result<()> {
    let (runtime, handler) = setup();
    assert!(matches!(
        handler.execute_sync("1 + 1", &[]),
        Err(DifError::Unsupported(_))
    ));

    runtime.set_executor(|script, mut args| {
        assert_eq!(script, "identity");
        Ok(args.remove(0))
    });
    let result = handler.execute_sync("identity", &[Value::Integer(3)])?;
    assert_eq!(result, Value::Integer(3));
    let result = handler.execute("identity", &[Value::from("x")])?.into_ready("execute")?;
    assert_eq!(result, Value::from("x"));
    Ok(())
}
