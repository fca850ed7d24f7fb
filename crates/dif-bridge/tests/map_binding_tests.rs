//! Map binding tests

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::*;
use dif_bridge::dif::ObserveOptions;
use dif_bridge::*;
use pretty_assertions::assert_eq;
use serde_json::json;

fn bound(handler: &DifHandler, value: Value) -> (Value, String) {
    let proxied = handler
        .create_transparent_reference(value, None, ReferenceMutability::Mutable)
        .expect("reference created");
    let address = handler.address_of(&proxied).expect("registered");
    (proxied, address)
}

fn sample_map() -> Value {
    Value::map(vec![
        ("key1".into(), "value1".into()),
        (Value::Integer(2), "value2".into()),
    ])
}

// ═══════════════════════════════════════════════════════════════════════
// Maps
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_remote_delete_text_key() -> anyhow::Result<()> {
    let (runtime, handler) = setup();
    let (proxied, address) = bound(&handler, sample_map());
    let map = proxied.as_map().expect("map");

    let data: DifUpdateData = serde_json::from_value(json!({
        "kind": "delete",
        "key": { "kind": "text", "value": "key1" }
    }))?;
    remote_update(&runtime, &address, data);

    assert!(!map.contains_key(&"key1".into())?);
    assert_eq!(map.len()?, 1);
    assert_eq!(map.get(&Value::Integer(2))?, Some("value2".into()));
    Ok(())
}

#[test]
fn test_remote_set_and_clear() -> anyhow::Result<()> {
    let (runtime, handler) = setup();
    let (proxied, address) = bound(&handler, sample_map());
    let map = proxied.as_map().expect("map");

    remote_update(
        &runtime,
        &address,
        DifUpdateData::Set {
            key: DifProperty::Value(DifValueContainer::untyped(true)),
            value: DifValueContainer::untyped("yes"),
        },
    );
    assert_eq!(map.get(&Value::Bool(true))?, Some("yes".into()));
    assert_eq!(map.len()?, 3);

    remote_update(&runtime, &address, DifUpdateData::Clear);
    assert!(map.is_empty()?);
    Ok(())
}

#[test]
fn test_remote_replace_map() -> anyhow::Result<()> {
    let (runtime, handler) = setup();
    let (proxied, address) = bound(&handler, sample_map());
    let map = proxied.as_map().expect("map");

    let replacement = handler.to_dif_container(&Value::map(vec![("only".into(), Value::Null)]))?;
    remote_update(&runtime, &address, DifUpdateData::Replace { value: replacement });

    assert_eq!(map.entries()?, vec![("only".into(), Value::Null)]);
    Ok(())
}

#[test]
fn test_local_map_mutations_reach_runtime() -> anyhow::Result<()> {
    let (runtime, handler) = setup();
    let (proxied, address) = bound(&handler, sample_map());
    let map = proxied.as_map().expect("map");

    map.set("key3".into(), Value::Integer(3))?;
    assert!(map.delete(&Value::Integer(2))?);
    assert!(!map.delete(&"missing".into())?);

    assert_eq!(
        stored(&runtime, &address),
        json!({ "type": "0c0000", "value": [
            [{ "value": "key1" }, { "value": "value1" }],
            [{ "value": "key3" }, { "value": 3 }]
        ] })
    );
    assert_eq!(stored(&runtime, &address), wire(&proxied));

    map.clear()?;
    assert_eq!(stored(&runtime, &address), json!({ "type": "0c0000", "value": [] }));
    Ok(())
}

#[test]
fn test_keys_are_sent_as_value_properties() -> anyhow::Result<()> {
    let (_runtime, handler) = setup();
    let (proxied, address) = bound(&handler, sample_map());
    let map = proxied.as_map().expect("map");
    let sent = Rc::new(RefCell::new(Vec::new()));
    let recorded = sent.clone();
    handler.observe_direct(
        &address,
        ObserveOptions {
            relay_own_updates: true,
        },
        move |update| recorded.borrow_mut().push(serde_json::to_value(&update.data).expect("serializable")),
    )?;

    map.set("key3".into(), Value::Integer(3))?;
    map.delete(&"key1".into())?;

    assert_eq!(
        *sent.borrow(),
        vec![
            json!({
                "kind": "set",
                "key": { "kind": "value", "value": { "value": "key3" } },
                "value": { "value": 3 }
            }),
            json!({ "kind": "delete", "key": { "kind": "value", "value": { "value": "key1" } } }),
        ]
    );
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════
// Objects
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_object_is_bound_as_map() -> anyhow::Result<()> {
    let (runtime, handler) = setup();
    let (proxied, address) = bound(&handler, Value::object([("a", Value::Integer(1))]));
    let object = proxied.as_object().expect("object");
    assert!(object.is_proxy());

    object.set("b", Value::Integer(2))?;
    assert_eq!(
        stored(&runtime, &address),
        json!({ "value": { "a": { "value": 1 }, "b": { "value": 2 } } })
    );

    remote_update(
        &runtime,
        &address,
        DifUpdateData::Set {
            key: DifProperty::Text("c".to_string()),
            value: DifValueContainer::untyped(3i64),
        },
    );
    remote_update(
        &runtime,
        &address,
        DifUpdateData::Delete {
            key: DifProperty::Text("a".to_string()),
        },
    );

    assert_eq!(
        object.entries()?,
        vec![
            ("b".to_string(), Value::Integer(2)),
            ("c".to_string(), Value::Integer(3))
        ]
    );
    assert_eq!(stored(&runtime, &address), wire(&proxied));
    Ok(())
}

#[test]
fn test_object_delete_and_clear_emit() -> anyhow::Result<()> {
    let (runtime, handler) = setup();
    let (proxied, address) = bound(
        &handler,
        Value::object([("a", Value::Integer(1)), ("b", Value::Integer(2))]),
    );
    let object = proxied.as_object().expect("object");

    assert!(object.delete("a")?);
    assert_eq!(stored(&runtime, &address), json!({ "value": { "b": { "value": 2 } } }));

    object.clear()?;
    assert_eq!(stored(&runtime, &address), json!({ "value": {} }));
    Ok(())
}
