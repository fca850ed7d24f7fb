//! Native values to wire containers

use indexmap::IndexMap;

use super::DifHandler;
use crate::dif::core::{core_type, host_type};
use crate::dif::{DifRepresentationValue, DifType, DifTypeDefinition, DifValueContainer};
use crate::error::Result;
use crate::value::Value;

impl DifHandler {
    /// Convert a value for the wire.
    ///
    /// Values that are references, or originals behind one, become their
    /// bare address; so do nested ones.
    pub fn to_dif_container(&self, value: &Value) -> Result<DifValueContainer> {
        if let Some(address) = self.address_of(value) {
            return Ok(DifValueContainer::Address(address));
        }
        encode(value, &|nested| self.to_dif_container(nested))
    }
}

/// Convert a value for the wire without a handler.
///
/// Only [`Ref`](crate::value::Ref) cells become addresses; proxied
/// containers are encoded by content.
pub fn to_dif_container_detached(value: &Value) -> Result<DifValueContainer> {
    encode(value, &to_dif_container_detached)
}

fn encode(
    value: &Value,
    nested: &dyn Fn(&Value) -> Result<DifValueContainer>,
) -> Result<DifValueContainer> {
    Ok(match value {
        Value::Undefined => DifValueContainer::typed(undefined_type(), DifRepresentationValue::Null),
        Value::Null => DifValueContainer::untyped(DifRepresentationValue::Null),
        Value::Bool(b) => DifValueContainer::untyped(*b),
        Value::Integer(n) => match i64::try_from(*n) {
            Ok(small) => DifValueContainer::untyped(small),
            Err(_) => DifValueContainer::typed(
                DifTypeDefinition::reference(core_type::INTEGER_I128),
                n.to_string(),
            ),
        },
        Value::BigInt(n) => DifValueContainer::typed(
            DifTypeDefinition::reference(core_type::INTEGER_IBIG),
            n.to_string(),
        ),
        Value::Decimal(f) => match serde_json::Number::from_f64(*f) {
            Some(number) => DifValueContainer::untyped(DifRepresentationValue::Number(number)),
            None => DifValueContainer::typed(
                DifTypeDefinition::reference(core_type::DECIMAL_F64),
                non_finite_text(*f),
            ),
        },
        Value::Text(text) => DifValueContainer::untyped(text.to_string()),
        Value::Endpoint(endpoint) => DifValueContainer::typed(
            DifTypeDefinition::reference(core_type::ENDPOINT),
            endpoint.name(),
        ),
        Value::List(list) => {
            let items = list
                .to_vec()?
                .iter()
                .map(nested)
                .collect::<Result<Vec<_>>>()?;
            DifValueContainer::untyped(DifRepresentationValue::List(items))
        }
        Value::Map(map) => {
            let pairs = map
                .entries()?
                .iter()
                .map(|(k, v)| Ok((nested(k)?, nested(v)?)))
                .collect::<Result<Vec<_>>>()?;
            DifValueContainer::typed(
                DifTypeDefinition::reference(core_type::MAP),
                DifRepresentationValue::Map(pairs),
            )
        }
        Value::Object(object) => {
            let fields = object
                .entries()?
                .into_iter()
                .map(|(k, v)| Ok((k, nested(&v)?)))
                .collect::<Result<IndexMap<_, _>>>()?;
            DifValueContainer::untyped(DifRepresentationValue::Object(fields))
        }
        Value::Ref(cell) => DifValueContainer::address(cell.address()),
    })
}

fn undefined_type() -> DifTypeDefinition {
    DifTypeDefinition::ImplType(
        Box::new(DifType::Reference(core_type::NULL.to_string())),
        vec![host_type::UNDEFINED.to_string()],
    )
}

fn non_finite_text(f: f64) -> &'static str {
    if f.is_nan() {
        "NaN"
    } else if f.is_sign_negative() {
        "-Infinity"
    } else {
        "Infinity"
    }
}
