//! Resolution of addresses and wire values into native values
//!
//! Every decoding step runs in one of two modes. The asynchronous mode may
//! call the runtime's fetching dereference and yields [`MaybeAsync`]; the
//! synchronous mode only dereferences resident pointers and fails with
//! [`DifError::RequiresAsync`] where it would otherwise have to wait.

use num_bigint::BigInt;
use tracing::trace;

use super::DifHandler;
use crate::dif::core::{core_type, core_type_name, host_type, is_big_integer, is_decimal, is_small_integer};
use crate::dif::{
    DifProperty, DifReference, DifRepresentationValue, DifTypeDefinition, DifValue,
    DifValueContainer,
};
use crate::error::{DifError, Result};
use crate::maybe_async::MaybeAsync;
use crate::value::{Endpoint, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Async,
    Sync,
}

/// What an object-shaped wire body decodes to
#[derive(Debug, Clone, Copy)]
enum Fields {
    /// Inferred from the shape alone: a plain object
    Object,
    /// Declared as a map: a map keyed by text
    TextKeyedMap,
}

impl DifHandler {
    // ═══════════════════════════════════════════════════════════════════
    // Addresses
    // ═══════════════════════════════════════════════════════════════════

    /// Resolve an address to its live value.
    ///
    /// A cached value is returned immediately. Otherwise the runtime is
    /// asked for the pointer and the result is initialized as a reference;
    /// this is pending whenever the runtime or a nested pointer has to be
    /// fetched.
    pub fn resolve(&self, address: &str) -> Result<MaybeAsync<Value>> {
        self.collect_garbage();
        if let Some(value) = self.cached_value(address) {
            trace!(%address, "cache hit");
            return Ok(MaybeAsync::Ready(value));
        }
        trace!(%address, "cache miss");
        let handler = self.clone();
        let address = address.to_string();
        self.inner
            .runtime
            .resolve_pointer_address(&address)?
            .and_then(move |reference| handler.init_resolved(address, reference))
    }

    /// Resolve an address without awaiting anything
    pub fn resolve_sync(&self, address: &str) -> Result<Value> {
        self.collect_garbage();
        if let Some(value) = self.cached_value(address) {
            trace!(%address, "cache hit");
            return Ok(value);
        }
        trace!(%address, "cache miss");
        let reference = self.inner.runtime.resolve_pointer_address_sync(address)?;
        let value = self.resolve_value_container_sync(&reference.value)?;
        self.init_reference(address, value, reference.mutability, &reference.allowed_type)
    }

    fn init_resolved(&self, address: String, reference: DifReference) -> Result<MaybeAsync<Value>> {
        let handler = self.clone();
        let DifReference {
            value,
            allowed_type,
            mutability,
        } = reference;
        self.resolve_value_container(&value)?.map(move |value| {
            handler.init_reference(&address, value, mutability, &allowed_type)
        })
    }

    // ═══════════════════════════════════════════════════════════════════
    // Wire values
    // ═══════════════════════════════════════════════════════════════════

    /// Resolve a container: addresses are dereferenced, values decoded
    pub fn resolve_value_container(&self, container: &DifValueContainer) -> Result<MaybeAsync<Value>> {
        self.container_in(container, Mode::Async)
    }

    /// Resolve a container without awaiting anything
    pub fn resolve_value_container_sync(&self, container: &DifValueContainer) -> Result<Value> {
        self.container_in(container, Mode::Sync)?
            .into_ready("Resolving a value container")
    }

    /// Decode a wire value
    pub fn resolve_value(&self, value: &DifValue) -> Result<MaybeAsync<Value>> {
        self.value_in(value, Mode::Async)
    }

    /// Decode a wire value without awaiting anything
    pub fn resolve_value_sync(&self, value: &DifValue) -> Result<Value> {
        self.value_in(value, Mode::Sync)?
            .into_ready("Resolving a value")
    }

    /// Decode the key of a `Set` or `Delete` update
    pub fn resolve_property_sync(&self, property: &DifProperty) -> Result<Value> {
        match property {
            DifProperty::Text(text) => Ok(Value::text(text.as_str())),
            DifProperty::Index(index) => Ok(Value::Integer(*index as i128)),
            DifProperty::Value(container) => self.resolve_value_container_sync(container),
        }
    }

    fn container_in(&self, container: &DifValueContainer, mode: Mode) -> Result<MaybeAsync<Value>> {
        match container {
            DifValueContainer::Address(address) if mode == Mode::Sync => {
                Ok(MaybeAsync::Ready(self.resolve_sync(address)?))
            }
            DifValueContainer::Address(address) => self.resolve(address),
            DifValueContainer::Value(value) => self.value_in(value, mode),
        }
    }

    fn value_in(&self, value: &DifValue, mode: Mode) -> Result<MaybeAsync<Value>> {
        let Some(ty) = &value.ty else {
            return self.untyped(&value.value, mode);
        };
        if let Some(type_address) = ty.as_reference() {
            return self.typed(type_address, &value.value, mode);
        }
        if is_undefined(ty, &value.value) {
            return Ok(MaybeAsync::Ready(Value::Undefined));
        }
        Err(DifError::NotImplemented(format!(
            "Resolving values of type {ty}"
        )))
    }

    fn untyped(&self, repr: &DifRepresentationValue, mode: Mode) -> Result<MaybeAsync<Value>> {
        let value = match repr {
            DifRepresentationValue::Null => Value::Null,
            DifRepresentationValue::Bool(b) => Value::Bool(*b),
            DifRepresentationValue::Text(text) => Value::text(text.as_str()),
            DifRepresentationValue::Number(number) => number_value(number)?,
            DifRepresentationValue::List(items) => return self.list(items, mode),
            DifRepresentationValue::Map(pairs) => return self.map(pairs, mode),
            DifRepresentationValue::Object(fields) => return self.object(fields, Fields::Object, mode),
        };
        Ok(MaybeAsync::Ready(value))
    }

    fn typed(
        &self,
        type_address: &str,
        repr: &DifRepresentationValue,
        mode: Mode,
    ) -> Result<MaybeAsync<Value>> {
        let value = match type_address {
            core_type::NULL => Value::Null,
            core_type::BOOLEAN => match repr {
                DifRepresentationValue::Bool(b) => Value::Bool(*b),
                other => return Err(invalid(type_address, other)),
            },
            core_type::TEXT => match repr {
                DifRepresentationValue::Text(text) => Value::text(text.as_str()),
                other => return Err(invalid(type_address, other)),
            },
            core_type::ENDPOINT => match repr {
                DifRepresentationValue::Text(name) => Value::Endpoint(Endpoint::get(name)),
                other => return Err(invalid(type_address, other)),
            },
            core_type::LIST => match repr {
                DifRepresentationValue::List(items) => return self.list(items, mode),
                other => return Err(invalid(type_address, other)),
            },
            core_type::MAP => match repr {
                DifRepresentationValue::Map(pairs) => return self.map(pairs, mode),
                DifRepresentationValue::Object(fields) => return self.object(fields, Fields::TextKeyedMap, mode),
                // an empty pair array is indistinguishable from an empty list
                DifRepresentationValue::List(items) if items.is_empty() => Value::map(Vec::new()),
                other => return Err(invalid(type_address, other)),
            },
            t if is_big_integer(t) => Value::BigInt(parse_integer(t, repr)?),
            t if is_small_integer(t) => Value::integer(parse_integer(t, repr)?),
            t if is_decimal(t) => Value::Decimal(parse_decimal(t, repr)?),
            t if core_type_name(t).is_some() => {
                return Err(DifError::NotImplemented(format!(
                    "Resolving values of core type {t}"
                )))
            }
            t if self.inner.registry.has_type_binding(t) => return self.untyped(repr, mode),
            t => {
                return Err(DifError::NotImplemented(format!(
                    "Custom type resolution not implemented for ${t}"
                )))
            }
        };
        Ok(MaybeAsync::Ready(value))
    }

    fn list(&self, items: &[DifValueContainer], mode: Mode) -> Result<MaybeAsync<Value>> {
        let items = items
            .iter()
            .map(|item| self.container_in(item, mode))
            .collect::<Result<Vec<_>>>()?;
        MaybeAsync::all(items).map(|values| Ok(Value::list(values)))
    }

    fn map(&self, pairs: &[(DifValueContainer, DifValueContainer)], mode: Mode) -> Result<MaybeAsync<Value>> {
        let mut parts = Vec::with_capacity(pairs.len() * 2);
        for (key, value) in pairs {
            parts.push(self.container_in(key, mode)?);
            parts.push(self.container_in(value, mode)?);
        }
        MaybeAsync::all(parts).map(|values| {
            let mut values = values.into_iter();
            let mut pairs = Vec::with_capacity(values.len() / 2);
            while let (Some(key), Some(value)) = (values.next(), values.next()) {
                pairs.push((key, value));
            }
            Ok(Value::map(pairs))
        })
    }

    fn object(
        &self,
        fields: &indexmap::IndexMap<String, DifValueContainer>,
        target: Fields,
        mode: Mode,
    ) -> Result<MaybeAsync<Value>> {
        let names: Vec<String> = fields.keys().cloned().collect();
        let values = fields
            .values()
            .map(|value| self.container_in(value, mode))
            .collect::<Result<Vec<_>>>()?;
        MaybeAsync::all(values).map(move |values| {
            let fields = names.into_iter().zip(values);
            Ok(match target {
                Fields::Object => Value::object(fields),
                Fields::TextKeyedMap => Value::map(
                    fields
                        .map(|(name, value)| (Value::text(name), value))
                        .collect(),
                ),
            })
        })
    }
}

/// `null` implementing the host's undefined marker
fn is_undefined(ty: &DifTypeDefinition, repr: &DifRepresentationValue) -> bool {
    match ty {
        DifTypeDefinition::ImplType(base, impls) => {
            base.as_reference() == Some(core_type::NULL)
                && matches!(impls.as_slice(), [only] if only == host_type::UNDEFINED)
                && matches!(repr, DifRepresentationValue::Null)
        }
        _ => false,
    }
}

fn number_value(number: &serde_json::Number) -> Result<Value> {
    if let Some(n) = number.as_i64() {
        return Ok(Value::Integer(n.into()));
    }
    if let Some(n) = number.as_u64() {
        return Ok(Value::Integer(n.into()));
    }
    number
        .as_f64()
        .map(Value::Decimal)
        .ok_or_else(|| DifError::InvalidWireValue(format!("unrepresentable number {number}")))
}

fn parse_integer(type_address: &str, repr: &DifRepresentationValue) -> Result<BigInt> {
    match repr {
        DifRepresentationValue::Number(number) => {
            if let Some(n) = number.as_i64() {
                return Ok(n.into());
            }
            if let Some(n) = number.as_u64() {
                return Ok(n.into());
            }
            number
                .to_string()
                .parse()
                .map_err(|_| invalid(type_address, repr))
        }
        DifRepresentationValue::Text(digits) => {
            digits.parse().map_err(|_| invalid(type_address, repr))
        }
        other => Err(invalid(type_address, other)),
    }
}

fn parse_decimal(type_address: &str, repr: &DifRepresentationValue) -> Result<f64> {
    match repr {
        DifRepresentationValue::Number(number) => {
            number.as_f64().ok_or_else(|| invalid(type_address, repr))
        }
        // non-finite values travel as text
        DifRepresentationValue::Text(text) => text.parse().map_err(|_| invalid(type_address, repr)),
        other => Err(invalid(type_address, other)),
    }
}

fn invalid(type_address: &str, repr: &DifRepresentationValue) -> DifError {
    let name = core_type_name(type_address).unwrap_or(type_address);
    DifError::InvalidWireValue(format!("{repr} is not a valid {name}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dif::DifType;
    use serde_json::json;

    fn repr(json: serde_json::Value) -> DifRepresentationValue {
        DifRepresentationValue::try_from(json).expect("valid representation")
    }

    #[test]
    fn test_undefined_needs_the_single_marker() {
        let null = || Box::new(DifType::Reference(core_type::NULL.to_string()));
        let marker = host_type::UNDEFINED.to_string();

        let undefined = DifTypeDefinition::ImplType(null(), vec![marker.clone()]);
        assert!(is_undefined(&undefined, &DifRepresentationValue::Null));
        assert!(!is_undefined(&undefined, &DifRepresentationValue::Bool(false)));

        let extra = DifTypeDefinition::ImplType(null(), vec![marker, "222222".to_string()]);
        assert!(!is_undefined(&extra, &DifRepresentationValue::Null));
    }

    #[test]
    fn test_number_value() {
        assert_eq!(number_value(&42.into()).unwrap(), Value::Integer(42));
        assert_eq!(number_value(&u64::MAX.into()).unwrap(), Value::Integer(u64::MAX as i128));
        let decimal = serde_json::Number::from_f64(1.5).unwrap();
        assert_eq!(number_value(&decimal).unwrap(), Value::Decimal(1.5));
    }

    #[test]
    fn test_parse_integer_accepts_numbers_and_digits() {
        assert_eq!(parse_integer(core_type::INTEGER_I32, &repr(json!(-7))).unwrap(), BigInt::from(-7));
        assert_eq!(
            parse_integer(core_type::INTEGER_IBIG, &repr(json!("123456789012345678901234567890"))).unwrap(),
            "123456789012345678901234567890".parse::<BigInt>().unwrap()
        );
        assert!(parse_integer(core_type::INTEGER, &repr(json!("twelve"))).is_err());
        assert!(parse_integer(core_type::INTEGER, &repr(json!(true))).is_err());
    }

    #[test]
    fn test_parse_decimal_non_finite() {
        assert!(parse_decimal(core_type::DECIMAL_F64, &repr(json!("NaN"))).unwrap().is_nan());
        assert_eq!(
            parse_decimal(core_type::DECIMAL_F64, &repr(json!("-Infinity"))).unwrap(),
            f64::NEG_INFINITY
        );
        assert_eq!(parse_decimal(core_type::DECIMAL, &repr(json!(0.25))).unwrap(), 0.25);
    }
}
