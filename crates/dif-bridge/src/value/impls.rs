//! Value trait implementations: constructors, extractors, From traits, PartialEq

use std::sync::Arc;

use indexmap::IndexMap;
use num_bigint::BigInt;

use super::*;

// ═══════════════════════════════════════════════════════════════════
// Convenience Constructors
// ═══════════════════════════════════════════════════════════════════

impl Value {
    /// Create a text value
    pub fn text(s: impl Into<Arc<str>>) -> Self {
        Value::Text(s.into())
    }

    /// Create a list value
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(List::new(items))
    }

    /// Create a map value from key/value pairs
    pub fn map(pairs: Vec<(Value, Value)>) -> Self {
        Value::Map(Map::from_pairs(pairs))
    }

    /// Create an object value from fields
    pub fn object<K: Into<String>>(fields: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Object(Object::from_fields(
            fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    /// Create an endpoint value
    pub fn endpoint(name: &str) -> Self {
        Value::Endpoint(Endpoint::get(name))
    }

    /// Integer value, demoted from a big integer when it fits
    pub fn integer(n: BigInt) -> Self {
        match i128::try_from(&n) {
            Ok(small) => Value::Integer(small),
            Err(_) => Value::BigInt(n),
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Extractors
    // ═══════════════════════════════════════════════════════════════════

    /// Name of the variant, for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::BigInt(_) => "big integer",
            Value::Decimal(_) => "decimal",
            Value::Text(_) => "text",
            Value::Endpoint(_) => "endpoint",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Object(_) => "object",
            Value::Ref(_) => "reference",
        }
    }

    /// Borrow as text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Extract a native integer
    pub fn as_integer(&self) -> Option<i128> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Extract a non-negative integer as an index
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Value::Integer(n) => usize::try_from(*n).ok(),
            Value::Decimal(n) if n.fract() == 0.0 && *n >= 0.0 => Some(*n as usize),
            _ => None,
        }
    }

    /// Extract a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Borrow as list handle
    pub fn as_list(&self) -> Option<&List> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }

    /// Borrow as map handle
    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Borrow as object handle
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Borrow as reference cell
    pub fn as_ref_cell(&self) -> Option<&Ref> {
        match self {
            Value::Ref(cell) => Some(cell),
            _ => None,
        }
    }

    /// The value itself, or the current content of a reference cell
    pub fn deref_cell(&self) -> Value {
        match self {
            Value::Ref(cell) => cell.get(),
            other => other.clone(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════
// From Implementations
// ═══════════════════════════════════════════════════════════════════

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! from_integer {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Value::Integer(n as i128)
                }
            }
        )*
    };
}

from_integer!(i8, i16, i32, i64, u8, u16, u32, u64, usize, i128);

impl From<u128> for Value {
    fn from(n: u128) -> Self {
        Value::integer(BigInt::from(n))
    }
}

impl From<BigInt> for Value {
    fn from(n: BigInt) -> Self {
        Value::integer(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Decimal(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::text(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::text(s)
    }
}

impl From<Endpoint> for Value {
    fn from(e: Endpoint) -> Self {
        Value::Endpoint(e)
    }
}

impl From<List> for Value {
    fn from(list: List) -> Self {
        Value::List(list)
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::Map(map)
    }
}

impl From<Object> for Value {
    fn from(object: Object) -> Self {
        Value::Object(object)
    }
}

impl From<Ref> for Value {
    fn from(cell: Ref) -> Self {
        Value::Ref(cell)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Null, Into::into)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::list(items)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(fields: IndexMap<String, Value>) -> Self {
        Value::Object(Object::from_fields(fields))
    }
}

// ═══════════════════════════════════════════════════════════════════
// PartialEq Implementation
// ═══════════════════════════════════════════════════════════════════

/// Primitives and containers compare structurally; reference cells compare
/// by identity. Container comparisons bypass the access gate.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::BigInt(a), Value::BigInt(b)) => a == b,
            (Value::Decimal(a), Value::Decimal(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Endpoint(a), Value::Endpoint(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                a.same_storage(b) || a.0.peek(|x| b.0.peek(|y| x == y))
            }
            (Value::Map(a), Value::Map(b)) => {
                a.same_storage(b)
                    || a.0.peek(|x| {
                        b.0.peek(|y| {
                            x.len() == y.len()
                                && x.iter().all(|(k, v)| y.get(k).is_some_and(|w| v == w))
                        })
                    })
            }
            (Value::Object(a), Value::Object(b)) => {
                a.same_storage(b)
                    || a.0.peek(|x| {
                        b.0.peek(|y| {
                            x.len() == y.len()
                                && x.iter().all(|(k, v)| y.get(k).is_some_and(|w| v == w))
                        })
                    })
            }
            (Value::Ref(a), Value::Ref(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_demotes_small_bigints() {
        assert_eq!(Value::integer(BigInt::from(5)), Value::Integer(5));
        let big = BigInt::from(i128::MAX) * 4;
        assert!(matches!(Value::integer(big), Value::BigInt(_)));
    }

    #[test]
    fn test_containers_compare_structurally() {
        let a = Value::list(vec![Value::from(1), Value::text("x")]);
        let b = Value::list(vec![Value::from(1), Value::text("x")]);
        assert_eq!(a, b);

        let m1 = Value::map(vec![(Value::text("k"), Value::from(true))]);
        let m2 = Value::map(vec![(Value::text("k"), Value::from(true))]);
        assert_eq!(m1, m2);
        assert_ne!(m1, Value::object([("k", Value::from(true))]));
    }

    #[test]
    fn test_integer_and_decimal_differ() {
        assert_ne!(Value::from(1), Value::from(1.0));
        assert_eq!(Value::from(Some("a")), Value::text("a"));
        assert_eq!(Value::from(None::<bool>), Value::Null);
    }
}
