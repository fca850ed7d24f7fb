//! Hashable wrapper for Value to enable use as map keys

use std::hash::{Hash, Hasher};

use super::Value;

/// A wrapper for Value that implements Hash and Eq.
///
/// Primitives hash and compare by value (decimals by bit pattern);
/// containers and references hash and compare by identity. Every value is
/// usable as a key.
#[derive(Debug, Clone)]
pub struct MapKey(pub Value);

impl Hash for MapKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(&self.0).hash(state);

        match &self.0 {
            Value::Undefined | Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Integer(n) => n.hash(state),
            Value::BigInt(n) => n.hash(state),
            Value::Decimal(n) => n.to_bits().hash(state),
            Value::Text(s) => s.hash(state),
            Value::Endpoint(e) => e.name().hash(state),
            Value::List(_) | Value::Map(_) | Value::Object(_) | Value::Ref(_) => {
                self.0.identity().hash(state)
            }
        }
    }
}

impl PartialEq for MapKey {
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (Value::Decimal(a), Value::Decimal(b)) => a.to_bits() == b.to_bits(),
            (a, b) if a.is_primitive() && b.is_primitive() => a == b,
            (a, b) => a.identity().is_some() && a.identity() == b.identity(),
        }
    }
}

impl Eq for MapKey {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::List;
    use std::collections::HashSet;

    #[test]
    fn test_primitive_keys_compare_by_value() {
        assert_eq!(MapKey(Value::text("a")), MapKey(Value::text("a")));
        assert_ne!(MapKey(Value::from(1)), MapKey(Value::from(1.0)));
        assert_eq!(MapKey(Value::from(f64::NAN)), MapKey(Value::from(f64::NAN)));
    }

    #[test]
    fn test_container_keys_compare_by_identity() {
        let a = List::new(vec![]);
        let b = List::new(vec![]);
        let mut set = HashSet::new();
        set.insert(MapKey(Value::List(a.clone())));
        set.insert(MapKey(Value::List(b)));
        set.insert(MapKey(Value::List(a)));
        assert_eq!(set.len(), 2);
    }
}
