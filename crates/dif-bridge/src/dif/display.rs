//! Display implementations for wire values

use std::fmt;

use super::core::core_type_name;
use super::definitions::*;

/// Render an address as its core type name, or `$<address>` otherwise.
pub fn address_to_display_string(address: &str) -> String {
    match core_type_name(address) {
        Some(name) => name.to_string(),
        None => format!("${address}"),
    }
}

impl fmt::Display for ReferenceMutability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceMutability::Mutable => write!(f, "&mut "),
            ReferenceMutability::Immutable => write!(f, "&"),
        }
    }
}

impl fmt::Display for DifReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{} (allowed: {})",
            self.mutability, self.value, self.allowed_type
        )
    }
}

impl fmt::Display for DifValueContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DifValueContainer::Address(address) => {
                write!(f, "{}", address_to_display_string(address))
            }
            DifValueContainer::Value(value) => write!(f, "{value}"),
        }
    }
}

impl fmt::Display for DifValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.ty {
            Some(ty) => write!(f, "{{ type: {}, value: {} }}", ty, self.value),
            None => write!(f, "{}", self.value),
        }
    }
}

impl fmt::Display for DifRepresentationValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DifRepresentationValue::Null => write!(f, "null"),
            DifRepresentationValue::Bool(b) => write!(f, "{b}"),
            DifRepresentationValue::Number(n) => write!(f, "{n}"),
            DifRepresentationValue::Text(s) => write!(f, "{s:?}"),
            DifRepresentationValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            DifRepresentationValue::Map(pairs) => {
                write!(f, "[")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "[{k}, {v}]")?;
                }
                write!(f, "]")
            }
            DifRepresentationValue::Object(fields) => {
                write!(f, "{{ ")?;
                for (i, (k, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, " }}")
            }
        }
    }
}

impl fmt::Display for DifTypeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DifTypeDefinition::Reference(address) => {
                write!(f, "{}", address_to_display_string(address))
            }
            other => {
                let def = serde_json::to_value(other)
                    .ok()
                    .and_then(|json| json.get("def").cloned())
                    .unwrap_or_default();
                write!(f, "{{ kind: {}, def: {} }}", other.kind() as u8, def)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dif::core::core_type;

    #[test]
    fn test_reference_display() {
        let reference = DifReference {
            value: DifValueContainer::typed(DifTypeDefinition::reference(core_type::INTEGER), "123"),
            allowed_type: DifTypeDefinition::reference(core_type::INTEGER),
            mutability: ReferenceMutability::Mutable,
        };
        assert_eq!(
            reference.to_string(),
            "&mut { type: integer, value: \"123\" } (allowed: integer)"
        );
    }

    #[test]
    fn test_unknown_address_display() {
        let container = DifValueContainer::address("abcdef");
        assert_eq!(container.to_string(), "$abcdef");
    }

    #[test]
    fn test_object_display() {
        let mut fields = indexmap::IndexMap::new();
        fields.insert("a".to_string(), DifValueContainer::untyped(true));
        let container = DifValueContainer::untyped(DifRepresentationValue::Object(fields));
        assert_eq!(container.to_string(), "{ a: true }");
    }
}
