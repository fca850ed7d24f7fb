//! DIF wire model
//!
//! The closed set of value, type and update representations exchanged with
//! the foreign runtime. Every type here serializes to exactly the JSON shape
//! the runtime produces and consumes:
//!
//! - a value container is either a bare pointer address string or
//!   `{ "type"?: <type definition>, "value": <representation> }`
//! - a type definition is either a bare address string (reference shorthand)
//!   or `{ "kind": <ordinal>, "def": ... }`
//! - mutability is an ordinal (`0` mutable, `1` immutable)
//! - updates are internally tagged by `"kind"`
//!
//! Representation values are ambiguous under a derived untagged
//! deserializer (a `[k, v]` pair parses as a sequence-form struct), so the
//! recursive types deserialize through `serde_json::Value` and classify the
//! shape by hand.

use indexmap::IndexMap;
use serde::de::{self, Deserializer};
use serde::ser::{self, SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Opaque string identifying a remote reference.
pub type PointerAddress = String;

/// Identifies which local transceiver caused an update.
pub type TransceiverId = u32;

/// Identifies a remote observer registered with the runtime.
pub type ObserverId = u32;

// ═══════════════════════════════════════════════════════════════════════
// Values
// ═══════════════════════════════════════════════════════════════════════

/// A value with optional explicit type information.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DifValue {
    /// Explicit type; absent when the type is inferable from the shape
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub ty: Option<DifTypeDefinition>,

    /// The representation
    pub value: DifRepresentationValue,
}

impl DifValue {
    /// A value whose type is inferred from its representation
    pub fn untyped(value: impl Into<DifRepresentationValue>) -> Self {
        Self {
            ty: None,
            value: value.into(),
        }
    }

    /// A value with an explicit type
    pub fn typed(ty: DifTypeDefinition, value: impl Into<DifRepresentationValue>) -> Self {
        Self {
            ty: Some(ty),
            value: value.into(),
        }
    }
}

/// Either a bare pointer address or an inline value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DifValueContainer {
    /// "This slot is itself a reference"
    Address(PointerAddress),
    /// An inline value
    Value(DifValue),
}

impl DifValueContainer {
    /// Container referring to another pointer
    pub fn address(address: impl Into<PointerAddress>) -> Self {
        DifValueContainer::Address(address.into())
    }

    /// Container holding an untyped inline value
    pub fn untyped(value: impl Into<DifRepresentationValue>) -> Self {
        DifValueContainer::Value(DifValue::untyped(value))
    }

    /// Container holding a typed inline value
    pub fn typed(ty: DifTypeDefinition, value: impl Into<DifRepresentationValue>) -> Self {
        DifValueContainer::Value(DifValue::typed(ty, value))
    }

    /// The address, if this container is a bare reference
    pub fn as_address(&self) -> Option<&str> {
        match self {
            DifValueContainer::Address(address) => Some(address),
            DifValueContainer::Value(_) => None,
        }
    }
}

impl From<DifValue> for DifValueContainer {
    fn from(value: DifValue) -> Self {
        DifValueContainer::Value(value)
    }
}

/// The JSON-compatible representation of a value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DifRepresentationValue {
    /// `null`
    Null,
    /// `true` / `false`
    Bool(bool),
    /// Any JSON number (integer-ness is preserved)
    Number(serde_json::Number),
    /// A string
    Text(String),
    /// Ordered sequence of containers
    List(Vec<DifValueContainer>),
    /// Key/value pairs, serialized as an array of two-element arrays
    Map(Vec<(DifValueContainer, DifValueContainer)>),
    /// Text-keyed structure
    Object(IndexMap<String, DifValueContainer>),
}

impl From<bool> for DifRepresentationValue {
    fn from(b: bool) -> Self {
        DifRepresentationValue::Bool(b)
    }
}

impl From<&str> for DifRepresentationValue {
    fn from(s: &str) -> Self {
        DifRepresentationValue::Text(s.to_string())
    }
}

impl From<String> for DifRepresentationValue {
    fn from(s: String) -> Self {
        DifRepresentationValue::Text(s)
    }
}

impl From<i64> for DifRepresentationValue {
    fn from(n: i64) -> Self {
        DifRepresentationValue::Number(n.into())
    }
}

impl From<Vec<DifValueContainer>> for DifRepresentationValue {
    fn from(items: Vec<DifValueContainer>) -> Self {
        DifRepresentationValue::List(items)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════════════════

/// Ordinal of a verbose type definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum DifTypeDefinitionKind {
    Structural = 1,
    Reference = 2,
    Type = 3,
    Intersection = 4,
    Union = 5,
    ImplType = 6,
    Unit = 7,
    Never = 8,
    Unknown = 9,
    Function = 10,
}

impl TryFrom<u64> for DifTypeDefinitionKind {
    type Error = String;

    fn try_from(ordinal: u64) -> Result<Self, Self::Error> {
        use DifTypeDefinitionKind::*;
        Ok(match ordinal {
            1 => Structural,
            2 => Reference,
            3 => Type,
            4 => Intersection,
            5 => Union,
            6 => ImplType,
            7 => Unit,
            8 => Never,
            9 => Unknown,
            10 => Function,
            other => return Err(format!("unknown type definition kind {other}")),
        })
    }
}

/// A type definition.
///
/// `Reference` serializes to the bare address string; every other kind to
/// `{ "kind": <ordinal>, "def": ... }`.
#[derive(Debug, Clone, PartialEq)]
pub enum DifTypeDefinition {
    /// Structural type described by a value
    Structural(Box<DifValue>),
    /// Nominal type identified by its address
    Reference(PointerAddress),
    /// The type of a type
    Type(Box<DifType>),
    /// All of the listed types
    Intersection(Vec<DifType>),
    /// Any of the listed types
    Union(Vec<DifType>),
    /// A base type with implementation markers
    ImplType(Box<DifType>, Vec<PointerAddress>),
    /// The unit type
    Unit,
    /// The bottom type
    Never,
    /// Type not known
    Unknown,
    /// Callable signature (opaque at this layer)
    Function(JsonValue),
}

impl DifTypeDefinition {
    /// Shorthand for a nominal reference
    pub fn reference(address: impl Into<PointerAddress>) -> Self {
        DifTypeDefinition::Reference(address.into())
    }

    /// The kind ordinal of this definition
    pub fn kind(&self) -> DifTypeDefinitionKind {
        match self {
            DifTypeDefinition::Structural(_) => DifTypeDefinitionKind::Structural,
            DifTypeDefinition::Reference(_) => DifTypeDefinitionKind::Reference,
            DifTypeDefinition::Type(_) => DifTypeDefinitionKind::Type,
            DifTypeDefinition::Intersection(_) => DifTypeDefinitionKind::Intersection,
            DifTypeDefinition::Union(_) => DifTypeDefinitionKind::Union,
            DifTypeDefinition::ImplType(_, _) => DifTypeDefinitionKind::ImplType,
            DifTypeDefinition::Unit => DifTypeDefinitionKind::Unit,
            DifTypeDefinition::Never => DifTypeDefinitionKind::Never,
            DifTypeDefinition::Unknown => DifTypeDefinitionKind::Unknown,
            DifTypeDefinition::Function(_) => DifTypeDefinitionKind::Function,
        }
    }

    /// The address, if this is a bare nominal reference
    pub fn as_reference(&self) -> Option<&str> {
        match self {
            DifTypeDefinition::Reference(address) => Some(address),
            _ => None,
        }
    }
}

/// A type used inside composite type definitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DifType {
    /// Shorthand for a nominal reference
    Reference(PointerAddress),
    /// Full form
    Definition {
        /// Optional type name
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        /// Optional reference mutability
        #[serde(rename = "mut", default, skip_serializing_if = "Option::is_none")]
        mutability: Option<ReferenceMutability>,
        /// The definition
        def: DifTypeDefinition,
    },
}

impl DifType {
    /// The nominal address, if this is the shorthand form
    pub fn as_reference(&self) -> Option<&str> {
        match self {
            DifType::Reference(address) => Some(address),
            DifType::Definition {
                def: DifTypeDefinition::Reference(address),
                ..
            } => Some(address),
            DifType::Definition { .. } => None,
        }
    }
}

/// Mutability of a reference; serialized as its ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReferenceMutability {
    /// Observable and writable
    #[default]
    Mutable,
    /// Neither observable nor writable
    Immutable,
}

impl ReferenceMutability {
    /// Whether this is [`ReferenceMutability::Immutable`]
    pub fn is_immutable(self) -> bool {
        self == ReferenceMutability::Immutable
    }
}

impl Serialize for ReferenceMutability {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(match self {
            ReferenceMutability::Mutable => 0,
            ReferenceMutability::Immutable => 1,
        })
    }
}

impl<'de> Deserialize<'de> for ReferenceMutability {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match u8::deserialize(deserializer)? {
            0 => Ok(ReferenceMutability::Mutable),
            1 => Ok(ReferenceMutability::Immutable),
            other => Err(de::Error::custom(format!("unknown mutability {other}"))),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// References & Updates
// ═══════════════════════════════════════════════════════════════════════

/// Full payload returned when a pointer is dereferenced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifReference {
    /// Current value
    pub value: DifValueContainer,
    /// Type the reference may hold
    pub allowed_type: DifTypeDefinition,
    /// Mutability
    #[serde(rename = "mut")]
    pub mutability: ReferenceMutability,
}

/// Key of a `Set` or `Delete` update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum DifProperty {
    /// Text key
    Text(String),
    /// Numeric index
    Index(usize),
    /// Arbitrary value used as key
    Value(DifValueContainer),
}

/// Discriminant of [`DifUpdateData`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum DifUpdateKind {
    Replace,
    Append,
    Set,
    Delete,
    Clear,
    ListSplice,
}

/// A structural update applied to a reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DifUpdateData {
    /// Replace the whole value
    Replace {
        /// New value
        value: DifValueContainer,
    },
    /// Append to a list
    Append {
        /// Appended item
        value: DifValueContainer,
    },
    /// Set a key or index
    Set {
        /// Target key
        key: DifProperty,
        /// New value
        value: DifValueContainer,
    },
    /// Remove a key or index
    Delete {
        /// Target key
        key: DifProperty,
    },
    /// Remove all entries
    Clear,
    /// Remove `delete_count` items at `start` and insert `items`
    ListSplice {
        /// First affected index
        start: usize,
        /// Number of removed items
        delete_count: usize,
        /// Inserted items
        items: Vec<DifValueContainer>,
    },
}

impl DifUpdateData {
    /// The kind of this update
    pub fn kind(&self) -> DifUpdateKind {
        match self {
            DifUpdateData::Replace { .. } => DifUpdateKind::Replace,
            DifUpdateData::Append { .. } => DifUpdateKind::Append,
            DifUpdateData::Set { .. } => DifUpdateKind::Set,
            DifUpdateData::Delete { .. } => DifUpdateKind::Delete,
            DifUpdateData::Clear => DifUpdateKind::Clear,
            DifUpdateData::ListSplice { .. } => DifUpdateKind::ListSplice,
        }
    }
}

/// An update tagged with the transceiver that caused it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifUpdate {
    /// Originating transceiver
    pub source_id: TransceiverId,
    /// The update
    pub data: DifUpdateData,
}

/// Options of a remote observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ObserveOptions {
    /// Deliver updates that the observing transceiver produced itself
    pub relay_own_updates: bool,
}

// ═══════════════════════════════════════════════════════════════════════
// Hand-written (de)serialization for the recursive, ambiguous shapes
// ═══════════════════════════════════════════════════════════════════════

impl Serialize for DifTypeDefinition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let def = match self {
            DifTypeDefinition::Reference(address) => return serializer.serialize_str(address),
            DifTypeDefinition::Structural(value) => serde_json::to_value(value),
            DifTypeDefinition::Type(ty) => serde_json::to_value(ty),
            DifTypeDefinition::Intersection(types) | DifTypeDefinition::Union(types) => {
                serde_json::to_value(types)
            }
            DifTypeDefinition::ImplType(base, impls) => serde_json::to_value((base, impls)),
            DifTypeDefinition::Function(def) => Ok(def.clone()),
            DifTypeDefinition::Unit | DifTypeDefinition::Never | DifTypeDefinition::Unknown => {
                Ok(JsonValue::Null)
            }
        }
        .map_err(ser::Error::custom)?;

        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("kind", &(self.kind() as u8))?;
        map.serialize_entry("def", &def)?;
        map.end()
    }
}

impl TryFrom<JsonValue> for DifTypeDefinition {
    type Error = String;

    fn try_from(json: JsonValue) -> Result<Self, Self::Error> {
        let mut obj = match json {
            JsonValue::String(address) => return Ok(DifTypeDefinition::Reference(address)),
            JsonValue::Object(obj) => obj,
            other => return Err(format!("expected type definition, got {other}")),
        };
        let kind = obj
            .get("kind")
            .and_then(JsonValue::as_u64)
            .ok_or_else(|| "type definition without kind".to_string())?;
        let def = obj.remove("def").unwrap_or(JsonValue::Null);
        let parse = |def: JsonValue| -> Result<DifType, String> {
            serde_json::from_value(def).map_err(|e| e.to_string())
        };

        let kind = DifTypeDefinitionKind::try_from(kind)?;
        Ok(match kind {
            DifTypeDefinitionKind::Structural => {
                DifTypeDefinition::Structural(Box::new(DifValue::try_from(def)?))
            }
            DifTypeDefinitionKind::Reference => match def {
                JsonValue::String(address) => DifTypeDefinition::Reference(address),
                other => return Err(format!("expected reference address, got {other}")),
            },
            DifTypeDefinitionKind::Type => DifTypeDefinition::Type(Box::new(parse(def)?)),
            DifTypeDefinitionKind::Intersection | DifTypeDefinitionKind::Union => {
                let JsonValue::Array(items) = def else {
                    return Err("expected type list".to_string());
                };
                let types = items.into_iter().map(parse).collect::<Result<Vec<_>, _>>()?;
                if kind == DifTypeDefinitionKind::Union {
                    DifTypeDefinition::Union(types)
                } else {
                    DifTypeDefinition::Intersection(types)
                }
            }
            DifTypeDefinitionKind::ImplType => {
                let JsonValue::Array(mut parts) = def else {
                    return Err("expected [base, impls] pair".to_string());
                };
                if parts.len() != 2 {
                    return Err("expected [base, impls] pair".to_string());
                }
                let impls = parts.pop().unwrap_or(JsonValue::Null);
                let base = parts.pop().unwrap_or(JsonValue::Null);
                let impls: Vec<PointerAddress> =
                    serde_json::from_value(impls).map_err(|e| e.to_string())?;
                DifTypeDefinition::ImplType(Box::new(parse(base)?), impls)
            }
            DifTypeDefinitionKind::Unit => DifTypeDefinition::Unit,
            DifTypeDefinitionKind::Never => DifTypeDefinition::Never,
            DifTypeDefinitionKind::Unknown => DifTypeDefinition::Unknown,
            DifTypeDefinitionKind::Function => DifTypeDefinition::Function(def),
        })
    }
}

impl TryFrom<JsonValue> for DifValue {
    type Error = String;

    fn try_from(json: JsonValue) -> Result<Self, Self::Error> {
        let JsonValue::Object(mut obj) = json else {
            return Err(format!("expected value object, got {json}"));
        };
        let value = obj
            .remove("value")
            .ok_or_else(|| "value object without \"value\" field".to_string())?;
        let ty = match obj.remove("type") {
            None | Some(JsonValue::Null) => None,
            Some(ty) => Some(DifTypeDefinition::try_from(ty)?),
        };
        Ok(DifValue {
            ty,
            value: DifRepresentationValue::try_from(value)?,
        })
    }
}

impl TryFrom<JsonValue> for DifValueContainer {
    type Error = String;

    fn try_from(json: JsonValue) -> Result<Self, Self::Error> {
        match json {
            JsonValue::String(address) => Ok(DifValueContainer::Address(address)),
            other => Ok(DifValueContainer::Value(DifValue::try_from(other)?)),
        }
    }
}

impl TryFrom<JsonValue> for DifRepresentationValue {
    type Error = String;

    fn try_from(json: JsonValue) -> Result<Self, Self::Error> {
        Ok(match json {
            JsonValue::Null => DifRepresentationValue::Null,
            JsonValue::Bool(b) => DifRepresentationValue::Bool(b),
            JsonValue::Number(n) => DifRepresentationValue::Number(n),
            JsonValue::String(s) => DifRepresentationValue::Text(s),
            // [[k, v], ...] is a map, anything else (including []) a list
            JsonValue::Array(items) if matches!(items.first(), Some(JsonValue::Array(_))) => {
                let pairs = items
                    .into_iter()
                    .map(|pair| match pair {
                        JsonValue::Array(kv) if kv.len() == 2 => {
                            let mut kv = kv.into_iter();
                            let key = kv.next().unwrap_or(JsonValue::Null);
                            let value = kv.next().unwrap_or(JsonValue::Null);
                            Ok((
                                DifValueContainer::try_from(key)?,
                                DifValueContainer::try_from(value)?,
                            ))
                        }
                        other => Err(format!("expected [key, value] pair, got {other}")),
                    })
                    .collect::<Result<Vec<_>, String>>()?;
                DifRepresentationValue::Map(pairs)
            }
            JsonValue::Array(items) => DifRepresentationValue::List(
                items
                    .into_iter()
                    .map(DifValueContainer::try_from)
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            JsonValue::Object(obj) => DifRepresentationValue::Object(
                obj.into_iter()
                    .map(|(k, v)| Ok((k, DifValueContainer::try_from(v)?)))
                    .collect::<Result<IndexMap<_, _>, String>>()?,
            ),
        })
    }
}

macro_rules! deserialize_via_json {
    ($($ty:ty),* $(,)?) => {
        $(
            impl<'de> Deserialize<'de> for $ty {
                fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                    let json = JsonValue::deserialize(deserializer)?;
                    <$ty>::try_from(json).map_err(de::Error::custom)
                }
            }
        )*
    };
}

deserialize_via_json!(
    DifTypeDefinition,
    DifValue,
    DifValueContainer,
    DifRepresentationValue,
);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reference_type_is_bare_string() {
        let ty = DifTypeDefinition::reference("0c0000");
        assert_eq!(serde_json::to_value(&ty).unwrap(), json!("0c0000"));
    }

    #[test]
    fn test_pair_array_is_map_and_empty_array_is_list() {
        let map: DifRepresentationValue = serde_json::from_value(json!([["a", "b"]])).unwrap();
        assert!(matches!(map, DifRepresentationValue::Map(ref pairs) if pairs.len() == 1));

        let list: DifRepresentationValue = serde_json::from_value(json!([])).unwrap();
        assert_eq!(list, DifRepresentationValue::List(vec![]));
    }

    #[test]
    fn test_clear_update_shape() {
        let json = serde_json::to_value(DifUpdateData::Clear).unwrap();
        assert_eq!(json, json!({ "kind": "clear" }));
    }

    #[test]
    fn test_mutability_ordinal() {
        assert_eq!(
            serde_json::to_value(ReferenceMutability::Immutable).unwrap(),
            json!(1)
        );
        let m: ReferenceMutability = serde_json::from_value(json!(0)).unwrap();
        assert_eq!(m, ReferenceMutability::Mutable);
    }
}
