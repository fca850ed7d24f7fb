//! Core type addresses known to every runtime

/// Addresses of the core types.
pub mod core_type {
    #![allow(missing_docs)]

    pub const NULL: &str = "010000";
    pub const TYPE: &str = "020000";
    pub const BOOLEAN: &str = "030000";
    pub const CALLABLE: &str = "050000";
    pub const ENDPOINT: &str = "070000";
    pub const TEXT: &str = "080000";
    pub const LIST: &str = "090000";
    pub const UNIT: &str = "0b0000";
    pub const MAP: &str = "0c0000";
    pub const NEVER: &str = "0d0000";
    pub const UNKNOWN: &str = "0e0000";
    pub const DECIMAL: &str = "2c0100";
    pub const DECIMAL_F32: &str = "2d0100";
    pub const DECIMAL_F64: &str = "2e0100";
    pub const DECIMAL_DBIG: &str = "2f0100";
    pub const INTEGER: &str = "640000";
    pub const INTEGER_U8: &str = "650000";
    pub const INTEGER_U16: &str = "660000";
    pub const INTEGER_U32: &str = "670000";
    pub const INTEGER_U64: &str = "680000";
    pub const INTEGER_U128: &str = "690000";
    pub const INTEGER_I8: &str = "6a0000";
    pub const INTEGER_I16: &str = "6b0000";
    pub const INTEGER_I32: &str = "6c0000";
    pub const INTEGER_I64: &str = "6d0000";
    pub const INTEGER_I128: &str = "6e0000";
    pub const INTEGER_IBIG: &str = "6f0000";
}

/// Addresses of types defined by the host library rather than the runtime core.
pub mod host_type {
    /// Marker component for the host's "absent" value (`null` + this impl)
    pub const UNDEFINED: &str = "111111";
}

/// Names for every core type address, used for display.
pub const CORE_TYPE_NAMES: &[(&str, &str)] = &[
    ("null", core_type::NULL),
    ("type", core_type::TYPE),
    ("boolean", core_type::BOOLEAN),
    ("callable", core_type::CALLABLE),
    ("endpoint", core_type::ENDPOINT),
    ("text", core_type::TEXT),
    ("list", core_type::LIST),
    ("unit", core_type::UNIT),
    ("map", core_type::MAP),
    ("never", core_type::NEVER),
    ("unknown", core_type::UNKNOWN),
    ("decimal", core_type::DECIMAL),
    ("decimal_f32", core_type::DECIMAL_F32),
    ("decimal_f64", core_type::DECIMAL_F64),
    ("decimal_dbig", core_type::DECIMAL_DBIG),
    ("integer", core_type::INTEGER),
    ("integer_u8", core_type::INTEGER_U8),
    ("integer_u16", core_type::INTEGER_U16),
    ("integer_u32", core_type::INTEGER_U32),
    ("integer_u64", core_type::INTEGER_U64),
    ("integer_u128", core_type::INTEGER_U128),
    ("integer_i8", core_type::INTEGER_I8),
    ("integer_i16", core_type::INTEGER_I16),
    ("integer_i32", core_type::INTEGER_I32),
    ("integer_i64", core_type::INTEGER_I64),
    ("integer_i128", core_type::INTEGER_I128),
    ("integer_ibig", core_type::INTEGER_IBIG),
];

const SMALL_UNSIGNED_INTEGERS: &[&str] = &[
    core_type::INTEGER_U8,
    core_type::INTEGER_U16,
    core_type::INTEGER_U32,
    core_type::INTEGER_U64,
    core_type::INTEGER_U128,
];

const SMALL_SIGNED_INTEGERS: &[&str] = &[
    core_type::INTEGER_I8,
    core_type::INTEGER_I16,
    core_type::INTEGER_I32,
    core_type::INTEGER_I64,
    core_type::INTEGER_I128,
];

const DECIMALS: &[&str] = &[
    core_type::DECIMAL,
    core_type::DECIMAL_F32,
    core_type::DECIMAL_F64,
    core_type::DECIMAL_DBIG,
];

/// Integer types whose values fit the native integer representation.
///
/// The generic `integer` type counts as small.
pub fn is_small_integer(address: &str) -> bool {
    address == core_type::INTEGER
        || SMALL_SIGNED_INTEGERS.contains(&address)
        || SMALL_UNSIGNED_INTEGERS.contains(&address)
}

/// Integer types that widen to an arbitrary-precision integer.
pub fn is_big_integer(address: &str) -> bool {
    address == core_type::INTEGER_IBIG
}

/// Floating point types.
pub fn is_decimal(address: &str) -> bool {
    DECIMALS.contains(&address)
}

/// Look up the display name of a core type address.
pub fn core_type_name(address: &str) -> Option<&'static str> {
    CORE_TYPE_NAMES
        .iter()
        .find(|(_, addr)| *addr == address)
        .map(|(name, _)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_ranges() {
        assert!(is_small_integer(core_type::INTEGER));
        assert!(is_small_integer(core_type::INTEGER_U8));
        assert!(is_small_integer(core_type::INTEGER_I128));
        assert!(!is_small_integer(core_type::INTEGER_IBIG));
        assert!(is_big_integer(core_type::INTEGER_IBIG));
        assert!(!is_big_integer(core_type::DECIMAL));
    }

    #[test]
    fn test_decimal_range() {
        assert!(is_decimal(core_type::DECIMAL_F64));
        assert!(!is_decimal(core_type::INTEGER));
    }

    #[test]
    fn test_core_type_name() {
        assert_eq!(core_type_name("0c0000"), Some("map"));
        assert_eq!(core_type_name("abcdef"), None);
    }
}
