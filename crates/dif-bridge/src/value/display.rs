//! Display and Debug implementations for Value

use std::fmt;

use super::*;

fn write_seq<'a>(
    f: &mut fmt::Formatter<'_>,
    items: impl Iterator<Item = &'a Value>,
) -> fmt::Result {
    for (i, item) in items.enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{:?}", item)?;
    }
    Ok(())
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(n) => write!(f, "{}", n),
            Value::BigInt(n) => write!(f, "{}n", n),
            Value::Decimal(n) => write!(f, "{:?}", n),
            Value::Text(s) => write!(f, "{:?}", s.as_ref()),
            Value::Endpoint(e) => write!(f, "{}", e),

            Value::List(list) => {
                if list.is_proxy() {
                    write!(f, "&")?;
                }
                write!(f, "[")?;
                list.0.peek(|items| write_seq(f, items.iter()))?;
                write!(f, "]")
            }

            Value::Map(map) => {
                if map.is_proxy() {
                    write!(f, "&")?;
                }
                write!(f, "Map {{")?;
                map.0.peek(|entries| {
                    for (i, (k, v)) in entries.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{:?} => {:?}", k.0, v)?;
                    }
                    Ok(())
                })?;
                write!(f, "}}")
            }

            Value::Object(object) => {
                if object.is_proxy() {
                    write!(f, "&")?;
                }
                write!(f, "{{")?;
                object.0.peek(|fields| {
                    for (i, (k, v)) in fields.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}: {:?}", k, v)?;
                    }
                    Ok(())
                })?;
                write!(f, "}}")
            }

            Value::Ref(cell) => write!(f, "{:?}", cell),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{}", s.as_ref()), // No quotes for Display
            Value::Ref(cell) => write!(f, "{}", cell.get()),
            _ => fmt::Debug::fmt(self, f),
        }
    }
}
