//! Values carried by transaction variables and compensable call arguments.
//!
//! [`Value`] is a closed set of types. Anything an application wants to stash in a
//! transaction variable or pass to a compensable method has to be expressed in these terms,
//! which is what makes the stored blobs reversible without any type registry.

use crate::timestamp::Timestamp;
use base64::Engine;
use std::collections::BTreeMap;

/// A serializable value.
#[derive(Clone, PartialEq)]
#[derive(serde::Deserialize, serde::Serialize)]
pub enum Value {
    Null,
    // NOTE: the #[serde] here is needed to get efficient encoding of byte-arrays in the blob
    // format.
    Bytes(#[serde(with = "serde_bytes")] Vec<u8>),
    String(String),
    Double(f64),
    U64(u64),
    I64(i64),
    Bool(bool),
    Timestamp(Timestamp),
    Ulid(ulid::Ulid),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// A short name for the type held, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bytes(_) => "bytes",
            Value::String(_) => "string",
            Value::Double(_) => "double",
            Value::U64(_) => "u64",
            Value::I64(_) => "i64",
            Value::Bool(_) => "bool",
            Value::Timestamp(_) => "timestamp",
            Value::Ulid(_) => "ulid",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }
}

macro_rules! impl_from {
(
    $(
        $source:ty => $target:ident $(with $conv:ident)?
    ),* $(,)?
    ) => {
        $(
            impl From<$source> for Value {
                fn from(value: $source) -> Self {
                    Self::$target(impl_from!(value$(, $conv)?))
                }
            }
        )*
    };

    ($value:ident, $conv:ident) => {
        $value.$conv()
    };

    ($value:ident) => {
        $value
    };
}

impl_from!(
    &[u8]      => Bytes with into,
    Vec<u8>    => Bytes,
    String     => String,
    &str       => String with to_string,
    f64        => Double,
    u8         => U64 with into,
    u16        => U64 with into,
    u32        => U64 with into,
    u64        => U64,
    i8         => I64 with into,
    i16        => I64 with into,
    i32        => I64 with into,
    i64        => I64,
    bool       => Bool,
    Timestamp  => Timestamp,
    ulid::Ulid => Ulid,
    Vec<Value> => List,
);

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bytes(inner) => write!(f, "{inner:02X?}"),
            Self::String(inner) => inner.fmt(f),
            Self::Bool(inner) => inner.fmt(f),
            // Make sure to always print at least 1 decimal, so we can non-ambiguously
            // tell apart I64 and doubles.
            Self::Double(inner) => write!(f, "{inner:?}d"),
            Self::U64(inner) => write!(f, "{inner}u"),
            Self::I64(inner) => write!(f, "{inner}"),
            Self::Timestamp(inner) => inner.fmt(f),
            Self::Ulid(inner) => inner.fmt(f),
            Self::List(inner) => f.debug_list().entries(inner).finish(),
            Self::Map(inner) => f.debug_map().entries(inner).finish(),
        }
    }
}

/// Renders a [`Value`] for human consumption.
///
/// This direction is lossy (bytes become base64 text, timestamps become strings) and is
/// only ever used for the observability copy of the variables.
impl From<Value> for serde_json::Value {
    fn from(val: Value) -> Self {
        match val {
            Value::Null => serde_json::Value::Null,
            Value::Bytes(v) => {
                base64::engine::general_purpose::STANDARD.encode(v).into()
            }
            Value::String(v) => v.into(),
            Value::Double(v) => v.into(),
            Value::U64(v) => v.into(),
            Value::I64(v) => v.into(),
            Value::Bool(v) => v.into(),
            Value::Timestamp(v) => v.into(),
            Value::Ulid(v) => v.to_string().into(),
            Value::List(v) => serde_json::Value::Array(v.into_iter().map(Into::into).collect()),
            Value::Map(v) => serde_json::Value::Object(
                v.into_iter().map(|(k, v)| (k, v.into())).collect(),
            ),
        }
    }
}
