//! Typed value codec.
//!
//! Application values enter the engine as a [`Value`], a closed set of six
//! kinds, and are frozen into a [`TaggedValue`]: a type tag plus the raw
//! bytes in that tag's fixed encoding.
//!
//! | type   | encoding                                   |
//! |--------|--------------------------------------------|
//! | String | UTF-8 bytes                                |
//! | Int    | 8 bytes, big-endian two's complement i64   |
//! | Float  | 8 bytes, big-endian IEEE-754 f64 bits      |
//! | Bool   | 1 byte, `1` = true                         |
//! | JSON   | a JSON document                            |
//! | Binary | verbatim                                   |

use crate::error::{CodecError, CodecResult};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;

// ============================================================================
// VALUE TYPE
// ============================================================================

/// Type tag carried by every stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Unknown,
    String,
    Int,
    Float,
    Bool,
    Json,
    Binary,
}

impl ValueType {
    /// Wire tag used by the envelope.
    pub fn tag(self) -> u8 {
        match self {
            ValueType::Unknown => 0,
            ValueType::String => 1,
            ValueType::Int => 2,
            ValueType::Float => 3,
            ValueType::Bool => 4,
            ValueType::Json => 5,
            ValueType::Binary => 6,
        }
    }

    /// Parse a wire tag.
    pub fn from_tag(tag: u8) -> CodecResult<Self> {
        Ok(match tag {
            0 => ValueType::Unknown,
            1 => ValueType::String,
            2 => ValueType::Int,
            3 => ValueType::Float,
            4 => ValueType::Bool,
            5 => ValueType::Json,
            6 => ValueType::Binary,
            other => return Err(CodecError::UnknownTypeTag(other)),
        })
    }

    /// Fixed data width for this type, if it has one.
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            ValueType::Int | ValueType::Float => Some(8),
            ValueType::Bool => Some(1),
            _ => None,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Unknown => "Unknown",
            ValueType::String => "String",
            ValueType::Int => "Int",
            ValueType::Float => "Float",
            ValueType::Bool => "Bool",
            ValueType::Json => "JSON",
            ValueType::Binary => "Binary",
        };
        f.write_str(name)
    }
}

// ============================================================================
// VALUE (INPUT)
// ============================================================================

/// An application value, classified into exactly one stored kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Binary(Vec<u8>),
    Json(serde_json::Value),
}

impl Value {
    /// Classify any serializable record as JSON.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> CodecResult<Self> {
        serde_json::to_value(value)
            .map(Value::Json)
            .map_err(|e| CodecError::Json {
                reason: e.to_string(),
            })
    }

    /// The type tag this value will be stored under.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::String(_) => ValueType::String,
            Value::Int(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::Bool(_) => ValueType::Bool,
            Value::Binary(_) => ValueType::Binary,
            Value::Json(_) => ValueType::Json,
        }
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::String(value.clone())
    }
}

macro_rules! impl_from_signed {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(value: $t) -> Self {
                    Value::Int(i64::from(value))
                }
            }
        )*
    };
}

impl_from_signed!(i8, i16, i32, i64);

impl From<isize> for Value {
    fn from(value: isize) -> Self {
        // isize is at most 64 bits on every supported target
        Value::Int(value as i64)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(f64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Binary(value)
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Value::Binary(value.to_vec())
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        Value::Json(value)
    }
}

// ============================================================================
// TAGGED VALUE
// ============================================================================

/// A type tag plus raw bytes whose format matches the tag.
///
/// Immutable once constructed; every constructor enforces the per-type
/// encoding invariant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaggedValue {
    value_type: ValueType,
    data: Vec<u8>,
}

impl TaggedValue {
    /// Classify and encode an application value.
    pub fn new(value: impl Into<Value>) -> CodecResult<Self> {
        let value = value.into();
        let (value_type, data) = match value {
            Value::String(s) => (ValueType::String, s.into_bytes()),
            Value::Int(i) => (ValueType::Int, i.to_be_bytes().to_vec()),
            Value::Float(f) => (ValueType::Float, f.to_bits().to_be_bytes().to_vec()),
            Value::Bool(b) => (ValueType::Bool, vec![u8::from(b)]),
            Value::Binary(bytes) => (ValueType::Binary, bytes),
            Value::Json(json) => {
                let data = serde_json::to_vec(&json).map_err(|e| CodecError::Json {
                    reason: e.to_string(),
                })?;
                (ValueType::Json, data)
            }
        };
        Ok(Self { value_type, data })
    }

    /// Encode a present optional value; `None` is a construction error.
    pub fn from_optional<T: Into<Value>>(value: Option<T>) -> CodecResult<Self> {
        match value {
            Some(inner) => Self::new(inner),
            None => Err(CodecError::NilValue),
        }
    }

    /// Encode any serializable record as JSON.
    pub fn from_json<T: Serialize + ?Sized>(value: &T) -> CodecResult<Self> {
        Self::new(Value::json(value)?)
    }

    /// Rebuild a value from its tag and raw bytes, validating the invariant.
    pub fn from_parts(value_type: ValueType, data: Vec<u8>) -> CodecResult<Self> {
        if let Some(expected) = value_type.fixed_width() {
            if data.len() != expected {
                return Err(CodecError::InvalidLength {
                    value_type,
                    expected,
                    actual: data.len(),
                });
            }
        }
        match value_type {
            ValueType::String => {
                std::str::from_utf8(&data).map_err(|_| CodecError::InvalidUtf8)?;
            }
            ValueType::Json => {
                serde_json::from_slice::<serde::de::IgnoredAny>(&data).map_err(|e| {
                    CodecError::Json {
                        reason: e.to_string(),
                    }
                })?;
            }
            _ => {}
        }
        Ok(Self { value_type, data })
    }

    /// The stored type tag.
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// Raw bytes regardless of type.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consume the value, returning the raw bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    fn expect_type(&self, expected: ValueType) -> CodecResult<()> {
        if self.value_type == expected {
            Ok(())
        } else {
            Err(CodecError::TypeMismatch {
                expected,
                actual: self.value_type,
            })
        }
    }

    fn fixed_bytes(&self) -> CodecResult<[u8; 8]> {
        self.data
            .as_slice()
            .try_into()
            .map_err(|_| CodecError::InvalidLength {
                value_type: self.value_type,
                expected: 8,
                actual: self.data.len(),
            })
    }

    pub fn as_str(&self) -> CodecResult<&str> {
        self.expect_type(ValueType::String)?;
        std::str::from_utf8(&self.data).map_err(|_| CodecError::InvalidUtf8)
    }

    pub fn as_string(&self) -> CodecResult<String> {
        self.as_str().map(str::to_string)
    }

    pub fn as_i64(&self) -> CodecResult<i64> {
        self.expect_type(ValueType::Int)?;
        Ok(i64::from_be_bytes(self.fixed_bytes()?))
    }

    pub fn as_i32(&self) -> CodecResult<i32> {
        narrow(self.as_i64()?, "i32")
    }

    pub fn as_i16(&self) -> CodecResult<i16> {
        narrow(self.as_i64()?, "i16")
    }

    pub fn as_i8(&self) -> CodecResult<i8> {
        narrow(self.as_i64()?, "i8")
    }

    pub fn as_isize(&self) -> CodecResult<isize> {
        narrow(self.as_i64()?, "isize")
    }

    pub fn as_f64(&self) -> CodecResult<f64> {
        self.expect_type(ValueType::Float)?;
        Ok(f64::from_bits(u64::from_be_bytes(self.fixed_bytes()?)))
    }

    /// Lossy narrowing, matching `f64 as f32`.
    pub fn as_f32(&self) -> CodecResult<f32> {
        self.as_f64().map(|f| f as f32)
    }

    pub fn as_bool(&self) -> CodecResult<bool> {
        self.expect_type(ValueType::Bool)?;
        match self.data.as_slice() {
            [byte] => Ok(*byte == 1),
            other => Err(CodecError::InvalidLength {
                value_type: ValueType::Bool,
                expected: 1,
                actual: other.len(),
            }),
        }
    }

    /// Deserialize a JSON value into `T`.
    pub fn as_json<T: DeserializeOwned>(&self) -> CodecResult<T> {
        self.expect_type(ValueType::Json)?;
        serde_json::from_slice(&self.data).map_err(|e| CodecError::Json {
            reason: e.to_string(),
        })
    }

    pub fn as_json_value(&self) -> CodecResult<serde_json::Value> {
        self.as_json()
    }

    pub fn as_binary(&self) -> CodecResult<&[u8]> {
        self.expect_type(ValueType::Binary)?;
        Ok(&self.data)
    }

    /// Decode back into the closed [`Value`] form.
    pub fn to_value(&self) -> CodecResult<Value> {
        Ok(match self.value_type {
            ValueType::String => Value::String(self.as_string()?),
            ValueType::Int => Value::Int(self.as_i64()?),
            ValueType::Float => Value::Float(self.as_f64()?),
            ValueType::Bool => Value::Bool(self.as_bool()?),
            ValueType::Json => Value::Json(self.as_json_value()?),
            ValueType::Binary => Value::Binary(self.data.clone()),
            ValueType::Unknown => {
                return Err(CodecError::TypeMismatch {
                    expected: ValueType::Binary,
                    actual: ValueType::Unknown,
                })
            }
        })
    }
}

fn narrow<T: TryFrom<i64>>(value: i64, target: &'static str) -> CodecResult<T> {
    T::try_from(value).map_err(|_| CodecError::Overflow { value, target })
}

// =============================================================================
// TESTS
// =============================================================================
