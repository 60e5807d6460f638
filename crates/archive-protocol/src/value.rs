//! The typed-value system carried inside frame payloads.
//!
//! Every parameter value on the wire is one of fifteen closed types.
//! [`Value`] is the tagged union holding a decoded value together with
//! its wire type; [`DataType`] is the one-byte tag that precedes each
//! value on the wire.

use std::fmt;

use crate::CodecError;

// ---------------------------------------------------------------------------
// DataType
// ---------------------------------------------------------------------------

/// Wire codes for the closed set of parameter data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DataType {
    /// One byte; zero is false, anything else is true.
    Bool = 0x01,
    Byte = 0x02,
    Short = 0x03,
    UShort = 0x04,
    Int = 0x05,
    UInt = 0x06,
    Long = 0x07,
    Float = 0x08,
    Double = 0x09,
    /// u16 LE byte count followed by UTF-8 bytes.
    Str = 0x0A,
    Vector2 = 0x0B,
    Vector3 = 0x0C,
    Quaternion = 0x0D,
    /// u16 LE byte count followed by raw bytes.
    ByteArray = 0x0E,
    /// u16 LE pair count, then `(keyType, key, valType, val)` repeated.
    Dictionary = 0x0F,
}

impl DataType {
    /// Resolves a wire tag to a data type, if it is a known one.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::Bool),
            0x02 => Some(Self::Byte),
            0x03 => Some(Self::Short),
            0x04 => Some(Self::UShort),
            0x05 => Some(Self::Int),
            0x06 => Some(Self::UInt),
            0x07 => Some(Self::Long),
            0x08 => Some(Self::Float),
            0x09 => Some(Self::Double),
            0x0A => Some(Self::Str),
            0x0B => Some(Self::Vector2),
            0x0C => Some(Self::Vector3),
            0x0D => Some(Self::Quaternion),
            0x0E => Some(Self::ByteArray),
            0x0F => Some(Self::Dictionary),
            _ => None,
        }
    }

    /// The wire tag for this data type.
    pub const fn code(self) -> u8 {
        self as u8
    }
}

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A decoded parameter value, tagged with its wire type.
///
/// Dictionaries are ordered pair lists rather than hash maps: keys may
/// be any `Value` (floats included), which rules out `Eq + Hash` keys,
/// and the pair order is part of the wire encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Byte(u8),
    Short(i16),
    UShort(u16),
    Int(i32),
    UInt(u32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(String),
    Vector2([f32; 2]),
    Vector3([f32; 3]),
    Quaternion([f32; 4]),
    Bytes(Vec<u8>),
    Dict(Vec<(Value, Value)>),
}

impl Value {
    /// The wire type this value serializes as.
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Bool(_) => DataType::Bool,
            Self::Byte(_) => DataType::Byte,
            Self::Short(_) => DataType::Short,
            Self::UShort(_) => DataType::UShort,
            Self::Int(_) => DataType::Int,
            Self::UInt(_) => DataType::UInt,
            Self::Long(_) => DataType::Long,
            Self::Float(_) => DataType::Float,
            Self::Double(_) => DataType::Double,
            Self::Str(_) => DataType::Str,
            Self::Vector2(_) => DataType::Vector2,
            Self::Vector3(_) => DataType::Vector3,
            Self::Quaternion(_) => DataType::Quaternion,
            Self::Bytes(_) => DataType::ByteArray,
            Self::Dict(_) => DataType::Dictionary,
        }
    }

    /// Converts this value to an explicitly requested wire type.
    ///
    /// This is the strict write path: integer values move between
    /// integer widths (and into `Double`) when the target can
    /// represent them, `Float` widens to `Double`, and a same-type
    /// request is the identity.
    ///
    /// # Errors
    /// - [`CodecError::ValueOutOfRange`] — the conversion exists but
    ///   this particular value does not fit (e.g. `Int(-1)` → `UINT`).
    /// - [`CodecError::UnsupportedType`] — no conversion is defined
    ///   between the shapes (e.g. `Str` → `INT`).
    pub fn coerce_to(&self, target: DataType) -> Result<Value, CodecError> {
        if self.data_type() == target {
            return Ok(self.clone());
        }

        if let Some(n) = self.as_i64() {
            return coerce_integer(n, target);
        }

        match (self, target) {
            (Self::Float(v), DataType::Double) => {
                Ok(Value::Double(f64::from(*v)))
            }
            _ => Err(CodecError::UnsupportedType),
        }
    }

    /// Reads any integer variant as `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Byte(v) => Some(i64::from(*v)),
            Self::Short(v) => Some(i64::from(*v)),
            Self::UShort(v) => Some(i64::from(*v)),
            Self::Int(v) => Some(i64::from(*v)),
            Self::UInt(v) => Some(i64::from(*v)),
            Self::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// Reads any integer variant as `u32`, when in range.
    pub fn as_u32(&self) -> Option<u32> {
        self.as_i64().and_then(|n| u32::try_from(n).ok())
    }

    /// Reads `Float` or `Double` as `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(f64::from(*v)),
            Self::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&[(Value, Value)]> {
        match self {
            Self::Dict(v) => Some(v),
            _ => None,
        }
    }
}

/// Integer-to-target conversion with range checks.
fn coerce_integer(n: i64, target: DataType) -> Result<Value, CodecError> {
    match target {
        DataType::Byte => u8::try_from(n)
            .map(Value::Byte)
            .map_err(|_| CodecError::ValueOutOfRange),
        DataType::Short => i16::try_from(n)
            .map(Value::Short)
            .map_err(|_| CodecError::ValueOutOfRange),
        DataType::UShort => u16::try_from(n)
            .map(Value::UShort)
            .map_err(|_| CodecError::ValueOutOfRange),
        DataType::Int => i32::try_from(n)
            .map(Value::Int)
            .map_err(|_| CodecError::ValueOutOfRange),
        DataType::UInt => u32::try_from(n)
            .map(Value::UInt)
            .map_err(|_| CodecError::ValueOutOfRange),
        DataType::Long => Ok(Value::Long(n)),
        // f64 represents every i32-and-smaller exactly; full i64 range
        // is allowed into Double per IEEE-754 nearest rounding.
        DataType::Double => Ok(Value::Double(n as f64)),
        _ => Err(CodecError::UnsupportedType),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Byte(v) => write!(f, "{v}"),
            Self::Short(v) => write!(f, "{v}"),
            Self::UShort(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}"),
            Self::Long(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Str(v) => write!(f, "{v:?}"),
            Self::Vector2(v) => write!(f, "({}, {})", v[0], v[1]),
            Self::Vector3(v) => {
                write!(f, "({}, {}, {})", v[0], v[1], v[2])
            }
            Self::Quaternion(v) => {
                write!(f, "({}, {}, {}, {})", v[0], v[1], v[2], v[3])
            }
            Self::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Self::Dict(v) => write!(f, "<dict of {} pairs>", v.len()),
        }
    }
}

// ---------------------------------------------------------------------------
// Shape inference
// ---------------------------------------------------------------------------

// The inferring write path: a Rust value picks its wire type at
// construction. Precedence for ambiguous shapes is fixed — bool, byte,
// short, int, float, string, vector by arity, byte array, dictionary.

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Self::Byte(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Self::Short(v)
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Self::UShort(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::UInt(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<[f32; 2]> for Value {
    fn from(v: [f32; 2]) -> Self {
        Self::Vector2(v)
    }
}

impl From<[f32; 3]> for Value {
    fn from(v: [f32; 3]) -> Self {
        Self::Vector3(v)
    }
}

impl From<[f32; 4]> for Value {
    fn from(v: [f32; 4]) -> Self {
        Self::Quaternion(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<Vec<(Value, Value)>> for Value {
    fn from(v: Vec<(Value, Value)>) -> Self {
        Self::Dict(v)
    }
}

// =========================================================================
// Tests
// =========================================================================
