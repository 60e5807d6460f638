//! Decoded message structure: header fields plus the parameter map.

use crate::names::{self, MessageType};
use crate::value::{DataType, Value};
use crate::CodecError;

// ---------------------------------------------------------------------------
// Params
// ---------------------------------------------------------------------------

/// An insertion-ordered mapping from parameter code to value.
///
/// Parameters travel as an ordered sequence on the wire, so encode
/// order matters; lookup is by code. Inserting a code that is already
/// present overwrites its value in place — last write wins, mirroring
/// how duplicate codes are resolved on decode.
///
/// Values are stored once, by numeric code. The name-based accessors
/// are a view over the static table in [`names`] — no duplicate state.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Params {
    entries: Vec<(u8, Value)>,
}

impl Params {
    /// Creates an empty parameter map.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Inserts a value under `code`, replacing any existing value.
    pub fn insert(&mut self, code: u8, value: impl Into<Value>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(c, _)| *c == code) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((code, value)),
        }
    }

    /// Inserts a value coerced to an explicit wire type.
    ///
    /// # Errors
    /// Propagates [`CodecError::ValueOutOfRange`] /
    /// [`CodecError::UnsupportedType`] from the coercion.
    pub fn insert_as(
        &mut self,
        code: u8,
        data_type: DataType,
        value: impl Into<Value>,
    ) -> Result<(), CodecError> {
        let coerced = value.into().coerce_to(data_type)?;
        self.insert(code, coerced);
        Ok(())
    }

    /// Builder-style insert for literal construction.
    pub fn with(mut self, code: u8, value: impl Into<Value>) -> Self {
        self.insert(code, value);
        self
    }

    /// Looks up a value by parameter code.
    pub fn get(&self, code: u8) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, v)| v)
    }

    /// Looks up a value by canonical parameter name (e.g. `"PLAYER_ID"`).
    pub fn by_name(&self, name: &str) -> Option<&Value> {
        names::param_code(name).and_then(|code| self.get(code))
    }

    /// Returns `true` if `code` is present.
    pub fn contains(&self, code: u8) -> bool {
        self.get(code).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates `(code, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, &Value)> {
        self.entries.iter().map(|(c, v)| (*c, v))
    }

    // -- Typed shorthands used throughout the dispatch layer ------------

    pub fn get_i64(&self, code: u8) -> Option<i64> {
        self.get(code).and_then(Value::as_i64)
    }

    pub fn get_u32(&self, code: u8) -> Option<u32> {
        self.get(code).and_then(Value::as_u32)
    }

    pub fn get_str(&self, code: u8) -> Option<&str> {
        self.get(code).and_then(Value::as_str)
    }

    pub fn get_bool(&self, code: u8) -> Option<bool> {
        self.get(code).and_then(Value::as_bool)
    }
}

impl FromIterator<(u8, Value)> for Params {
    fn from_iter<T: IntoIterator<Item = (u8, Value)>>(iter: T) -> Self {
        let mut params = Self::new();
        for (code, value) in iter {
            params.insert(code, value);
        }
        params
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A decoded frame: raw header codes plus the materialized parameters.
///
/// Header codes are kept raw so that frames with unrecognized codes
/// still round-trip byte-exactly; [`Message::kind`] and the name
/// accessors resolve them when known.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Raw message-type byte from the header.
    pub message_type: u8,
    /// Raw operation byte from the header.
    pub operation: u8,
    /// The decoded parameter map.
    pub params: Params,
}

impl Message {
    /// Creates a message with an empty parameter map.
    pub fn new(message_type: u8, operation: u8) -> Self {
        Self {
            message_type,
            operation,
            params: Params::new(),
        }
    }

    /// Builder-style parameter insert.
    pub fn with(mut self, code: u8, value: impl Into<Value>) -> Self {
        self.params.insert(code, value);
        self
    }

    /// The resolved message type, when the raw code is a known one.
    pub fn kind(&self) -> Option<MessageType> {
        MessageType::from_code(self.message_type)
    }

    /// Canonical message-type name, `"UNKNOWN"` for unrecognized codes.
    pub fn type_name(&self) -> &'static str {
        self.kind().map_or("UNKNOWN", MessageType::name)
    }

    /// Canonical operation name within this message type's namespace,
    /// `"UNKNOWN"` when the combination carries no name.
    pub fn operation_name(&self) -> &'static str {
        names::operation_name(self.message_type, self.operation)
    }

    /// Encodes this message into a complete frame.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        crate::codec::encode(self.message_type, self.operation, &self.params)
    }
}

// =========================================================================
// Tests
// =========================================================================
