//! Binary frame codec: deterministic encode/decode of ARCHIVE frames.
//!
//! Wire layout of one frame:
//!
//! ```text
//! ┌─────────────┬───────────┬───────────────┬───────────┬─────────┐
//! │ messageType │ operation │ payloadLength │ payload   │ CRC-16  │
//! │ u8          │ u8        │ u16 LE        │ N bytes   │ u16 LE  │
//! └─────────────┴───────────┴───────────────┴───────────┴─────────┘
//! ```
//!
//! The payload is a sequence of `(paramCode: u8, dataType: u8, value)`
//! triples; the CRC covers header + payload. All multi-byte integers
//! are little-endian. Encoding is deterministic: the same message
//! always produces the same bytes, which is what lets the server
//! forward frames verbatim without re-encoding.

use crate::crc::crc16;
use crate::message::{Message, Params};
use crate::value::{DataType, Value};
use crate::CodecError;

/// Header size: messageType(1) + operation(1) + payloadLength(2).
pub const HEADER_LEN: usize = 4;

/// Trailing CRC size.
pub const CRC_LEN: usize = 2;

/// Fixed per-frame overhead: header + CRC.
pub const FRAME_OVERHEAD: usize = HEADER_LEN + CRC_LEN;

/// Maximum payload size — the length field is a u16.
pub const MAX_PAYLOAD: usize = u16::MAX as usize;

// ---------------------------------------------------------------------------
// Encode
// ---------------------------------------------------------------------------

/// Encodes a frame from header codes and a parameter map.
///
/// Parameters are written in insertion order. Fails with
/// [`CodecError::ValueOutOfRange`] when a length-prefixed value or the
/// total payload exceeds what a u16 length can carry.
pub fn encode(
    message_type: u8,
    operation: u8,
    params: &Params,
) -> Result<Vec<u8>, CodecError> {
    let mut payload = Vec::new();
    for (code, value) in params.iter() {
        payload.push(code);
        payload.push(value.data_type().code());
        write_value(&mut payload, value)?;
    }

    let payload_len = u16::try_from(payload.len())
        .map_err(|_| CodecError::ValueOutOfRange)?;

    let mut frame = Vec::with_capacity(payload.len() + FRAME_OVERHEAD);
    frame.push(message_type);
    frame.push(operation);
    frame.extend_from_slice(&payload_len.to_le_bytes());
    frame.extend_from_slice(&payload);

    let crc = crc16(&frame);
    frame.extend_from_slice(&crc.to_le_bytes());
    Ok(frame)
}

/// Serializes one value in its wire form (the type tag is written by
/// the caller).
fn write_value(out: &mut Vec<u8>, value: &Value) -> Result<(), CodecError> {
    match value {
        Value::Bool(v) => out.push(u8::from(*v)),
        Value::Byte(v) => out.push(*v),
        Value::Short(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::UShort(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::Int(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::UInt(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::Long(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::Float(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::Double(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::Str(v) => write_prefixed(out, v.as_bytes())?,
        Value::Vector2(v) => {
            for f in v {
                out.extend_from_slice(&f.to_le_bytes());
            }
        }
        Value::Vector3(v) => {
            for f in v {
                out.extend_from_slice(&f.to_le_bytes());
            }
        }
        Value::Quaternion(v) => {
            for f in v {
                out.extend_from_slice(&f.to_le_bytes());
            }
        }
        Value::Bytes(v) => write_prefixed(out, v)?,
        Value::Dict(pairs) => {
            let count = u16::try_from(pairs.len())
                .map_err(|_| CodecError::ValueOutOfRange)?;
            out.extend_from_slice(&count.to_le_bytes());
            for (key, val) in pairs {
                out.push(key.data_type().code());
                write_value(out, key)?;
                out.push(val.data_type().code());
                write_value(out, val)?;
            }
        }
    }
    Ok(())
}

/// Writes a u16 LE byte count followed by the raw bytes.
fn write_prefixed(out: &mut Vec<u8>, bytes: &[u8]) -> Result<(), CodecError> {
    let len =
        u16::try_from(bytes.len()).map_err(|_| CodecError::ValueOutOfRange)?;
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(bytes);
    Ok(())
}

// ---------------------------------------------------------------------------
// Decode
// ---------------------------------------------------------------------------

/// Decodes a complete frame.
///
/// Validates the total length against the header's payload length,
/// verifies the trailing CRC over header + payload, then parses the
/// parameter triples. Duplicate parameter codes resolve last-write-wins.
pub fn decode(bytes: &[u8]) -> Result<Message, CodecError> {
    if bytes.len() < FRAME_OVERHEAD {
        return Err(CodecError::Truncated);
    }

    let message_type = bytes[0];
    let operation = bytes[1];
    let payload_len = u16::from_le_bytes([bytes[2], bytes[3]]) as usize;

    if bytes.len() != payload_len + FRAME_OVERHEAD {
        return Err(CodecError::Truncated);
    }

    let covered = &bytes[..HEADER_LEN + payload_len];
    let expected = u16::from_le_bytes([
        bytes[HEADER_LEN + payload_len],
        bytes[HEADER_LEN + payload_len + 1],
    ]);
    let actual = crc16(covered);
    if expected != actual {
        return Err(CodecError::Crc { expected, actual });
    }

    let mut reader = Reader::new(&bytes[HEADER_LEN..HEADER_LEN + payload_len]);
    let mut params = Params::new();
    while !reader.is_empty() {
        let code = reader.u8()?;
        let type_code = reader.u8()?;
        let data_type = DataType::from_code(type_code)
            .ok_or(CodecError::UnknownType(type_code))?;
        let value = read_value(&mut reader, data_type)?;
        params.insert(code, value);
    }

    Ok(Message {
        message_type,
        operation,
        params,
    })
}

/// Deserializes one value of the given wire type.
fn read_value(
    reader: &mut Reader<'_>,
    data_type: DataType,
) -> Result<Value, CodecError> {
    let value = match data_type {
        DataType::Bool => Value::Bool(reader.u8()? != 0),
        DataType::Byte => Value::Byte(reader.u8()?),
        DataType::Short => Value::Short(reader.i16()?),
        DataType::UShort => Value::UShort(reader.u16()?),
        DataType::Int => Value::Int(reader.i32()?),
        DataType::UInt => Value::UInt(reader.u32()?),
        DataType::Long => Value::Long(reader.i64()?),
        DataType::Float => Value::Float(reader.f32()?),
        DataType::Double => Value::Double(reader.f64()?),
        DataType::Str => {
            let len = reader.u16()? as usize;
            let bytes = reader.take(len)?;
            let text = std::str::from_utf8(bytes)
                .map_err(|_| CodecError::BadString)?;
            Value::Str(text.to_string())
        }
        DataType::Vector2 => {
            Value::Vector2([reader.f32()?, reader.f32()?])
        }
        DataType::Vector3 => {
            Value::Vector3([reader.f32()?, reader.f32()?, reader.f32()?])
        }
        DataType::Quaternion => Value::Quaternion([
            reader.f32()?,
            reader.f32()?,
            reader.f32()?,
            reader.f32()?,
        ]),
        DataType::ByteArray => {
            let len = reader.u16()? as usize;
            Value::Bytes(reader.take(len)?.to_vec())
        }
        DataType::Dictionary => {
            let count = reader.u16()? as usize;
            let mut pairs = Vec::with_capacity(count.min(256));
            for _ in 0..count {
                let key_type = reader.u8()?;
                let key_type = DataType::from_code(key_type)
                    .ok_or(CodecError::UnknownType(key_type))?;
                let key = read_value(reader, key_type)?;
                let val_type = reader.u8()?;
                let val_type = DataType::from_code(val_type)
                    .ok_or(CodecError::UnknownType(val_type))?;
                let val = read_value(reader, val_type)?;
                pairs.push((key, val));
            }
            Value::Dict(pairs)
        }
    };
    Ok(value)
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Cursor over the payload slice. Every read fails with
/// [`CodecError::Truncated`] rather than reading past the end.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(CodecError::Truncated)?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, CodecError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn i16(&mut self) -> Result<i16, CodecError> {
        let b = self.take(2)?;
        Ok(i16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, CodecError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn i32(&mut self) -> Result<i32, CodecError> {
        let b = self.take(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn i64(&mut self) -> Result<i64, CodecError> {
        let b = self.take(8)?;
        Ok(i64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    fn f32(&mut self) -> Result<f32, CodecError> {
        let b = self.take(4)?;
        Ok(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn f64(&mut self) -> Result<f64, CodecError> {
        let b = self.take(8)?;
        Ok(f64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }
}

// =========================================================================
// Tests
// =========================================================================
