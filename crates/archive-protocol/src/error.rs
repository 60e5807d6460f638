//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding a frame.
///
/// Every variant is local to one frame: a decode failure never poisons
/// the connection, it is reported and the next frame is processed.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The input ended before the structure it declared was complete —
    /// a frame shorter than its header + payload length, or a value
    /// whose bytes run past the payload end.
    #[error("frame truncated")]
    Truncated,

    /// The trailing checksum does not match the header + payload bytes.
    #[error("crc mismatch: frame carries {expected:#06x}, computed {actual:#06x}")]
    Crc {
        /// The CRC carried in the frame's last two bytes.
        expected: u16,
        /// The CRC computed over the received header + payload.
        actual: u16,
    },

    /// A data-type tag outside the defined table.
    #[error("unknown data type {0:#04x}")]
    UnknownType(u8),

    /// No wire form is defined for the requested value/type combination.
    #[error("unsupported type for this value")]
    UnsupportedType,

    /// A STRING value whose bytes are not valid UTF-8.
    #[error("string is not valid UTF-8")]
    BadString,

    /// The value cannot be represented in the declared wire type —
    /// an out-of-range integer coercion, or a length-prefixed value
    /// (or whole payload) larger than its u16 length field allows.
    #[error("value cannot be represented in the declared type")]
    ValueOutOfRange,
}
