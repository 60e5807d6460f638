//! Wire protocol for ARCHIVE.
//!
//! This crate defines the byte-exact "language" that clients and
//! servers speak:
//!
//! - **Values** ([`Value`], [`DataType`]) — the closed set of fifteen
//!   typed parameter values that travel inside payloads.
//! - **Messages** ([`Message`], [`Params`]) — a decoded frame: header
//!   codes plus an insertion-ordered parameter map.
//! - **Codec** ([`codec::encode`], [`codec::decode`]) — deterministic
//!   binary framing with a trailing CRC-16.
//! - **Names** ([`MessageType`], [`op`], [`param`]) — compile-time
//!   tables mapping wire codes to canonical names, for logs and the
//!   name-view accessors.
//! - **Errors** ([`CodecError`]) — what can go wrong per frame.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and the
//! connection/dispatch layers (player context). It holds no state: the
//! same bytes always decode to the same message.
//!
//! ```text
//! Transport (bytes) → Protocol (Message) → Dispatch (session context)
//! ```

pub mod codec;
mod crc;
mod error;
mod message;
mod names;
mod value;

pub use codec::{decode, encode, FRAME_OVERHEAD, HEADER_LEN, MAX_PAYLOAD};
pub use crc::crc16;
pub use error::CodecError;
pub use message::{Message, Params};
pub use names::{op, operation_name, param, param_code, param_name, MessageType};
pub use value::{DataType, Value};
