//! PackStream serialization format.
//!
//! PackStream is the binary serialization format used by the Bolt protocol
//! to encode values for transmission between client and server.
//!
//! # Supported Types
//!
//! - **Null**: Single byte marker
//! - **Boolean**: True/False markers
//! - **Integer**: Smallest of tiny/8/16/32/64-bit forms
//! - **Float**: 64-bit IEEE 754
//! - **String**: UTF-8 encoded, tiny/8/16-bit length prefix
//! - **List**: Heterogeneous collections
//! - **Map**: String keys to arbitrary values, insertion ordered
//! - **Structure**: Tag byte plus fields; Bolt messages are structures
//!
//! Sized values are limited to 65535 items (or bytes for strings). Larger
//! values fail with [`PackStreamError::ValueTooLarge`].

pub mod decoder;
pub mod encoder;
pub mod marker;
pub mod types;

pub use decoder::{decode, PackStreamDecoder, MAX_NESTING_DEPTH};
pub use encoder::{encode, PackStreamEncoder};
pub use types::{PackStreamStructure, PackStreamValue, ValueMap};

use std::fmt;

/// PackStream errors.
#[derive(Debug, Clone, PartialEq)]
pub enum PackStreamError {
    /// Input ended before a declared length was satisfied
    UnexpectedEof,
    /// Unknown marker byte
    UnknownMarker(u8),
    /// Invalid UTF-8 in string
    InvalidUtf8(String),
    /// Invalid map key (must be string)
    InvalidMapKey,
    /// Value too large to encode
    ValueTooLarge(&'static str, usize),
    /// Invalid structure format
    InvalidStructure(String),
    /// Containers nested deeper than the decoder accepts
    NestingTooDeep(usize),
}

impl fmt::Display for PackStreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackStreamError::UnexpectedEof => write!(f, "Unexpected end of PackStream data"),
            PackStreamError::UnknownMarker(m) => write!(f, "Unknown PackStream marker: 0x{:02X}", m),
            PackStreamError::InvalidUtf8(e) => write!(f, "Invalid UTF-8 in string: {}", e),
            PackStreamError::InvalidMapKey => write!(f, "Map keys must be strings"),
            PackStreamError::ValueTooLarge(t, s) => {
                write!(f, "{} too large: {} entries (max {})", t, s, marker::MAX_LEN)
            }
            PackStreamError::InvalidStructure(msg) => write!(f, "Invalid structure: {}", msg),
            PackStreamError::NestingTooDeep(max) => {
                write!(f, "Values nested deeper than {} levels", max)
            }
        }
    }
}

impl std::error::Error for PackStreamError {}
