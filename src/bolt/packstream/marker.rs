//! PackStream marker bytes.
//!
//! Every encoded value starts with a marker byte. Small values (tiny ints)
//! and short collections carry their payload or length in the marker itself.

/// Null marker
pub const NULL: u8 = 0xC0;

/// Float marker (64-bit IEEE 754)
pub const FLOAT_64: u8 = 0xC1;

/// Boolean markers
pub const FALSE: u8 = 0xC2;
pub const TRUE: u8 = 0xC3;

/// Integer markers. Values in [-16, 127] are written as the marker itself.
pub const TINY_INT_MIN: i64 = -16;
pub const TINY_INT_MAX: i64 = 127;
pub const INT_8: u8 = 0xC8;
pub const INT_16: u8 = 0xC9;
pub const INT_32: u8 = 0xCA;
pub const INT_64: u8 = 0xCB;

/// Tiny collections (0-15 items) keep the length in the low nibble.
pub const TINY_MAX_LEN: usize = 15;

/// Largest length any sized value may declare.
pub const MAX_LEN: usize = u16::MAX as usize;

/// String markers
pub const TINY_STRING_BASE: u8 = 0x80;
pub const STRING_8: u8 = 0xD0;
pub const STRING_16: u8 = 0xD1;

/// List markers
pub const TINY_LIST_BASE: u8 = 0x90;
pub const LIST_8: u8 = 0xD4;
pub const LIST_16: u8 = 0xD5;

/// Map markers
pub const TINY_MAP_BASE: u8 = 0xA0;
pub const MAP_8: u8 = 0xD8;
pub const MAP_16: u8 = 0xD9;

/// Structure markers
pub const TINY_STRUCT_BASE: u8 = 0xB0;
pub const STRUCT_8: u8 = 0xDC;
pub const STRUCT_16: u8 = 0xDD;

/// Check if an integer fits in a single marker byte.
#[inline]
pub fn can_encode_tiny_int(value: i64) -> bool {
    (TINY_INT_MIN..=TINY_INT_MAX).contains(&value)
}

/// Check if a byte is a tiny integer marker.
#[inline]
pub fn is_tiny_int(marker: u8) -> bool {
    marker <= 0x7F || marker >= 0xF0
}

/// Length nibble of a tiny string/list/map/struct marker.
#[inline]
pub fn tiny_len(marker: u8) -> usize {
    (marker & 0x0F) as usize
}

/// Marker family of a sized value, used when picking a length prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizedKind {
    String,
    List,
    Map,
    Struct,
}

impl SizedKind {
    /// Tiny, 8-bit and 16-bit marker for this family.
    pub fn markers(self) -> (u8, u8, u8) {
        match self {
            SizedKind::String => (TINY_STRING_BASE, STRING_8, STRING_16),
            SizedKind::List => (TINY_LIST_BASE, LIST_8, LIST_16),
            SizedKind::Map => (TINY_MAP_BASE, MAP_8, MAP_16),
            SizedKind::Struct => (TINY_STRUCT_BASE, STRUCT_8, STRUCT_16),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SizedKind::String => "string",
            SizedKind::List => "list",
            SizedKind::Map => "map",
            SizedKind::Struct => "structure",
        }
    }
}
