//! PackStream encoder.

use bytes::{BufMut, BytesMut};

use super::marker::*;
use super::types::{PackStreamStructure, PackStreamValue, ValueMap};
use super::PackStreamError;

/// PackStream encoder that writes values to a byte buffer.
pub struct PackStreamEncoder {
    buffer: BytesMut,
}

impl PackStreamEncoder {
    /// Create a new encoder with default buffer capacity.
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Create a new encoder with specified buffer capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    /// Get the current buffer length.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Consume the encoder and return the bytes.
    pub fn into_bytes(self) -> BytesMut {
        self.buffer
    }

    /// Get the bytes as a slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Encode a PackStreamValue.
    pub fn encode(&mut self, value: &PackStreamValue) -> Result<(), PackStreamError> {
        match value {
            PackStreamValue::Null => self.buffer.put_u8(NULL),
            PackStreamValue::Boolean(b) => self.buffer.put_u8(if *b { TRUE } else { FALSE }),
            PackStreamValue::Integer(i) => self.encode_int(*i),
            PackStreamValue::Float(f) => {
                self.buffer.put_u8(FLOAT_64);
                self.buffer.put_f64(*f);
            }
            PackStreamValue::String(s) => return self.encode_string(s),
            PackStreamValue::List(l) => return self.encode_list(l),
            PackStreamValue::Map(m) => return self.encode_map(m),
            PackStreamValue::Structure(s) => return self.encode_structure(s),
        }
        Ok(())
    }

    /// Encode an integer using the smallest representation.
    pub fn encode_int(&mut self, value: i64) {
        if can_encode_tiny_int(value) {
            self.buffer.put_u8(value as u8);
        } else if let Ok(v) = i8::try_from(value) {
            self.buffer.put_u8(INT_8);
            self.buffer.put_i8(v);
        } else if let Ok(v) = i16::try_from(value) {
            self.buffer.put_u8(INT_16);
            self.buffer.put_i16(v);
        } else if let Ok(v) = i32::try_from(value) {
            self.buffer.put_u8(INT_32);
            self.buffer.put_i32(v);
        } else {
            self.buffer.put_u8(INT_64);
            self.buffer.put_i64(value);
        }
    }

    /// Encode a string. Length is measured in UTF-8 bytes.
    pub fn encode_string(&mut self, value: &str) -> Result<(), PackStreamError> {
        let bytes = value.as_bytes();
        self.write_header(SizedKind::String, bytes.len())?;
        self.buffer.put_slice(bytes);
        Ok(())
    }

    /// Encode a list.
    pub fn encode_list(&mut self, values: &[PackStreamValue]) -> Result<(), PackStreamError> {
        self.write_header(SizedKind::List, values.len())?;
        for value in values {
            self.encode(value)?;
        }
        Ok(())
    }

    /// Encode a map. Keys are always written as strings.
    pub fn encode_map(&mut self, map: &ValueMap) -> Result<(), PackStreamError> {
        self.write_header(SizedKind::Map, map.len())?;
        for (key, value) in map.iter() {
            self.encode_string(key)?;
            self.encode(value)?;
        }
        Ok(())
    }

    /// Encode a structure: size marker, tag byte, then fields.
    pub fn encode_structure(&mut self, s: &PackStreamStructure) -> Result<(), PackStreamError> {
        self.write_header(SizedKind::Struct, s.fields.len())?;
        self.buffer.put_u8(s.tag);
        for field in &s.fields {
            self.encode(field)?;
        }
        Ok(())
    }

    fn write_header(&mut self, kind: SizedKind, len: usize) -> Result<(), PackStreamError> {
        let (tiny, size_8, size_16) = kind.markers();
        if len <= TINY_MAX_LEN {
            self.buffer.put_u8(tiny | len as u8);
        } else if len <= u8::MAX as usize {
            self.buffer.put_u8(size_8);
            self.buffer.put_u8(len as u8);
        } else if len <= MAX_LEN {
            self.buffer.put_u8(size_16);
            self.buffer.put_u16(len as u16);
        } else {
            return Err(PackStreamError::ValueTooLarge(kind.name(), len));
        }
        Ok(())
    }
}

impl Default for PackStreamEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience function to encode a single value.
pub fn encode(value: &PackStreamValue) -> Result<BytesMut, PackStreamError> {
    let mut encoder = PackStreamEncoder::new();
    encoder.encode(value)?;
    Ok(encoder.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(value: impl Into<PackStreamValue>) -> Vec<u8> {
        encode(&value.into()).unwrap().to_vec()
    }

    #[test]
    fn test_encode_scalars() {
        assert_eq!(encoded(PackStreamValue::Null), vec![0xC0]);
        assert_eq!(encoded(true), vec![0xC3]);
        assert_eq!(encoded(false), vec![0xC2]);
        assert_eq!(encoded(1.5f64)[0], 0xC1);
        assert_eq!(encoded(1.5f64).len(), 9);
    }

    #[test]
    fn test_encode_tiny_int() {
        let mut enc = PackStreamEncoder::new();
        enc.encode_int(0);
        enc.encode_int(127);
        enc.encode_int(-16);
        enc.encode_int(-1);
        assert_eq!(enc.as_bytes(), &[0x00, 0x7F, 0xF0, 0xFF]);
    }

    #[test]
    fn test_encode_int_widths() {
        assert_eq!(encoded(-17i64), vec![0xC8, 0xEF]);
        assert_eq!(encoded(-128i64), vec![0xC8, 0x80]);
        assert_eq!(encoded(1000i64), vec![0xC9, 0x03, 0xE8]);
        assert_eq!(encoded(100_000i64), vec![0xCA, 0x00, 0x01, 0x86, 0xA0]);
        assert_eq!(encoded(i64::MAX)[0], 0xCB);
        assert_eq!(encoded(i64::MAX).len(), 9);
    }

    #[test]
    fn test_encode_tiny_string() {
        assert_eq!(encoded("hello"), vec![0x85, b'h', b'e', b'l', b'l', b'o']);
        assert_eq!(encoded(""), vec![0x80]);
    }

    #[test]
    fn test_encode_string_counts_bytes() {
        // 8 chars, 16 UTF-8 bytes
        let s = "éééééééé";
        let bytes = encoded(s);
        assert_eq!(bytes[0], STRING_8);
        assert_eq!(bytes[1], 16);
    }

    #[test]
    fn test_encode_map_keeps_order() {
        let map: ValueMap = [("b", 1i64), ("a", 2i64)].into_iter().collect();
        assert_eq!(encoded(map), vec![0xA2, 0x81, b'b', 0x01, 0x81, b'a', 0x02]);
    }

    #[test]
    fn test_encode_structure() {
        let s = PackStreamStructure::new(0x70, vec![PackStreamValue::Map(ValueMap::new())]);
        assert_eq!(encoded(s), vec![0xB1, 0x70, 0xA0]);
    }
}
