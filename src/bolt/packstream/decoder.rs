//! PackStream decoder.

use bytes::Buf;

use super::marker::*;
use super::types::{PackStreamStructure, PackStreamValue, ValueMap};
use super::PackStreamError;

/// Deepest list/map/structure nesting accepted from the wire.
pub const MAX_NESTING_DEPTH: usize = 128;

/// PackStream decoder that reads values from a byte buffer.
pub struct PackStreamDecoder<'a> {
    data: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> PackStreamDecoder<'a> {
    /// Create a new decoder for the given bytes.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0, depth: 0 }
    }

    /// Get the current position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Get remaining bytes count.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Check if all data has been consumed.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Decode the next value.
    pub fn decode(&mut self) -> Result<PackStreamValue, PackStreamError> {
        let marker = self.read_u8()?;

        if is_tiny_int(marker) {
            return Ok(PackStreamValue::Integer(marker as i8 as i64));
        }

        match marker {
            0x80..=0x8F => self.read_string_data(tiny_len(marker)),
            0x90..=0x9F => self.read_list_data(tiny_len(marker)),
            0xA0..=0xAF => self.read_map_data(tiny_len(marker)),
            0xB0..=0xBF => self.read_struct_data(tiny_len(marker)),

            NULL => Ok(PackStreamValue::Null),
            TRUE => Ok(PackStreamValue::Boolean(true)),
            FALSE => Ok(PackStreamValue::Boolean(false)),
            FLOAT_64 => Ok(PackStreamValue::Float(self.take(8)?.get_f64())),

            INT_8 => Ok(PackStreamValue::Integer(self.read_u8()? as i8 as i64)),
            INT_16 => Ok(PackStreamValue::Integer(self.take(2)?.get_i16() as i64)),
            INT_32 => Ok(PackStreamValue::Integer(self.take(4)?.get_i32() as i64)),
            INT_64 => Ok(PackStreamValue::Integer(self.take(8)?.get_i64())),

            STRING_8 => {
                let len = self.read_u8()? as usize;
                self.read_string_data(len)
            }
            STRING_16 => {
                let len = self.read_u16()?;
                self.read_string_data(len)
            }
            LIST_8 => {
                let len = self.read_u8()? as usize;
                self.read_list_data(len)
            }
            LIST_16 => {
                let len = self.read_u16()?;
                self.read_list_data(len)
            }
            MAP_8 => {
                let len = self.read_u8()? as usize;
                self.read_map_data(len)
            }
            MAP_16 => {
                let len = self.read_u16()?;
                self.read_map_data(len)
            }
            STRUCT_8 => {
                let len = self.read_u8()? as usize;
                self.read_struct_data(len)
            }
            STRUCT_16 => {
                let len = self.read_u16()?;
                self.read_struct_data(len)
            }

            _ => Err(PackStreamError::UnknownMarker(marker)),
        }
    }

    fn read_string_data(&mut self, len: usize) -> Result<PackStreamValue, PackStreamError> {
        let bytes = self.take(len)?;
        let s = std::str::from_utf8(bytes).map_err(|e| PackStreamError::InvalidUtf8(e.to_string()))?;
        Ok(PackStreamValue::String(s.to_string()))
    }

    fn read_list_data(&mut self, len: usize) -> Result<PackStreamValue, PackStreamError> {
        self.nested(|d| {
            // Each item is at least one byte; cap the preallocation by what is left.
            let mut items = Vec::with_capacity(len.min(d.remaining()));
            for _ in 0..len {
                items.push(d.decode()?);
            }
            Ok(PackStreamValue::List(items))
        })
    }

    fn read_map_data(&mut self, len: usize) -> Result<PackStreamValue, PackStreamError> {
        self.nested(|d| {
            let mut map = ValueMap::with_capacity(len.min(d.remaining() / 2));
            for _ in 0..len {
                let key = match d.decode()? {
                    PackStreamValue::String(s) => s,
                    _ => return Err(PackStreamError::InvalidMapKey),
                };
                let value = d.decode()?;
                map.insert(key, value);
            }
            Ok(PackStreamValue::Map(map))
        })
    }

    fn read_struct_data(&mut self, field_count: usize) -> Result<PackStreamValue, PackStreamError> {
        self.nested(|d| {
            let tag = d.read_u8()?;
            let mut fields = Vec::with_capacity(field_count.min(d.remaining()));
            for _ in 0..field_count {
                fields.push(d.decode()?);
            }
            Ok(PackStreamValue::Structure(PackStreamStructure::new(tag, fields)))
        })
    }

    /// Run `f` one container level deeper, bounded by [`MAX_NESTING_DEPTH`].
    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, PackStreamError>,
    ) -> Result<T, PackStreamError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(PackStreamError::NestingTooDeep(MAX_NESTING_DEPTH));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn read_u8(&mut self) -> Result<u8, PackStreamError> {
        Ok(self.take(1)?[0])
    }

    fn read_u16(&mut self) -> Result<usize, PackStreamError> {
        Ok(self.take(2)?.get_u16() as usize)
    }

    /// Borrow the next `len` bytes, failing if the input is truncated.
    fn take(&mut self, len: usize) -> Result<&'a [u8], PackStreamError> {
        if self.remaining() < len {
            return Err(PackStreamError::UnexpectedEof);
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }
}

/// Convenience function to decode a single value from bytes.
pub fn decode(data: &[u8]) -> Result<PackStreamValue, PackStreamError> {
    let mut decoder = PackStreamDecoder::new(data);
    decoder.decode()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_scalars() {
        assert!(decode(&[0xC0]).unwrap().is_null());
        assert_eq!(decode(&[0xC3]).unwrap(), PackStreamValue::Boolean(true));
        assert_eq!(decode(&[0xC2]).unwrap(), PackStreamValue::Boolean(false));
    }

    #[test]
    fn test_decode_tiny_int() {
        assert_eq!(decode(&[0x00]).unwrap(), PackStreamValue::Integer(0));
        assert_eq!(decode(&[0x7F]).unwrap(), PackStreamValue::Integer(127));
        assert_eq!(decode(&[0xF0]).unwrap(), PackStreamValue::Integer(-16));
        assert_eq!(decode(&[0xFF]).unwrap(), PackStreamValue::Integer(-1));
    }

    #[test]
    fn test_decode_int_widths() {
        assert_eq!(decode(&[0xC8, 0xEF]).unwrap(), PackStreamValue::Integer(-17));
        assert_eq!(decode(&[0xC9, 0x03, 0xE8]).unwrap(), PackStreamValue::Integer(1000));
        assert_eq!(
            decode(&[0xCA, 0x00, 0x01, 0x86, 0xA0]).unwrap(),
            PackStreamValue::Integer(100_000)
        );
        let data = [0xCB, 0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];
        assert_eq!(decode(&data).unwrap(), PackStreamValue::Integer(i64::MAX));
    }

    #[test]
    fn test_decode_float() {
        let data = [0xC1, 0x40, 0x09, 0x1E, 0xB8, 0x51, 0xEB, 0x85, 0x1F];
        let f = decode(&data).unwrap().as_float().unwrap();
        assert!((f - 3.14).abs() < 0.001);
    }

    #[test]
    fn test_decode_strings() {
        assert_eq!(decode(&[0x85, b'h', b'e', b'l', b'l', b'o']).unwrap(), PackStreamValue::from("hello"));
        assert_eq!(decode(&[0x80]).unwrap(), PackStreamValue::from(""));

        let mut data = vec![0xD0, 20];
        data.extend_from_slice(&[b'a'; 20]);
        assert_eq!(decode(&data).unwrap(), PackStreamValue::String("a".repeat(20)));
    }

    #[test]
    fn test_decode_collections() {
        let list = decode(&[0x93, 1, 2, 3]).unwrap();
        assert_eq!(list, PackStreamValue::from(vec![1i64, 2, 3]));

        let map = decode(&[0xA2, 0x81, b'b', 1, 0x81, b'a', 2]).unwrap();
        let keys: Vec<&str> = map.as_map().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn test_decode_structure() {
        let value = decode(&[0xB1, 0x71, 0x91, 0x01]).unwrap();
        let s = value.as_structure().unwrap();
        assert_eq!(s.tag, 0x71);
        assert_eq!(s.fields, vec![PackStreamValue::from(vec![1i64])]);
    }

    #[test]
    fn test_truncated_input_is_eof() {
        assert!(matches!(decode(&[0xC9]), Err(PackStreamError::UnexpectedEof)));
        assert!(matches!(decode(&[0x85, b'h']), Err(PackStreamError::UnexpectedEof)));
        assert!(matches!(decode(&[0xD1, 0x00]), Err(PackStreamError::UnexpectedEof)));
        assert!(matches!(decode(&[0x92, 0x01]), Err(PackStreamError::UnexpectedEof)));
        assert!(matches!(decode(&[]), Err(PackStreamError::UnexpectedEof)));
    }

    #[test]
    fn test_unknown_markers() {
        // 32-bit sizes and byte arrays are not part of the supported wire format.
        for marker in [0xCC, 0xCD, 0xCE, 0xD2, 0xD6, 0xDA, 0xE0, 0xEF] {
            assert!(
                matches!(decode(&[marker, 0, 0, 0, 0]), Err(PackStreamError::UnknownMarker(m)) if m == marker),
                "marker 0x{:02X}",
                marker
            );
        }
    }

    #[test]
    fn test_decode_invalid_map_key() {
        let err = decode(&[0xA1, 0x01, 0x02]).unwrap_err();
        assert!(matches!(err, PackStreamError::InvalidMapKey));
    }

    #[test]
    fn test_decode_invalid_utf8() {
        let err = decode(&[0x82, 0xFF, 0xFE]).unwrap_err();
        assert!(matches!(err, PackStreamError::InvalidUtf8(_)));
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let mut data = vec![0x91; 200_000];
        data.push(0xC0);
        assert_eq!(
            decode(&data),
            Err(PackStreamError::NestingTooDeep(MAX_NESTING_DEPTH))
        );

        // Struct and map containers count towards the same limit.
        let mut data = vec![0xB1, 0x70].repeat(MAX_NESTING_DEPTH + 1);
        data.push(0xC0);
        assert!(matches!(decode(&data), Err(PackStreamError::NestingTooDeep(_))));
    }

    #[test]
    fn test_nesting_at_limit_decodes() {
        let mut data = vec![0x91; MAX_NESTING_DEPTH];
        data.push(0x01);
        let mut value = decode(&data).unwrap();
        for _ in 0..MAX_NESTING_DEPTH {
            value = match value {
                PackStreamValue::List(mut items) => items.remove(0),
                other => panic!("expected list, got {:?}", other),
            };
        }
        assert_eq!(value, PackStreamValue::Integer(1));
    }

    #[test]
    fn test_decoder_position() {
        let data = [0x01, 0x02, 0x03];
        let mut decoder = PackStreamDecoder::new(&data);
        assert_eq!(decoder.remaining(), 3);
        decoder.decode().unwrap();
        assert_eq!(decoder.position(), 1);
        assert_eq!(decoder.remaining(), 2);
    }
}
