//! Bolt protocol codec for tokio_util.
//!
//! Implements chunked message framing: every message is written as one or
//! more `u16` length-prefixed chunks followed by a `00 00` terminator.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::message::{registry, BoltMessage};
use super::packstream::{decode, encode, PackStreamValue};
use super::BoltError;

/// Maximum chunk payload
pub const MAX_CHUNK_SIZE: usize = u16::MAX as usize;

/// Default limit for a reassembled inbound message (16MB)
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// End of message marker (0x00 0x00)
pub const END_MARKER: [u8; 2] = [0x00, 0x00];

/// Frames PackStream values.
#[derive(Debug)]
pub struct BoltCodec {
    /// Maximum message size
    max_message_size: usize,
    /// Buffer for accumulating chunks
    message_buffer: BytesMut,
}

impl BoltCodec {
    /// Create a new codec with default settings.
    pub fn new() -> Self {
        Self::with_max_size(DEFAULT_MAX_MESSAGE_SIZE)
    }

    /// Create a codec with custom max message size.
    pub fn with_max_size(max_message_size: usize) -> Self {
        Self {
            max_message_size,
            message_buffer: BytesMut::with_capacity(4096),
        }
    }

    /// Split `data` into chunks and terminate the message.
    fn encode_chunked(data: &[u8], dst: &mut BytesMut) {
        dst.reserve(data.len() + 2 * (data.len() / MAX_CHUNK_SIZE + 2));
        for chunk in data.chunks(MAX_CHUNK_SIZE) {
            dst.put_u16(chunk.len() as u16);
            dst.put_slice(chunk);
        }
        dst.put_slice(&END_MARKER);
    }
}

impl Default for BoltCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for BoltCodec {
    type Item = PackStreamValue;
    type Error = BoltError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            if src.len() < 2 {
                return Ok(None);
            }

            let chunk_size = u16::from_be_bytes([src[0], src[1]]) as usize;

            if chunk_size == 0 {
                src.advance(2);

                if self.message_buffer.is_empty() {
                    // NOOP keep-alive between messages
                    continue;
                }

                let message_data = self.message_buffer.split();
                return Ok(Some(decode(&message_data)?));
            }

            if src.len() < 2 + chunk_size {
                src.reserve(2 + chunk_size - src.len());
                return Ok(None);
            }

            let size = self.message_buffer.len() + chunk_size;
            if size > self.max_message_size {
                return Err(BoltError::MessageTooLarge {
                    size,
                    max: self.max_message_size,
                });
            }

            src.advance(2);
            self.message_buffer.extend_from_slice(&src[..chunk_size]);
            src.advance(chunk_size);
        }
    }
}

impl Encoder<PackStreamValue> for BoltCodec {
    type Error = BoltError;

    fn encode(&mut self, item: PackStreamValue, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let encoded = encode(&item)?;
        Self::encode_chunked(&encoded, dst);
        Ok(())
    }
}

/// Frames typed Bolt messages in both directions.
///
/// Decoding resolves each structure through the message registry, so a
/// client sees responses and a test peer sees requests through the same
/// codec.
#[derive(Debug, Default)]
pub struct BoltMessageCodec {
    inner: BoltCodec,
}

impl BoltMessageCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_size(max_message_size: usize) -> Self {
        Self {
            inner: BoltCodec::with_max_size(max_message_size),
        }
    }
}

impl Decoder for BoltMessageCodec {
    type Item = BoltMessage;
    type Error = BoltError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.inner.decode(src)? {
            Some(value) => Ok(Some(registry::decode_value(value)?)),
            None => Ok(None),
        }
    }
}

impl<M: Into<BoltMessage>> Encoder<M> for BoltMessageCodec {
    type Error = BoltError;

    fn encode(&mut self, item: M, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let value = PackStreamValue::Structure(item.into().to_structure());
        self.inner.encode(value, dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bolt::message::{BoltRequest, BoltResponse, RecordMessage, RunMessage};
    use crate::bolt::packstream::ValueMap;

    #[test]
    fn test_frame_layout() {
        let mut codec = BoltCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(PackStreamValue::Integer(1), &mut buf).unwrap();
        assert_eq!(&buf[..], &[0x00, 0x01, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn test_chunked_large_message() {
        let mut codec = BoltCodec::new();
        let mut buf = BytesMut::new();

        // Larger than one chunk but within the string length limit.
        let large = "x".repeat(60_000);
        let value = PackStreamValue::List(vec![large.clone().into(), large.clone().into()]);
        codec.encode(value.clone(), &mut buf).unwrap();

        let first_chunk = u16::from_be_bytes([buf[0], buf[1]]) as usize;
        assert_eq!(first_chunk, MAX_CHUNK_SIZE);

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, value);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_partial_chunk() {
        let mut codec = BoltCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(PackStreamValue::Integer(42), &mut buf).unwrap();
        let full = buf.clone();

        let mut partial = BytesMut::from(&full[..2]);
        assert!(codec.decode(&mut partial).unwrap().is_none());

        let mut complete = full;
        assert_eq!(codec.decode(&mut complete).unwrap().unwrap().as_int(), Some(42));
    }

    #[test]
    fn test_message_too_large() {
        let mut codec = BoltCodec::with_max_size(100);
        let mut buf = BytesMut::new();
        buf.put_u16(200);
        buf.extend_from_slice(&[0u8; 200]);

        let result = codec.decode(&mut buf);
        assert!(matches!(result, Err(BoltError::MessageTooLarge { size: 200, max: 100 })));
    }

    #[test]
    fn test_empty_message_skipped() {
        let mut codec = BoltCodec::new();
        let mut buf = BytesMut::new();
        buf.put_slice(&END_MARKER);
        codec.encode(PackStreamValue::Boolean(true), &mut buf).unwrap();

        assert_eq!(codec.decode(&mut buf).unwrap().unwrap().as_bool(), Some(true));
    }

    #[test]
    fn test_multiple_messages() {
        let mut codec = BoltCodec::new();
        let mut buf = BytesMut::new();
        for i in 1..=3 {
            codec.encode(PackStreamValue::Integer(i), &mut buf).unwrap();
        }
        for i in 1..=3 {
            assert_eq!(codec.decode(&mut buf).unwrap().unwrap().as_int(), Some(i));
        }
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_message_codec_dispatch() {
        let mut codec = BoltMessageCodec::new();
        let mut buf = BytesMut::new();

        let run = BoltRequest::Run(RunMessage::new("RETURN 1", ValueMap::new(), ValueMap::new()));
        codec.encode(run.clone(), &mut buf).unwrap();
        codec
            .encode(BoltResponse::Record(RecordMessage::new(vec![1i64.into()])), &mut buf)
            .unwrap();

        assert_eq!(codec.decode(&mut buf).unwrap(), Some(BoltMessage::Request(run)));
        match codec.decode(&mut buf).unwrap() {
            Some(BoltMessage::Response(BoltResponse::Record(r))) => assert_eq!(r.fields, vec![1i64.into()]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_message_codec_rejects_bare_value() {
        let mut codec = BoltMessageCodec::new();
        let mut buf = BytesMut::new();
        BoltCodec::new().encode(PackStreamValue::Integer(1), &mut buf).unwrap();
        assert!(matches!(codec.decode(&mut buf), Err(BoltError::PackStream(_))));
    }
}
