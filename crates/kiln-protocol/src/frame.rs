//! Kafka protocol frame handling for the request stream.
//!
//! The Kafka protocol uses length-prefixed messages:
//! - Request: [Length: i32][RequestMessage]
//! - Response: [Length: i32][ResponseMessage]
//!
//! Responses leave the encoders already framed, so only the read side needs
//! a codec.

use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::Decoder;
use tracing::{debug, trace};

use crate::error::{Error, Result};

/// Maximum frame size (100MB) to prevent OOM attacks
pub const MAX_FRAME_SIZE: usize = 100 * 1024 * 1024;

/// Splits a byte stream into request frames with the size prefix stripped.
///
/// Frames too short to hold a request header are still yielded; the
/// dispatcher answers those with an error response instead of the codec
/// dropping the connection.
pub struct KafkaFrameCodec {
    /// Maximum allowed frame size
    max_frame_size: usize,
}

impl KafkaFrameCodec {
    /// Create a new frame codec with default settings
    pub fn new() -> Self {
        Self {
            max_frame_size: MAX_FRAME_SIZE,
        }
    }

    /// Create a new frame codec with custom max frame size
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }
}

impl Default for KafkaFrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for KafkaFrameCodec {
    type Item = Bytes;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        // Need at least 4 bytes for the length prefix
        if src.len() < 4 {
            trace!("Not enough data for length prefix, have {} bytes", src.len());
            return Ok(None);
        }

        // Peek at the length without consuming
        let mut length_bytes = [0u8; 4];
        length_bytes.copy_from_slice(&src[..4]);
        let length = i32::from_be_bytes(length_bytes);

        if length < 0 {
            return Err(Error::Frame(format!("Negative frame size {}", length)));
        }
        let length = length as usize;

        if length > self.max_frame_size {
            return Err(Error::Frame(format!(
                "Frame size {} exceeds maximum {}",
                length, self.max_frame_size
            )));
        }

        // Check if we have the complete frame
        if src.len() < 4 + length {
            trace!(
                "Waiting for complete frame, have {} bytes, need {}",
                src.len(),
                4 + length
            );
            src.reserve(4 + length - src.len());
            return Ok(None);
        }

        debug!("Decoding frame of {} bytes", length);

        src.advance(4);
        Ok(Some(src.split_to(length).freeze()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BufMut;

    #[test]
    fn test_frame_codec_decode() {
        let mut codec = KafkaFrameCodec::new();
        let mut buf = BytesMut::new();

        // Test incomplete length prefix
        buf.put_u8(0);
        buf.put_u8(0);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        // Complete length prefix but no data
        buf.put_u8(0);
        buf.put_u8(20); // Length = 20
        assert!(codec.decode(&mut buf).unwrap().is_none());

        // Add complete frame data
        let data = vec![0u8; 20];
        buf.put_slice(&data);

        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.len(), 20);
        assert_eq!(buf.len(), 0); // All consumed
    }

    #[test]
    fn test_back_to_back_frames() {
        let mut codec = KafkaFrameCodec::new();
        let mut buf = BytesMut::new();
        buf.put_i32(2);
        buf.put_slice(&[0xAA, 0xBB]);
        buf.put_i32(1);
        buf.put_slice(&[0xCC]);

        assert_eq!(&codec.decode(&mut buf).unwrap().unwrap()[..], &[0xAA, 0xBB]);
        assert_eq!(&codec.decode(&mut buf).unwrap().unwrap()[..], &[0xCC]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_frame_size_validation() {
        let mut codec = KafkaFrameCodec::with_max_frame_size(1000);
        let mut buf = BytesMut::new();
        buf.put_i32(2000);
        assert!(matches!(codec.decode(&mut buf), Err(Error::Frame(_))));

        let mut buf = BytesMut::new();
        buf.put_i32(-1);
        assert!(matches!(codec.decode(&mut buf), Err(Error::Frame(_))));
    }
}
