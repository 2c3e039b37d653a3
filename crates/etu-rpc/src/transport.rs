//! Length-prefixed framing for JSON-RPC messages over a byte stream.
//!
//! Frame format:
//! ```text
//! +----------------+------------------+
//! |  4 bytes       |  N bytes         |
//! |  (length BE)   |  (JSON payload)  |
//! +----------------+------------------+
//! ```
//!
//! The stream itself is plaintext TCP or TLS over TCP; see [`BoxedStream`].

use std::io;

use bytes::{Buf, BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use crate::protocol::Message;

/// Default frame size limit (16 MB)
pub const DEFAULT_MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

const LENGTH_PREFIX_SIZE: usize = 4;

/// Byte stream a channel can frame: plaintext or TLS.
pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> AsyncStream for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

pub type BoxedStream = Box<dyn AsyncStream>;

/// Codec for length-prefixed JSON-RPC messages
#[derive(Debug)]
pub struct FrameCodec {
    max_frame_len: usize,
    pending_len: Option<usize>,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::with_max_frame_len(DEFAULT_MAX_FRAME_LEN)
    }
}

impl FrameCodec {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A codec rejecting frames larger than `max_frame_len` bytes.
    ///
    /// The limit is clamped to `u32::MAX`, the largest length the prefix can carry.
    #[must_use]
    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self {
            max_frame_len: max_frame_len.min(u32::MAX as usize),
            pending_len: None,
        }
    }

    #[must_use]
    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }
}

impl Decoder for FrameCodec {
    type Item = Message;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let len = match self.pending_len {
            Some(len) => len,
            None => {
                if src.len() < LENGTH_PREFIX_SIZE {
                    return Ok(None);
                }
                let len = src.get_u32() as usize;
                if len > self.max_frame_len {
                    return Err(CodecError::FrameTooLarge {
                        size: len,
                        max: self.max_frame_len,
                    });
                }
                self.pending_len = Some(len);
                len
            }
        };

        if src.len() < len {
            src.reserve(len - src.len());
            return Ok(None);
        }

        let payload = src.split_to(len);
        self.pending_len = None;

        let text = std::str::from_utf8(&payload)?;
        trace!(bytes = len, "decoded frame");
        Ok(Some(serde_json::from_str(text)?))
    }
}

impl Encoder<Message> for FrameCodec {
    type Error = CodecError;

    // Payload length is checked against max_frame_len, which fits in u32
    #[allow(clippy::cast_possible_truncation)]
    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = serde_json::to_vec(&item)?;

        if payload.len() > self.max_frame_len {
            return Err(CodecError::FrameTooLarge {
                size: payload.len(),
                max: self.max_frame_len,
            });
        }

        dst.reserve(LENGTH_PREFIX_SIZE + payload.len());
        dst.put_u32(payload.len() as u32);
        dst.put_slice(&payload);
        trace!(bytes = payload.len(), "encoded frame");

        Ok(())
    }
}

/// Errors that can occur during codec operations
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },
}

#[cfg(test)]
mod tests {
    #![allow(clippy::cast_possible_truncation)] // Test constants bounded to u32

    use super::*;
    use crate::metadata::Metadata;
    use crate::protocol::{Request, RequestId, Response, RpcError};

    #[test]
    fn test_request_with_metadata_survives_framing() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();

        let request = Request::new("/etu.TagsService/listTags", None, 1.into())
            .with_metadata(Metadata::authorization("secret"));
        codec.encode(Message::Request(request), &mut buf).unwrap();

        let Message::Request(decoded) = codec.decode(&mut buf).unwrap().unwrap() else {
            panic!("Expected Request");
        };
        assert_eq!(decoded.method, "/etu.TagsService/listTags");
        assert_eq!(decoded.metadata.get("authorization"), Some("secret"));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_error_response_framing() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();

        let response = Response::error(4.into(), RpcError::new(5, "missing"));
        codec.encode(Message::Response(response), &mut buf).unwrap();

        let Message::Response(decoded) = codec.decode(&mut buf).unwrap().unwrap() else {
            panic!("Expected Response");
        };
        assert_eq!(decoded.id, RequestId::Number(4));
        assert_eq!(decoded.error.unwrap().code, 5);
    }

    #[test]
    fn test_partial_decode() {
        let mut codec = FrameCodec::new();
        let mut full = BytesMut::new();
        codec
            .encode(Message::Request(Request::new("x", None, 1.into())), &mut full)
            .unwrap();

        let mut partial = BytesMut::new();
        partial.extend_from_slice(&full[..2]);
        assert!(codec.decode(&mut partial).unwrap().is_none());

        partial.extend_from_slice(&full[2..6]);
        assert!(codec.decode(&mut partial).unwrap().is_none());

        partial.extend_from_slice(&full[6..]);
        assert!(codec.decode(&mut partial).unwrap().is_some());
    }

    #[test]
    fn test_multiple_frames_in_buffer() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();

        for (id, result) in [(1u64, "first"), (2, "second")] {
            let response = Response::success(id.into(), serde_json::json!(result));
            codec.encode(Message::Response(response), &mut buf).unwrap();
        }

        for expected in [1u64, 2] {
            let Message::Response(resp) = codec.decode(&mut buf).unwrap().unwrap() else {
                panic!("Expected Response");
            };
            assert_eq!(resp.id, RequestId::Number(expected));
        }
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_oversized_prefix_rejected() {
        let mut codec = FrameCodec::with_max_frame_len(64);
        let mut buf = BytesMut::new();
        buf.put_u32(65);

        let result = codec.decode(&mut buf);
        assert!(matches!(
            result,
            Err(CodecError::FrameTooLarge { size: 65, max: 64 })
        ));
    }

    #[test]
    fn test_oversized_encode_rejected() {
        let mut codec = FrameCodec::with_max_frame_len(16);
        let mut buf = BytesMut::new();
        let request = Request::new("a-rather-long-method-name", None, 1.into());

        let result = codec.encode(Message::Request(request), &mut buf);
        assert!(matches!(result, Err(CodecError::FrameTooLarge { .. })));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_invalid_json() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        let garbage = b"not valid json";
        buf.put_u32(garbage.len() as u32);
        buf.extend_from_slice(garbage);

        assert!(matches!(codec.decode(&mut buf), Err(CodecError::Json(_))));
    }

    #[test]
    fn test_invalid_utf8() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        let bytes = [0xff, 0xfe, 0x00, 0x01];
        buf.put_u32(bytes.len() as u32);
        buf.extend_from_slice(&bytes);

        assert!(matches!(codec.decode(&mut buf), Err(CodecError::Utf8(_))));
    }

    #[test]
    fn test_length_prefix_is_big_endian() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        codec
            .encode(Message::Request(Request::new("x", None, 1.into())), &mut buf)
            .unwrap();

        let length = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        assert_eq!(length, buf.len() - 4);
    }

    #[test]
    fn test_codec_error_display() {
        let err = CodecError::FrameTooLarge {
            size: 20_000_000,
            max: DEFAULT_MAX_FRAME_LEN,
        };
        assert!(err.to_string().contains("20000000"));
        assert!(err.to_string().contains("too large"));
    }
}
