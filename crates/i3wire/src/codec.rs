//! Frame codec for the i3 IPC wire format
//!
//! ```text
//! +--------+----------------+----------------+-----------------+
//! | i3-ipc | payload length | message type   | payload (JSON)  |
//! | 6 bytes| u32, peer order| u32, peer order| length bytes    |
//! +--------+----------------+----------------+-----------------+
//! ```

use bytes::{Buf, Bytes, BytesMut};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

use crate::byte_order::ByteOrder;

/// i3 IPC magic string - "i3-ipc"
pub const MAGIC: [u8; 6] = *b"i3-ipc";
pub const MAGIC_LEN: usize = 6;
pub const HEADER_LEN: usize = MAGIC_LEN + 4 + 4;

/// Upper bound for a declared payload (64 MiB)
///
/// Layout trees of large setups stay far below this; anything bigger is a
/// desynchronized stream or a byte order mix-up.
pub const MAX_PAYLOAD_LEN: usize = 64 * 1024 * 1024;

/// One header-plus-payload unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Raw type field, including the event flag for events
    pub message_type: u32,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(message_type: u32, payload: impl Into<Bytes>) -> Self {
        Self {
            message_type,
            payload: payload.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("magic incorrect: {found:02x?}")]
    MagicIncorrect { found: [u8; MAGIC_LEN] },
    #[error("payload of {len} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { len: usize, max: usize },
}

/// Decoded frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub payload_len: u32,
    pub message_type: u32,
}

impl Header {
    /// Parse the first [`HEADER_LEN`] bytes of `buf`
    ///
    /// `buf` must hold at least a full header.
    pub fn parse(order: ByteOrder, buf: &[u8]) -> Result<Header, CodecError> {
        let mut found = [0u8; MAGIC_LEN];
        found.copy_from_slice(&buf[..MAGIC_LEN]);

        if found != MAGIC {
            return Err(CodecError::MagicIncorrect { found });
        }

        let mut cursor = &buf[MAGIC_LEN..HEADER_LEN];
        let payload_len = order.get_u32(&mut cursor);
        let message_type = order.get_u32(&mut cursor);

        Ok(Header {
            payload_len,
            message_type,
        })
    }
}

/// Append one encoded frame to `dst`
pub fn encode_frame(
    order: ByteOrder,
    message_type: u32,
    payload: &[u8],
    dst: &mut BytesMut,
) -> Result<(), CodecError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(CodecError::PayloadTooLarge {
            len: payload.len(),
            max: MAX_PAYLOAD_LEN,
        });
    }

    dst.reserve(HEADER_LEN + payload.len());
    dst.extend_from_slice(&MAGIC);
    order.put_u32(dst, payload.len() as u32);
    order.put_u32(dst, message_type);
    dst.extend_from_slice(payload);

    Ok(())
}

/// `tokio_util` codec for i3 frames in a fixed byte order
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    order: ByteOrder,
}

impl FrameCodec {
    pub fn new(order: ByteOrder) -> Self {
        Self { order }
    }

    pub fn order(&self) -> ByteOrder {
        self.order
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }

        let header = match Header::parse(self.order, src) {
            Ok(header) => header,
            Err(e) => {
                src.clear();
                return Err(e);
            }
        };

        let payload_len = header.payload_len as usize;
        if payload_len > MAX_PAYLOAD_LEN {
            src.clear();
            return Err(CodecError::PayloadTooLarge {
                len: payload_len,
                max: MAX_PAYLOAD_LEN,
            });
        }

        let frame_len = HEADER_LEN + payload_len;
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        let mut frame = src.split_to(frame_len);
        frame.advance(HEADER_LEN);

        Ok(Some(Frame {
            message_type: header.message_type,
            payload: frame.freeze(),
        }))
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_frame(self.order, item.message_type, &item.payload, dst)
    }
}
