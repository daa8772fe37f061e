//! One framed connection to the i3 socket

use std::path::{Path, PathBuf};

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::UnixStream;
use tokio_util::codec::Framed;
use tracing::{debug, trace};

use crate::byte_order::{ByteOrder, ByteOrderCache};
use crate::codec::{CodecError, Frame, FrameCodec};
use crate::error::IpcError;
use crate::message::MessageType;

/// A socket connection that speaks i3 frames in a known byte order
///
/// The transport owns the whole stream. [`Transport::close`] drops it, after
/// which every read and write fails with `IpcError::ConnectionClosed`.
/// A frame with bad magic or an oversized length closes the transport too:
/// once the stream is out of sync nothing on it can be trusted.
#[derive(Debug)]
pub struct Transport {
    path: PathBuf,
    order: ByteOrder,
    framed: Option<Framed<UnixStream, FrameCodec>>,
}

impl Transport {
    /// Connect to `path`, detecting the byte order through `cache` if needed
    ///
    /// # Errors
    ///
    /// Returns `IpcError::ConnectionFailed` if the socket cannot be reached.
    /// Returns `IpcError::ByteOrderUndetected` if detection runs and fails.
    pub async fn dial(path: &Path, cache: &ByteOrderCache) -> Result<Self, IpcError> {
        let order = cache.resolve(path).await?;
        Self::dial_with_order(path, order).await
    }

    /// Connect to `path` using a byte order that is already known
    pub async fn dial_with_order(path: &Path, order: ByteOrder) -> Result<Self, IpcError> {
        let stream = UnixStream::connect(path)
            .await
            .map_err(|e| IpcError::ConnectionFailed {
                path: path.to_path_buf(),
                source: e,
            })?;

        debug!(path = %path.display(), order = ?order, "Connected to i3 socket");

        Ok(Self {
            path: path.to_path_buf(),
            order,
            framed: Some(Framed::new(stream, FrameCodec::new(order))),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    pub fn is_closed(&self) -> bool {
        self.framed.is_none()
    }

    /// Release the connection. Calling it again does nothing.
    pub fn close(&mut self) {
        if self.framed.take().is_some() {
            trace!(path = %self.path.display(), "Closed i3 connection");
        }
    }

    pub async fn write_frame(&mut self, message_type: u32, payload: &[u8]) -> Result<(), IpcError> {
        let framed = self.framed.as_mut().ok_or(IpcError::ConnectionClosed)?;

        trace!(message_type, len = payload.len(), "Writing frame");

        let result = framed
            .send(Frame::new(message_type, Bytes::copy_from_slice(payload)))
            .await;

        match result {
            Ok(()) => Ok(()),
            Err(CodecError::Io(e)) => Err(IpcError::SendFailed(e)),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Read the next frame, whatever its type
    pub async fn read_frame(&mut self) -> Result<Frame, IpcError> {
        let framed = self.framed.as_mut().ok_or(IpcError::ConnectionClosed)?;

        let next = framed.next().await;
        match next {
            Some(Ok(frame)) => {
                trace!(
                    message_type = frame.message_type,
                    len = frame.payload.len(),
                    "Read frame"
                );
                Ok(frame)
            }
            Some(Err(e)) => Err(self.fail(e)),
            None => {
                self.close();
                Err(IpcError::ConnectionClosed)
            }
        }
    }

    /// Write one request and read the frame that answers it
    ///
    /// # Errors
    ///
    /// Returns `IpcError::UnexpectedReplyType` if the reply's type is not the
    /// reply code of `message_type`. The transport is closed in that case.
    pub async fn request(
        &mut self,
        message_type: MessageType,
        payload: &[u8],
    ) -> Result<Bytes, IpcError> {
        self.write_frame(message_type.code(), payload).await?;
        let reply = self.read_frame().await?;

        let expected = message_type.reply_code();
        if reply.message_type != expected {
            self.close();
            return Err(IpcError::UnexpectedReplyType {
                expected,
                actual: reply.message_type,
            });
        }

        debug!(request = ?message_type, len = reply.payload.len(), "Received reply");

        Ok(reply.payload)
    }

    /// Close the connection and map a codec failure onto `IpcError`
    fn fail(&mut self, err: CodecError) -> IpcError {
        self.close();
        match err {
            CodecError::Io(e) => IpcError::ReceiveFailed(e),
            CodecError::MagicIncorrect { found } => IpcError::BadMagic { found },
            CodecError::PayloadTooLarge { len, max } => IpcError::PayloadTooLarge { len, max },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::UnixListener;

    #[tokio::test]
    async fn test_dial_missing_socket() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("missing.sock");

        let err = Transport::dial_with_order(&path, ByteOrder::Little)
            .await
            .expect_err("nothing listens there");

        match err {
            IpcError::ConnectionFailed { path: p, .. } => assert_eq!(p, path),
            other => panic!("Expected ConnectionFailed, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("i3.sock");
        let listener = UnixListener::bind(&path).expect("bind");

        let mut transport = Transport::dial_with_order(&path, ByteOrder::Little)
            .await
            .expect("dial");
        let _peer = listener.accept().await.expect("accept");

        transport.close();
        transport.close();
        assert!(transport.is_closed());

        assert!(matches!(
            transport.write_frame(0, b"nop").await,
            Err(IpcError::ConnectionClosed)
        ));
        assert!(matches!(
            transport.read_frame().await,
            Err(IpcError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_bad_magic_closes_transport() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("i3.sock");
        let listener = UnixListener::bind(&path).expect("bind");

        let mut transport = Transport::dial_with_order(&path, ByteOrder::Little)
            .await
            .expect("dial");
        let (mut peer, _) = listener.accept().await.expect("accept");

        peer.write_all(b"i4-ipc\x00\x00\x00\x00\x00\x00\x00\x00")
            .await
            .expect("peer write");

        let err = transport.read_frame().await.expect_err("bad magic");
        assert!(matches!(err, IpcError::BadMagic { found } if &found == b"i4-ipc"));
        assert!(transport.is_closed());
    }

    #[tokio::test]
    async fn test_request_checks_reply_type() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("i3.sock");
        let listener = UnixListener::bind(&path).expect("bind");

        let peer = tokio::spawn(async move {
            let (mut peer, _) = listener.accept().await.expect("accept");
            let mut header = [0u8; 14];
            peer.read_exact(&mut header).await.expect("header");
            let len = u32::from_be_bytes([header[6], header[7], header[8], header[9]]);
            let mut payload = vec![0u8; len as usize];
            peer.read_exact(&mut payload).await.expect("payload");

            // Answer GET_TREE with a GET_WORKSPACES reply
            let mut reply = Vec::new();
            reply.extend_from_slice(b"i3-ipc");
            reply.extend_from_slice(&2u32.to_be_bytes());
            reply.extend_from_slice(&1u32.to_be_bytes());
            reply.extend_from_slice(b"[]");
            peer.write_all(&reply).await.expect("reply");
        });

        let mut transport = Transport::dial_with_order(&path, ByteOrder::Big)
            .await
            .expect("dial");
        let err = transport
            .request(MessageType::GetTree, b"")
            .await
            .expect_err("mismatched reply");

        assert!(
            matches!(err, IpcError::UnexpectedReplyType { expected: 4, actual: 1 }),
            "got: {:?}",
            err
        );
        assert!(transport.is_closed());
        assert!(matches!(
            transport.request(MessageType::GetTree, b"").await,
            Err(IpcError::ConnectionClosed)
        ));
        peer.await.expect("peer task");
    }
}
