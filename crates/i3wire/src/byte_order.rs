//! Detection and caching of the peer's integer byte order
//!
//! i3 writes the header integers in the native order of the machine it runs
//! on and never says which one that is. The order is found by probing:
//!
//! 1. A subscribe request whose payload is padded to [`PROBE_PAYLOAD_LEN`]
//!    bytes. That length reads the same in both orders, so the peer always
//!    consumes the whole frame, but the type field (2) only makes sense to the
//!    peer when the candidate order is right. i3 drops frames of unknown type.
//! 2. A `nop` run-command request of the same length. Its type (0) is also
//!    order-independent, so the peer always answers it.
//!
//! The first reply tells the orders apart: a subscribe reply confirms the
//! candidate, a run-command reply means the subscribe was dropped.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use bytes::{Buf, BufMut, BytesMut};
use serde::Deserialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::codec::{encode_frame, Header, HEADER_LEN, MAX_PAYLOAD_LEN};
use crate::error::IpcError;
use crate::message::MessageType;

/// Declared probe payload length, `0x0001_0100`
///
/// Larger than common socket buffer thresholds and byte-palindromic.
pub const PROBE_PAYLOAD_LEN: usize = 65536 + 256;

const NOP_PREFIX: &str = "nop byte-order detection. padding: ";

/// Order of the two u32 fields in a frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    /// Order of the machine this process runs on
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            ByteOrder::Little => ByteOrder::Big,
            ByteOrder::Big => ByteOrder::Little,
        }
    }

    pub fn get_u32(self, buf: &mut impl Buf) -> u32 {
        match self {
            ByteOrder::Little => buf.get_u32_le(),
            ByteOrder::Big => buf.get_u32(),
        }
    }

    pub fn put_u32(self, buf: &mut impl BufMut, n: u32) {
        match self {
            ByteOrder::Little => buf.put_u32_le(n),
            ByteOrder::Big => buf.put_u32(n),
        }
    }
}

/// Once-initialized byte order shared by every clone of a client
///
/// Clones share the same slot. Concurrent callers of [`ByteOrderCache::resolve`]
/// wait for the detection already in flight instead of starting another.
#[derive(Debug, Clone)]
pub struct ByteOrderCache {
    first_candidate: ByteOrder,
    slot: Arc<Mutex<Arc<OnceCell<ByteOrder>>>>,
}

impl Default for ByteOrderCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteOrderCache {
    /// Empty cache that probes the native order first
    pub fn new() -> Self {
        Self::with_first_candidate(ByteOrder::native())
    }

    /// Empty cache that probes `first` before its opposite
    pub fn with_first_candidate(first: ByteOrder) -> Self {
        Self {
            first_candidate: first,
            slot: Arc::new(Mutex::new(Arc::new(OnceCell::new()))),
        }
    }

    /// Cache that already knows the order and never probes
    pub fn preset(order: ByteOrder) -> Self {
        Self {
            first_candidate: order,
            slot: Arc::new(Mutex::new(Arc::new(OnceCell::from(order)))),
        }
    }

    pub fn first_candidate(&self) -> ByteOrder {
        self.first_candidate
    }

    /// The cached order, if detection already ran
    pub fn get(&self) -> Option<ByteOrder> {
        self.cell().get().copied()
    }

    /// Forget the cached order; the next resolve probes again
    pub fn reset(&self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Arc::new(OnceCell::new());
    }

    /// Return the cached order, detecting it against `path` on first use
    ///
    /// Concurrent first callers wait on a single detection instead of
    /// probing in parallel. There is no timeout: if the peer never answers
    /// the probe, every waiting caller stalls with it.
    pub async fn resolve(&self, path: &Path) -> Result<ByteOrder, IpcError> {
        let cell = self.cell();
        let order = cell
            .get_or_try_init(|| detect_byte_order(path, self.first_candidate))
            .await?;
        Ok(*order)
    }

    // The lock only guards the swap in `reset`, never the detection itself.
    fn cell(&self) -> Arc<OnceCell<ByteOrder>> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Probe the peer at `path`, trying `first` and then its opposite
///
/// Each candidate gets its own connection.
///
/// # Errors
///
/// Returns `IpcError::ConnectionFailed` if the socket cannot be dialed.
/// Returns `IpcError::ByteOrderUndetected` if neither order is confirmed.
pub async fn detect_byte_order(path: &Path, first: ByteOrder) -> Result<ByteOrder, IpcError> {
    for candidate in [first, first.opposite()] {
        if probe(path, candidate).await? {
            info!(order = ?candidate, path = %path.display(), "Detected i3 byte order");
            return Ok(candidate);
        }
        debug!(order = ?candidate, "Byte order probe not confirmed");
    }

    Err(IpcError::ByteOrderUndetected)
}

#[derive(Deserialize)]
struct ProbeAck {
    success: bool,
}

/// Send both probe frames in `candidate` order and check the first reply
///
/// Only dialing can fail; any later I/O or framing problem just means the
/// candidate is not confirmed.
async fn probe(path: &Path, candidate: ByteOrder) -> Result<bool, IpcError> {
    let mut stream = UnixStream::connect(path)
        .await
        .map_err(|e| IpcError::ConnectionFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    let request = probe_frames(candidate);
    if let Err(e) = stream.write_all(&request).await {
        debug!(error = %e, "Byte order probe write failed");
        return Ok(false);
    }

    let mut header_buf = [0u8; HEADER_LEN];
    if let Err(e) = stream.read_exact(&mut header_buf).await {
        debug!(error = %e, "Byte order probe got no reply");
        return Ok(false);
    }

    let header = match Header::parse(candidate, &header_buf) {
        Ok(header) => header,
        Err(e) => {
            debug!(error = %e, "Byte order probe reply malformed");
            return Ok(false);
        }
    };

    if header.message_type != MessageType::Subscribe.reply_code() {
        // The nop was answered first: the subscribe frame was not understood
        return Ok(false);
    }

    let len = header.payload_len as usize;
    if len > MAX_PAYLOAD_LEN {
        return Ok(false);
    }

    let mut payload = vec![0u8; len];
    if let Err(e) = stream.read_exact(&mut payload).await {
        debug!(error = %e, "Byte order probe reply truncated");
        return Ok(false);
    }

    Ok(serde_json::from_slice::<ProbeAck>(&payload)
        .map(|ack| ack.success)
        .unwrap_or(false))
}

/// The subscribe probe followed by the nop probe, both padded to
/// [`PROBE_PAYLOAD_LEN`]
fn probe_frames(order: ByteOrder) -> BytesMut {
    let mut subscribe = Vec::with_capacity(PROBE_PAYLOAD_LEN);
    subscribe.extend_from_slice(b"[]");
    subscribe.resize(PROBE_PAYLOAD_LEN, b' ');

    let mut nop = Vec::with_capacity(PROBE_PAYLOAD_LEN);
    nop.extend_from_slice(NOP_PREFIX.as_bytes());
    nop.resize(PROBE_PAYLOAD_LEN, b'a');

    let mut buf = BytesMut::with_capacity(2 * (HEADER_LEN + PROBE_PAYLOAD_LEN));
    // Both payloads are below MAX_PAYLOAD_LEN, so encoding cannot fail
    let _ = encode_frame(order, MessageType::Subscribe.code(), &subscribe, &mut buf);
    let _ = encode_frame(order, MessageType::RunCommand.code(), &nop, &mut buf);
    buf
}
