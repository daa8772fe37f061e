//! Error types for i3 IPC operations

use std::path::PathBuf;
use thiserror::Error;

/// Broad classification of an [`IpcError`]
///
/// The class decides what a caller may do next: connection errors are cured by
/// issuing a new call (every call owns a fresh connection), protocol and
/// decode errors are not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The socket could not be located
    Config,
    /// Dial, write, read or reset failure
    Connection,
    /// Bad magic, type mismatch or an implausible event code
    Protocol,
    /// Malformed JSON for a known message shape
    Decode,
    /// Well-formed reply carrying `success: false`
    CommandFailure,
}

/// Errors that can occur when communicating with i3
#[derive(Debug, Error)]
pub enum IpcError {
    /// None of the socket sources produced a path
    #[error("I3SOCK/SWAYSOCK not set and `i3 --get-socketpath` failed - is i3 running?")]
    SocketNotSet,

    /// The socket path does not exist
    #[error("i3 socket not found at {path}")]
    SocketNotFound { path: PathBuf },

    /// Failed to connect to the i3 socket
    #[error("Failed to connect to i3 socket at {path}: {source}")]
    ConnectionFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a frame
    #[error("Failed to send request to i3: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Failed to read a frame
    #[error("Failed to receive reply from i3: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// The peer closed the connection, or it was closed locally
    #[error("Connection to i3 closed")]
    ConnectionClosed,

    /// The frame did not start with `i3-ipc`; the connection is out of sync
    #[error("Invalid magic {found:02x?}, connection is out of sync")]
    BadMagic { found: [u8; 6] },

    /// The declared payload length is not believable
    #[error("Payload of {len} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { len: usize, max: usize },

    /// The reply type does not answer the request that was sent
    #[error("Unexpected reply type {actual:#x} (expected {expected:#x})")]
    UnexpectedReplyType { expected: u32, actual: u32 },

    /// A frame without the event flag was handed to the event decoder
    #[error("Message type {0:#x} is not an event")]
    NotAnEvent(u32),

    /// The event flag is set but the family code makes no sense
    #[error("Implausible event type {0:#x}")]
    ImplausibleEvent(u32),

    /// Neither byte order produced a valid probe reply
    #[error("Could not detect the byte order of the i3 socket")]
    ByteOrderUndetected,

    /// The peer is older than the caller requires
    #[error("i3 {found} is older than the required {major}.{minor}")]
    VersionTooOld {
        found: String,
        major: i64,
        minor: i64,
    },

    /// Failed to serialize a request to JSON
    #[error("Failed to serialize request: {0}")]
    SerializeFailed(#[source] serde_json::Error),

    /// Failed to deserialize a reply or event from JSON
    #[error("Failed to deserialize reply: {0}")]
    DeserializeFailed(#[source] serde_json::Error),

    /// i3 answered the subscribe request with `success: false`
    #[error("i3 rejected the subscription: {}", .error.as_deref().unwrap_or("no reason given"))]
    SubscribeRejected { error: Option<String> },

    /// One or more commands reported `success: false`
    #[error(transparent)]
    CommandFailed(#[from] CommandFailure),

    /// Maximum retry attempts exceeded
    #[error("Failed to reach i3 after {attempts} attempts")]
    MaxRetriesExceeded { attempts: u32 },
}

impl IpcError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            IpcError::SocketNotSet | IpcError::SocketNotFound { .. } => ErrorKind::Config,
            IpcError::ConnectionFailed { .. }
            | IpcError::SendFailed(_)
            | IpcError::ReceiveFailed(_)
            | IpcError::ConnectionClosed
            | IpcError::MaxRetriesExceeded { .. } => ErrorKind::Connection,
            IpcError::BadMagic { .. }
            | IpcError::PayloadTooLarge { .. }
            | IpcError::UnexpectedReplyType { .. }
            | IpcError::NotAnEvent(_)
            | IpcError::ImplausibleEvent(_)
            | IpcError::ByteOrderUndetected
            | IpcError::VersionTooOld { .. } => ErrorKind::Protocol,
            IpcError::SerializeFailed(_) | IpcError::DeserializeFailed(_) => ErrorKind::Decode,
            IpcError::SubscribeRejected { .. } | IpcError::CommandFailed(_) => {
                ErrorKind::CommandFailure
            }
        }
    }

    /// Whether a new call may succeed where this one failed
    ///
    /// `MaxRetriesExceeded` is a connection error but already is the result of
    /// retrying, so it is not retryable itself.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Connection && !matches!(self, IpcError::MaxRetriesExceeded { .. })
    }
}

/// Commands that i3 parsed but refused to run
///
/// This is ordinary output of `run_command`, not a transport failure. Build
/// one with [`crate::ensure_success`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} command(s) failed: {}", .errors.len(), .errors.join("; "))]
pub struct CommandFailure {
    /// Error message of every failed command, in request order
    pub errors: Vec<String>,
}
