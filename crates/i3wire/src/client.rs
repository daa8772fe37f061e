//! i3 IPC client
//!
//! `I3Client` holds no connection. Every round trip dials its own
//! [`Transport`] and closes it before returning, so any number of calls may
//! run concurrently on clones of one client. The only state the clones share
//! is the [`ByteOrderCache`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::byte_order::ByteOrderCache;
use crate::error::IpcError;
use crate::message::{EventType, MessageType};
use crate::socket::discover_socket_path;
use crate::subscription::Subscription;
use crate::transport::Transport;

/// Default number of retry attempts for `round_trip_with_retry`
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Initial delay between retry attempts (100ms)
const INITIAL_RETRY_DELAY_MS: u64 = 100;

/// Maximum delay between retry attempts (1 second)
const MAX_RETRY_DELAY_MS: u64 = 1000;

/// Client for the IPC socket of one i3 or sway instance
///
/// # Example
///
/// ```ignore
/// let client = I3Client::from_env().await?;
/// let tree = client.get_tree().await?;
/// let focused = tree.find_focused(|n| n.focused);
/// ```
#[derive(Debug, Clone)]
pub struct I3Client {
    socket_path: PathBuf,
    byte_order: ByteOrderCache,
}

impl I3Client {
    /// Client for the socket at `socket_path`, detecting the byte order on
    /// first use
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self::with_byte_order_cache(socket_path, ByteOrderCache::new())
    }

    /// Client that uses (and shares) an existing byte order cache
    pub fn with_byte_order_cache(socket_path: impl Into<PathBuf>, cache: ByteOrderCache) -> Self {
        Self {
            socket_path: socket_path.into(),
            byte_order: cache,
        }
    }

    /// Client for the socket found by [`discover_socket_path`]
    ///
    /// # Errors
    ///
    /// Returns `IpcError::SocketNotSet` or `IpcError::SocketNotFound` if no
    /// usable socket path is found.
    pub async fn from_env() -> Result<Self, IpcError> {
        let socket_path = discover_socket_path().await?;
        Ok(Self::new(socket_path))
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn byte_order_cache(&self) -> &ByteOrderCache {
        &self.byte_order
    }

    /// Open a new connection, detecting the byte order if not cached yet
    pub async fn dial(&self) -> Result<Transport, IpcError> {
        Transport::dial(&self.socket_path, &self.byte_order).await
    }

    /// Send one request on a fresh connection and return the raw reply payload
    ///
    /// The connection is closed before returning, on success or failure.
    ///
    /// # Errors
    ///
    /// Returns a connection error (`ConnectionFailed`, `SendFailed`,
    /// `ReceiveFailed`, `ConnectionClosed`) if the exchange fails; a new call
    /// may succeed. Returns `BadMagic`, `PayloadTooLarge` or
    /// `UnexpectedReplyType` if the peer answered with something that is not
    /// the reply to this request.
    pub async fn round_trip(
        &self,
        message_type: MessageType,
        payload: &[u8],
    ) -> Result<Bytes, IpcError> {
        let mut transport = self.dial().await?;
        let result = transport.request(message_type, payload).await;
        transport.close();
        result
    }

    /// [`I3Client::round_trip`] with retries on connection errors
    ///
    /// # Backoff Strategy
    ///
    /// - Initial delay: 100ms
    /// - Each retry: delay *= 2
    /// - Maximum delay: 1 second (capped)
    ///
    /// # Arguments
    ///
    /// * `max_retries` - Maximum number of retries (0 means try once)
    ///
    /// # Errors
    ///
    /// Returns `IpcError::MaxRetriesExceeded` if every attempt failed with a
    /// connection error. Any other error is returned as soon as it occurs.
    pub async fn round_trip_with_retry(
        &self,
        message_type: MessageType,
        payload: &[u8],
        max_retries: u32,
    ) -> Result<Bytes, IpcError> {
        let mut attempt = 0;
        let mut delay_ms = INITIAL_RETRY_DELAY_MS;

        let last_error = loop {
            attempt += 1;

            let e = match self.round_trip(message_type, payload).await {
                Ok(reply) => return Ok(reply),
                Err(e) => e,
            };

            if !e.is_retryable() {
                return Err(e);
            }

            if attempt > max_retries {
                break e;
            }

            warn!(
                attempt = attempt,
                max_retries = max_retries,
                delay_ms = delay_ms,
                request = ?message_type,
                error = %e,
                "i3 IPC request failed, retrying..."
            );

            sleep(Duration::from_millis(delay_ms)).await;

            delay_ms = (delay_ms * 2).min(MAX_RETRY_DELAY_MS);
        };

        warn!(
            attempts = attempt,
            last_error = %last_error,
            "Failed to reach i3 after all retry attempts"
        );

        Err(IpcError::MaxRetriesExceeded { attempts: attempt })
    }

    /// Subscribe to `events` on a dedicated connection
    ///
    /// Every call gets its own connection and its own copy of the event
    /// stream, even for identical filters.
    ///
    /// # Errors
    ///
    /// Returns `IpcError::SubscribeRejected` if i3 refuses the subscription,
    /// or any error from dialing and the subscribe exchange.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let mut sub = client.subscribe(&[EventType::Window]).await?;
    /// while sub.next().await {
    ///     println!("{:?}", sub.event());
    /// }
    /// sub.close().await?;
    /// ```
    pub async fn subscribe(&self, events: &[EventType]) -> Result<Subscription, IpcError> {
        let transport = self.dial().await?;
        debug!(events = ?events, "Subscribing to i3 events");
        Subscription::establish(transport, events).await
    }
}
