//! Event subscriptions
//!
//! ```text
//! +-----------+      +--------------+      +-----------+      +----------+
//! | i3 socket | ---> | reader task  | ---> | mpsc (1)  | ---> | next()   |
//! +-----------+      | decode_event |      +-----------+      | event()  |
//!                    +--------------+                         +----------+
//! ```
//!
//! Each subscription owns one connection and one reader task. The reader
//! stops when the subscription is closed, when the connection fails, or when
//! an event does not decode. A failure is kept as the terminal error and
//! returned by every `close()`.

use std::sync::Arc;

use futures::Stream;
use serde::Deserialize;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::IpcError;
use crate::events::{decode_event, is_event, Event};
use crate::message::{EventType, MessageType};
use crate::transport::Transport;

#[derive(Deserialize)]
struct SubscribeAck {
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Progress of the reader task, published to every closer
#[derive(Debug, Clone)]
enum ReaderState {
    Running,
    /// Stopped and released its connection, with the error that ended it
    Finished(Option<Arc<IpcError>>),
}

/// Handle that closes a [`Subscription`] from another task
///
/// Cheap to clone. All clones close the same subscription.
#[derive(Debug, Clone)]
pub struct SubscriptionCloser {
    token: CancellationToken,
    state: watch::Receiver<ReaderState>,
}

impl SubscriptionCloser {
    /// Stop the reader and release its connection
    ///
    /// A task blocked in [`Subscription::next`] wakes up with `false`.
    /// Safe to call repeatedly and from several tasks at once. Every call
    /// waits until the reader has stopped.
    ///
    /// # Errors
    ///
    /// Returns the error that ended the reader (e.g. `ConnectionClosed` after
    /// an i3 restart), if any. Every call returns the same error.
    pub async fn close(&self) -> Result<(), Arc<IpcError>> {
        self.token.cancel();

        let mut state = self.state.clone();
        let finished = state
            .wait_for(|s| matches!(s, ReaderState::Finished(_)))
            .await;

        match finished {
            Ok(finished) => match &*finished {
                ReaderState::Finished(Some(e)) => Err(Arc::clone(e)),
                _ => Ok(()),
            },
            Err(_) => {
                warn!("Subscription reader task did not finish cleanly");
                Ok(())
            }
        }
    }

    /// The error that ended the reader, once it has stopped
    pub fn terminal_error(&self) -> Option<Arc<IpcError>> {
        match &*self.state.borrow() {
            ReaderState::Finished(e) => e.clone(),
            ReaderState::Running => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled() || matches!(*self.state.borrow(), ReaderState::Finished(_))
    }
}

/// A live event stream on a dedicated connection
///
/// Single consumer: [`Subscription::next`] takes `&mut self`. Use
/// [`Subscription::closer`] to close it from elsewhere. Dropping the
/// subscription closes it.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::Receiver<Event>,
    current: Option<Event>,
    closer: SubscriptionCloser,
}

impl Subscription {
    /// Send the subscribe request on `transport` and start the reader
    pub(crate) async fn establish(
        mut transport: Transport,
        events: &[EventType],
    ) -> Result<Self, IpcError> {
        let payload = serde_json::to_vec(events).map_err(IpcError::SerializeFailed)?;
        let reply = transport.request(MessageType::Subscribe, &payload).await?;

        let ack: SubscribeAck =
            serde_json::from_slice(&reply).map_err(IpcError::DeserializeFailed)?;
        if !ack.success {
            transport.close();
            return Err(IpcError::SubscribeRejected { error: ack.error });
        }

        debug!(events = ?events, "Subscription established");

        let (tx, rx) = mpsc::channel(1);
        let token = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(ReaderState::Running);

        tokio::spawn(run_reader(transport, tx, token.clone(), state_tx));

        Ok(Self {
            rx,
            current: None,
            closer: SubscriptionCloser {
                token,
                state: state_rx,
            },
        })
    }

    /// Wait for the next event
    ///
    /// Returns `true` when an event is available through
    /// [`Subscription::event`], `false` once the subscription is closed or
    /// its connection has ended. After the first `false` every later call
    /// returns `false` too.
    pub async fn next(&mut self) -> bool {
        self.current = None;

        let received = tokio::select! {
            biased;
            _ = self.closer.token.cancelled() => None,
            event = self.rx.recv() => event,
        };

        self.current = received;
        self.current.is_some()
    }

    /// The event made available by the last successful [`Subscription::next`]
    pub fn event(&self) -> Option<&Event> {
        self.current.as_ref()
    }

    /// Take ownership of the current event
    pub fn take_event(&mut self) -> Option<Event> {
        self.current.take()
    }

    pub fn closer(&self) -> SubscriptionCloser {
        self.closer.clone()
    }

    /// See [`SubscriptionCloser::close`]
    pub async fn close(&self) -> Result<(), Arc<IpcError>> {
        self.closer.close().await
    }

    /// See [`SubscriptionCloser::terminal_error`]
    pub fn terminal_error(&self) -> Option<Arc<IpcError>> {
        self.closer.terminal_error()
    }

    /// Adapt into a `Stream` of events
    ///
    /// The stream ends where `next()` would return `false`. The terminal
    /// error is not reported; keep a [`SubscriptionCloser`] and ask it
    /// afterwards.
    pub fn into_stream(self) -> impl Stream<Item = Event> + Send {
        futures::stream::unfold(self, |mut sub| async move {
            if sub.next().await {
                sub.take_event().map(|event| (event, sub))
            } else {
                None
            }
        })
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.closer.token.cancel();
    }
}

async fn run_reader(
    mut transport: Transport,
    tx: mpsc::Sender<Event>,
    token: CancellationToken,
    state: watch::Sender<ReaderState>,
) {
    let failure = loop {
        let frame = tokio::select! {
            biased;
            _ = token.cancelled() => break None,
            frame = transport.read_frame() => frame,
        };

        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => break Some(e),
        };

        if !is_event(frame.message_type) {
            warn!(
                message_type = frame.message_type,
                "Discarding non-event frame on subscription"
            );
            continue;
        }

        let event = match decode_event(frame.message_type, &frame.payload) {
            Ok(event) => event,
            Err(e) => break Some(e),
        };

        trace!(event_type = ?event.event_type(), "Received event");

        tokio::select! {
            biased;
            _ = token.cancelled() => break None,
            sent = tx.send(event) => {
                if sent.is_err() {
                    // Subscription dropped
                    break None;
                }
            }
        }
    };

    transport.close();

    if let Some(e) = &failure {
        debug!(error = %e, "Subscription reader stopped");
    }

    // Publish before the consumer sees the channel close
    state.send_replace(ReaderState::Finished(failure.map(Arc::new)));
    drop(tx);
}
