//! i3wire: client for the i3 / sway IPC protocol
//!
//! This crate talks to a running i3 (or sway) instance over its Unix domain
//! socket. It provides:
//! - One-shot request/reply round trips (`I3Client::round_trip`)
//! - Long-lived event subscriptions (`I3Client::subscribe`)
//! - Typed wrappers for the documented requests (`I3Client::get_tree`, ...)
//! - Navigation helpers over the layout tree (`Node::find_focused`, ...)
//!
//! ## Architecture
//!
//! - `Transport`: one framed socket connection (`codec` + `byte_order`)
//! - `I3Client`: dials a fresh `Transport` for every round trip and shares a
//!   `ByteOrderCache` across clones
//! - `Subscription`: a dedicated `Transport` drained by a background reader task
//! - `IpcError`: every failure, classified by `ErrorKind`
//!
//! ## Protocol
//!
//! Every message is a frame: the magic string `i3-ipc`, a 4-byte payload
//! length, a 4-byte message type and a JSON payload. The integers use the
//! peer's native byte order, which is not announced and is detected on the
//! first dial. Event frames set the high bit of the type field.

mod byte_order;
mod client;
pub mod codec;
mod commands;
mod error;
mod events;
mod message;
mod socket;
mod subscription;
mod transport;
mod tree;
mod types;

pub use byte_order::{detect_byte_order, ByteOrder, ByteOrderCache, PROBE_PAYLOAD_LEN};
pub use client::{I3Client, DEFAULT_MAX_RETRIES};
pub use codec::Frame;
pub use commands::ensure_success;
pub use error::{CommandFailure, ErrorKind, IpcError};
pub use events::{
    decode_event, is_event, BarStateUpdateEvent, BindingChange, BindingEvent, Event,
    InputChange, InputEvent, ModeEvent, OutputChange, OutputEvent, ShutdownEvent,
    ShutdownReason, TickEvent, WindowChange, WindowEvent, WorkspaceChange, WorkspaceEvent,
    EVENT_FLAG,
};
pub use message::{EventType, MessageType};
pub use socket::{discover_socket_path, I3SOCK_ENV, SWAYSOCK_ENV};
pub use subscription::{Subscription, SubscriptionCloser};
pub use transport::Transport;
pub use tree::{
    is_floating_state, Border, FloatingState, Layout, Node, NodeId, NodeType, Orientation,
    Rect, Tree, WindowProperties,
};
pub use types::{
    BarConfig, Binding, BindingState, CommandOutcome, ConfigReply, IncludedConfig, InputDevice,
    Output, SyncReply, SyncRequest, TickReply, Version, Workspace,
};
