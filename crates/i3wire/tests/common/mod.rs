//! In-process stand-in for an i3 IPC socket
//!
//! The peer listens on a Unix socket in a temp dir and speaks i3 frames in a
//! fixed byte order. Frames whose type is not a known request (which is what
//! a mis-ordered header looks like) are dropped without a reply, as i3 does.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use bytes::BytesMut;
use i3wire::codec::{encode_frame, Header, HEADER_LEN};
use i3wire::{ByteOrder, ByteOrderCache, EventType, I3Client, MessageType};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::task::JoinHandle;

/// What the peer does in response to one request
#[derive(Debug, Clone)]
pub enum Action {
    /// Write a frame with this type and payload
    Send(u32, Vec<u8>),
    /// Write raw bytes as they are
    Raw(Vec<u8>),
    /// Close the connection
    Close,
}

pub fn reply(message_type: MessageType, body: Value) -> Action {
    Action::Send(message_type.reply_code(), body.to_string().into_bytes())
}

pub fn event(event_type: EventType, body: Value) -> Action {
    Action::Send(event_type.code(), body.to_string().into_bytes())
}

pub fn subscribe_ack() -> Action {
    reply(MessageType::Subscribe, json!({ "success": true }))
}

type Handler = dyn Fn(MessageType, &[u8]) -> Vec<Action> + Send + Sync;

pub struct MockPeer {
    _dir: TempDir,
    path: PathBuf,
    order: ByteOrder,
    connections: Arc<AtomicUsize>,
    acceptor: JoinHandle<()>,
}

impl MockPeer {
    /// Start a peer that answers every request with `handler`
    pub fn start<H>(order: ByteOrder, handler: H) -> Result<Self>
    where
        H: Fn(MessageType, &[u8]) -> Vec<Action> + Send + Sync + 'static,
    {
        let dir = tempfile::tempdir().context("Failed to create temp dir")?;
        let path = dir.path().join("ipc.sock");
        let listener = UnixListener::bind(&path).context("Failed to bind mock socket")?;

        let connections = Arc::new(AtomicUsize::new(0));
        let handler: Arc<Handler> = Arc::new(handler);

        let counter = Arc::clone(&connections);
        let acceptor = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let handler = Arc::clone(&handler);
                tokio::spawn(async move {
                    // Clients hang up whenever they like
                    let _ = serve(stream, order, handler).await;
                });
            }
        });

        Ok(Self {
            _dir: dir,
            path,
            order,
            connections,
            acceptor,
        })
    }

    /// Start a peer that answers like a freshly started i3
    pub fn with_defaults(order: ByteOrder) -> Result<Self> {
        Self::start(order, default_actions)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn order(&self) -> ByteOrder {
        self.order
    }

    /// Number of connections accepted so far
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Client that already knows the peer's byte order
    pub fn client(&self) -> I3Client {
        I3Client::with_byte_order_cache(&self.path, ByteOrderCache::preset(self.order))
    }
}

impl Drop for MockPeer {
    fn drop(&mut self) {
        self.acceptor.abort();
    }
}

async fn serve(mut stream: UnixStream, order: ByteOrder, handler: Arc<Handler>) -> Result<()> {
    loop {
        let mut header_buf = [0u8; HEADER_LEN];
        if stream.read_exact(&mut header_buf).await.is_err() {
            return Ok(());
        }

        let header = Header::parse(order, &header_buf)?;
        let mut payload = vec![0u8; header.payload_len as usize];
        stream.read_exact(&mut payload).await?;

        let Ok(message_type) = MessageType::try_from(header.message_type) else {
            continue;
        };

        for action in handler(message_type, &payload) {
            match action {
                Action::Send(message_type, body) => {
                    let mut buf = BytesMut::new();
                    encode_frame(order, message_type, &body, &mut buf)?;
                    stream.write_all(&buf).await?;
                }
                Action::Raw(bytes) => stream.write_all(&bytes).await?,
                Action::Close => return Ok(()),
            }
        }
    }
}

/// Layout used by the default GET_TREE reply
///
/// ```text
/// root(1) focus [10]
/// └── output "screen" (10) focus [100]
///     └── workspace "1" (100) focus [1001, 1000, 1002]
///         ├── con "a" (1000)
///         ├── con "b" (1001) focused
///         └── floating_con (1002, user_on)
///             └── con "dialog" (1003)
/// ```
pub fn tree_json() -> Value {
    json!({
        "id": 1,
        "type": "root",
        "name": "root",
        "layout": "splith",
        "floating": "auto_off",
        "focus": [10],
        "nodes": [{
            "id": 10,
            "type": "output",
            "name": "screen",
            "layout": "output",
            "focus": [100],
            "nodes": [{
                "id": 100,
                "type": "workspace",
                "name": "1",
                "layout": "splith",
                "focus": [1001, 1000, 1002],
                "nodes": [
                    {
                        "id": 1000,
                        "type": "con",
                        "name": "a",
                        "window": 4194307,
                        "window_properties": {"class": "XTerm", "instance": "xterm", "title": "a"},
                        "floating": "auto_off",
                        "focus": [],
                        "nodes": [],
                        "floating_nodes": []
                    },
                    {
                        "id": 1001,
                        "type": "con",
                        "name": "b",
                        "focused": true,
                        "window": 4194308,
                        "floating": "auto_off",
                        "marks": ["foo"],
                        "focus": [],
                        "nodes": [],
                        "floating_nodes": []
                    }
                ],
                "floating_nodes": [{
                    "id": 1002,
                    "type": "floating_con",
                    "floating": "user_on",
                    "focus": [1003],
                    "nodes": [{
                        "id": 1003,
                        "type": "con",
                        "name": "dialog",
                        "floating": "user_on",
                        "focus": [],
                        "nodes": [],
                        "floating_nodes": []
                    }],
                    "floating_nodes": []
                }]
            }],
            "floating_nodes": []
        }],
        "floating_nodes": []
    })
}

/// Replies of an i3 4.23 instance with one workspace and one bar
pub fn default_actions(message_type: MessageType, payload: &[u8]) -> Vec<Action> {
    let text = String::from_utf8_lossy(payload);

    let body = match message_type {
        MessageType::RunCommand => return run_command_actions(text.trim()),
        MessageType::Subscribe => return vec![subscribe_ack()],
        MessageType::GetWorkspaces => json!([{
            "id": 100,
            "num": 1,
            "name": "1",
            "visible": true,
            "focused": true,
            "urgent": false,
            "rect": {"x": 0, "y": 0, "width": 1280, "height": 800},
            "output": "screen"
        }]),
        MessageType::GetOutputs => json!([
            {"name": "xroot-0", "active": false, "primary": false, "current_workspace": null,
             "rect": {"x": 0, "y": 0, "width": 1280, "height": 800}},
            {"name": "screen", "active": true, "primary": false, "current_workspace": "1",
             "rect": {"x": 0, "y": 0, "width": 1280, "height": 800}}
        ]),
        MessageType::GetTree => tree_json(),
        MessageType::GetMarks => json!(["foo"]),
        MessageType::GetBarConfig if text.is_empty() => json!(["bar-0"]),
        MessageType::GetBarConfig => json!({
            "id": text,
            "mode": "dock",
            "position": "bottom",
            "status_command": "i3status",
            "font": "fixed",
            "workspace_buttons": true,
            "binding_mode_indicator": true,
            "verbose": false,
            "colors": {"background": "#000000", "statusline": "#ffffff"}
        }),
        MessageType::GetVersion => json!({
            "major": 4,
            "minor": 23,
            "patch": 0,
            "human_readable": "4.23 (2023-10-29)",
            "loaded_config_file_name": "/etc/i3/config"
        }),
        MessageType::GetBindingModes => json!(["default", "resize"]),
        MessageType::GetConfig => json!({
            "config": "bindsym Mod1+Return exec xterm\n",
            "included_configs": [{
                "path": "/etc/i3/config",
                "raw_contents": "bindsym Mod1+Return exec xterm\n",
                "variable_replaced_contents": "bindsym Mod1+Return exec xterm\n"
            }]
        }),
        MessageType::SendTick => json!({ "success": true }),
        MessageType::Sync => json!({ "success": true }),
        MessageType::GetBindingState => json!({ "name": "default" }),
    };

    vec![reply(message_type, body)]
}

fn run_command_actions(command: &str) -> Vec<Action> {
    if command == "restart" {
        return vec![Action::Close];
    }

    let outcomes: Vec<Value> = command
        .split(';')
        .map(str::trim)
        .map(|cmd| {
            if cmd.starts_with("nop") || cmd.starts_with("workspace") || cmd.starts_with("mark") {
                json!({ "success": true })
            } else {
                json!({
                    "success": false,
                    "parse_error": true,
                    "error": format!(
                        "Expected one of these tokens: <end>, '[', 'move', 'exec', 'exit', \
                         'restart', 'reload', 'workspace', got '{}'",
                        cmd
                    )
                })
            }
        })
        .collect();

    vec![reply(MessageType::RunCommand, Value::Array(outcomes))]
}

/// Fail the test if `cond` does not hold within `ms` milliseconds
pub async fn eventually<F: Fn() -> bool>(ms: u64, cond: F) -> Result<()> {
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_millis(ms);
    while !cond() {
        if tokio::time::Instant::now() > deadline {
            bail!("condition not met within {}ms", ms);
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    Ok(())
}
