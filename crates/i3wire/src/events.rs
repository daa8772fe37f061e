//! Event notifications and their decoder
//!
//! Event frames share the socket and framing with replies; the high bit of
//! the type field marks them and the low bits select the family.
//!
//! `change` values are an open set. Values this crate does not know decode
//! to an `Other(String)` variant that keeps the raw string, so a newer peer
//! never breaks an older client.
//!
//! Source: https://i3wm.org/docs/ipc.html#_events

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::IpcError;
use crate::message::EventType;
use crate::tree::Node;
use crate::types::{BarConfig, Binding, InputDevice};

/// High bit of the type field, set on every event frame
pub const EVENT_FLAG: u32 = 0x8000_0000;

/// Largest family code still treated as a plausible (if unknown) event
const MAX_EVENT_FAMILY: u32 = 0xFF;

/// Whether a frame type carries the event flag
pub fn is_event(message_type: u32) -> bool {
    message_type & EVENT_FLAG != 0
}

macro_rules! change_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $wire:literal),* $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum $name {
            $($variant,)*
            /// A value this crate does not know, kept verbatim
            Other(String),
        }

        impl $name {
            pub fn as_str(&self) -> &str {
                match self {
                    $($name::$variant => $wire,)*
                    $name::Other(raw) => raw.as_str(),
                }
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                match raw.as_str() {
                    $($wire => $name::$variant,)*
                    _ => $name::Other(raw),
                }
            }
        }

        impl From<$name> for String {
            fn from(change: $name) -> String {
                match change {
                    $name::Other(raw) => raw,
                    known => known.as_str().to_string(),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

change_enum! {
    WorkspaceChange {
        Focus => "focus",
        Init => "init",
        Empty => "empty",
        Urgent => "urgent",
        Rename => "rename",
        Reload => "reload",
        Restored => "restored",
        Move => "move",
    }
}

change_enum! {
    OutputChange {
        Unspecified => "unspecified",
    }
}

change_enum! {
    WindowChange {
        New => "new",
        Close => "close",
        Focus => "focus",
        Title => "title",
        FullscreenMode => "fullscreen_mode",
        Move => "move",
        Floating => "floating",
        Urgent => "urgent",
        Mark => "mark",
    }
}

change_enum! {
    BindingChange {
        Run => "run",
    }
}

change_enum! {
    /// Why the IPC is shutting down
    ShutdownReason {
        Restart => "restart",
        Exit => "exit",
    }
}

change_enum! {
    InputChange {
        Added => "added",
        Removed => "removed",
        XkbKeymap => "xkb_keymap",
        XkbLayout => "xkb_layout",
        LibinputConfig => "libinput_config",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceEvent {
    pub change: WorkspaceChange,
    #[serde(default)]
    pub current: Option<Node>,
    #[serde(default)]
    pub old: Option<Node>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputEvent {
    pub change: OutputChange,
}

/// Binding mode switch; `change` is the name of the new mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeEvent {
    pub change: String,
    #[serde(default)]
    pub pango_markup: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowEvent {
    pub change: WindowChange,
    pub container: Node,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingEvent {
    pub change: BindingChange,
    pub binding: Binding,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownEvent {
    pub change: ShutdownReason,
}

/// Tick sent by SEND_TICK, or the `first` tick every new subscriber gets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickEvent {
    #[serde(default)]
    pub first: bool,
    #[serde(default)]
    pub payload: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarStateUpdateEvent {
    pub id: String,
    pub visible_by_modifier: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputEvent {
    pub change: InputChange,
    pub input: InputDevice,
}

/// A decoded event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    Workspace(Box<WorkspaceEvent>),
    Output(OutputEvent),
    Mode(ModeEvent),
    Window(Box<WindowEvent>),
    #[serde(rename = "barconfig_update")]
    BarConfigUpdate(Box<BarConfig>),
    Binding(BindingEvent),
    Shutdown(ShutdownEvent),
    Tick(TickEvent),
    BarStateUpdate(BarStateUpdateEvent),
    Input(Box<InputEvent>),
    /// A family this crate does not know, with its raw JSON
    Unknown {
        family: u32,
        payload: serde_json::Value,
    },
}

impl Event {
    /// Family of the event, `None` for [`Event::Unknown`]
    pub fn event_type(&self) -> Option<EventType> {
        match self {
            Event::Workspace(_) => Some(EventType::Workspace),
            Event::Output(_) => Some(EventType::Output),
            Event::Mode(_) => Some(EventType::Mode),
            Event::Window(_) => Some(EventType::Window),
            Event::BarConfigUpdate(_) => Some(EventType::BarConfigUpdate),
            Event::Binding(_) => Some(EventType::Binding),
            Event::Shutdown(_) => Some(EventType::Shutdown),
            Event::Tick(_) => Some(EventType::Tick),
            Event::BarStateUpdate(_) => Some(EventType::BarStateUpdate),
            Event::Input(_) => Some(EventType::Input),
            Event::Unknown { .. } => None,
        }
    }
}

/// Decode an event frame
///
/// # Errors
///
/// Returns `IpcError::NotAnEvent` if `message_type` lacks [`EVENT_FLAG`].
/// Returns `IpcError::ImplausibleEvent` if the family code is out of range.
/// Returns `IpcError::DeserializeFailed` if the payload does not match the
/// family's shape.
pub fn decode_event(message_type: u32, payload: &[u8]) -> Result<Event, IpcError> {
    if !is_event(message_type) {
        return Err(IpcError::NotAnEvent(message_type));
    }

    let family = message_type & !EVENT_FLAG;

    let event = match EventType::try_from(family) {
        Ok(EventType::Workspace) => Event::Workspace(parse(payload)?),
        Ok(EventType::Output) => Event::Output(parse(payload)?),
        Ok(EventType::Mode) => Event::Mode(parse(payload)?),
        Ok(EventType::Window) => Event::Window(parse(payload)?),
        Ok(EventType::BarConfigUpdate) => Event::BarConfigUpdate(parse(payload)?),
        Ok(EventType::Binding) => Event::Binding(parse(payload)?),
        Ok(EventType::Shutdown) => Event::Shutdown(parse(payload)?),
        Ok(EventType::Tick) => Event::Tick(parse(payload)?),
        Ok(EventType::BarStateUpdate) => Event::BarStateUpdate(parse(payload)?),
        Ok(EventType::Input) => Event::Input(parse(payload)?),
        Err(family) if family <= MAX_EVENT_FAMILY => Event::Unknown {
            family,
            payload: parse(payload)?,
        },
        Err(_) => return Err(IpcError::ImplausibleEvent(message_type)),
    };

    Ok(event)
}

fn parse<T: DeserializeOwned>(payload: &[u8]) -> Result<T, IpcError> {
    serde_json::from_slice(payload).map_err(IpcError::DeserializeFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_decode_workspace_focus() {
        let payload = br#"{
            "change": "focus",
            "current": {"id": 2, "type": "workspace", "name": "2", "focus": []},
            "old": {"id": 1, "type": "workspace", "name": "1", "focus": []}
        }"#;

        let event = decode_event(EventType::Workspace.code(), payload).expect("valid event");
        match event {
            Event::Workspace(ws) => {
                assert_eq!(ws.change, WorkspaceChange::Focus);
                assert_eq!(ws.current.and_then(|n| n.name).as_deref(), Some("2"));
                assert_eq!(ws.old.map(|n| n.id), Some(1));
            }
            other => panic!("Expected workspace event, got: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_change_is_preserved() {
        let payload = br#"{"change": "teleport", "container": {"id": 42, "name": "xterm"}}"#;

        let event = decode_event(EventType::Window.code(), payload).expect("valid event");
        match event {
            Event::Window(window) => {
                assert_eq!(window.change, WindowChange::Other("teleport".to_string()));
                assert_eq!(window.change.as_str(), "teleport");
                assert_eq!(window.container.id, 42);
                assert_eq!(window.container.name.as_deref(), Some("xterm"));
            }
            other => panic!("Expected window event, got: {:?}", other),
        }
    }

    #[test]
    fn test_change_serializes_as_raw_string() {
        let json = serde_json::to_string(&WindowChange::FullscreenMode).expect("serializable");
        assert_eq!(json, r#""fullscreen_mode""#);

        let json = serde_json::to_string(&ShutdownReason::Other("suspend".into()))
            .expect("serializable");
        assert_eq!(json, r#""suspend""#);
    }

    #[test]
    fn test_decode_tick_and_shutdown() {
        let event = decode_event(EventType::Tick.code(), br#"{"first": true, "payload": ""}"#)
            .expect("valid tick");
        assert_eq!(
            event,
            Event::Tick(TickEvent {
                first: true,
                payload: String::new(),
            })
        );

        let event = decode_event(EventType::Shutdown.code(), br#"{"change": "restart"}"#)
            .expect("valid shutdown");
        assert_eq!(
            event,
            Event::Shutdown(ShutdownEvent {
                change: ShutdownReason::Restart,
            })
        );
    }

    #[test]
    fn test_decode_sway_events() {
        let event = decode_event(
            EventType::BarStateUpdate.code(),
            br#"{"id": "bar-0", "visible_by_modifier": true}"#,
        )
        .expect("valid event");
        assert_eq!(event.event_type(), Some(EventType::BarStateUpdate));

        let event = decode_event(
            EventType::Input.code(),
            br#"{"change": "xkb_layout", "input": {"identifier": "1:1:AT_Translated_Set_2_keyboard", "type": "keyboard", "xkb_active_layout_name": "English (US)"}}"#,
        )
        .expect("valid event");
        match event {
            Event::Input(input) => {
                assert_eq!(input.change, InputChange::XkbLayout);
                assert_eq!(input.input.input_type, "keyboard");
            }
            other => panic!("Expected input event, got: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_known_event_is_decode_error() {
        let err = decode_event(EventType::Window.code(), br#"{"change": "new"}"#)
            .expect_err("container is required");
        assert_eq!(err.kind(), ErrorKind::Decode);

        let err = decode_event(EventType::Mode.code(), b"{not json").expect_err("invalid JSON");
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn test_type_without_flag_is_protocol_error() {
        let err = decode_event(3, br#"{}"#).expect_err("no event flag");
        assert!(matches!(err, IpcError::NotAnEvent(3)));
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }

    #[test]
    fn test_unknown_family_falls_back() {
        let event = decode_event(EVENT_FLAG | 9, br#"{"change": "whatever", "n": 1}"#)
            .expect("plausible family");
        match event {
            Event::Unknown { family, payload } => {
                assert_eq!(family, 9);
                assert_eq!(payload["n"], 1);
            }
            other => panic!("Expected unknown event, got: {:?}", other),
        }
    }

    #[test]
    fn test_implausible_family_is_protocol_error() {
        let err = decode_event(EVENT_FLAG | 0x0100_0000, br#"{}"#).expect_err("implausible");
        assert!(matches!(err, IpcError::ImplausibleEvent(0x8100_0000)));
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let event = Event::Mode(ModeEvent {
            change: "resize".to_string(),
            pango_markup: false,
        });
        let json = serde_json::to_value(&event).expect("serializable");
        assert_eq!(json["event"], "mode");
        assert_eq!(json["change"], "resize");
    }
}
