//! Message and event type codes
//!
//! Source: https://i3wm.org/docs/ipc.html#_sending_messages_to_i3 and
//! https://man.archlinux.org/man/sway-ipc.7#MESSAGES_AND_REPLIES

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::events::EVENT_FLAG;

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum MessageType {
    /// Runs the payload as i3 commands.
    RunCommand = 0,
    /// Get the list of current workspaces.
    GetWorkspaces = 1,
    /// Subscribe the IPC connection to the events listed in the payload.
    Subscribe = 2,
    /// Get the list of current outputs.
    GetOutputs = 3,
    /// Get the node layout tree.
    GetTree = 4,
    /// Get the names of all the marks currently set.
    GetMarks = 5,
    /// Get the specified bar config or a list of bar config names.
    GetBarConfig = 6,
    /// Get the version of i3 that owns the IPC socket.
    GetVersion = 7,
    /// Get the list of binding mode names.
    GetBindingModes = 8,
    /// Returns the config that was last loaded.
    GetConfig = 9,
    /// Sends a tick event with the specified payload.
    SendTick = 10,
    /// Sends an X11 ClientMessage once i3 processed everything before it.
    Sync = 11,
    /// Request the currently active binding mode.
    GetBindingState = 12,
}

impl MessageType {
    /// Wire code of the request
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Wire code of the reply that answers this request
    ///
    /// i3 numbers its replies like the requests they answer.
    pub fn reply_code(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for MessageType {
    type Error = u32;

    fn try_from(n: u32) -> Result<MessageType, Self::Error> {
        match n {
            0 => Ok(MessageType::RunCommand),
            1 => Ok(MessageType::GetWorkspaces),
            2 => Ok(MessageType::Subscribe),
            3 => Ok(MessageType::GetOutputs),
            4 => Ok(MessageType::GetTree),
            5 => Ok(MessageType::GetMarks),
            6 => Ok(MessageType::GetBarConfig),
            7 => Ok(MessageType::GetVersion),
            8 => Ok(MessageType::GetBindingModes),
            9 => Ok(MessageType::GetConfig),
            10 => Ok(MessageType::SendTick),
            11 => Ok(MessageType::Sync),
            12 => Ok(MessageType::GetBindingState),
            v => Err(v),
        }
    }
}

/// Event families a connection can subscribe to
///
/// Source: https://i3wm.org/docs/ipc.html#_events
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Sent whenever an event involving a workspace occurs such as
    /// initialization of a new workspace or a different workspace gains
    /// focus
    Workspace = 0,
    /// Sent when RandR issues a change notification
    Output = 1,
    /// Sent whenever the binding mode changes
    Mode = 2,
    /// Sent whenever an event involving a window occurs such as being
    /// reparented, focused, or closed
    Window = 3,
    /// Sent whenever a bar config changes
    #[serde(rename = "barconfig_update")]
    BarConfigUpdate = 4,
    /// Sent when a configured binding is executed
    Binding = 5,
    /// Sent when the ipc shuts down because i3 is restarting or exiting
    Shutdown = 6,
    /// Sent when an ipc client sends a SEND_TICK message
    Tick = 7,
    /// Sent when the visibility of a bar should change due to a modifier
    /// (sway only)
    BarStateUpdate = 20,
    /// Sent when something related to input devices changes (sway only)
    Input = 21,
}

impl EventType {
    pub const ALL: [EventType; 10] = [
        EventType::Workspace,
        EventType::Output,
        EventType::Mode,
        EventType::Window,
        EventType::BarConfigUpdate,
        EventType::Binding,
        EventType::Shutdown,
        EventType::Tick,
        EventType::BarStateUpdate,
        EventType::Input,
    ];

    /// Name used in the subscribe payload
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Workspace => "workspace",
            EventType::Output => "output",
            EventType::Mode => "mode",
            EventType::Window => "window",
            EventType::BarConfigUpdate => "barconfig_update",
            EventType::Binding => "binding",
            EventType::Shutdown => "shutdown",
            EventType::Tick => "tick",
            EventType::BarStateUpdate => "bar_state_update",
            EventType::Input => "input",
        }
    }

    /// Full wire type of an event frame of this family
    pub fn code(self) -> u32 {
        EVENT_FLAG | self as u32
    }
}

impl TryFrom<u32> for EventType {
    type Error = u32;

    /// Converts the family code (the type field without the event flag)
    fn try_from(n: u32) -> Result<EventType, Self::Error> {
        match n {
            0 => Ok(EventType::Workspace),
            1 => Ok(EventType::Output),
            2 => Ok(EventType::Mode),
            3 => Ok(EventType::Window),
            4 => Ok(EventType::BarConfigUpdate),
            5 => Ok(EventType::Binding),
            6 => Ok(EventType::Shutdown),
            7 => Ok(EventType::Tick),
            20 => Ok(EventType::BarStateUpdate),
            21 => Ok(EventType::Input),
            v => Err(v),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.to_lowercase().replace('-', "_");
        EventType::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| format!("Unknown event type: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_codes_round_trip() {
        for code in 0..=12 {
            let message = MessageType::try_from(code).expect("known code");
            assert_eq!(message.code(), code);
            assert_eq!(message.reply_code(), code);
        }
        assert_eq!(MessageType::try_from(13), Err(13));
    }

    #[test]
    fn test_subscribe_payload_names() {
        let payload = serde_json::to_string(&[EventType::Window, EventType::BarConfigUpdate])
            .expect("serializable");
        assert_eq!(payload, r#"["window","barconfig_update"]"#);
    }

    #[test]
    fn test_event_type_from_str() {
        assert_eq!("window".parse::<EventType>(), Ok(EventType::Window));
        assert_eq!("Bar-State-Update".parse::<EventType>(), Ok(EventType::BarStateUpdate));
        assert!("focus".parse::<EventType>().is_err());
    }

    #[test]
    fn test_event_codes_carry_flag() {
        assert_eq!(EventType::Workspace.code(), 0x8000_0000);
        assert_eq!(EventType::Input.code(), 0x8000_0015);
        assert_eq!(EventType::try_from(7), Ok(EventType::Tick));
    }
}
