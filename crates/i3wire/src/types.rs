//! Reply records for the typed requests
//!
//! Fields the peer may omit (older i3 releases, sway) default instead of
//! failing the decode.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::tree::Rect;

/// Outcome of one command in a RUN_COMMAND payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub success: bool,
    /// Set when the command did not parse
    #[serde(default)]
    pub parse_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    #[serde(default)]
    pub id: i64,
    pub num: i64,
    pub name: String,
    #[serde(default)]
    pub visible: bool,
    #[serde(default)]
    pub focused: bool,
    #[serde(default)]
    pub urgent: bool,
    #[serde(default)]
    pub rect: Rect,
    #[serde(default)]
    pub output: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    pub name: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub current_workspace: Option<String>,
    #[serde(default)]
    pub rect: Rect,
}

/// Configuration of one i3bar instance
///
/// Also the payload of the `barconfig_update` event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarConfig {
    pub id: String,
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub hidden_state: Option<String>,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub status_command: Option<String>,
    #[serde(default)]
    pub font: String,
    #[serde(default)]
    pub workspace_buttons: bool,
    #[serde(default)]
    pub binding_mode_indicator: bool,
    #[serde(default)]
    pub verbose: bool,
    /// Color name (`background`, `focused_workspace_text`, ...) to `#rrggbb`
    #[serde(default)]
    pub colors: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub major: i64,
    pub minor: i64,
    #[serde(default)]
    pub patch: i64,
    #[serde(default)]
    pub human_readable: String,
    #[serde(default)]
    pub loaded_config_file_name: String,
}

impl Version {
    /// Whether this version is `major.minor` or newer
    pub fn at_least(&self, major: i64, minor: i64) -> bool {
        (self.major, self.minor) >= (major, minor)
    }
}

/// Binding that triggered a `binding` event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub command: String,
    #[serde(default)]
    pub event_state_mask: Vec<String>,
    #[serde(default)]
    pub input_code: i64,
    #[serde(default)]
    pub symbol: Option<String>,
    /// `keyboard` or `mouse`
    #[serde(default)]
    pub input_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingState {
    pub name: String,
}

/// One file read while loading the configuration (i3 4.20+)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncludedConfig {
    pub path: String,
    #[serde(default)]
    pub raw_contents: String,
    #[serde(default)]
    pub variable_replaced_contents: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigReply {
    pub config: String,
    #[serde(default)]
    pub included_configs: Vec<IncludedConfig>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReply {
    pub success: bool,
}

/// Parameters of a SYNC request
///
/// i3 answers by sending a ClientMessage with `random` to `window`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRequest {
    pub window: u32,
    pub random: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReply {
    pub success: bool,
}

/// Input device as reported in sway's `input` event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputDevice {
    pub identifier: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub vendor: i64,
    #[serde(default)]
    pub product: i64,
    #[serde(rename = "type", default)]
    pub input_type: String,
    #[serde(default)]
    pub xkb_active_layout_name: Option<String>,
    #[serde(default)]
    pub xkb_layout_names: Vec<String>,
    #[serde(default)]
    pub xkb_active_layout_index: Option<i64>,
    #[serde(default)]
    pub scroll_factor: Option<f64>,
    /// Backend-specific settings, kept as raw JSON
    #[serde(default)]
    pub libinput: Option<serde_json::Value>,
}
