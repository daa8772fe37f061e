//! Layout tree returned by GET_TREE, and navigation over it
//!
//! Nodes own their children by value and keep no parent reference. Finding a
//! parent is a search for the node whose `focus` list names the child, see
//! [`Node::parent_of`] and `I3Client::find_parent`.
//!
//! Source: https://i3wm.org/docs/ipc.html#_tree_reply

use serde::{Deserialize, Deserializer, Serialize};

/// Container id as assigned by i3
pub type NodeId = i64;

/// Whole layout snapshot, rooted at the `root` container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tree {
    pub root: Node,
}

impl Tree {
    pub fn find_child<P>(&self, predicate: P) -> Option<&Node>
    where
        P: FnMut(&Node) -> bool,
    {
        self.root.find_child(predicate)
    }

    pub fn find_focused<P>(&self, predicate: P) -> Option<&Node>
    where
        P: FnMut(&Node) -> bool,
    {
        self.root.find_focused(predicate)
    }

    pub fn parent_of(&self, id: NodeId) -> Option<&Node> {
        self.root.parent_of(id)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    #[serde(rename = "root")]
    Root,
    #[serde(rename = "output")]
    Output,
    #[default]
    #[serde(rename = "con")]
    Con,
    #[serde(rename = "floating_con")]
    FloatingCon,
    #[serde(rename = "workspace")]
    Workspace,
    #[serde(rename = "dockarea")]
    DockArea,
    #[serde(other, rename = "unknown")]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    #[default]
    SplitH,
    SplitV,
    Stacked,
    Tabbed,
    DockArea,
    Output,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    None,
    Horizontal,
    Vertical,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Border {
    #[default]
    Normal,
    None,
    Pixel,
    /// sway's client-side decorations
    Csd,
    #[serde(other)]
    Unknown,
}

/// Floating state of a container
///
/// Only these four strings are valid. Anything else in a tree reply is
/// recorded as an absent state rather than failing the whole decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FloatingState {
    AutoOff,
    AutoOn,
    UserOff,
    UserOn,
}

impl FloatingState {
    /// Exact match against the wire strings
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "auto_off" => Some(FloatingState::AutoOff),
            "auto_on" => Some(FloatingState::AutoOn),
            "user_off" => Some(FloatingState::UserOff),
            "user_on" => Some(FloatingState::UserOn),
            _ => None,
        }
    }

    pub fn is_on(self) -> bool {
        matches!(self, FloatingState::AutoOn | FloatingState::UserOn)
    }
}

/// Whether a raw floating-state string is one of the two "on" values
///
/// No prefix or suffix matching: `"user_on "` and `"_on"` are both false.
pub fn is_floating_state(s: &str) -> bool {
    FloatingState::from_wire(s).is_some_and(FloatingState::is_on)
}

fn lenient_floating<'de, D>(deserializer: D) -> Result<Option<FloatingState>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .and_then(FloatingState::from_wire))
}

/// X11 properties of the window inside a container
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowProperties {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub instance: Option<String>,
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub window_role: Option<String>,
    #[serde(default)]
    pub transient_for: Option<i64>,
}

/// One container in the layout tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub node_type: NodeType,
    #[serde(default)]
    pub border: Border,
    #[serde(default)]
    pub current_border_width: Option<i64>,
    #[serde(default)]
    pub layout: Layout,
    #[serde(default)]
    pub orientation: Orientation,
    #[serde(default)]
    pub percent: Option<f64>,
    #[serde(default)]
    pub rect: Rect,
    #[serde(default)]
    pub window_rect: Rect,
    #[serde(default)]
    pub deco_rect: Rect,
    #[serde(default)]
    pub geometry: Rect,
    /// X11 window id, if the container holds a window
    #[serde(default)]
    pub window: Option<i64>,
    #[serde(default)]
    pub window_properties: Option<WindowProperties>,
    #[serde(default)]
    pub window_type: Option<String>,
    #[serde(default)]
    pub urgent: bool,
    #[serde(default)]
    pub marks: Vec<String>,
    #[serde(default)]
    pub focused: bool,
    /// Ids of the direct children, most recently focused first
    #[serde(default)]
    pub focus: Vec<NodeId>,
    #[serde(default)]
    pub fullscreen_mode: Option<i64>,
    #[serde(default)]
    pub sticky: bool,
    #[serde(default, deserialize_with = "lenient_floating")]
    pub floating: Option<FloatingState>,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub floating_nodes: Vec<Node>,
    /// Wayland app id (sway only)
    #[serde(default)]
    pub app_id: Option<String>,
    /// Client process id (sway only)
    #[serde(default)]
    pub pid: Option<i64>,
}

impl Node {
    /// Direct children: tiling first, then floating
    pub fn children(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().chain(self.floating_nodes.iter())
    }

    /// First node, in depth-first pre-order, that satisfies `predicate`
    ///
    /// Visits the node itself, then `nodes`, then `floating_nodes`.
    pub fn find_child<P>(&self, mut predicate: P) -> Option<&Node>
    where
        P: FnMut(&Node) -> bool,
    {
        let mut stack = vec![self];

        while let Some(node) = stack.pop() {
            if predicate(node) {
                return Some(node);
            }
            // Reversed so the first tiling child is popped next
            stack.extend(node.floating_nodes.iter().rev());
            stack.extend(node.nodes.iter().rev());
        }

        None
    }

    /// First node on the focus path that satisfies `predicate`
    ///
    /// Descends only into the head of each `focus` list, so nodes off the
    /// focus path are never considered even when they match.
    pub fn find_focused<P>(&self, mut predicate: P) -> Option<&Node>
    where
        P: FnMut(&Node) -> bool,
    {
        let mut node = self;

        loop {
            if predicate(node) {
                return Some(node);
            }
            let head = node.focus.first()?;
            node = node.children().find(|child| child.id == *head)?;
        }
    }

    /// The node whose `focus` list contains `id`
    ///
    /// O(tree size).
    pub fn parent_of(&self, id: NodeId) -> Option<&Node> {
        self.find_child(|node| node.focus.contains(&id))
    }

    /// True iff the floating state is `auto_on` or `user_on`
    pub fn is_floating(&self) -> bool {
        self.floating.is_some_and(FloatingState::is_on)
    }
}
