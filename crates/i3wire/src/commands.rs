//! Typed requests
//!
//! Each method is a round trip plus a serde decode of the reply. Replies
//! with `success: false` are returned as data, not as errors; use
//! [`ensure_success`] where a failed command should abort.

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::client::I3Client;
use crate::error::{CommandFailure, IpcError};
use crate::message::MessageType;
use crate::tree::{Node, Tree};
use crate::types::{
    BarConfig, BindingState, CommandOutcome, ConfigReply, Output, SyncReply, SyncRequest,
    TickReply, Version, Workspace,
};

/// Collect the failed outcomes of a RUN_COMMAND reply
///
/// # Errors
///
/// Returns a `CommandFailure` listing the error of every outcome with
/// `success: false`, in request order.
pub fn ensure_success(outcomes: &[CommandOutcome]) -> Result<(), CommandFailure> {
    let errors: Vec<String> = outcomes
        .iter()
        .filter(|outcome| !outcome.success)
        .map(|outcome| {
            outcome
                .error
                .clone()
                .unwrap_or_else(|| "command failed without an error message".to_string())
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(CommandFailure { errors })
    }
}

impl I3Client {
    async fn request<T: DeserializeOwned>(
        &self,
        message_type: MessageType,
        payload: &[u8],
    ) -> Result<T, IpcError> {
        let reply = self.round_trip(message_type, payload).await?;
        serde_json::from_slice(&reply).map_err(IpcError::DeserializeFailed)
    }

    /// Run one or more i3 commands (separated by `;` or `,`)
    ///
    /// Returns one outcome per command. A command i3 could not parse or run
    /// is reported in its outcome, not as an `Err`.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let outcomes = client.run_command("workspace 2; mark foo").await?;
    /// ensure_success(&outcomes)?;
    /// ```
    pub async fn run_command(&self, command: &str) -> Result<Vec<CommandOutcome>, IpcError> {
        debug!(command = command, "Running i3 command");
        self.request(MessageType::RunCommand, command.as_bytes()).await
    }

    pub async fn get_tree(&self) -> Result<Tree, IpcError> {
        self.request(MessageType::GetTree, b"").await
    }

    pub async fn get_workspaces(&self) -> Result<Vec<Workspace>, IpcError> {
        self.request(MessageType::GetWorkspaces, b"").await
    }

    pub async fn get_outputs(&self) -> Result<Vec<Output>, IpcError> {
        self.request(MessageType::GetOutputs, b"").await
    }

    /// Names of all marks currently set
    pub async fn get_marks(&self) -> Result<Vec<String>, IpcError> {
        self.request(MessageType::GetMarks, b"").await
    }

    /// Ids of all configured bars
    pub async fn get_bar_ids(&self) -> Result<Vec<String>, IpcError> {
        self.request(MessageType::GetBarConfig, b"").await
    }

    pub async fn get_bar_config(&self, id: &str) -> Result<BarConfig, IpcError> {
        self.request(MessageType::GetBarConfig, id.as_bytes()).await
    }

    pub async fn get_version(&self) -> Result<Version, IpcError> {
        self.request(MessageType::GetVersion, b"").await
    }

    /// Fail unless the peer is `major.minor` or newer
    ///
    /// # Errors
    ///
    /// Returns `IpcError::VersionTooOld` if the peer is older, or any error
    /// from `get_version`.
    pub async fn at_least(&self, major: i64, minor: i64) -> Result<(), IpcError> {
        let version = self.get_version().await?;
        if version.at_least(major, minor) {
            return Ok(());
        }

        let found = if version.human_readable.is_empty() {
            format!("{}.{}.{}", version.major, version.minor, version.patch)
        } else {
            version.human_readable
        };
        Err(IpcError::VersionTooOld {
            found,
            major,
            minor,
        })
    }

    /// Names of all configured binding modes (i3 4.13+)
    pub async fn get_binding_modes(&self) -> Result<Vec<String>, IpcError> {
        self.request(MessageType::GetBindingModes, b"").await
    }

    /// The active binding mode (i3 4.19+)
    pub async fn get_binding_state(&self) -> Result<BindingState, IpcError> {
        self.request(MessageType::GetBindingState, b"").await
    }

    /// The configuration i3 has loaded (i3 4.14+)
    pub async fn get_config(&self) -> Result<ConfigReply, IpcError> {
        self.request(MessageType::GetConfig, b"").await
    }

    /// Broadcast a tick event carrying `payload` to every tick subscriber
    pub async fn send_tick(&self, payload: &str) -> Result<TickReply, IpcError> {
        self.request(MessageType::SendTick, payload.as_bytes()).await
    }

    pub async fn sync(&self, request: SyncRequest) -> Result<SyncReply, IpcError> {
        let payload = serde_json::to_vec(&request).map_err(IpcError::SerializeFailed)?;
        self.request(MessageType::Sync, &payload).await
    }

    /// Restart i3 in place
    ///
    /// i3 may close the connection before (or instead of) answering; that
    /// counts as success. Every open subscription ends with the restart.
    ///
    /// # Errors
    ///
    /// Returns `IpcError::CommandFailed` if i3 refused the command.
    pub async fn restart(&self) -> Result<(), IpcError> {
        let reply = match self.round_trip(MessageType::RunCommand, b"restart").await {
            Ok(reply) => reply,
            Err(IpcError::ConnectionClosed) | Err(IpcError::ReceiveFailed(_)) => {
                debug!("i3 closed the connection while restarting");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        if reply.is_empty() {
            return Ok(());
        }

        let outcomes: Vec<CommandOutcome> =
            serde_json::from_slice(&reply).map_err(IpcError::DeserializeFailed)?;
        ensure_success(&outcomes)?;
        Ok(())
    }

    /// Parent of `node` in a freshly fetched tree
    ///
    /// Fetches the whole tree and searches for the node whose `focus` list
    /// contains `node.id`. The layout may have changed since `node` was
    /// fetched, so the answer can be `None` or describe a newer layout.
    pub async fn find_parent(&self, node: &Node) -> Result<Option<Node>, IpcError> {
        let tree = self.get_tree().await?;
        Ok(tree.parent_of(node.id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(success: bool, error: Option<&str>) -> CommandOutcome {
        CommandOutcome {
            success,
            parse_error: false,
            error: error.map(str::to_string),
        }
    }

    #[test]
    fn test_ensure_success_passes_all_ok() {
        let outcomes = vec![outcome(true, None), outcome(true, None)];
        assert!(ensure_success(&outcomes).is_ok());
        assert!(ensure_success(&[]).is_ok());
    }

    #[test]
    fn test_ensure_success_collects_failures_in_order() {
        let outcomes = vec![
            outcome(false, Some("No such mark")),
            outcome(true, None),
            outcome(false, Some("Expected one of these tokens: <end>")),
        ];

        let failure = ensure_success(&outcomes).expect_err("two commands failed");
        assert_eq!(
            failure.errors,
            vec![
                "No such mark".to_string(),
                "Expected one of these tokens: <end>".to_string()
            ]
        );
        assert!(failure.to_string().starts_with("2 command(s) failed"));
    }

    #[test]
    fn test_ensure_success_without_message() {
        let failure = ensure_success(&[outcome(false, None)]).expect_err("failed");
        assert_eq!(failure.errors.len(), 1);
    }
}
