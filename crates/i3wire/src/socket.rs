//! Socket path discovery

use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::debug;

use crate::error::IpcError;

/// Environment variable i3 exports with its socket path
pub const I3SOCK_ENV: &str = "I3SOCK";

/// Environment variable sway exports with its socket path
pub const SWAYSOCK_ENV: &str = "SWAYSOCK";

/// Locate the socket of the running i3 or sway instance
///
/// Tries, in order: `$I3SOCK`, `$SWAYSOCK`, then the output of
/// `i3 --get-socketpath`. Empty variables are skipped.
///
/// # Errors
///
/// Returns `IpcError::SocketNotSet` if no source yields a path.
/// Returns `IpcError::SocketNotFound` if the path doesn't exist.
pub async fn discover_socket_path() -> Result<PathBuf, IpcError> {
    let path = match socket_path_from_env() {
        Some(path) => path,
        None => query_i3_socket_path().await.ok_or(IpcError::SocketNotSet)?,
    };

    ensure_exists(path)
}

fn socket_path_from_env() -> Option<PathBuf> {
    [I3SOCK_ENV, SWAYSOCK_ENV].into_iter().find_map(|var| {
        std::env::var_os(var)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
    })
}

async fn query_i3_socket_path() -> Option<PathBuf> {
    let output = match Command::new("i3").arg("--get-socketpath").output().await {
        Ok(output) => output,
        Err(e) => {
            debug!(error = %e, "Could not run i3 --get-socketpath");
            return None;
        }
    };

    if !output.status.success() {
        debug!(status = %output.status, "i3 --get-socketpath failed");
        return None;
    }

    let stdout = String::from_utf8(output.stdout).ok()?;
    let trimmed = stdout.trim();
    (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
}

fn ensure_exists(path: PathBuf) -> Result<PathBuf, IpcError> {
    if !Path::new(&path).exists() {
        return Err(IpcError::SocketNotFound { path });
    }
    Ok(path)
}
