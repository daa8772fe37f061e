//! i3wire CLI
//!
//! Talks to a running i3 or sway instance over its IPC socket and prints the
//! replies as JSON.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use i3wire::{
    discover_socket_path, ensure_success, ByteOrderCache, EventType, I3Client, MessageType,
    NodeId,
};
use i3wire_config::{Config, GlobalConfig};
use miette::{miette, Context, IntoDiagnostic};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{reload, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "i3wire")]
#[command(about = "Query and control i3 or sway over IPC")]
#[command(version)]
struct Cli {
    /// Path to configuration file [default: ~/.config/i3wire/config.kdl]
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Path to the IPC socket (skips discovery)
    #[arg(short, long, global = true)]
    socket: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run i3 commands and print one outcome per command
    Run {
        /// Command text, joined with spaces
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Print a query reply
    Get {
        #[command(subcommand)]
        target: GetTarget,
    },

    /// Print events as JSON lines until interrupted
    Subscribe {
        /// Event families (default: from config)
        events: Vec<EventType>,
    },

    /// Print the focused leaf container
    Focused,

    /// Print the parent of a container
    Parent {
        /// Container id
        id: NodeId,
    },

    /// Send a tick event
    Tick {
        /// Tick payload
        #[arg(default_value = "")]
        payload: String,
    },
}

#[derive(Subcommand, Debug, Clone)]
enum GetTarget {
    Tree,
    Workspaces,
    Outputs,
    Marks,
    BarIds,
    BarConfig {
        /// Bar id, as listed by `get bar-ids`
        id: String,
    },
    Version,
    BindingModes,
    BindingState,
    Config,
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    // Start at RUST_LOG (or warn) so config warnings are visible, then switch
    // to the configured level
    let env_filter = EnvFilter::try_from_default_env().ok();
    let has_env_filter = env_filter.is_some();
    let (filter, reload_handle) =
        reload::Layer::new(env_filter.unwrap_or_else(|| EnvFilter::new("warn")));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config_path: Option<PathBuf> = cli
        .config
        .as_deref()
        .map(|p| shellexpand::tilde(p).into_owned().into());
    let config: Config =
        i3wire_config::load_config(config_path.as_deref()).map_err(miette::Report::new)?;

    if !has_env_filter {
        reload_handle
            .reload(EnvFilter::new(config.global.log_level.as_filter()))
            .into_diagnostic()?;
    }

    let socket: Option<PathBuf> = cli
        .socket
        .as_deref()
        .map(|p| shellexpand::tilde(p).into_owned().into());
    let client = build_client(socket, &config.global).await?;
    let retries = config.global.retries;

    match cli.command {
        Commands::Run { command } => cmd_run(&client, &command.join(" ")).await,
        Commands::Get { target } => cmd_get(&client, target, retries).await,
        Commands::Subscribe { events } => {
            let events = if events.is_empty() {
                config.subscribe.events.clone()
            } else {
                events
            };
            cmd_subscribe(&client, &events).await
        }
        Commands::Focused => cmd_focused(&client, retries).await,
        Commands::Parent { id } => cmd_parent(&client, id, retries).await,
        Commands::Tick { payload } => cmd_tick(&client, &payload).await,
    }
}

async fn build_client(socket: Option<PathBuf>, global: &GlobalConfig) -> miette::Result<I3Client> {
    let cache = match global.byte_order {
        Some(setting) => ByteOrderCache::preset(setting.resolve()),
        None => ByteOrderCache::new(),
    };

    let path = match socket.or_else(|| global.socket_path.clone()) {
        Some(path) => path,
        None => discover_socket_path()
            .await
            .into_diagnostic()
            .wrap_err("Could not locate the i3 socket (set I3SOCK or pass --socket)")?,
    };

    tracing::debug!(path = %path.display(), "Using i3 socket");
    Ok(I3Client::with_byte_order_cache(path, cache))
}

fn print_json<T: Serialize>(value: &T) -> miette::Result<()> {
    let json = serde_json::to_string_pretty(value).into_diagnostic()?;
    println!("{}", json);
    Ok(())
}

/// Round trip with the configured retry budget, decoded as `T`
async fn query<T: DeserializeOwned>(
    client: &I3Client,
    message_type: MessageType,
    payload: &[u8],
    retries: u32,
) -> miette::Result<T> {
    let reply = client
        .round_trip_with_retry(message_type, payload, retries)
        .await
        .into_diagnostic()?;
    serde_json::from_slice(&reply)
        .into_diagnostic()
        .wrap_err_with(|| format!("Malformed {:?} reply", message_type))
}

async fn cmd_run(client: &I3Client, command: &str) -> miette::Result<()> {
    let outcomes = client.run_command(command).await.into_diagnostic()?;
    print_json(&outcomes)?;
    ensure_success(&outcomes).into_diagnostic()
}

async fn cmd_get(client: &I3Client, target: GetTarget, retries: u32) -> miette::Result<()> {
    match target {
        GetTarget::Tree => {
            let tree: i3wire::Tree = query(client, MessageType::GetTree, b"", retries).await?;
            print_json(&tree)
        }
        GetTarget::Workspaces => {
            let workspaces: Vec<i3wire::Workspace> =
                query(client, MessageType::GetWorkspaces, b"", retries).await?;
            print_json(&workspaces)
        }
        GetTarget::Outputs => {
            let outputs: Vec<i3wire::Output> =
                query(client, MessageType::GetOutputs, b"", retries).await?;
            print_json(&outputs)
        }
        GetTarget::Marks => {
            let marks: Vec<String> = query(client, MessageType::GetMarks, b"", retries).await?;
            print_json(&marks)
        }
        GetTarget::BarIds => {
            let ids: Vec<String> = query(client, MessageType::GetBarConfig, b"", retries).await?;
            print_json(&ids)
        }
        GetTarget::BarConfig { id } => {
            let bar: i3wire::BarConfig =
                query(client, MessageType::GetBarConfig, id.as_bytes(), retries).await?;
            print_json(&bar)
        }
        GetTarget::Version => {
            let version: i3wire::Version =
                query(client, MessageType::GetVersion, b"", retries).await?;
            print_json(&version)
        }
        GetTarget::BindingModes => {
            let modes: Vec<String> =
                query(client, MessageType::GetBindingModes, b"", retries).await?;
            print_json(&modes)
        }
        GetTarget::BindingState => {
            let state: i3wire::BindingState =
                query(client, MessageType::GetBindingState, b"", retries).await?;
            print_json(&state)
        }
        GetTarget::Config => {
            let config: i3wire::ConfigReply =
                query(client, MessageType::GetConfig, b"", retries).await?;
            print_json(&config)
        }
    }
}

async fn cmd_subscribe(client: &I3Client, events: &[EventType]) -> miette::Result<()> {
    let mut subscription = client.subscribe(events).await.into_diagnostic()?;
    tracing::info!(events = ?events, "Listening for events, press Ctrl-C to stop");

    loop {
        tokio::select! {
            more = subscription.next() => {
                if !more {
                    break;
                }
                if let Some(event) = subscription.event() {
                    println!("{}", serde_json::to_string(event).into_diagnostic()?);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, closing subscription");
                break;
            }
        }
    }

    subscription
        .close()
        .await
        .into_diagnostic()
        .wrap_err("Subscription ended with an error")
}

async fn cmd_focused(client: &I3Client, retries: u32) -> miette::Result<()> {
    let tree: i3wire::Tree = query(client, MessageType::GetTree, b"", retries).await?;
    let focused = tree
        .find_focused(|node| node.focused)
        .ok_or_else(|| miette!("No focused container"))?;
    print_json(focused)
}

async fn cmd_parent(client: &I3Client, id: NodeId, retries: u32) -> miette::Result<()> {
    let tree: i3wire::Tree = query(client, MessageType::GetTree, b"", retries).await?;
    let node = tree
        .find_child(|node| node.id == id)
        .ok_or_else(|| miette!("No container with id {}", id))?;

    match client.find_parent(node).await.into_diagnostic()? {
        Some(parent) => print_json(&parent),
        None => Err(miette!("Container {} has no parent", id)),
    }
}

async fn cmd_tick(client: &I3Client, payload: &str) -> miette::Result<()> {
    let reply = client.send_tick(payload).await.into_diagnostic()?;
    print_json(&reply)
}
