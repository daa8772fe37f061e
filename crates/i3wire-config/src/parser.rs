//! KDL configuration parser

use std::path::{Path, PathBuf};

use i3wire::EventType;

use crate::error::ConfigError;
use crate::model::*;

/// Location used when no `--config` is given
pub const DEFAULT_CONFIG_PATH: &str = "~/.config/i3wire/config.kdl";

pub fn default_config_path() -> PathBuf {
    shellexpand::tilde(DEFAULT_CONFIG_PATH).into_owned().into()
}

/// Load the configuration from `path`, or from the default location
///
/// A missing file at the default location yields the defaults. A missing
/// file that was asked for explicitly is an error.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    match path {
        Some(path) => parse_config(path),
        None => {
            let path = default_config_path();
            if !path.exists() {
                tracing::debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Config::default());
            }
            parse_config(&path)
        }
    }
}

/// Parse a configuration file from the given path
pub fn parse_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config_str(&content)
}

/// Parse configuration from a string
pub fn parse_config_str(content: &str) -> Result<Config, ConfigError> {
    let doc: kdl::KdlDocument = content.parse().map_err(|e: kdl::KdlError| {
        // kdl reports its span with its own miette version
        let offset = e.span.offset();
        let len = e.span.len();
        let span = miette::SourceSpan::from((offset, len));
        ConfigError::ParseError {
            src: content.to_string(),
            span,
            source: e,
        }
    })?;

    let mut config = Config::default();

    for node in doc.nodes() {
        match node.name().value() {
            "global" => {
                config.global = parse_global(node)?;
            }
            "subscribe" => {
                config.subscribe = parse_subscribe(node)?;
            }
            name => {
                tracing::warn!("Unknown top-level node: {}", name);
            }
        }
    }

    Ok(config)
}

fn first_string<'a>(node: &'a kdl::KdlNode, field: &str) -> Result<&'a str, ConfigError> {
    node.entries()
        .first()
        .and_then(|entry| entry.value().as_string())
        .ok_or_else(|| ConfigError::MissingValue {
            field: field.to_string(),
        })
}

fn parse_global(node: &kdl::KdlNode) -> Result<GlobalConfig, ConfigError> {
    let mut global = GlobalConfig::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "log-level" => {
                    let val = first_string(child, "log-level")?;
                    global.log_level = val
                        .parse()
                        .map_err(|e| ConfigError::Invalid { message: e })?;
                }
                "socket-path" => {
                    let val = first_string(child, "socket-path")?;
                    global.socket_path = Some(shellexpand::tilde(val).into_owned().into());
                }
                "byte-order" => {
                    let val = first_string(child, "byte-order")?;
                    global.byte_order = Some(
                        val.parse()
                            .map_err(|e| ConfigError::Invalid { message: e })?,
                    );
                }
                "retries" => {
                    let val = child
                        .entries()
                        .first()
                        .and_then(|entry| entry.value().as_i64())
                        .ok_or_else(|| ConfigError::MissingValue {
                            field: "retries".to_string(),
                        })?;
                    global.retries = u32::try_from(val).map_err(|_| ConfigError::Invalid {
                        message: format!("retries must be between 0 and {}, got {}", u32::MAX, val),
                    })?;
                }
                name => {
                    tracing::warn!("Unknown global config option: {}", name);
                }
            }
        }
    }

    Ok(global)
}

fn parse_subscribe(node: &kdl::KdlNode) -> Result<SubscribeConfig, ConfigError> {
    let mut subscribe = SubscribeConfig::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "events" => {
                    let mut events = Vec::new();
                    for entry in child.entries() {
                        let name = entry.value().as_string().ok_or_else(|| {
                            ConfigError::Invalid {
                                message: format!("event names must be strings, got {}", entry.value()),
                            }
                        })?;
                        let event: EventType = name
                            .parse()
                            .map_err(|e| ConfigError::Invalid { message: e })?;
                        if !events.contains(&event) {
                            events.push(event);
                        }
                    }
                    if events.is_empty() {
                        return Err(ConfigError::MissingValue {
                            field: "events".to_string(),
                        });
                    }
                    subscribe.events = events;
                }
                name => {
                    tracing::warn!("Unknown subscribe config option: {}", name);
                }
            }
        }
    }

    Ok(subscribe)
}
