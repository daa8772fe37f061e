//! Configuration data model

use std::path::PathBuf;

use i3wire::{ByteOrder, EventType};

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub global: GlobalConfig,
    pub subscribe: SubscribeConfig,
}

/// Global settings
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalConfig {
    pub log_level: LogLevel,
    /// Explicit socket path; discovery is used when unset
    pub socket_path: Option<PathBuf>,
    /// Fixed byte order; detection is used when unset
    pub byte_order: Option<ByteOrderSetting>,
    /// Retry budget for round trips
    pub retries: u32,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            socket_path: None,
            byte_order: None,
            retries: i3wire::DEFAULT_MAX_RETRIES,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive for `tracing_subscriber::EnvFilter`
    pub fn as_filter(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(format!("Unknown log level: {}", s)),
        }
    }
}

/// `byte-order` setting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrderSetting {
    Little,
    Big,
    /// Whatever this machine uses
    Native,
}

impl ByteOrderSetting {
    pub fn resolve(self) -> ByteOrder {
        match self {
            Self::Little => ByteOrder::Little,
            Self::Big => ByteOrder::Big,
            Self::Native => ByteOrder::native(),
        }
    }
}

impl std::str::FromStr for ByteOrderSetting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "little" | "le" => Ok(Self::Little),
            "big" | "be" => Ok(Self::Big),
            "native" => Ok(Self::Native),
            _ => Err(format!("Unknown byte order: {} (expected little, big or native)", s)),
        }
    }
}

/// Defaults for `i3wire subscribe`
#[derive(Debug, Clone, PartialEq)]
pub struct SubscribeConfig {
    pub events: Vec<EventType>,
}

impl Default for SubscribeConfig {
    fn default() -> Self {
        Self {
            events: vec![EventType::Workspace, EventType::Window],
        }
    }
}
