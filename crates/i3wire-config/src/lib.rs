//! Configuration for the i3wire command line tool
//!
//! This crate parses the KDL configuration file (by default
//! `~/.config/i3wire/config.kdl`).

mod error;
mod model;
mod parser;

pub use error::ConfigError;
pub use model::*;
pub use parser::{
    default_config_path, load_config, parse_config, parse_config_str, DEFAULT_CONFIG_PATH,
};
