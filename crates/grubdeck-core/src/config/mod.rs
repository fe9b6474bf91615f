//! Configuration module wiring for GrubDeck.
//!
//! Keeps config types and on-disk loading in separate files.

mod config_io;
mod config_types;

pub use config_io::{ConfigError, DEFAULT_CONFIG_PATH};
pub use config_types::*;
