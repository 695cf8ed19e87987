//! Command-line interface module.
//!
//! This module provides the CLI structure and command handlers for the cirrus binary.

mod commands;
mod handlers;

pub use commands::{Cli, Commands};
pub use handlers::{fetch, print_config, put, remove, url};
