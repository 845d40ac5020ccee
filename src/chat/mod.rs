//! Chat application module for interactive conversations over ChatWait.
//!
//! This module provides the presentation-side glue for the `chatwait-chat`
//! binary: CLI argument parsing and slash command handling. The actual
//! conversation logic lives in [`crate::controller`]; the binary only
//! appends user messages and renders whatever the controller holds.
//!
//! # Architecture
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`commands`]: Slash command parsing and handling

mod commands;
mod config;

pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig};
