//! CLI module for focusrun.
//!
//! This module provides the command-line interface:
//! - `commands`: Command definitions using clap derive
//! - `app`: Command execution against the stores and the daemon
//! - `client`: IPC client for daemon communication
//! - `display`: Output formatting and display logic

pub mod app;
pub mod client;
pub mod commands;
pub mod display;

pub use app::execute;
pub use client::{EventStream, IpcClient};
pub use commands::{Cli, Commands, MonitorArgs, MusicCommand, SessionCommand, SettingsCommand};
pub use display::Display;
