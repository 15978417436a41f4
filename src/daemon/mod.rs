//! Daemon module for focusrun.
//!
//! This module contains the core daemon functionality:
//! - `timer`: Session execution engine (state machine)
//! - `runtime`: Single-consumer task driving the engine
//! - `events`: Engine events and subscriptions
//! - `ticker`: 1 Hz tick source
//! - `ipc`: Unix socket server and request handling
//! - `server`: Daemon bootstrap and accept loop

mod error;
pub mod events;
pub mod ipc;
pub mod runtime;
pub mod server;
pub mod ticker;
pub mod timer;

pub use error::EngineError;
pub use events::{EngineEvent, EventBus, Subscription};
pub use ipc::{IpcError, IpcServer, RequestHandler};
pub use runtime::{spawn_runtime, EngineHandle, RuntimeParts, StatusView};
pub use server::{run_daemon, serve};
pub use ticker::{Ticker, TICK_PERIOD};
pub use timer::{AudioCue, FixedSettings, SessionEngine, SettingsSource};
