//! focusrun library
//!
//! This library provides the core functionality behind the `focusrun` CLI.
//! It includes:
//! - Session execution engine and its single-consumer runtime
//! - Idle monitoring over platform idle-time sources
//! - Background music playback and the task-change bell
//! - Desktop notifications for task changes, session finish and idle warnings
//! - JSON stores for sessions and settings
//! - IPC server/client for daemon-CLI communication
//! - CLI command parsing and display utilities

pub mod activity;
pub mod cli;
pub mod daemon;
pub mod notification;
pub mod sound;
pub mod store;
pub mod types;

// Re-export commonly used types for convenience
pub use types::{
    IpcRequest, IpcResponse, MusicState, MusicStatus, ResponseData, RunPhase, Session, Settings,
    Task, TaskKind, TimerSnapshot,
};

// Re-export engine types
pub use daemon::{
    spawn_runtime, EngineError, EngineEvent, EngineHandle, RuntimeParts, SessionEngine,
    SettingsSource, StatusView,
};

// Re-export collaborator types
pub use activity::{IdleError, IdleMonitor, IdleSource, MockIdleSource, SystemIdleSource};
pub use notification::{DesktopNotifier, MockNotifier, Notifier};
pub use sound::{AudioController, AudioOutput, MockAudioOutput, SoundError};
pub use store::{AppPaths, SessionStore, SettingsCache, SettingsStore, StoreError};
