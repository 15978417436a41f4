//! Core data types for the focus session runner.
//!
//! This module defines the data structures used for:
//! - Sessions and their ordered work/break tasks
//! - User settings (idle monitoring and music preferences)
//! - Timer snapshots emitted by the execution engine
//! - IPC request/response serialization

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Constants
// ============================================================================

/// Minimum task duration in minutes
pub const MIN_TASK_MINUTES: u32 = 1;

/// Maximum task duration in minutes
pub const MAX_TASK_MINUTES: u32 = 180;

/// Minimum persisted idle threshold in seconds
pub const MIN_ACTIVITY_THRESHOLD_SECS: u64 = 60;

/// Maximum persisted idle threshold in seconds
pub const MAX_ACTIVITY_THRESHOLD_SECS: u64 = 1800;

/// Default idle threshold in seconds (5 minutes)
pub const DEFAULT_ACTIVITY_THRESHOLD_SECS: u64 = 300;

/// Default music volume
pub const DEFAULT_MUSIC_VOLUME: f32 = 0.5;

// ============================================================================
// TaskKind
// ============================================================================

/// Kind of a task block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskKind {
    /// Focused work block
    Work,
    /// Break block
    Break,
}

impl TaskKind {
    /// Returns the string representation of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Work => "work",
            TaskKind::Break => "break",
        }
    }

    /// Returns true for break blocks.
    pub fn is_break(&self) -> bool {
        matches!(self, TaskKind::Break)
    }
}

impl std::str::FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "work" | "w" => Ok(TaskKind::Work),
            "break" | "b" => Ok(TaskKind::Break),
            other => Err(format!(
                "不明なタスク種別です: '{}' (work または break を指定してください)",
                other
            )),
        }
    }
}

// ============================================================================
// Task
// ============================================================================

/// Clamps a duration to the valid task range.
pub fn clamp_task_minutes(minutes: u32) -> u32 {
    minutes.clamp(MIN_TASK_MINUTES, MAX_TASK_MINUTES)
}

/// One timed block of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Opaque unique id
    pub id: String,
    /// Display name
    pub name: String,
    /// Duration in whole minutes (1-180)
    pub duration_minutes: u32,
    /// Work or break
    #[serde(rename = "task_type")]
    pub kind: TaskKind,
}

impl Task {
    /// Creates a new task with a fresh id. The duration is clamped to 1-180 minutes.
    pub fn new(name: impl Into<String>, duration_minutes: u32, kind: TaskKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            duration_minutes: clamp_task_minutes(duration_minutes),
            kind,
        }
    }

    /// Creates a work task.
    pub fn work(name: impl Into<String>, duration_minutes: u32) -> Self {
        Self::new(name, duration_minutes, TaskKind::Work)
    }

    /// Creates a break task.
    pub fn rest(name: impl Into<String>, duration_minutes: u32) -> Self {
        Self::new(name, duration_minutes, TaskKind::Break)
    }

    /// Returns the task duration in seconds.
    ///
    /// Out-of-range durations from hand-edited documents are clamped here too,
    /// so a task never runs for zero seconds.
    pub fn duration_seconds(&self) -> u32 {
        clamp_task_minutes(self.duration_minutes) * 60
    }

    /// Returns true for break blocks.
    pub fn is_break(&self) -> bool {
        self.kind.is_break()
    }
}

// ============================================================================
// Session
// ============================================================================

/// A named, ordered sequence of tasks executed as one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque unique id
    pub id: String,
    /// Display name
    pub name: String,
    /// Tasks in execution order
    pub tasks: Vec<Task>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Creates a new session with a fresh id and the current timestamp.
    pub fn new(name: impl Into<String>, tasks: Vec<Task>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            tasks,
            created_at: Utc::now(),
        }
    }

    /// Returns true if the session can be started (has at least one task).
    pub fn is_startable(&self) -> bool {
        !self.tasks.is_empty()
    }

    /// Total duration of all tasks in seconds.
    pub fn total_seconds(&self) -> u64 {
        self.tasks.iter().map(|t| u64::from(t.duration_seconds())).sum()
    }

    /// Clamps every task duration into the valid range.
    pub fn normalize(&mut self) {
        for task in &mut self.tasks {
            task.duration_minutes = clamp_task_minutes(task.duration_minutes);
        }
    }
}

// ============================================================================
// Settings
// ============================================================================

fn default_activity_threshold() -> u64 {
    DEFAULT_ACTIVITY_THRESHOLD_SECS
}

fn default_music_volume() -> f32 {
    DEFAULT_MUSIC_VOLUME
}

/// Process-wide user settings.
///
/// Field names follow the persisted settings document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Whether idle monitoring is enabled
    #[serde(default)]
    pub activity_monitoring: bool,
    /// Idle threshold in seconds (60-1800)
    #[serde(default = "default_activity_threshold")]
    pub activity_threshold: u64,
    /// Music volume (0.0-1.0)
    #[serde(default = "default_music_volume")]
    pub music_volume: f32,
    /// Background music file
    #[serde(default)]
    pub music_file_path: Option<String>,
    /// Start music automatically when the timer runs
    #[serde(default)]
    pub music_auto_play: bool,
    /// Loop the music file
    #[serde(default)]
    pub music_loop: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            activity_monitoring: false,
            activity_threshold: DEFAULT_ACTIVITY_THRESHOLD_SECS,
            music_volume: DEFAULT_MUSIC_VOLUME,
            music_file_path: None,
            music_auto_play: false,
            music_loop: false,
        }
    }
}

impl Settings {
    /// Clamps every value into its valid range.
    pub fn normalize(&mut self) {
        self.activity_threshold = self
            .activity_threshold
            .clamp(MIN_ACTIVITY_THRESHOLD_SECS, MAX_ACTIVITY_THRESHOLD_SECS);
        self.music_volume = clamp_volume(self.music_volume);
        if self
            .music_file_path
            .as_deref()
            .is_some_and(|p| p.trim().is_empty())
        {
            self.music_file_path = None;
        }
    }

    /// Returns the music file to autoplay, if autoplay is configured.
    pub fn autoplay_track(&self) -> Option<&str> {
        if self.music_auto_play {
            self.music_file_path.as_deref()
        } else {
            None
        }
    }
}

/// Clamps a volume into 0.0-1.0, mapping NaN to 0.0.
pub fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}

// ============================================================================
// RunPhase
// ============================================================================

/// Engine run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    /// No session loaded
    #[default]
    Idle,
    /// Session loaded, never started
    Loaded,
    /// Counting down
    Running,
    /// Paused after running
    Paused,
    /// Last task completed
    Finished,
}

impl RunPhase {
    /// Returns the string representation of the phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            RunPhase::Idle => "idle",
            RunPhase::Loaded => "loaded",
            RunPhase::Running => "running",
            RunPhase::Paused => "paused",
            RunPhase::Finished => "finished",
        }
    }

    /// Returns true while a run for the loaded session is in progress.
    pub fn is_active(&self) -> bool {
        matches!(self, RunPhase::Running | RunPhase::Paused)
    }
}

// ============================================================================
// TimerSnapshot
// ============================================================================

/// Point-in-time view of the engine's run state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    /// Remaining seconds in the current task
    pub remaining_seconds: u32,
    /// Index of the current task
    pub current_task_index: usize,
    /// Whether the timer is counting down
    pub is_running: bool,
    /// Whether the current task is a break
    pub is_break: bool,
    /// Current task display name
    pub current_task_name: String,
    /// Loaded session id
    pub session_id: String,
    /// Number of tasks in the loaded session
    pub task_count: usize,
}

// ============================================================================
// Music status
// ============================================================================

/// Playback state of the background music.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MusicState {
    /// Nothing loaded
    #[default]
    Stopped,
    /// Playing
    Playing,
    /// Paused
    Paused,
}

impl MusicState {
    /// Returns the string representation of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            MusicState::Stopped => "stopped",
            MusicState::Playing => "playing",
            MusicState::Paused => "paused",
        }
    }
}

/// Snapshot of the audio controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MusicStatus {
    /// Playback state
    pub state: MusicState,
    /// Current file (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    /// Whether the current file loops
    pub loop_enabled: bool,
    /// Volume (0.0-1.0)
    pub volume: f32,
}

// ============================================================================
// IPC Types
// ============================================================================

/// IPC request from client to daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum IpcRequest {
    /// Load a session into the engine
    LoadSession {
        /// Session to load
        session: Session,
    },
    /// Start or resume the timer
    StartTimer,
    /// Pause the timer
    PauseTimer,
    /// Stop the run and unload the session
    StopTimer,
    /// Query the current timer snapshot
    GetTimerStatus,
    /// Play a music file
    PlayMusic {
        /// Path to the audio file
        file_path: String,
        /// Loop the file
        #[serde(default)]
        loop_enabled: bool,
    },
    /// Pause the music
    PauseMusic,
    /// Resume paused music
    ResumeMusic,
    /// Stop the music
    StopMusic,
    /// Query the music state
    MusicStatus,
    /// Set the music volume
    SetVolume {
        /// Volume (0.0-1.0)
        volume: f32,
    },
    /// Configure idle monitoring
    SetActivityMonitoring {
        /// Enable flag
        enabled: bool,
        /// Idle threshold in seconds
        threshold_seconds: u64,
    },
    /// Re-read settings.json into the daemon's settings cache
    ReloadSettings,
    /// Stream engine events on this connection
    Subscribe,
}

/// Response data for IPC responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseData {
    /// Engine run phase
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Timer snapshot
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timer: Option<TimerSnapshot>,
    /// Music status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub music: Option<MusicStatus>,
}

impl ResponseData {
    /// Creates response data from a run phase and an optional snapshot.
    pub fn from_timer(phase: RunPhase, timer: Option<TimerSnapshot>) -> Self {
        Self {
            state: Some(phase.as_str().to_string()),
            timer,
            music: None,
        }
    }

    /// Creates response data from a music status.
    pub fn from_music(music: MusicStatus) -> Self {
        Self {
            state: None,
            timer: None,
            music: Some(music),
        }
    }
}

/// IPC response from daemon to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcResponse {
    /// Response status ("success" or "error")
    pub status: String,
    /// Human-readable message
    pub message: String,
    /// Machine-readable error code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Optional response data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,
}

impl IpcResponse {
    /// Creates a success response.
    pub fn success(message: impl Into<String>, data: Option<ResponseData>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
            code: None,
            data,
        }
    }

    /// Creates an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            code: None,
            data: None,
        }
    }

    /// Creates an error response with a machine-readable code.
    pub fn error_with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            ..Self::error(message)
        }
    }

    /// Returns true for success responses.
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // ------------------------------------------------------------------------
    // Task Tests
    // ------------------------------------------------------------------------

    mod task_tests {
        use super::*;

        #[test]
        fn test_new_clamps_duration() {
            assert_eq!(Task::work("w", 0).duration_minutes, 1);
            assert_eq!(Task::work("w", 500).duration_minutes, 180);
            assert_eq!(Task::rest("b", 5).duration_minutes, 5);
        }

        #[test]
        fn test_duration_seconds_clamps_raw_values() {
            let mut task = Task::work("w", 25);
            task.duration_minutes = 0;
            assert_eq!(task.duration_seconds(), 60);
        }

        #[test]
        fn test_unique_ids() {
            let a = Task::work("a", 1);
            let b = Task::work("a", 1);
            assert_ne!(a.id, b.id);
        }

        #[test]
        fn test_persisted_shape() {
            let task = Task {
                id: "t1".to_string(),
                name: "Deep work".to_string(),
                duration_minutes: 25,
                kind: TaskKind::Work,
            };
            let json = serde_json::to_string(&task).unwrap();
            assert!(json.contains("\"task_type\":\"Work\""));
            assert!(json.contains("\"duration_minutes\":25"));
        }

        #[test]
        fn test_kind_from_str() {
            assert_eq!("work".parse::<TaskKind>().unwrap(), TaskKind::Work);
            assert_eq!("Break".parse::<TaskKind>().unwrap(), TaskKind::Break);
            assert!("nap".parse::<TaskKind>().is_err());
        }
    }

    // ------------------------------------------------------------------------
    // Session Tests
    // ------------------------------------------------------------------------

    mod session_tests {
        use super::*;

        #[test]
        fn test_empty_session_is_not_startable() {
            let session = Session::new("empty", vec![]);
            assert!(!session.is_startable());
        }

        #[test]
        fn test_total_seconds() {
            let session = Session::new("s", vec![Task::work("w", 25), Task::rest("b", 5)]);
            assert_eq!(session.total_seconds(), 30 * 60);
        }

        #[test]
        fn test_normalize() {
            let mut session = Session::new("s", vec![Task::work("w", 25)]);
            session.tasks[0].duration_minutes = 999;
            session.normalize();
            assert_eq!(session.tasks[0].duration_minutes, 180);
        }

        #[test]
        fn test_deserialize_stored_document() {
            let json = r#"{
                "id": "s1",
                "name": "Morning",
                "tasks": [
                    {"id": "t1", "name": "Write", "duration_minutes": 50, "task_type": "Work"},
                    {"id": "t2", "name": "Walk", "duration_minutes": 10, "task_type": "Break"}
                ],
                "created_at": "2024-05-01T08:00:00Z"
            }"#;
            let session: Session = serde_json::from_str(json).unwrap();
            assert_eq!(session.tasks.len(), 2);
            assert!(session.tasks[1].is_break());
        }
    }

    // ------------------------------------------------------------------------
    // Settings Tests
    // ------------------------------------------------------------------------

    mod settings_tests {
        use super::*;

        #[test]
        fn test_default_values() {
            let settings = Settings::default();
            assert!(!settings.activity_monitoring);
            assert_eq!(settings.activity_threshold, 300);
            assert_eq!(settings.music_volume, 0.5);
            assert!(settings.music_file_path.is_none());
            assert!(!settings.music_auto_play);
            assert!(!settings.music_loop);
        }

        #[test]
        fn test_missing_fields_use_defaults() {
            let settings: Settings = serde_json::from_str(r#"{"musicLoop":true}"#).unwrap();
            assert!(settings.music_loop);
            assert_eq!(settings.activity_threshold, 300);
            assert_eq!(settings.music_volume, 0.5);
        }

        #[test]
        fn test_camel_case_document() {
            let json = serde_json::to_string(&Settings::default()).unwrap();
            assert!(json.contains("activityMonitoring"));
            assert!(json.contains("musicAutoPlay"));
        }

        #[test]
        fn test_normalize_clamps() {
            let mut settings = Settings {
                activity_threshold: 5,
                music_volume: 3.0,
                music_file_path: Some("  ".to_string()),
                ..Settings::default()
            };
            settings.normalize();
            assert_eq!(settings.activity_threshold, 60);
            assert_eq!(settings.music_volume, 1.0);
            assert!(settings.music_file_path.is_none());

            settings.activity_threshold = 99_999;
            settings.normalize();
            assert_eq!(settings.activity_threshold, 1800);
        }

        #[test]
        fn test_autoplay_track() {
            let mut settings = Settings {
                music_file_path: Some("/tmp/rain.mp3".to_string()),
                ..Settings::default()
            };
            assert_eq!(settings.autoplay_track(), None);
            settings.music_auto_play = true;
            assert_eq!(settings.autoplay_track(), Some("/tmp/rain.mp3"));
        }

        #[test]
        fn test_clamp_volume_nan() {
            assert_eq!(clamp_volume(f32::NAN), 0.0);
            assert_eq!(clamp_volume(-1.0), 0.0);
        }
    }

    // ------------------------------------------------------------------------
    // IPC Types Tests
    // ------------------------------------------------------------------------

    mod ipc_tests {
        use super::*;

        #[test]
        fn test_simple_commands_serialize() {
            let json = serde_json::to_string(&IpcRequest::StartTimer).unwrap();
            assert_eq!(json, r#"{"command":"start_timer"}"#);

            let json = serde_json::to_string(&IpcRequest::GetTimerStatus).unwrap();
            assert_eq!(json, r#"{"command":"get_timer_status"}"#);
        }

        #[test]
        fn test_play_music_uses_camel_case_fields() {
            let request = IpcRequest::PlayMusic {
                file_path: "/tmp/a.mp3".to_string(),
                loop_enabled: true,
            };
            let json = serde_json::to_string(&request).unwrap();
            assert!(json.contains("\"command\":\"play_music\""));
            assert!(json.contains("\"filePath\":\"/tmp/a.mp3\""));
            assert!(json.contains("\"loopEnabled\":true"));
        }

        #[test]
        fn test_set_activity_monitoring_deserialize() {
            let json = r#"{"command":"set_activity_monitoring","enabled":true,"thresholdSeconds":120}"#;
            match serde_json::from_str::<IpcRequest>(json).unwrap() {
                IpcRequest::SetActivityMonitoring {
                    enabled,
                    threshold_seconds,
                } => {
                    assert!(enabled);
                    assert_eq!(threshold_seconds, 120);
                }
                other => panic!("Unexpected request: {:?}", other),
            }
        }

        #[test]
        fn test_reload_settings_tag() {
            let json = serde_json::to_string(&IpcRequest::ReloadSettings).unwrap();
            assert_eq!(json, r#"{"command":"reload_settings"}"#);
        }

        #[test]
        fn test_load_session_carries_session() {
            let session = Session::new("s", vec![Task::work("w", 1)]);
            let json = serde_json::to_string(&IpcRequest::LoadSession {
                session: session.clone(),
            })
            .unwrap();
            match serde_json::from_str::<IpcRequest>(&json).unwrap() {
                IpcRequest::LoadSession { session: loaded } => assert_eq!(loaded, session),
                other => panic!("Unexpected request: {:?}", other),
            }
        }

        #[test]
        fn test_error_response_with_code() {
            let response = IpcResponse::error_with_code("no_session_loaded", "no session");
            assert!(!response.is_success());
            assert_eq!(response.code.as_deref(), Some("no_session_loaded"));

            let json = serde_json::to_string(&response).unwrap();
            assert!(json.contains("\"code\":\"no_session_loaded\""));
        }

        #[test]
        fn test_success_response_omits_code() {
            let response = IpcResponse::success(
                "OK",
                Some(ResponseData::from_timer(RunPhase::Idle, None)),
            );
            let json = serde_json::to_string(&response).unwrap();
            assert!(!json.contains("code"));
            assert!(json.contains("\"state\":\"idle\""));
        }
    }
}
