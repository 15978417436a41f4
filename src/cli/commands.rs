//! Command definitions for the focusrun CLI.
//!
//! Uses clap derive macro for argument parsing.

use clap::{ArgGroup, Args, Parser, Subcommand};

use crate::types::{
    Task, TaskKind, MAX_ACTIVITY_THRESHOLD_SECS, MAX_TASK_MINUTES, MIN_ACTIVITY_THRESHOLD_SECS,
    MIN_TASK_MINUTES,
};

/// Maximum session name length in characters.
const MAX_NAME_CHARS: usize = 100;

// ============================================================================
// CLI Structure
// ============================================================================

/// focusrun - sequential focus sessions with music and idle detection
#[derive(Parser, Debug)]
#[command(
    name = "focusrun",
    version,
    about = "作業と休憩のタスク列を順に実行するフォーカスタイマー",
    long_about = "作業・休憩タスクを並べたセッションを順番に実行するタイマー。\n\
                  バックグラウンド音楽の再生とアイドル検出に対応しています。",
    propagate_version = true
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

// ============================================================================
// Subcommands
// ============================================================================

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Manage saved sessions
    Session {
        #[command(subcommand)]
        command: SessionCommand,
    },

    /// Load a saved session into the daemon
    Load {
        /// Session id (a unique prefix is enough)
        id: String,
    },

    /// Start or resume the loaded session
    Start,

    /// Pause the running session
    Pause,

    /// Stop the run and unload the session
    Stop,

    /// Show current timer status
    Status,

    /// Stream timer events until interrupted
    Watch,

    /// Control background music
    Music {
        #[command(subcommand)]
        command: MusicCommand,
    },

    /// Configure idle monitoring (saved; applied to a running daemon)
    Monitor(MonitorArgs),

    /// Show or change settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },

    /// Run the daemon in the foreground
    Daemon,

    /// Generate shell completion scripts
    Completions {
        /// Shell type for completion script
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

// ============================================================================
// Session Commands
// ============================================================================

/// Session store subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum SessionCommand {
    /// Create a session
    Add(SessionAddArgs),

    /// List saved sessions
    List,

    /// Show one session with its tasks
    Show {
        /// Session id (a unique prefix is enough)
        id: String,
    },

    /// Rename a session
    Rename {
        /// Session id (a unique prefix is enough)
        id: String,
        /// New name
        #[arg(value_parser = validate_session_name)]
        name: String,
    },

    /// Delete a session
    Delete {
        /// Session id (a unique prefix is enough)
        id: String,
    },
}

/// Arguments for `session add`
#[derive(Args, Debug, Clone)]
pub struct SessionAddArgs {
    /// Session name
    #[arg(short, long, value_parser = validate_session_name)]
    pub name: String,

    /// Task as KIND:MINUTES[:NAME], e.g. work:25:"Deep work" or break:5 (repeatable)
    #[arg(short, long = "task", value_name = "TASK", required = true, value_parser = parse_task_arg)]
    pub tasks: Vec<Task>,
}

// ============================================================================
// Music Commands
// ============================================================================

/// Music subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum MusicCommand {
    /// Play a file (defaults to the configured music file)
    Play {
        /// Audio file path
        path: Option<String>,
        /// Loop the file (defaults to the configured loop setting)
        #[arg(short, long = "loop")]
        loop_enabled: bool,
    },

    /// Pause playback
    Pause,

    /// Resume paused playback
    Resume,

    /// Stop playback
    Stop,

    /// Show playback state
    Status,

    /// Set the volume (0.0-1.0) and save it
    Volume {
        /// Volume between 0.0 and 1.0
        #[arg(value_parser = parse_volume)]
        volume: f32,
    },
}

// ============================================================================
// Monitor / Settings Commands
// ============================================================================

/// Arguments for `monitor`
#[derive(Args, Debug, Clone)]
#[command(group(ArgGroup::new("mode").required(true).args(["enable", "disable"])))]
pub struct MonitorArgs {
    /// Enable idle monitoring
    #[arg(long)]
    pub enable: bool,

    /// Disable idle monitoring
    #[arg(long)]
    pub disable: bool,

    /// Idle threshold in seconds (60-1800)
    #[arg(
        short,
        long,
        value_parser = clap::value_parser!(u64).range(MIN_ACTIVITY_THRESHOLD_SECS..=MAX_ACTIVITY_THRESHOLD_SECS)
    )]
    pub threshold: Option<u64>,
}

/// Settings subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum SettingsCommand {
    /// Print the current settings
    Show,

    /// Change one or more settings
    Set(SettingsSetArgs),
}

/// Arguments for `settings set`
#[derive(Args, Debug, Clone, Default)]
pub struct SettingsSetArgs {
    /// Enable idle monitoring (true/false)
    #[arg(long, value_name = "BOOL")]
    pub activity_monitoring: Option<bool>,

    /// Idle threshold in seconds (60-1800)
    #[arg(
        long,
        value_name = "SECS",
        value_parser = clap::value_parser!(u64).range(MIN_ACTIVITY_THRESHOLD_SECS..=MAX_ACTIVITY_THRESHOLD_SECS)
    )]
    pub activity_threshold: Option<u64>,

    /// Music volume (0.0-1.0)
    #[arg(long, value_name = "V", value_parser = parse_volume)]
    pub music_volume: Option<f32>,

    /// Background music file
    #[arg(long, value_name = "PATH", conflicts_with = "clear_music_file")]
    pub music_file: Option<String>,

    /// Forget the background music file
    #[arg(long)]
    pub clear_music_file: bool,

    /// Start music automatically with the timer (true/false)
    #[arg(long, value_name = "BOOL")]
    pub music_auto_play: Option<bool>,

    /// Loop the music file (true/false)
    #[arg(long, value_name = "BOOL")]
    pub music_loop: Option<bool>,
}

impl SettingsSetArgs {
    /// Returns true when no option was given.
    pub fn is_empty(&self) -> bool {
        self.activity_monitoring.is_none()
            && self.activity_threshold.is_none()
            && self.music_volume.is_none()
            && self.music_file.is_none()
            && !self.clear_music_file
            && self.music_auto_play.is_none()
            && self.music_loop.is_none()
    }
}

// ============================================================================
// Validation Functions
// ============================================================================

/// Validates a session name.
///
/// - Must not be blank
/// - Must not exceed 100 characters
fn validate_session_name(s: &str) -> Result<String, String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err("セッション名は空にできません".to_string());
    }
    if trimmed.chars().count() > MAX_NAME_CHARS {
        return Err(format!(
            "セッション名は{}文字以内にしてください",
            MAX_NAME_CHARS
        ));
    }
    Ok(trimmed.to_string())
}

/// Parses `KIND:MINUTES[:NAME]` into a task.
///
/// Without a name the task is called after its kind.
fn parse_task_arg(s: &str) -> Result<Task, String> {
    let mut parts = s.splitn(3, ':');
    let kind: TaskKind = parts.next().unwrap_or_default().trim().parse()?;

    let minutes_raw = parts
        .next()
        .ok_or_else(|| format!("タスクの時間がありません: '{}' (例: work:25:執筆)", s))?;
    let minutes: u32 = minutes_raw
        .trim()
        .parse()
        .map_err(|_| format!("タスクの時間が数値ではありません: '{}'", minutes_raw))?;
    if !(MIN_TASK_MINUTES..=MAX_TASK_MINUTES).contains(&minutes) {
        return Err(format!(
            "タスクの時間は{}〜{}分で指定してください",
            MIN_TASK_MINUTES, MAX_TASK_MINUTES
        ));
    }

    let name = match parts.next().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => default_task_name(kind).to_string(),
    };

    Ok(Task::new(name, minutes, kind))
}

fn default_task_name(kind: TaskKind) -> &'static str {
    match kind {
        TaskKind::Work => "作業",
        TaskKind::Break => "休憩",
    }
}

/// Parses a volume between 0.0 and 1.0.
fn parse_volume(s: &str) -> Result<f32, String> {
    let volume: f32 = s
        .trim()
        .parse()
        .map_err(|_| format!("音量が数値ではありません: '{}'", s))?;
    if !(0.0..=1.0).contains(&volume) {
        return Err("音量は0.0〜1.0で指定してください".to_string());
    }
    Ok(volume)
}

// ============================================================================
// Tests
// ============================================================================
