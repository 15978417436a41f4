//! Display utilities for the focusrun CLI.
//!
//! This module provides formatted output for:
//! - Timer status and command results
//! - Saved sessions
//! - Music and settings
//! - Streamed events
//! - Error messages

use crate::daemon::EngineEvent;
use crate::types::{IpcResponse, MusicState, MusicStatus, Session, Settings, TimerSnapshot};

// ============================================================================
// Display
// ============================================================================

/// Display utilities for CLI output.
pub struct Display;

impl Display {
    // ------------------------------------------------------------------------
    // Timer
    // ------------------------------------------------------------------------

    /// Shows the result of a timer command followed by the timer state.
    pub fn show_timer_result(response: &IpcResponse) {
        if !response.message.is_empty() {
            println!("* {}", response.message);
        }
        if let Some(timer) = response.data.as_ref().and_then(|d| d.timer.as_ref()) {
            println!("  {}", Self::format_timer_line(timer));
        }
    }

    /// Shows the current timer status.
    pub fn show_status(response: &IpcResponse) {
        println!("focusrun ステータス");
        println!("─────────────────────────────");

        let Some(data) = &response.data else {
            println!("タイマーは起動していません");
            return;
        };

        let state = data.state.as_deref().unwrap_or("unknown");
        println!("状態: {}", Self::phase_label(state));

        match &data.timer {
            Some(timer) => {
                println!(
                    "タスク: {} ({}/{}){}",
                    timer.current_task_name,
                    timer.current_task_index + 1,
                    timer.task_count,
                    if timer.is_break { " [休憩]" } else { "" }
                );
                let (minutes, seconds) = Self::format_time(timer.remaining_seconds);
                println!("残り時間: {}:{:02}", minutes, seconds);
                println!("セッション: {}", timer.session_id);
            }
            None => println!("セッションは読み込まれていません"),
        }
    }

    /// Returns the label for an engine phase.
    pub fn phase_label(state: &str) -> &str {
        match state {
            "idle" => "待機中",
            "loaded" => "準備完了",
            "running" => "実行中",
            "paused" => "一時停止中",
            "finished" => "完了",
            other => other,
        }
    }

    /// Formats one line summarizing a snapshot.
    pub fn format_timer_line(timer: &TimerSnapshot) -> String {
        let (minutes, seconds) = Self::format_time(timer.remaining_seconds);
        let marker = if timer.is_running { ">" } else { "||" };
        format!(
            "{} {} ({}/{}) 残り {}:{:02}",
            marker,
            timer.current_task_name,
            timer.current_task_index + 1,
            timer.task_count,
            minutes,
            seconds
        )
    }

    // ------------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------------

    /// Formats a streamed event for `watch`.
    pub fn format_event(event: &EngineEvent) -> String {
        match event {
            EngineEvent::TimerUpdate(timer) => Self::format_timer_line(timer),
            EngineEvent::TaskChanged {
                index,
                name,
                is_break,
            } => {
                let kind = if *is_break { "休憩" } else { "作業" };
                format!("-> 次のタスク #{}: {} [{}]", index + 1, name, kind)
            }
            EngineEvent::SessionFinished { .. } => "* セッションが完了しました".to_string(),
            EngineEvent::TimerStopped { .. } => "[] タイマーが停止されました".to_string(),
            EngineEvent::ActivityWarning {
                idle_seconds,
                threshold_seconds,
            } => format!(
                "! {}秒間操作がありません (しきい値 {}秒)",
                idle_seconds, threshold_seconds
            ),
            EngineEvent::AudioFailed { message } => format!("! 音楽を再生できません: {}", message),
        }
    }

    // ------------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------------

    /// Shows saved sessions, one per line.
    pub fn show_session_list(sessions: &[Session]) {
        if sessions.is_empty() {
            println!("保存されたセッションはありません");
            println!("  'focusrun session add' で作成できます");
            return;
        }

        for session in sessions {
            let total_minutes = session.total_seconds() / 60;
            println!(
                "{}  {}  ({}タスク, {}分)",
                Self::short_id(&session.id),
                session.name,
                session.tasks.len(),
                total_minutes
            );
        }
    }

    /// Shows one session with its tasks.
    pub fn show_session(session: &Session) {
        println!("{}", session.name);
        println!("─────────────────────────────");
        println!("ID: {}", session.id);
        println!("作成日時: {}", session.created_at.format("%Y-%m-%d %H:%M"));
        for (index, task) in session.tasks.iter().enumerate() {
            let kind = if task.is_break() { "休憩" } else { "作業" };
            println!(
                "  {}. [{}] {} - {}分",
                index + 1,
                kind,
                task.name,
                task.duration_minutes
            );
        }
        println!("合計: {}分", session.total_seconds() / 60);
    }

    /// Shows a message after a session was saved.
    pub fn show_session_saved(message: &str, session: &Session) {
        println!("* {}", message);
        println!("  {}  {}", Self::short_id(&session.id), session.name);
    }

    /// Returns the first 8 characters of an id.
    pub fn short_id(id: &str) -> &str {
        id.char_indices().nth(8).map_or(id, |(end, _)| &id[..end])
    }

    // ------------------------------------------------------------------------
    // Music / Settings
    // ------------------------------------------------------------------------

    /// Shows the result of a music command.
    pub fn show_music_result(response: &IpcResponse) {
        if !response.message.is_empty() {
            println!("* {}", response.message);
        }
        if let Some(music) = response.data.as_ref().and_then(|d| d.music.as_ref()) {
            Self::show_music_status(music);
        }
    }

    /// Shows the music state.
    pub fn show_music_status(music: &MusicStatus) {
        let state = match music.state {
            MusicState::Playing => "再生中",
            MusicState::Paused => "一時停止中",
            MusicState::Stopped => "停止中",
        };
        println!("  状態: {}", state);
        if let Some(path) = &music.file_path {
            println!(
                "  ファイル: {}{}",
                path,
                if music.loop_enabled { " (ループ)" } else { "" }
            );
        }
        println!("  音量: {}%", Self::volume_percent(music.volume));
    }

    /// Shows the current settings.
    pub fn show_settings(settings: &Settings) {
        println!("設定");
        println!("─────────────────────────────");
        println!(
            "アイドル監視: {}",
            if settings.activity_monitoring { "有効" } else { "無効" }
        );
        println!("アイドルしきい値: {}秒", settings.activity_threshold);
        println!("音量: {}%", Self::volume_percent(settings.music_volume));
        println!(
            "音楽ファイル: {}",
            settings.music_file_path.as_deref().unwrap_or("(未設定)")
        );
        println!(
            "自動再生: {}",
            if settings.music_auto_play { "有効" } else { "無効" }
        );
        println!("ループ: {}", if settings.music_loop { "有効" } else { "無効" });
    }

    /// Shows a one-line success message.
    pub fn show_success(message: &str) {
        println!("* {}", message);
    }

    /// Shows a warning that did not abort the command.
    pub fn show_warning(message: &str) {
        eprintln!("注意: {}", message);
    }

    /// Shows an error message.
    pub fn show_error(message: &str) {
        eprintln!("エラー: {}", message);
    }

    /// Formats remaining seconds as (minutes, seconds).
    fn format_time(total_seconds: u32) -> (u32, u32) {
        let minutes = total_seconds / 60;
        let seconds = total_seconds % 60;
        (minutes, seconds)
    }

    pub fn volume_percent(volume: f32) -> u32 {
        (volume.clamp(0.0, 1.0) * 100.0).round() as u32
    }
}

// ============================================================================
// Tests
// ============================================================================
