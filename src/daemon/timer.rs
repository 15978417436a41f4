//! Session execution engine.
//!
//! This module provides the authoritative run state for one loaded session:
//! - State transitions (Idle → Loaded → Running ⇄ Paused → Finished)
//! - Countdown and task advancement, one tick at a time
//! - Debounced idle warnings
//! - Music decisions derived from the run state
//!
//! The engine is a plain state machine. It never blocks and never touches
//! audio or the idle monitor directly: side effects are queued as
//! [`AudioCue`]s and a pending [`MonitorConfig`], and events are queued for
//! publication. The runtime drains all three after every operation.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{debug, info, trace};

use super::error::EngineError;
use super::events::EngineEvent;
use crate::activity::{IdleReport, MonitorConfig};
use crate::types::{RunPhase, Session, Settings, TimerSnapshot};

// ============================================================================
// SettingsSource
// ============================================================================

/// Read-only access to the user settings.
///
/// The engine reads settings when a session is loaded and when the timer
/// starts. It never writes them.
pub trait SettingsSource: Send + Sync {
    /// Returns the current settings.
    fn current(&self) -> Settings;
}

/// In-memory settings, for tests and embedding.
#[derive(Debug, Default)]
pub struct FixedSettings {
    settings: Mutex<Settings>,
}

impl FixedSettings {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: Mutex::new(settings),
        }
    }

    /// Replaces the settings seen by later reads.
    pub fn set(&self, settings: Settings) {
        *self.settings.lock().unwrap_or_else(PoisonError::into_inner) = settings;
    }
}

impl SettingsSource for FixedSettings {
    fn current(&self) -> Settings {
        self.settings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

// ============================================================================
// AudioCue
// ============================================================================

/// Audio command requested by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioCue {
    /// Make the track audible (resume it if it is the paused track)
    Play {
        /// Track to play
        file_path: String,
        /// Loop flag
        loop_enabled: bool,
    },
    /// Pause playback
    Pause,
    /// Stop playback and release the track
    Stop,
    /// Apply the volume
    SetVolume(f32),
    /// Ring the bell once (task change and session finish)
    Bell,
}

// ============================================================================
// SessionEngine
// ============================================================================

/// Run state for at most one loaded session.
pub struct SessionEngine {
    settings: Arc<dyn SettingsSource>,
    phase: RunPhase,
    session: Option<Session>,
    task_index: usize,
    remaining_seconds: u32,
    /// Set once a warning was emitted for the current idle episode
    idle_warned: bool,
    last_warning_at: Option<DateTime<Utc>>,
    events: Vec<EngineEvent>,
    audio_cues: Vec<AudioCue>,
    monitor_config: Option<MonitorConfig>,
}

impl SessionEngine {
    /// Creates an idle engine.
    pub fn new(settings: Arc<dyn SettingsSource>) -> Self {
        Self {
            settings,
            phase: RunPhase::Idle,
            session: None,
            task_index: 0,
            remaining_seconds: 0,
            idle_warned: false,
            last_warning_at: None,
            events: Vec::new(),
            audio_cues: Vec::new(),
            monitor_config: None,
        }
    }

    // ------------------------------------------------------------------------
    // Control operations
    // ------------------------------------------------------------------------

    /// Loads a session, replacing any previous run.
    ///
    /// An active run is stopped first. Settings are read here: the music
    /// volume is applied and the idle monitor is reconfigured.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidSession` if the session has no tasks.
    /// The previous run state is left untouched in that case.
    pub fn load(&mut self, session: Session) -> Result<TimerSnapshot, EngineError> {
        if !session.is_startable() {
            return Err(EngineError::InvalidSession(session.name));
        }

        if self.phase.is_active() {
            self.stop();
        }
        self.reset();

        let mut session = session;
        session.normalize();
        self.remaining_seconds = session.tasks[0].duration_seconds();
        info!(
            "Session loaded: {} ({} tasks, {}s)",
            session.name,
            session.tasks.len(),
            session.total_seconds()
        );
        self.session = Some(session);
        self.phase = RunPhase::Loaded;

        let settings = self.settings.current();
        self.audio_cues.push(AudioCue::SetVolume(settings.music_volume));
        self.monitor_config = Some(MonitorConfig {
            enabled: settings.activity_monitoring,
            threshold_seconds: settings.activity_threshold,
        });

        let snapshot = self.snapshot().ok_or(EngineError::NoSessionLoaded)?;
        self.events.push(EngineEvent::TimerUpdate(snapshot.clone()));
        Ok(snapshot)
    }

    /// Starts or resumes the countdown.
    ///
    /// No-op while running and after the session finished. Starts the
    /// configured music when autoplay is on.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::NoSessionLoaded` if no session is loaded.
    pub fn start(&mut self) -> Result<(), EngineError> {
        match self.phase {
            RunPhase::Idle => return Err(EngineError::NoSessionLoaded),
            RunPhase::Running => return Ok(()),
            RunPhase::Finished => {
                debug!("Start ignored: session already finished");
                return Ok(());
            }
            RunPhase::Loaded | RunPhase::Paused => {}
        }

        let resumed = self.phase == RunPhase::Paused;
        self.phase = RunPhase::Running;
        info!(
            "Timer {} at task {} ({}s left)",
            if resumed { "resumed" } else { "started" },
            self.task_index,
            self.remaining_seconds
        );

        let settings = self.settings.current();
        if let Some(track) = settings.autoplay_track() {
            self.audio_cues.push(AudioCue::Play {
                file_path: track.to_string(),
                loop_enabled: settings.music_loop,
            });
        }

        self.emit_snapshot();
        Ok(())
    }

    /// Pauses the countdown. No-op unless running.
    pub fn pause(&mut self) {
        if self.phase != RunPhase::Running {
            return;
        }

        self.phase = RunPhase::Paused;
        info!(
            "Timer paused at task {} ({}s left)",
            self.task_index, self.remaining_seconds
        );
        self.audio_cues.push(AudioCue::Pause);
        self.emit_snapshot();
    }

    /// Discards the run and returns to Idle. No-op when idle.
    pub fn stop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        info!("Timer stopped: {} ({})", session.name, session.id);
        self.reset();
        self.audio_cues.push(AudioCue::Stop);
        self.events.push(EngineEvent::TimerStopped {
            session_id: session.id,
        });
    }

    /// Advances the countdown by one second. Ignored unless running.
    pub fn tick(&mut self) {
        if self.phase != RunPhase::Running {
            return;
        }

        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        trace!("Tick: {}s left", self.remaining_seconds);

        if self.remaining_seconds == 0 {
            self.advance();
        } else {
            self.emit_snapshot();
        }
    }

    /// Handles one idle sample.
    ///
    /// Emits at most one warning per idle episode, and only while running.
    /// The episode ends when a sample falls below its threshold.
    pub fn handle_idle_report(&mut self, report: IdleReport) {
        if !report.exceeds_threshold() {
            if self.idle_warned {
                debug!("Idle episode ended ({}s idle)", report.idle_seconds);
            }
            self.idle_warned = false;
            return;
        }

        if self.phase != RunPhase::Running || self.idle_warned {
            return;
        }

        self.idle_warned = true;
        self.last_warning_at = Some(Utc::now());
        info!(
            "Activity warning: idle {}s (threshold {}s)",
            report.idle_seconds, report.threshold_seconds
        );
        self.events.push(EngineEvent::ActivityWarning {
            idle_seconds: report.idle_seconds,
            threshold_seconds: report.threshold_seconds,
        });
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Returns the current snapshot, or `None` when no session is loaded.
    pub fn status(&self) -> Option<TimerSnapshot> {
        self.snapshot()
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// The loaded copy of the session.
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// When the last activity warning of this run was emitted.
    pub fn last_warning_at(&self) -> Option<DateTime<Utc>> {
        self.last_warning_at
    }

    // ------------------------------------------------------------------------
    // Effect queues
    // ------------------------------------------------------------------------

    /// Drains the events produced since the last call, in order.
    pub fn take_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    /// Drains the audio commands produced since the last call, in order.
    pub fn take_audio_cues(&mut self) -> Vec<AudioCue> {
        std::mem::take(&mut self.audio_cues)
    }

    /// Takes the idle monitor configuration requested by the last load.
    pub fn take_monitor_config(&mut self) -> Option<MonitorConfig> {
        self.monitor_config.take()
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn advance(&mut self) {
        let Some(session) = self.session.as_ref() else {
            return;
        };

        let next_index = self.task_index + 1;
        let previous_is_break = session
            .tasks
            .get(self.task_index)
            .is_some_and(|t| t.is_break());
        let next = session
            .tasks
            .get(next_index)
            .map(|t| (t.name.clone(), t.is_break(), t.duration_seconds()));

        match next {
            Some((name, is_break, duration_seconds)) => {
                if previous_is_break != is_break {
                    debug!(
                        "Boundary: {} -> {}",
                        if previous_is_break { "break" } else { "work" },
                        if is_break { "break" } else { "work" }
                    );
                }
                info!("Task {}: {}", next_index, name);

                self.remaining_seconds = duration_seconds;
                self.task_index = next_index;
                self.events.push(EngineEvent::TaskChanged {
                    index: next_index,
                    name,
                    is_break,
                });
                self.audio_cues.push(AudioCue::Bell);
                self.emit_snapshot();
            }
            None => {
                let session_id = session.id.clone();
                info!("Session finished: {}", session.name);

                self.phase = RunPhase::Finished;
                self.remaining_seconds = 0;
                self.emit_snapshot();
                self.events.push(EngineEvent::SessionFinished { session_id });
                self.audio_cues.push(AudioCue::Stop);
                self.audio_cues.push(AudioCue::Bell);
            }
        }
    }

    fn reset(&mut self) {
        self.phase = RunPhase::Idle;
        self.session = None;
        self.task_index = 0;
        self.remaining_seconds = 0;
        self.idle_warned = false;
        self.last_warning_at = None;
    }

    fn snapshot(&self) -> Option<TimerSnapshot> {
        let session = self.session.as_ref()?;
        let task = session.tasks.get(self.task_index)?;
        Some(TimerSnapshot {
            remaining_seconds: self.remaining_seconds,
            current_task_index: self.task_index,
            is_running: self.phase == RunPhase::Running,
            is_break: task.is_break(),
            current_task_name: task.name.clone(),
            session_id: session.id.clone(),
            task_count: session.tasks.len(),
        })
    }

    fn emit_snapshot(&mut self) {
        if let Some(snapshot) = self.snapshot() {
            self.events.push(EngineEvent::TimerUpdate(snapshot));
        }
    }
}

impl std::fmt::Debug for SessionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionEngine")
            .field("phase", &self.phase)
            .field("task_index", &self.task_index)
            .field("remaining_seconds", &self.remaining_seconds)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
