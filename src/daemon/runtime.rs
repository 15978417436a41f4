//! Engine runtime: the single task that owns the [`SessionEngine`].
//!
//! Control commands, idle reports and ticks all arrive at one `select!`
//! loop, so they are applied strictly one at a time. Commands are polled
//! first: once `stop` is acknowledged, no tick or idle report for the
//! discarded run can be processed.
//!
//! After every step the runtime:
//! 1. publishes the new status on a `watch` channel (consistent reads)
//! 2. forwards queued audio cues to the audio dispatcher
//! 3. applies a requested idle monitor configuration
//! 4. publishes queued events on the [`EventBus`]
//!
//! ```text
//!   EngineHandle ──commands──┐
//!   IdleMonitor ───reports───┼──▶ runtime loop ──▶ watch<StatusView>
//!   Ticker ─────────ticks────┘         │      ──▶ EventBus
//!                                      └──cues──▶ audio dispatcher ──▶ AudioController
//! ```
//!
//! Desktop notifications are not wired here; the daemon attaches a
//! notifier as one more [`EventBus`] subscriber.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, info, warn};

use super::error::EngineError;
use super::events::{EngineEvent, EventBus, Subscription};
use super::ticker::{Ticker, TICK_PERIOD};
use super::timer::{AudioCue, SessionEngine};
use crate::activity::{IdleMonitor, IdleReport};
use crate::sound::{AudioController, SoundError};
use crate::types::{RunPhase, Session, TimerSnapshot};

/// Capacity of the control command queue.
const COMMAND_QUEUE_SIZE: usize = 32;

// ============================================================================
// StatusView
// ============================================================================

/// Run phase and snapshot, published together.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusView {
    /// Engine run phase
    pub phase: RunPhase,
    /// Current snapshot (None when idle)
    pub timer: Option<TimerSnapshot>,
}

// ============================================================================
// Commands
// ============================================================================

type Reply = oneshot::Sender<Result<StatusView, EngineError>>;

enum Command {
    Load { session: Session, reply: Reply },
    Start { reply: Reply },
    Pause { reply: Reply },
    Stop { reply: Reply },
}

// ============================================================================
// EngineHandle
// ============================================================================

/// Cloneable handle used to control and observe the engine.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<StatusView>,
    bus: EventBus,
}

impl EngineHandle {
    /// Loads a session (stopping any active run first).
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidSession` for a session without tasks.
    pub async fn load_session(&self, session: Session) -> Result<StatusView, EngineError> {
        self.request(|reply| Command::Load { session, reply }).await
    }

    /// Starts or resumes the timer.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::NoSessionLoaded` if no session is loaded.
    pub async fn start_timer(&self) -> Result<StatusView, EngineError> {
        self.request(|reply| Command::Start { reply }).await
    }

    /// Pauses the timer. No-op unless running.
    pub async fn pause_timer(&self) -> Result<StatusView, EngineError> {
        self.request(|reply| Command::Pause { reply }).await
    }

    /// Stops the run and unloads the session.
    pub async fn stop_timer(&self) -> Result<StatusView, EngineError> {
        self.request(|reply| Command::Stop { reply }).await
    }

    /// Returns the latest published status without waiting on the engine.
    pub fn status(&self) -> StatusView {
        self.status.borrow().clone()
    }

    pub fn phase(&self) -> RunPhase {
        self.status.borrow().phase
    }

    /// Subscribes to engine events.
    pub fn subscribe(&self) -> Subscription {
        self.bus.subscribe()
    }

    /// Returns the event bus shared with the runtime.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    async fn request<F>(&self, build: F) -> Result<StatusView, EngineError>
    where
        F: FnOnce(Reply) -> Command,
    {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| EngineError::EngineUnavailable)?;
        response.await.map_err(|_| EngineError::EngineUnavailable)?
    }
}

// ============================================================================
// EngineRuntime
// ============================================================================

/// Collaborators wired into the runtime.
pub struct RuntimeParts {
    /// Audio controller driven by engine cues
    pub audio: Arc<AudioController>,
    /// Idle monitor reconfigured from settings on load
    pub monitor: Arc<IdleMonitor>,
    /// Reports produced by the idle monitor
    pub idle_reports: mpsc::Receiver<IdleReport>,
    /// Tick period (1 s in production)
    pub tick_period: Duration,
}

impl RuntimeParts {
    /// Wires the collaborators with the default tick period.
    pub fn new(
        audio: Arc<AudioController>,
        monitor: Arc<IdleMonitor>,
        idle_reports: mpsc::Receiver<IdleReport>,
    ) -> Self {
        Self {
            audio,
            monitor,
            idle_reports,
            tick_period: TICK_PERIOD,
        }
    }
}

struct EngineRuntime {
    engine: SessionEngine,
    commands: mpsc::Receiver<Command>,
    idle_reports: mpsc::Receiver<IdleReport>,
    ticker: Ticker,
    status: watch::Sender<StatusView>,
    bus: EventBus,
    audio_cues: mpsc::UnboundedSender<AudioCue>,
    monitor: Arc<IdleMonitor>,
}

/// Spawns the runtime and the audio dispatcher.
///
/// The runtime exits once every [`EngineHandle`] has been dropped.
pub fn spawn_runtime(engine: SessionEngine, parts: RuntimeParts) -> (EngineHandle, JoinHandle<()>) {
    let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_SIZE);
    let (status_tx, status_rx) = watch::channel(StatusView::default());
    let bus = EventBus::new();
    let audio_cues = spawn_audio_dispatcher(parts.audio, bus.clone());

    let runtime = EngineRuntime {
        engine,
        commands: command_rx,
        idle_reports: parts.idle_reports,
        ticker: Ticker::new(parts.tick_period),
        status: status_tx,
        bus: bus.clone(),
        audio_cues,
        monitor: parts.monitor,
    };
    let task = tokio::spawn(runtime.run());

    let handle = EngineHandle {
        commands: command_tx,
        status: status_rx,
        bus,
    };
    (handle, task)
}

impl EngineRuntime {
    async fn run(mut self) {
        info!("Engine runtime started");
        self.publish();
        let mut idle_open = true;

        loop {
            let running = self.engine.phase() == RunPhase::Running;

            tokio::select! {
                biased;

                command = self.commands.recv() => {
                    let Some(command) = command else {
                        break;
                    };
                    self.apply(command);
                }

                report = self.idle_reports.recv(), if idle_open => {
                    match report {
                        Some(report) => self.engine.handle_idle_report(report),
                        None => {
                            debug!("Idle report channel closed");
                            idle_open = false;
                        }
                    }
                    self.publish();
                }

                _ = self.ticker.tick(), if running => {
                    self.engine.tick();
                    self.publish();
                }
            }
        }

        info!("Engine runtime stopped");
    }

    fn apply(&mut self, command: Command) {
        let was_running = self.engine.phase() == RunPhase::Running;

        let (result, reply) = match command {
            Command::Load { session, reply } => (self.engine.load(session).map(|_| ()), reply),
            Command::Start { reply } => (self.engine.start(), reply),
            Command::Pause { reply } => {
                self.engine.pause();
                (Ok(()), reply)
            }
            Command::Stop { reply } => {
                self.engine.stop();
                (Ok(()), reply)
            }
        };

        if !was_running && self.engine.phase() == RunPhase::Running {
            self.ticker.reset();
        }

        let view = self.publish();
        let _ = reply.send(result.map(|()| view));
    }

    /// Flushes everything the engine queued and returns the published status.
    fn publish(&mut self) -> StatusView {
        let view = StatusView {
            phase: self.engine.phase(),
            timer: self.engine.status(),
        };
        self.status.send_replace(view.clone());

        for cue in self.engine.take_audio_cues() {
            if self.audio_cues.send(cue).is_err() {
                warn!("Audio dispatcher is not running");
            }
        }

        if let Some(config) = self.engine.take_monitor_config() {
            self.monitor
                .configure(config.enabled, config.threshold_seconds);
        }

        for event in self.engine.take_events() {
            self.bus.publish(&event);
        }

        view
    }
}

// ============================================================================
// Audio dispatcher
// ============================================================================

/// Applies engine cues to the controller one at a time, off the runtime task.
///
/// Failures are logged and published as `audio-failed`; they never reach
/// the engine.
fn spawn_audio_dispatcher(
    controller: Arc<AudioController>,
    bus: EventBus,
) -> mpsc::UnboundedSender<AudioCue> {
    let (tx, mut rx) = mpsc::unbounded_channel::<AudioCue>();

    tokio::spawn(async move {
        while let Some(cue) = rx.recv().await {
            let is_bell = cue == AudioCue::Bell;
            let controller = Arc::clone(&controller);
            let result = tokio::task::spawn_blocking(move || apply_cue(&controller, cue)).await;

            match result {
                Ok(Ok(())) => {}
                // A missing bell is not worth an event; music failures are.
                Ok(Err(e)) if is_bell => debug!("Bell skipped: {}", e),
                Ok(Err(e)) => {
                    warn!("Audio command failed: {} ({})", e, e.suggestion());
                    bus.publish(&EngineEvent::AudioFailed {
                        message: e.to_string(),
                    });
                }
                Err(e) => warn!("Audio task failed: {}", e),
            }
        }
        debug!("Audio dispatcher stopped");
    });

    tx
}

fn apply_cue(controller: &AudioController, cue: AudioCue) -> Result<(), SoundError> {
    match cue {
        AudioCue::Play {
            file_path,
            loop_enabled,
        } => controller.ensure_playing(&file_path, loop_enabled),
        AudioCue::Pause => {
            controller.pause();
            Ok(())
        }
        AudioCue::Stop => {
            controller.stop();
            Ok(())
        }
        AudioCue::SetVolume(volume) => {
            controller.set_volume(volume);
            Ok(())
        }
        AudioCue::Bell => controller.play_bell(),
    }
}
