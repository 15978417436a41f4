//! Engine events and the subscription bus that fans them out.
//!
//! Every subscriber gets its own unbounded queue, so delivery is FIFO per
//! subscriber and a slow subscriber never holds up the engine. Dropping a
//! [`Subscription`] unsubscribes it; that is safe from any task, including
//! one that is in the middle of handling an event.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use crate::types::TimerSnapshot;

// ============================================================================
// EngineEvent
// ============================================================================

/// Events pushed by the session engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum EngineEvent {
    /// New snapshot; sent on every tick and every state transition
    TimerUpdate(TimerSnapshot),
    /// The last task of the loaded session completed naturally
    SessionFinished {
        /// Finished session
        session_id: String,
    },
    /// Idle time crossed the threshold while running
    ActivityWarning {
        /// Reported idle time
        idle_seconds: u64,
        /// Threshold in effect
        threshold_seconds: u64,
    },
    /// The engine advanced to another task
    TaskChanged {
        /// New task index
        index: usize,
        /// New task name
        name: String,
        /// Whether the new task is a break
        is_break: bool,
    },
    /// The run was stopped explicitly
    TimerStopped {
        /// Stopped session
        session_id: String,
    },
    /// An audio command issued by the engine failed
    AudioFailed {
        /// Failure description
        message: String,
    },
}

impl EngineEvent {
    /// Returns the wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::TimerUpdate(_) => "timer-update",
            EngineEvent::SessionFinished { .. } => "session-finished",
            EngineEvent::ActivityWarning { .. } => "activity-warning",
            EngineEvent::TaskChanged { .. } => "task-changed",
            EngineEvent::TimerStopped { .. } => "timer-stopped",
            EngineEvent::AudioFailed { .. } => "audio-failed",
        }
    }
}

// ============================================================================
// EventBus
// ============================================================================

#[derive(Debug, Default)]
struct Subscribers {
    next_id: u64,
    senders: Vec<(u64, mpsc::UnboundedSender<EngineEvent>)>,
}

fn lock(inner: &Mutex<Subscribers>) -> MutexGuard<'_, Subscribers> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fan-out of engine events to any number of subscribers.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<Subscribers>>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new subscriber.
    pub fn subscribe(&self) -> Subscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut subscribers = lock(&self.inner);
        let id = subscribers.next_id;
        subscribers.next_id += 1;
        subscribers.senders.push((id, sender));
        debug!("Subscriber {} registered", id);

        Subscription {
            id,
            receiver,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Delivers an event to every live subscriber and returns how many got it.
    ///
    /// Subscribers whose receiving side is gone are pruned.
    pub fn publish(&self, event: &EngineEvent) -> usize {
        let mut subscribers = lock(&self.inner);
        subscribers
            .senders
            .retain(|(_, sender)| sender.send(event.clone()).is_ok());
        subscribers.senders.len()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner).senders.len()
    }
}

// ============================================================================
// Subscription
// ============================================================================

/// A cancellable handle on the event stream.
///
/// Events published after `subscribe` arrive in publish order.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    receiver: mpsc::UnboundedReceiver<EngineEvent>,
    bus: Weak<Mutex<Subscribers>>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Waits for the next event. Returns `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<EngineEvent> {
        self.receiver.recv().await
    }

    /// Returns the next queued event without waiting.
    pub fn try_recv(&mut self) -> Option<EngineEvent> {
        self.receiver.try_recv().ok()
    }

    /// Unsubscribes. Queued events are discarded.
    pub fn cancel(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.bus.upgrade() {
            lock(&inner).senders.retain(|(id, _)| *id != self.id);
            debug!("Subscriber {} removed", self.id);
        }
    }
}
