//! Desktop notifications for session milestones.
//!
//! The daemon announces three engine events on the desktop:
//!
//! - `task-changed`: "タスク完了" with the next task
//! - `session-finished`: "セッション完了"
//! - `activity-warning`: "まだそこにいますか？"
//!
//! [`spawn_notifier`] consumes an event [`Subscription`] and shows the
//! notifications one at a time on the blocking pool. Failures are logged
//! and never reach the engine.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use focusrun::notification::{spawn_notifier, DesktopNotifier};
//! # fn wire(engine: &focusrun::EngineHandle) {
//! let task = spawn_notifier(Arc::new(DesktopNotifier::new()), engine.subscribe());
//! # drop(task);
//! # }
//! ```

mod content;
mod error;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub use content::{activity_warning, for_event, session_finished, task_changed, Notification};
pub use error::NotificationError;

use crate::daemon::Subscription;

/// Application name shown by the notification server.
pub const APP_NAME: &str = "focusrun";

/// The desktop notification collaborator.
pub trait Notifier: Send + Sync {
    /// Shows one notification. May block.
    ///
    /// # Errors
    ///
    /// Returns `NotificationError::SendFailed` if the notification server
    /// cannot be reached.
    fn show(&self, notification: &Notification) -> Result<(), NotificationError>;
}

// ============================================================================
// DesktopNotifier
// ============================================================================

/// Notifier backed by `notify-rust` (D-Bus on Linux, Notification Center
/// on macOS).
#[derive(Debug, Clone, Default)]
pub struct DesktopNotifier;

impl DesktopNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Notifier for DesktopNotifier {
    fn show(&self, notification: &Notification) -> Result<(), NotificationError> {
        notify_rust::Notification::new()
            .appname(APP_NAME)
            .summary(&notification.title)
            .body(&notification.body)
            .icon("alarm-clock")
            .show()
            .map(|_| ())
            .map_err(|e| NotificationError::SendFailed(e.to_string()))
    }
}

// ============================================================================
// MockNotifier
// ============================================================================

/// Mock notifier for testing.
#[derive(Debug, Default)]
pub struct MockNotifier {
    shown: Mutex<Vec<Notification>>,
    should_fail: Mutex<bool>,
}

impl MockNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every `show` fail.
    pub fn set_should_fail(&self, should_fail: bool) {
        *lock(&self.should_fail) = should_fail;
    }

    #[must_use]
    pub fn shown(&self) -> Vec<Notification> {
        lock(&self.shown).clone()
    }
}

impl Notifier for MockNotifier {
    fn show(&self, notification: &Notification) -> Result<(), NotificationError> {
        if *lock(&self.should_fail) {
            return Err(NotificationError::SendFailed("Mock failure".to_string()));
        }
        lock(&self.shown).push(notification.clone());
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Shows a notification for every announced event on `events`.
///
/// The task ends when the event bus goes away.
pub fn spawn_notifier(notifier: Arc<dyn Notifier>, mut events: Subscription) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut failing = false;

        while let Some(event) = events.recv().await {
            let Some(notification) = for_event(&event) else {
                continue;
            };

            let notifier = Arc::clone(&notifier);
            let result = tokio::task::spawn_blocking(move || notifier.show(&notification))
                .await
                .unwrap_or_else(|e| Err(NotificationError::TaskFailed(e.to_string())));

            match result {
                Ok(()) => {
                    debug!("Notification shown for {}", event.name());
                    failing = false;
                }
                Err(e) if failing => debug!("Notification skipped: {}", e),
                Err(e) => {
                    warn!("{} ({})", e, e.suggestion());
                    failing = true;
                }
            }
        }
        debug!("Notifier stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::daemon::{EngineEvent, EventBus};

    async fn settle() {
        for _ in 0..20 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn test_announced_events_are_shown_in_order() {
        let bus = EventBus::new();
        let notifier = Arc::new(MockNotifier::new());
        let task = spawn_notifier(notifier.clone(), bus.subscribe());

        bus.publish(&EngineEvent::TaskChanged {
            index: 1,
            name: "Walk".to_string(),
            is_break: true,
        });
        bus.publish(&EngineEvent::TimerStopped {
            session_id: "s".to_string(),
        });
        bus.publish(&EngineEvent::ActivityWarning {
            idle_seconds: 320,
            threshold_seconds: 300,
        });
        bus.publish(&EngineEvent::SessionFinished {
            session_id: "s".to_string(),
        });
        settle().await;

        assert_eq!(
            notifier.shown(),
            vec![
                task_changed("Walk", true),
                activity_warning(320),
                session_finished(),
            ]
        );
        task.abort();
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_the_dispatcher() {
        let bus = EventBus::new();
        let notifier = Arc::new(MockNotifier::new());
        notifier.set_should_fail(true);
        let task = spawn_notifier(notifier.clone(), bus.subscribe());

        bus.publish(&EngineEvent::SessionFinished {
            session_id: "a".to_string(),
        });
        settle().await;
        assert!(notifier.shown().is_empty());

        notifier.set_should_fail(false);
        bus.publish(&EngineEvent::SessionFinished {
            session_id: "b".to_string(),
        });
        settle().await;

        assert_eq!(notifier.shown(), vec![session_finished()]);
        assert!(!task.is_finished());
        task.abort();
    }

    #[tokio::test]
    async fn test_stops_when_bus_dropped() {
        let bus = EventBus::new();
        let task = spawn_notifier(Arc::new(MockNotifier::new()), bus.subscribe());
        drop(bus);

        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
    }
}
