//! Notification texts for engine events.

use crate::daemon::EngineEvent;

/// Maximum task name length shown in a notification body.
const MAX_TASK_NAME_CHARS: usize = 100;

/// Title and body of one desktop notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
}

impl Notification {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

/// Returns the notification for an event, or `None` for events that are
/// not announced on the desktop.
#[must_use]
pub fn for_event(event: &EngineEvent) -> Option<Notification> {
    match event {
        EngineEvent::TaskChanged { name, is_break, .. } => {
            Some(task_changed(name, *is_break))
        }
        EngineEvent::SessionFinished { .. } => Some(session_finished()),
        EngineEvent::ActivityWarning { idle_seconds, .. } => {
            Some(activity_warning(*idle_seconds))
        }
        EngineEvent::TimerUpdate(_)
        | EngineEvent::TimerStopped { .. }
        | EngineEvent::AudioFailed { .. } => None,
    }
}

/// Previous task done; announces the next one.
#[must_use]
pub fn task_changed(next_name: &str, is_break: bool) -> Notification {
    let name = truncate_name(next_name);
    let body = if is_break {
        format!("次: [休憩] {}", name)
    } else {
        format!("次: {}", name)
    };
    Notification::new("タスク完了", body)
}

#[must_use]
pub fn session_finished() -> Notification {
    Notification::new("セッション完了", "すべてのタスクが完了しました！")
}

#[must_use]
pub fn activity_warning(idle_seconds: u64) -> Notification {
    Notification::new(
        "まだそこにいますか？",
        format!(
            "{}秒間操作がありません。集中を続けましょう！",
            idle_seconds
        ),
    )
}

fn truncate_name(name: &str) -> String {
    if name.chars().count() <= MAX_TASK_NAME_CHARS {
        return name.to_string();
    }
    let mut truncated: String = name.chars().take(MAX_TASK_NAME_CHARS).collect();
    truncated.push('…');
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TimerSnapshot;

    #[test]
    fn test_task_changed() {
        let n = task_changed("Review", false);
        assert_eq!(n.title, "タスク完了");
        assert_eq!(n.body, "次: Review");

        let n = task_changed("Walk", true);
        assert_eq!(n.body, "次: [休憩] Walk");
    }

    #[test]
    fn test_long_task_name_is_truncated() {
        let long = "あ".repeat(150);
        let n = task_changed(&long, false);
        assert_eq!(n.body.chars().count(), "次: ".chars().count() + 101);
        assert!(n.body.ends_with('…'));
    }

    #[test]
    fn test_activity_warning() {
        let n = activity_warning(320);
        assert_eq!(n.title, "まだそこにいますか？");
        assert!(n.body.contains("320秒"));
    }

    #[test]
    fn test_for_event_selects_announced_events() {
        let changed = EngineEvent::TaskChanged {
            index: 1,
            name: "Walk".to_string(),
            is_break: true,
        };
        assert_eq!(for_event(&changed), Some(task_changed("Walk", true)));

        let finished = EngineEvent::SessionFinished {
            session_id: "s".to_string(),
        };
        assert_eq!(for_event(&finished), Some(session_finished()));

        let warning = EngineEvent::ActivityWarning {
            idle_seconds: 400,
            threshold_seconds: 300,
        };
        assert_eq!(for_event(&warning), Some(activity_warning(400)));

        let update = EngineEvent::TimerUpdate(TimerSnapshot {
            remaining_seconds: 10,
            current_task_index: 0,
            is_running: true,
            is_break: false,
            current_task_name: "Write".to_string(),
            session_id: "s".to_string(),
            task_count: 1,
        });
        assert!(for_event(&update).is_none());
        assert!(for_event(&EngineEvent::TimerStopped {
            session_id: "s".to_string()
        })
        .is_none());
        assert!(for_event(&EngineEvent::AudioFailed {
            message: "x".to_string()
        })
        .is_none());
    }
}
