//! Notification error types.

use thiserror::Error;

/// Errors that can occur while showing a desktop notification.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotificationError {
    /// The notification server rejected or never received the notification.
    #[error("通知の送信に失敗しました: {0}")]
    SendFailed(String),

    /// The notification task could not run.
    #[error("通知タスクが失敗しました: {0}")]
    TaskFailed(String),
}

impl NotificationError {
    /// Returns a user-friendly suggestion for resolving this error.
    #[must_use]
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::SendFailed(_) => {
                "デスクトップセッション内でデーモンを起動しているか確認してください"
            }
            Self::TaskFailed(_) => "デーモンを再起動してください",
        }
    }
}
