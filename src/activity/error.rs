//! Idle monitoring error types.
//!
//! Sampling failures never reach the session timer: the monitor logs them
//! and skips the report, so monitoring pauses until the next successful
//! sample.

use thiserror::Error;

/// Errors that can occur while querying the system idle time.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdleError {
    /// No idle-time source exists for this platform.
    #[error("このプラットフォームではアイドル時間を取得できません: {0}")]
    Unsupported(String),

    /// The platform idle query failed.
    #[error("アイドル時間の取得に失敗しました: {0}")]
    QueryFailed(String),

    /// The idle query did not finish in time.
    #[error("アイドル時間の取得がタイムアウトしました（{0}秒）")]
    Timeout(u64),

    /// An earlier query is still running; this poll was skipped.
    #[error("前回のアイドル時間の取得がまだ完了していません")]
    Busy,
}

impl IdleError {
    /// Returns true if idle monitoring can never work on this system.
    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported(_))
    }

    /// Returns true if this error is a timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy)
    }

    /// Returns a user-friendly suggestion for resolving this error.
    #[must_use]
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::Unsupported(_) => {
                "アイドル監視は macOS、Linux (X11)、Windows でのみ利用できます"
            }
            Self::QueryFailed(_) => {
                "Linux ではデスクトップセッション (DISPLAY) 内でデーモンを起動してください"
            }
            Self::Timeout(_) | Self::Busy => "システムの負荷を確認してください",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = IdleError::QueryFailed("no display".to_string());
        assert!(err.to_string().contains("no display"));

        let err = IdleError::Timeout(2);
        assert!(err.to_string().contains("2秒"));
    }

    #[test]
    fn test_predicates() {
        assert!(IdleError::Unsupported("windows".into()).is_unsupported());
        assert!(!IdleError::Timeout(2).is_unsupported());
        assert!(IdleError::Timeout(2).is_timeout());
        assert!(IdleError::Busy.is_busy());
        assert!(!IdleError::Busy.is_timeout());
    }

    #[test]
    fn test_suggestion() {
        assert!(IdleError::QueryFailed("x".into())
            .suggestion()
            .contains("DISPLAY"));
    }
}
