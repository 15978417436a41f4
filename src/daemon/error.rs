//! Session engine error types.
//!
//! Both errors are local and recoverable: the engine reports them to the
//! caller and its run state is left unchanged.

use thiserror::Error;

/// Errors returned by engine control operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The session has no tasks.
    #[error("セッション '{0}' にタスクがないため読み込めません")]
    InvalidSession(String),

    /// A control command that needs a session arrived before `load`.
    #[error("セッションが読み込まれていません")]
    NoSessionLoaded,

    /// The engine runtime is no longer running.
    #[error("タイマーエンジンが停止しています")]
    EngineUnavailable,
}

impl EngineError {
    /// Machine-readable code used in IPC error responses.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidSession(_) => "invalid_session",
            Self::NoSessionLoaded => "no_session_loaded",
            Self::EngineUnavailable => "engine_unavailable",
        }
    }

    /// Returns a user-friendly suggestion for resolving this error.
    #[must_use]
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::InvalidSession(_) => "セッションに1つ以上のタスクを追加してください",
            Self::NoSessionLoaded => "focusrun load <ID> でセッションを読み込んでください",
            Self::EngineUnavailable => "デーモンを再起動してください",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(
            EngineError::InvalidSession("s".into()).code(),
            "invalid_session"
        );
        assert_eq!(EngineError::NoSessionLoaded.code(), "no_session_loaded");
    }

    #[test]
    fn test_display() {
        let err = EngineError::InvalidSession("Morning".into());
        assert!(err.to_string().contains("Morning"));
        assert!(EngineError::NoSessionLoaded
            .suggestion()
            .contains("focusrun load"));
    }
}
