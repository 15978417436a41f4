//! Store error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the session and settings stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing a document failed.
    #[error("ファイルの読み書きに失敗しました: {path}: {source}")]
    Io {
        /// Document path
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// A document is not valid JSON or does not match the expected shape.
    #[error("ドキュメントの解析に失敗しました: {path}: {source}")]
    Parse {
        /// Document path
        path: PathBuf,
        /// Underlying serde failure
        #[source]
        source: serde_json::Error,
    },

    /// A session with the same id already exists.
    #[error("セッションIDが重複しています: {0}")]
    DuplicateId(String),

    /// No session matches the given id.
    #[error("セッションが見つかりません: {0}")]
    NotFound(String),

    /// An id prefix matches more than one session.
    #[error("セッションIDが曖昧です: {0}")]
    AmbiguousId(String),

    /// The session cannot be saved (blank name or no tasks).
    #[error("セッションを保存できません: {0}")]
    InvalidSession(String),

    /// The home directory could not be determined.
    #[error("ホームディレクトリが見つかりません")]
    HomeDirectoryNotFound,
}

impl StoreError {
    /// Returns true if the error refers to a missing session.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns a user-friendly suggestion for resolving this error.
    #[must_use]
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::Io { .. } => "ファイルのアクセス権限を確認してください",
            Self::Parse { .. } => "ファイルの内容を確認するか、削除して再作成してください",
            Self::DuplicateId(_) => "別のIDでセッションを作成してください",
            Self::NotFound(_) | Self::AmbiguousId(_) => {
                "focusrun session list で ID を確認してください"
            }
            Self::InvalidSession(_) => "名前と1つ以上のタスクを指定してください",
            Self::HomeDirectoryNotFound => "FOCUSRUN_HOME 環境変数を設定してください",
        }
    }
}
