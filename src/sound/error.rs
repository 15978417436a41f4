//! Sound system error types.
//!
//! This module defines the error types for background music playback.
//! Every error here is recoverable: a failed playback leaves the music
//! stopped and never touches the session timer.

use std::path::Path;

use thiserror::Error;

/// Errors that can occur in the audio controller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SoundError {
    /// The audio file could not be opened or decoded.
    #[error("音楽ファイルを再生できません: {path}: {reason}")]
    AudioSourceUnavailable {
        /// File that was requested
        path: String,
        /// Underlying open/decode failure
        reason: String,
    },

    /// Audio device is not available (e.g., no speakers connected).
    #[error("オーディオデバイスが利用できません: {0}")]
    DeviceNotAvailable(String),

    /// Failed to create or reach the audio output stream.
    #[error("オーディオストリームの作成に失敗しました: {0}")]
    StreamError(String),

    /// Generic sound playback error.
    #[error("サウンド再生エラー: {0}")]
    PlaybackError(String),
}

impl SoundError {
    /// Builds an `AudioSourceUnavailable` error for the given path.
    pub fn source_unavailable(path: &Path, reason: impl std::fmt::Display) -> Self {
        Self::AudioSourceUnavailable {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    /// Returns true if this error is related to the audio file.
    #[must_use]
    pub fn is_source_error(&self) -> bool {
        matches!(self, Self::AudioSourceUnavailable { .. })
    }

    /// Returns true if this error is related to device availability.
    #[must_use]
    pub fn is_device_error(&self) -> bool {
        matches!(self, Self::DeviceNotAvailable(_) | Self::StreamError(_))
    }

    /// Machine-readable code used in IPC error responses.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::AudioSourceUnavailable { .. } => "audio_source_unavailable",
            Self::DeviceNotAvailable(_) => "audio_device_unavailable",
            Self::StreamError(_) => "audio_stream_error",
            Self::PlaybackError(_) => "audio_playback_error",
        }
    }

    /// Returns a user-friendly suggestion for resolving this error.
    #[must_use]
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::AudioSourceUnavailable { .. } => {
                "ファイルのパスと形式 (mp3, wav, flac, ogg) を確認してください"
            }
            Self::DeviceNotAvailable(_) => "オーディオデバイスを接続してください",
            Self::StreamError(_) => "オーディオ設定を確認してください",
            Self::PlaybackError(_) => "デーモンを再起動してください",
        }
    }
}
