//! Background music playback for focus sessions.
//!
//! This module provides the audio side of a running session:
//!
//! - An [`AudioOutput`] abstraction over the OS audio decoder/device
//! - A rodio-backed output running on its own thread
//! - The [`AudioController`] that tracks playback state
//! - A synthesized bell for task changes and session finish
//! - Graceful degradation when audio is unavailable
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ AudioController  │ ← play / pause / resume / stop / set_volume
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐     ┌──────────────────┐
//! │   AudioOutput    │────▶│ RodioAudioOutput │ (audio thread + Sink)
//! │     (trait)      │     ├──────────────────┤
//! │                  │────▶│ MockAudioOutput  │ (tests)
//! └──────────────────┘     └──────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use focusrun::sound::{try_create_output, AudioController};
//!
//! let controller = AudioController::new(try_create_output());
//! controller.set_volume(0.4);
//! if let Err(e) = controller.play("/home/me/music/rain.mp3", true) {
//!     eprintln!("Could not play music: {}", e);
//! }
//! ```

mod bell;
mod controller;
mod error;
mod player;

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

pub use bell::{bell_source, BELL_DURATION, BELL_FREQUENCY, BELL_VOLUME};
pub use controller::AudioController;
pub use error::SoundError;
pub use player::{try_create_output, RodioAudioOutput, UnavailableAudioOutput};

/// The audio-output collaborator.
///
/// Implementations must be non-blocking apart from opening and decoding
/// the file in `play`.
pub trait AudioOutput: Send + Sync {
    /// Starts playing the file from the beginning, replacing any current track.
    ///
    /// # Errors
    ///
    /// Returns `SoundError::AudioSourceUnavailable` if the file cannot be
    /// opened or decoded.
    fn play(&self, path: &Path, loop_enabled: bool) -> Result<(), SoundError>;

    /// Pauses the current track.
    fn pause(&self);

    /// Resumes the current track.
    fn resume(&self);

    /// Stops and releases the current track.
    fn stop(&self);

    /// Sets the output volume (0.0-1.0).
    fn set_volume(&self, volume: f32);

    /// Plays the bell once, mixed over any music.
    ///
    /// # Errors
    ///
    /// Returns `SoundError::DeviceNotAvailable` if there is no output device.
    fn play_bell(&self) -> Result<(), SoundError>;

    /// Returns true when no track is queued, including after a
    /// non-looping track has played to its end.
    fn is_finished(&self) -> bool;
}

/// A call recorded by [`MockAudioOutput`].
#[derive(Debug, Clone, PartialEq)]
pub enum AudioCall {
    Play { path: String, loop_enabled: bool },
    Pause,
    Resume,
    Stop,
    SetVolume(f32),
    Bell,
}

/// Mock audio output for testing.
#[derive(Debug, Default)]
pub struct MockAudioOutput {
    calls: Mutex<Vec<AudioCall>>,
    unavailable: Mutex<HashSet<String>>,
    should_fail: AtomicBool,
    finished: AtomicBool,
}

impl MockAudioOutput {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every `play` fail with `AudioSourceUnavailable`.
    pub fn set_should_fail(&self, should_fail: bool) {
        self.should_fail.store(should_fail, Ordering::SeqCst);
    }

    /// Makes `play` fail for one specific path.
    pub fn mark_unavailable(&self, path: impl Into<String>) {
        lock(&self.unavailable).insert(path.into());
    }

    /// Simulates the current track running out.
    pub fn set_finished(&self, finished: bool) {
        self.finished.store(finished, Ordering::SeqCst);
    }

    #[must_use]
    pub fn calls(&self) -> Vec<AudioCall> {
        lock(&self.calls).clone()
    }

    #[must_use]
    pub fn play_count(&self) -> usize {
        self.count(|c| matches!(c, AudioCall::Play { .. }))
    }

    #[must_use]
    pub fn bell_count(&self) -> usize {
        self.count(|c| *c == AudioCall::Bell)
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    fn count(&self, predicate: impl Fn(&AudioCall) -> bool) -> usize {
        lock(&self.calls).iter().filter(|c| predicate(*c)).count()
    }

    fn record(&self, call: AudioCall) {
        lock(&self.calls).push(call);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl AudioOutput for MockAudioOutput {
    fn play(&self, path: &Path, loop_enabled: bool) -> Result<(), SoundError> {
        let key = path.display().to_string();
        if self.should_fail.load(Ordering::SeqCst) || lock(&self.unavailable).contains(&key) {
            return Err(SoundError::source_unavailable(path, "Mock failure"));
        }
        self.finished.store(false, Ordering::SeqCst);
        self.record(AudioCall::Play {
            path: key,
            loop_enabled,
        });
        Ok(())
    }

    fn pause(&self) {
        self.record(AudioCall::Pause);
    }

    fn resume(&self) {
        self.record(AudioCall::Resume);
    }

    fn stop(&self) {
        self.record(AudioCall::Stop);
    }

    fn set_volume(&self, volume: f32) {
        self.record(AudioCall::SetVolume(volume));
    }

    fn play_bell(&self) -> Result<(), SoundError> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(SoundError::DeviceNotAvailable("Mock failure".to_string()));
        }
        self.record(AudioCall::Bell);
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_records_calls() {
        let mock = MockAudioOutput::new();
        mock.play(Path::new("a.mp3"), true).unwrap();
        mock.pause();
        mock.resume();
        mock.set_volume(0.3);
        mock.stop();

        assert_eq!(mock.play_count(), 1);
        assert_eq!(
            mock.calls(),
            vec![
                AudioCall::Play {
                    path: "a.mp3".to_string(),
                    loop_enabled: true
                },
                AudioCall::Pause,
                AudioCall::Resume,
                AudioCall::SetVolume(0.3),
                AudioCall::Stop,
            ]
        );
    }

    #[test]
    fn test_mock_should_fail() {
        let mock = MockAudioOutput::new();
        mock.set_should_fail(true);

        let err = mock.play(Path::new("a.mp3"), false).unwrap_err();
        assert!(err.is_source_error());
        assert_eq!(mock.play_count(), 0);
    }

    #[test]
    fn test_mock_bell_and_finished() {
        let mock = MockAudioOutput::new();
        mock.play_bell().unwrap();
        assert_eq!(mock.bell_count(), 1);
        assert_eq!(mock.play_count(), 0);

        mock.set_finished(true);
        assert!(mock.is_finished());
        mock.play(Path::new("a.mp3"), false).unwrap();
        assert!(!mock.is_finished());
    }

    #[test]
    fn test_mock_unavailable_path() {
        let mock = MockAudioOutput::new();
        mock.mark_unavailable("missing.mp3");

        assert!(mock.play(Path::new("missing.mp3"), false).is_err());
        assert!(mock.play(Path::new("present.mp3"), false).is_ok());
    }
}
