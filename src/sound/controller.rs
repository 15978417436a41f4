//! Audio controller: play/pause/resume/stop/volume state on top of an output.
//!
//! A non-looping track that plays to its end is reported as stopped the
//! next time the state is read.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use super::error::SoundError;
use super::AudioOutput;
use crate::types::{clamp_volume, MusicState, MusicStatus, DEFAULT_MUSIC_VOLUME};

/// Thin command/state wrapper around an [`AudioOutput`].
///
/// Tracks what is playing so callers can ask for the music status, and
/// so the engine can resume a track it paused instead of restarting it.
pub struct AudioController {
    output: Arc<dyn AudioOutput>,
    status: Mutex<MusicStatus>,
}

impl AudioController {
    /// Creates a controller over the given output at the default volume.
    pub fn new(output: Arc<dyn AudioOutput>) -> Self {
        output.set_volume(DEFAULT_MUSIC_VOLUME);
        Self {
            output,
            status: Mutex::new(MusicStatus {
                state: MusicState::Stopped,
                file_path: None,
                loop_enabled: false,
                volume: DEFAULT_MUSIC_VOLUME,
            }),
        }
    }

    fn status_guard(&self) -> MutexGuard<'_, MusicStatus> {
        let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        if status.state != MusicState::Stopped && self.output.is_finished() {
            debug!("Track ended: {}", status.file_path.as_deref().unwrap_or("-"));
            status.state = MusicState::Stopped;
            status.file_path = None;
            status.loop_enabled = false;
        }
        status
    }

    /// Starts playing `file_path` from the beginning, replacing any current track.
    ///
    /// # Errors
    ///
    /// Returns `SoundError::AudioSourceUnavailable` if the file cannot be
    /// opened or decoded. The music is left stopped in that case.
    pub fn play(&self, file_path: &str, loop_enabled: bool) -> Result<(), SoundError> {
        let mut status = self.status_guard();

        match self.output.play(Path::new(file_path), loop_enabled) {
            Ok(()) => {
                info!("Music playing: {} (loop: {})", file_path, loop_enabled);
                status.state = MusicState::Playing;
                status.file_path = Some(file_path.to_string());
                status.loop_enabled = loop_enabled;
                Ok(())
            }
            Err(e) => {
                warn!("Music playback failed: {}", e);
                self.output.stop();
                status.state = MusicState::Stopped;
                status.file_path = None;
                status.loop_enabled = false;
                Err(e)
            }
        }
    }

    /// Makes sure `file_path` is audible: resumes it when it is the paused
    /// track, otherwise plays it from the beginning.
    pub fn ensure_playing(&self, file_path: &str, loop_enabled: bool) -> Result<(), SoundError> {
        {
            let mut status = self.status_guard();
            let same_track = status.file_path.as_deref() == Some(file_path)
                && status.loop_enabled == loop_enabled;
            match status.state {
                MusicState::Playing if same_track => return Ok(()),
                MusicState::Paused if same_track => {
                    self.output.resume();
                    status.state = MusicState::Playing;
                    debug!("Music resumed: {}", file_path);
                    return Ok(());
                }
                _ => {}
            }
        }
        self.play(file_path, loop_enabled)
    }

    /// Pauses the current track. No-op unless playing.
    pub fn pause(&self) {
        let mut status = self.status_guard();
        if status.state == MusicState::Playing {
            self.output.pause();
            status.state = MusicState::Paused;
            debug!("Music paused");
        }
    }

    /// Resumes a paused track. No-op unless paused.
    pub fn resume(&self) {
        let mut status = self.status_guard();
        if status.state == MusicState::Paused {
            self.output.resume();
            status.state = MusicState::Playing;
            debug!("Music resumed");
        }
    }

    /// Stops playback and releases the current track.
    pub fn stop(&self) {
        let mut status = self.status_guard();
        self.output.stop();
        if status.state != MusicState::Stopped {
            debug!("Music stopped");
        }
        status.state = MusicState::Stopped;
        status.file_path = None;
        status.loop_enabled = false;
    }

    /// Sets the volume, clamped to 0.0-1.0. Takes effect immediately and
    /// applies to the next playback when stopped.
    pub fn set_volume(&self, volume: f32) {
        let volume = clamp_volume(volume);
        let mut status = self.status_guard();
        self.output.set_volume(volume);
        status.volume = volume;
    }

    /// Returns the current music status.
    pub fn status(&self) -> MusicStatus {
        self.status_guard().clone()
    }

    /// Rings the bell once. The music state is not touched.
    ///
    /// # Errors
    ///
    /// Returns `SoundError::DeviceNotAvailable` if there is no output device.
    pub fn play_bell(&self) -> Result<(), SoundError> {
        self.output.play_bell()
    }
}

impl std::fmt::Debug for AudioController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("AudioController")
            .field("status", &*status)
            .finish_non_exhaustive()
    }
}
