//! Audio output implementation using rodio.
//!
//! rodio's `OutputStream` is not `Send`, so the stream and the current
//! `Sink` live on a dedicated thread that receives commands over a channel.
//! Files are opened and decoded on the caller's side, which lets `play`
//! report a bad file synchronously while the device work stays off the
//! caller's thread. The bell gets its own detached sink so it plays over
//! the music without touching it.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use tracing::{debug, warn};

use super::bell::{bell_source, BELL_VOLUME};
use super::error::SoundError;
use super::AudioOutput;
use crate::types::DEFAULT_MUSIC_VOLUME;

/// A decoded, ready-to-append source.
type BoxedSource = Box<dyn Source<Item = i16> + Send>;

/// Commands processed by the audio thread.
enum OutputCommand {
    Play(BoxedSource),
    Pause,
    Resume,
    Stop,
    SetVolume(f32),
    Bell,
    QueryFinished(mpsc::Sender<bool>),
}

/// Background music output backed by rodio.
///
/// Thread-safe; share it with `Arc`. All commands are fire-and-forget
/// once the source has been decoded.
pub struct RodioAudioOutput {
    sender: mpsc::Sender<OutputCommand>,
}

impl RodioAudioOutput {
    /// Opens the default output device on a dedicated audio thread.
    ///
    /// # Errors
    ///
    /// Returns `SoundError::DeviceNotAvailable` if no audio output device
    /// is available.
    pub fn new() -> Result<Self, SoundError> {
        let (sender, receiver) = mpsc::channel::<OutputCommand>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();

        thread::Builder::new()
            .name("focusrun-audio".to_string())
            .spawn(move || {
                let (stream, handle) = match OutputStream::try_default() {
                    Ok(pair) => {
                        let _ = ready_tx.send(Ok(()));
                        pair
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                debug!("Audio output stream initialized");
                run_output_loop(&handle, receiver);
                drop(stream);
                debug!("Audio thread exiting");
            })
            .map_err(|e| SoundError::StreamError(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self { sender }),
            Ok(Err(e)) => Err(SoundError::DeviceNotAvailable(e)),
            Err(_) => Err(SoundError::DeviceNotAvailable(
                "audio thread exited during initialization".to_string(),
            )),
        }
    }

    fn send(&self, command: OutputCommand) -> Result<(), SoundError> {
        self.sender
            .send(command)
            .map_err(|_| SoundError::StreamError("audio thread is not running".to_string()))
    }
}

impl AudioOutput for RodioAudioOutput {
    fn play(&self, path: &Path, loop_enabled: bool) -> Result<(), SoundError> {
        let source = open_source(path, loop_enabled)?;
        debug!("Playing {} (loop: {})", path.display(), loop_enabled);
        self.send(OutputCommand::Play(source))
    }

    fn pause(&self) {
        if let Err(e) = self.send(OutputCommand::Pause) {
            warn!("{}", e);
        }
    }

    fn resume(&self) {
        if let Err(e) = self.send(OutputCommand::Resume) {
            warn!("{}", e);
        }
    }

    fn stop(&self) {
        if let Err(e) = self.send(OutputCommand::Stop) {
            warn!("{}", e);
        }
    }

    fn set_volume(&self, volume: f32) {
        if let Err(e) = self.send(OutputCommand::SetVolume(volume)) {
            warn!("{}", e);
        }
    }

    fn play_bell(&self) -> Result<(), SoundError> {
        self.send(OutputCommand::Bell)
    }

    fn is_finished(&self) -> bool {
        let (reply, answer) = mpsc::channel();
        if self.send(OutputCommand::QueryFinished(reply)).is_err() {
            return true;
        }
        answer.recv().unwrap_or(true)
    }
}

impl std::fmt::Debug for RodioAudioOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RodioAudioOutput").finish_non_exhaustive()
    }
}

/// Opens and decodes an audio file, wrapping it in an infinite repeat when looping.
fn open_source(path: &Path, loop_enabled: bool) -> Result<BoxedSource, SoundError> {
    let file = File::open(path).map_err(|e| SoundError::source_unavailable(path, e))?;
    let decoder =
        Decoder::new(BufReader::new(file)).map_err(|e| SoundError::source_unavailable(path, e))?;

    if loop_enabled {
        Ok(Box::new(decoder.repeat_infinite()))
    } else {
        Ok(Box::new(decoder))
    }
}

/// Owns the sink for the lifetime of the audio thread.
fn run_output_loop(handle: &OutputStreamHandle, receiver: mpsc::Receiver<OutputCommand>) {
    let mut sink: Option<Sink> = None;
    let mut volume = DEFAULT_MUSIC_VOLUME;

    while let Ok(command) = receiver.recv() {
        match command {
            OutputCommand::Play(source) => {
                if let Some(old) = sink.take() {
                    old.stop();
                }
                match Sink::try_new(handle) {
                    Ok(new_sink) => {
                        new_sink.set_volume(volume);
                        new_sink.append(source);
                        sink = Some(new_sink);
                    }
                    Err(e) => warn!("Failed to create audio sink: {}", e),
                }
            }
            OutputCommand::Pause => {
                if let Some(s) = &sink {
                    s.pause();
                }
            }
            OutputCommand::Resume => {
                if let Some(s) = &sink {
                    s.play();
                }
            }
            OutputCommand::Stop => {
                if let Some(s) = sink.take() {
                    s.stop();
                }
            }
            OutputCommand::SetVolume(v) => {
                volume = v;
                if let Some(s) = &sink {
                    s.set_volume(v);
                }
            }
            OutputCommand::Bell => match Sink::try_new(handle) {
                Ok(bell) => {
                    bell.set_volume(BELL_VOLUME);
                    bell.append(bell_source());
                    bell.detach();
                }
                Err(e) => warn!("Failed to create bell sink: {}", e),
            },
            OutputCommand::QueryFinished(reply) => {
                let _ = reply.send(sink.as_ref().map_or(true, Sink::empty));
            }
        }
    }
}

/// Output used when no audio device could be opened.
///
/// Every `play` and bell fails with `DeviceNotAvailable`; the other
/// commands are no-ops.
#[derive(Debug, Clone)]
pub struct UnavailableAudioOutput {
    reason: String,
}

impl UnavailableAudioOutput {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl AudioOutput for UnavailableAudioOutput {
    fn play(&self, _path: &Path, _loop_enabled: bool) -> Result<(), SoundError> {
        Err(SoundError::DeviceNotAvailable(self.reason.clone()))
    }

    fn pause(&self) {}

    fn resume(&self) {}

    fn stop(&self) {}

    fn set_volume(&self, _volume: f32) {}

    fn play_bell(&self) -> Result<(), SoundError> {
        Err(SoundError::DeviceNotAvailable(self.reason.clone()))
    }

    fn is_finished(&self) -> bool {
        true
    }
}

/// Creates the rodio output, falling back to an unavailable output when
/// there is no audio device. A warning is logged in that case.
#[must_use]
pub fn try_create_output() -> Arc<dyn AudioOutput> {
    match RodioAudioOutput::new() {
        Ok(output) => Arc::new(output),
        Err(e) => {
            warn!("Audio not available, music disabled: {}", e);
            Arc::new(UnavailableAudioOutput::new(e.to_string()))
        }
    }
}
