//! Synthesized bell played on task changes and at session finish.
//!
//! Two short sine partials (an octave apart) mixed together. Nothing is
//! read from disk, so the bell works even when no music file is set.

use std::time::Duration;

use rodio::source::SineWave;
use rodio::Source;

/// Fundamental frequency in Hz.
pub const BELL_FREQUENCY: f32 = 880.0;

/// Length of the tone.
pub const BELL_DURATION: Duration = Duration::from_millis(200);

/// Playback volume of the bell, independent of the music volume.
pub const BELL_VOLUME: f32 = 0.8;

/// Builds the bell tone.
#[must_use]
pub fn bell_source() -> impl Source<Item = f32> + Send + 'static {
    let fundamental = SineWave::new(BELL_FREQUENCY)
        .take_duration(BELL_DURATION)
        .amplify(0.5);
    let overtone = SineWave::new(BELL_FREQUENCY * 2.0)
        .take_duration(BELL_DURATION)
        .amplify(0.3);
    fundamental.mix(overtone)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bell_is_short_and_finite() {
        let source = bell_source();
        let rate = source.sample_rate() as usize;
        let channels = source.channels() as usize;

        let samples = source.count();
        let expected = rate * channels / 5;
        assert!(samples > 0);
        assert!(samples <= expected + channels * 2);
    }

    #[test]
    fn test_bell_does_not_clip() {
        assert!(bell_source().all(|sample| sample.abs() <= 1.0));
    }
}
