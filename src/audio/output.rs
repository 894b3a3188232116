use crate::error::{Result, TalkboxError};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Trait for audio sinks that play one utterance at a time.
///
/// `play` blocks until the audio has finished playing. Like the synthesis
/// engines, outputs are built and driven on the voice thread.
pub trait AudioOutput {
    /// Play mono 16-bit samples at `sample_rate`, returning once playback is complete.
    fn play(&mut self, samples: &[i16], sample_rate: u32) -> Result<()>;

    /// Human-readable backend name for logs and status.
    fn name(&self) -> &str;
}

impl<T: AudioOutput + ?Sized> AudioOutput for Box<T> {
    fn play(&mut self, samples: &[i16], sample_rate: u32) -> Result<()> {
        (**self).play(samples, sample_rate)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Discards audio. Used for `audio.backend = "null"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAudioOutput;

impl AudioOutput for NullAudioOutput {
    fn play(&mut self, samples: &[i16], sample_rate: u32) -> Result<()> {
        tracing::debug!(samples = samples.len(), sample_rate, "discarding audio");
        Ok(())
    }

    fn name(&self) -> &str {
        "null"
    }
}

/// Record of one `play` call on a [`MockAudioOutput`].
#[derive(Debug, Clone)]
pub struct PlayCall {
    pub samples: usize,
    pub sample_rate: u32,
    pub started: Instant,
    pub finished: Instant,
}

/// Mock audio output for testing
///
/// Records every call. Can simulate playback time and fail on demand.
#[derive(Debug, Clone, Default)]
pub struct MockAudioOutput {
    calls: Arc<Mutex<Vec<PlayCall>>>,
    play_duration: Duration,
    should_fail: bool,
}

impl MockAudioOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block for `duration` inside every `play` call.
    pub fn with_play_duration(mut self, duration: Duration) -> Self {
        self.play_duration = duration;
        self
    }

    /// Configure the mock to fail every `play` call.
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Shared log of calls, readable after the output moved to another thread.
    pub fn call_log(&self) -> Arc<Mutex<Vec<PlayCall>>> {
        Arc::clone(&self.calls)
    }
}

impl AudioOutput for MockAudioOutput {
    fn play(&mut self, samples: &[i16], sample_rate: u32) -> Result<()> {
        let started = Instant::now();
        if self.should_fail {
            return Err(TalkboxError::audio("mock playback failure"));
        }

        if !self.play_duration.is_zero() {
            std::thread::sleep(self.play_duration);
        }

        if let Ok(mut calls) = self.calls.lock() {
            calls.push(PlayCall {
                samples: samples.len(),
                sample_rate,
                started,
                finished: Instant::now(),
            });
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_records_calls() {
        let mut output = MockAudioOutput::new();
        let log = output.call_log();

        output.play(&[0; 100], 22050).unwrap();
        output.play(&[0; 50], 16000).unwrap();

        let calls = log.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].samples, 100);
        assert_eq!(calls[1].sample_rate, 16000);
    }

    #[test]
    fn mock_failure() {
        let mut output = MockAudioOutput::new().with_failure();
        let result = output.play(&[0; 10], 22050);
        assert!(matches!(result, Err(TalkboxError::Audio { .. })));
        assert!(output.call_log().lock().unwrap().is_empty());
    }

    #[test]
    fn mock_blocks_for_play_duration() {
        let mut output = MockAudioOutput::new().with_play_duration(Duration::from_millis(30));
        let start = Instant::now();
        output.play(&[0; 10], 22050).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn boxed_output_delegates() {
        let mut output: Box<dyn AudioOutput> = Box::new(NullAudioOutput);
        assert!(output.play(&[1, 2, 3], 22050).is_ok());
        assert_eq!(output.name(), "null");
    }
}
