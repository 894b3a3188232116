use crate::defaults;
use crate::error::{Result, TalkboxError};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Kind of a timing marker reported by a synthesis engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryKind {
    /// Start of a spoken word
    Word,
    /// Start of a sentence
    Sentence,
    /// End of the utterance
    End,
    /// Anything else the engine reports (phonemes, marks, ...)
    Other,
}

/// A timing marker delivered alongside a chunk of synthesized audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundaryEvent {
    pub kind: BoundaryKind,
    /// Offset from the start of the utterance audio
    pub position_ms: u64,
}

impl BoundaryEvent {
    pub fn new(kind: BoundaryKind, position_ms: u64) -> Self {
        Self { kind, position_ms }
    }

    pub fn word(position_ms: u64) -> Self {
        Self::new(BoundaryKind::Word, position_ms)
    }

    pub fn sentence(position_ms: u64) -> Self {
        Self::new(BoundaryKind::Sentence, position_ms)
    }

    pub fn end(position_ms: u64) -> Self {
        Self::new(BoundaryKind::End, position_ms)
    }

    pub fn other(position_ms: u64) -> Self {
        Self::new(BoundaryKind::Other, position_ms)
    }
}

/// What the engine should do after delivering a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkControl {
    Continue,
    Stop,
}

/// Receiver for synthesis output.
///
/// Engines call [`on_chunk`](Self::on_chunk) any number of times during one
/// synthesis. An empty `samples` slice marks the end of the audio stream.
pub trait SynthSink {
    fn on_chunk(&mut self, samples: &[i16], events: &[BoundaryEvent]) -> ChunkControl;
}

/// Trait for text-to-speech engines.
///
/// Engines are not reentrant and may be bound to the thread that created them,
/// so the trait does not require `Send`. Build and use an engine on one thread.
pub trait SynthesisEngine {
    /// Start synthesizing `text`, delivering output to `sink`.
    fn synthesize(&mut self, text: &str, sink: &mut dyn SynthSink) -> Result<()>;

    /// Block until every callback for the current synthesis has been delivered.
    fn synchronize(&mut self) -> Result<()>;

    /// Sample rate of the delivered PCM.
    fn sample_rate(&self) -> u32;

    /// Human-readable engine name for logs and status.
    fn name(&self) -> &str;
}

impl<T: SynthesisEngine + ?Sized> SynthesisEngine for Box<T> {
    fn synthesize(&mut self, text: &str, sink: &mut dyn SynthSink) -> Result<()> {
        (**self).synthesize(text, sink)
    }

    fn synchronize(&mut self) -> Result<()> {
        (**self).synchronize()
    }

    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// One chunk the scripted engine will deliver.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptedChunk {
    pub samples: Vec<i16>,
    pub events: Vec<BoundaryEvent>,
}

impl ScriptedChunk {
    pub fn new(samples: Vec<i16>, events: Vec<BoundaryEvent>) -> Self {
        Self { samples, events }
    }
}

/// Record of one `synthesize` call on a [`ScriptedEngine`].
#[derive(Debug, Clone)]
pub struct SynthCall {
    pub text: String,
    pub started: Instant,
    pub finished: Instant,
}

/// Deterministic engine for testing
///
/// Delivers the same scripted chunks for every text, followed by the empty
/// end-of-stream chunk. Texts containing a configured marker fail.
#[derive(Debug, Clone)]
pub struct ScriptedEngine {
    chunks: Vec<ScriptedChunk>,
    sample_rate: u32,
    fail_marker: Option<String>,
    fail_synchronize: bool,
    sync_fail_marker: Option<String>,
    last_text: String,
    delay: Duration,
    calls: Arc<Mutex<Vec<SynthCall>>>,
}

impl ScriptedEngine {
    /// Engine with one short chunk: a word at 0ms and the end at 10ms.
    pub fn new() -> Self {
        Self {
            chunks: vec![ScriptedChunk::new(
                vec![0i16; 220],
                vec![BoundaryEvent::word(0), BoundaryEvent::end(10)],
            )],
            sample_rate: defaults::SYNTH_SAMPLE_RATE,
            fail_marker: None,
            fail_synchronize: false,
            sync_fail_marker: None,
            last_text: String::new(),
            delay: Duration::ZERO,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Replace the scripted chunks.
    pub fn with_chunks(mut self, chunks: Vec<ScriptedChunk>) -> Self {
        self.chunks = chunks;
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Fail synthesis of any text containing `marker`.
    pub fn with_failure_on(mut self, marker: &str) -> Self {
        self.fail_marker = Some(marker.to_string());
        self
    }

    /// Fail every `synchronize` call.
    pub fn with_synchronize_failure(mut self) -> Self {
        self.fail_synchronize = true;
        self
    }

    /// Fail `synchronize` after delivering audio for a text containing `marker`.
    pub fn with_synchronize_failure_on(mut self, marker: &str) -> Self {
        self.sync_fail_marker = Some(marker.to_string());
        self
    }

    /// Sleep this long inside each `synthesize` call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Shared log of calls, readable after the engine moved to another thread.
    pub fn call_log(&self) -> Arc<Mutex<Vec<SynthCall>>> {
        Arc::clone(&self.calls)
    }
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SynthesisEngine for ScriptedEngine {
    fn synthesize(&mut self, text: &str, sink: &mut dyn SynthSink) -> Result<()> {
        let started = Instant::now();
        self.last_text = text.to_string();

        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }

        let failed = self
            .fail_marker
            .as_deref()
            .is_some_and(|marker| text.contains(marker));

        if !failed {
            let mut stopped = false;
            for chunk in &self.chunks {
                if sink.on_chunk(&chunk.samples, &chunk.events) == ChunkControl::Stop {
                    stopped = true;
                    break;
                }
            }
            if !stopped {
                sink.on_chunk(&[], &[]);
            }
        }

        if let Ok(mut calls) = self.calls.lock() {
            calls.push(SynthCall {
                text: text.to_string(),
                started,
                finished: Instant::now(),
            });
        }

        if failed {
            Err(TalkboxError::engine(format!(
                "scripted failure for '{}'",
                text
            )))
        } else {
            Ok(())
        }
    }

    fn synchronize(&mut self) -> Result<()> {
        let marked = self
            .sync_fail_marker
            .as_deref()
            .is_some_and(|marker| self.last_text.contains(marker));
        if self.fail_synchronize || marked {
            Err(TalkboxError::engine("scripted synchronize failure"))
        } else {
            Ok(())
        }
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
