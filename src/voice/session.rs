use crate::defaults;
use crate::mouth::{MouthEvent, MouthKind, MouthTracker};
use crate::speech::engine::{BoundaryEvent, ChunkControl, SynthSink};

/// Per-request synthesis state.
///
/// Holds the audio and mouth cues accumulated by the synthesis callback for the
/// request currently in flight. One session exists per voice thread and it is
/// cleared between requests.
#[derive(Debug, Clone)]
pub struct Session {
    samples: Vec<i16>,
    sample_rate: u32,
    mouth_events: Vec<MouthEvent>,
    tracker: MouthTracker,
}

impl Session {
    pub fn new(close_lead_ms: u64) -> Self {
        Self {
            samples: Vec::new(),
            sample_rate: defaults::SYNTH_SAMPLE_RATE,
            mouth_events: Vec::new(),
            tracker: MouthTracker::new(close_lead_ms),
        }
    }

    /// Prepare for a new utterance at the given sample rate.
    pub fn begin(&mut self, sample_rate: u32) {
        self.clear();
        self.sample_rate = sample_rate;
    }

    /// Drop accumulated audio and cues and close the mouth.
    pub fn clear(&mut self) {
        self.samples.clear();
        self.mouth_events.clear();
        self.tracker.reset();
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty() && self.mouth_events.is_empty()
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
    }

    pub fn mouth_events(&self) -> &[MouthEvent] {
        &self.mouth_events
    }

    /// Mouth state after the last observed boundary.
    pub fn mouth_state(&self) -> MouthKind {
        self.tracker.state()
    }

    /// Length of the accumulated audio.
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.samples.len() as u64 * 1000 / self.sample_rate as u64
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(defaults::CLOSE_LEAD_MS)
    }
}

impl SynthSink for Session {
    fn on_chunk(&mut self, samples: &[i16], events: &[BoundaryEvent]) -> ChunkControl {
        // The final empty chunk may still carry the end boundary.
        for event in events {
            self.tracker.observe(event, &mut self.mouth_events);
        }

        if samples.is_empty() {
            return ChunkControl::Stop;
        }

        self.samples.extend_from_slice(samples);
        ChunkControl::Continue
    }
}
