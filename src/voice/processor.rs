use crate::audio::output::AudioOutput;
use crate::error::Result;
use crate::mouth::MouthScheduler;
use crate::speech::engine::SynthesisEngine;
use crate::speech::synthesizer::Synthesizer;
use crate::voice::report::{ErrorReporter, LogReporter};
use crate::voice::request::VoiceRequest;
use crate::voice::session::Session;
use crossbeam_channel::Receiver;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::Instant;

/// Where the processor is in handling the current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessorState {
    Idle,
    Synthesizing,
    Playing,
}

impl ProcessorState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Synthesizing,
            2 => Self::Playing,
            _ => Self::Idle,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Synthesizing => 1,
            Self::Playing => 2,
        }
    }
}

/// Counters shared between the voice thread and observers.
#[derive(Debug, Default)]
pub struct ProcessorStats {
    state: AtomicU8,
    processed: AtomicU64,
    failed: AtomicU64,
}

impl ProcessorStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ProcessorState {
        ProcessorState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// True while a request is being synthesized or played.
    pub fn busy(&self) -> bool {
        self.state() != ProcessorState::Idle
    }

    /// Requests that completed playback.
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::SeqCst)
    }

    /// Requests that failed in synthesis or playback.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::SeqCst)
    }

    fn set_state(&self, state: ProcessorState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }

    fn record(&self, ok: bool) {
        if ok {
            self.processed.fetch_add(1, Ordering::SeqCst);
        } else {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Handles voice requests one at a time: synthesize, arm mouth cues, play.
///
/// Owns the engine, the audio output and the single session, so it must run
/// on the thread that built them.
pub struct VoiceProcessor<E: SynthesisEngine, A: AudioOutput> {
    synthesizer: Synthesizer<E>,
    output: A,
    session: Session,
    scheduler: MouthScheduler,
    stats: Arc<ProcessorStats>,
    error_reporter: Arc<dyn ErrorReporter>,
}

impl<E: SynthesisEngine, A: AudioOutput> VoiceProcessor<E, A> {
    pub fn new(engine: E, output: A, scheduler: MouthScheduler, close_lead_ms: u64) -> Self {
        Self {
            synthesizer: Synthesizer::new(engine),
            output,
            session: Session::new(close_lead_ms),
            scheduler,
            stats: Arc::new(ProcessorStats::new()),
            error_reporter: Arc::new(LogReporter),
        }
    }

    /// Set a custom error reporter for failed requests.
    pub fn with_error_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.error_reporter = reporter;
        self
    }

    /// Share externally owned stats instead of the processor's own.
    pub fn with_stats(mut self, stats: Arc<ProcessorStats>) -> Self {
        self.stats = stats;
        self
    }

    pub fn state(&self) -> ProcessorState {
        self.stats.state()
    }

    pub fn stats(&self) -> Arc<ProcessorStats> {
        Arc::clone(&self.stats)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn engine_name(&self) -> &str {
        self.synthesizer.engine_name()
    }

    pub fn output_name(&self) -> &str {
        self.output.name()
    }

    /// Speak one request to completion.
    ///
    /// The session is empty again when this returns, whatever the outcome.
    pub fn process_one(&mut self, request: &VoiceRequest) -> Result<()> {
        let started = Instant::now();
        let result = self.speak(&request.text);

        self.session.clear();
        self.stats.set_state(ProcessorState::Idle);
        self.stats.record(result.is_ok());

        if result.is_ok() {
            tracing::info!(
                chars = request.text.chars().count(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "spoke request"
            );
        }
        result
    }

    fn speak(&mut self, text: &str) -> Result<()> {
        self.stats.set_state(ProcessorState::Synthesizing);
        self.synthesizer.synthesize(text, &mut self.session)?;

        self.stats.set_state(ProcessorState::Playing);
        self.scheduler.schedule(self.session.mouth_events());
        self.output
            .play(self.session.samples(), self.session.sample_rate())
    }

    /// Handle requests until every sender is dropped.
    ///
    /// Failures are reported and never stop the loop.
    pub fn run(&mut self, requests: Receiver<VoiceRequest>) {
        tracing::debug!(
            engine = self.engine_name(),
            output = self.output_name(),
            "voice loop started"
        );

        for request in requests.iter() {
            if let Err(e) = self.process_one(&request) {
                self.error_reporter.report(&request.text, &e);
            }
        }

        tracing::debug!(
            processed = self.stats.processed(),
            failed = self.stats.failed(),
            "voice loop finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::output::MockAudioOutput;
    use crate::error::TalkboxError;
    use crate::mouth::{CollectingRenderer, MouthKind};
    use crate::speech::engine::{BoundaryEvent, ScriptedChunk, ScriptedEngine};
    use crate::voice::report::CollectingReporter;
    use crossbeam_channel::unbounded;
    use std::time::Duration;

    fn processor(
        engine: ScriptedEngine,
        output: MockAudioOutput,
    ) -> (
        VoiceProcessor<ScriptedEngine, MockAudioOutput>,
        Arc<CollectingRenderer>,
    ) {
        let renderer = Arc::new(CollectingRenderer::new());
        let scheduler = MouthScheduler::spawn(renderer.clone()).unwrap();
        (VoiceProcessor::new(engine, output, scheduler, 20), renderer)
    }

    #[test]
    fn speaks_and_returns_to_idle() {
        let output = MockAudioOutput::new();
        let plays = output.call_log();
        let (mut processor, _) = processor(ScriptedEngine::new(), output);

        processor.process_one(&VoiceRequest::new("hello")).unwrap();

        assert_eq!(processor.state(), ProcessorState::Idle);
        assert!(processor.session().is_empty());
        assert_eq!(plays.lock().unwrap().len(), 1);
        assert_eq!(processor.stats().processed(), 1);
    }

    #[test]
    fn synthesis_failure_skips_playback() {
        let output = MockAudioOutput::new();
        let plays = output.call_log();
        let (mut processor, renderer) =
            processor(ScriptedEngine::new().with_failure_on("bad"), output);

        let result = processor.process_one(&VoiceRequest::new("bad"));

        assert!(matches!(result, Err(TalkboxError::Engine { .. })));
        assert_eq!(processor.state(), ProcessorState::Idle);
        assert!(processor.session().is_empty());
        assert!(plays.lock().unwrap().is_empty());
        drop(processor);
        assert!(renderer.is_empty());
    }

    #[test]
    fn late_engine_failure_discards_delivered_audio() {
        let output = MockAudioOutput::new();
        let plays = output.call_log();
        let engine = ScriptedEngine::new().with_synchronize_failure_on("late");
        let (mut processor, renderer) = processor(engine, output);

        // Audio and mouth events reach the session before the engine fails.
        let result = processor.process_one(&VoiceRequest::new("fails late"));
        assert!(matches!(result, Err(TalkboxError::Engine { .. })));
        assert_eq!(processor.state(), ProcessorState::Idle);
        assert!(processor.session().is_empty());
        assert!(processor.session().mouth_events().is_empty());
        assert!(plays.lock().unwrap().is_empty());

        processor.process_one(&VoiceRequest::new("fine")).unwrap();
        {
            let plays = plays.lock().unwrap();
            assert_eq!(plays.len(), 1);
            // Only the second request's own chunk, nothing carried over.
            assert_eq!(plays[0].samples, 220);
        }
        assert_eq!(processor.stats().failed(), 1);
        assert_eq!(processor.stats().processed(), 1);

        drop(processor);
        assert_eq!(renderer.kinds(), vec![MouthKind::Open, MouthKind::Close]);
    }

    #[test]
    fn playback_failure_still_clears_session() {
        let (mut processor, _) =
            processor(ScriptedEngine::new(), MockAudioOutput::new().with_failure());

        let result = processor.process_one(&VoiceRequest::new("hello"));

        assert!(matches!(result, Err(TalkboxError::Audio { .. })));
        assert!(processor.session().is_empty());
        assert_eq!(processor.stats().failed(), 1);
    }

    #[test]
    fn empty_text_is_engine_error() {
        let (mut processor, _) = processor(ScriptedEngine::new(), MockAudioOutput::new());
        let result = processor.process_one(&VoiceRequest::new("  "));
        assert!(matches!(result, Err(TalkboxError::Engine { .. })));
    }

    #[test]
    fn mouth_cues_fire_during_playback() {
        let engine = ScriptedEngine::new().with_chunks(vec![ScriptedChunk::new(
            vec![0; 2205],
            vec![
                BoundaryEvent::word(0),
                BoundaryEvent::word(40),
                BoundaryEvent::end(80),
            ],
        )]);
        let output = MockAudioOutput::new().with_play_duration(Duration::from_millis(100));
        let (mut processor, renderer) = processor(engine, output);

        processor.process_one(&VoiceRequest::new("two words")).unwrap();
        drop(processor);

        assert_eq!(
            renderer.kinds(),
            vec![
                MouthKind::Open,
                MouthKind::Close,
                MouthKind::Open,
                MouthKind::Close
            ]
        );
    }

    #[test]
    fn run_reports_failures_and_keeps_going() {
        let reporter = Arc::new(CollectingReporter::new());
        let output = MockAudioOutput::new();
        let plays = output.call_log();
        let (processor, _) = processor(ScriptedEngine::new().with_failure_on("boom"), output);
        let mut processor = processor.with_error_reporter(reporter.clone());

        let (tx, rx) = unbounded();
        for text in ["one", "boom", "", "two"] {
            tx.send(VoiceRequest::new(text)).unwrap();
        }
        drop(tx);

        processor.run(rx);

        assert_eq!(plays.lock().unwrap().len(), 2);
        let failures = reporter.failures();
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].0, "boom");
        assert_eq!(processor.stats().processed(), 2);
        assert_eq!(processor.stats().failed(), 2);
    }

    #[test]
    fn shared_stats_are_updated() {
        let stats = Arc::new(ProcessorStats::new());
        let (processor, _) = processor(ScriptedEngine::new(), MockAudioOutput::new());
        let mut processor = processor.with_stats(stats.clone());

        processor.process_one(&VoiceRequest::new("hi")).unwrap();

        assert_eq!(stats.processed(), 1);
        assert!(!stats.busy());
    }

    #[test]
    fn state_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ProcessorState::Synthesizing).unwrap(),
            "\"synthesizing\""
        );
    }
}
