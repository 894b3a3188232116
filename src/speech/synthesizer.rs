use crate::error::{Result, TalkboxError};
use crate::speech::engine::SynthesisEngine;
use crate::voice::session::Session;

/// Drives one engine to fill a [`Session`] per utterance.
///
/// Owns the engine, so it lives on the thread that built it.
pub struct Synthesizer<E: SynthesisEngine> {
    engine: E,
}

impl<E: SynthesisEngine> Synthesizer<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    /// Synthesize `text` into `session`, blocking until the engine is done.
    ///
    /// The session is reset first. Empty or whitespace-only text is rejected
    /// without touching the engine.
    pub fn synthesize(&mut self, text: &str, session: &mut Session) -> Result<()> {
        if text.trim().is_empty() {
            return Err(TalkboxError::engine("nothing to synthesize: text is empty"));
        }

        session.begin(self.engine.sample_rate());

        self.engine.synthesize(text, session)?;
        self.engine.synchronize()?;

        // Subprocess engines only learn the rate once output is decoded.
        session.set_sample_rate(self.engine.sample_rate());

        tracing::debug!(
            chars = text.chars().count(),
            samples = session.samples().len(),
            events = session.mouth_events().len(),
            "synthesis complete"
        );
        Ok(())
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }
}
