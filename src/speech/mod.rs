//! Text-to-speech engines and the adapter that feeds a voice session.

pub mod command;
pub mod engine;
#[cfg(feature = "espeak")]
pub mod espeak;
pub mod synthesizer;

pub use command::CommandEngine;
pub use engine::{
    BoundaryEvent, BoundaryKind, ChunkControl, ScriptedChunk, ScriptedEngine, SynthCall,
    SynthSink, SynthesisEngine,
};
#[cfg(feature = "espeak")]
pub use espeak::EspeakEngine;
pub use synthesizer::Synthesizer;
