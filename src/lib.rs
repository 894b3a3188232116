//! talkbox - speak text received over HTTP
//!
//! Serializes voice requests onto one voice thread that synthesizes speech,
//! plays it and fires mouth open/close cues in time with the audio.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod daemon;
pub mod defaults;
pub mod error;
pub mod intake;
pub mod mouth;
pub mod speech;
pub mod voice;

// Core traits (engine → session → output)
pub use audio::output::AudioOutput;
pub use mouth::renderer::MouthRenderer;
pub use speech::engine::{SynthSink, SynthesisEngine};
pub use voice::report::ErrorReporter;

// Voice pipeline
pub use voice::{RequestSender, VoiceHandle, VoiceProcessor, VoiceRequest, VoiceWorker};

// Error handling
pub use error::{Result, TalkboxError};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
