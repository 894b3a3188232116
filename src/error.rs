//! Error types for talkbox.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TalkboxError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Synthesis engine errors
    #[error("Speech engine initialization failed: {message}")]
    EngineInit { message: String },

    #[error("Speech synthesis failed: {message}")]
    Engine { message: String },

    // Audio output errors
    #[error("Audio device not found: {device}")]
    AudioDeviceNotFound { device: String },

    #[error("Audio output initialization failed: {message}")]
    AudioInit { message: String },

    #[error("Audio playback failed: {message}")]
    Audio { message: String },

    // Request intake errors
    #[error("Invalid voice request: {message}")]
    InvalidRequest { message: String },

    #[error("Voice worker is not running")]
    WorkerStopped,

    #[error("Intake server error: {message}")]
    Intake { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

impl TalkboxError {
    /// Shorthand for a synthesis failure.
    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine {
            message: message.into(),
        }
    }

    /// Shorthand for a playback failure.
    pub fn audio(message: impl Into<String>) -> Self {
        Self::Audio {
            message: message.into(),
        }
    }

    /// Errors the process cannot run without recovering from.
    ///
    /// Startup failures of the engine or the audio device are fatal; per-request
    /// synthesis and playback failures are not.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TalkboxError::EngineInit { .. }
                | TalkboxError::AudioInit { .. }
                | TalkboxError::AudioDeviceNotFound { .. }
                | TalkboxError::ConfigFileNotFound { .. }
                | TalkboxError::ConfigInvalidValue { .. }
                | TalkboxError::Config(_)
        )
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, TalkboxError>;
