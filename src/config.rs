use crate::defaults;
use crate::error::{Result, TalkboxError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub voice: VoiceConfig,
    pub audio: AudioConfig,
    pub mouth: MouthConfig,
}

/// HTTP intake configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

/// Speech synthesis configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VoiceConfig {
    pub engine: EngineKind,
    /// Binary used by the subprocess engine
    pub command: String,
    pub name: String,
    pub language: String,
    pub gender: Gender,
    pub age: u8,
    pub variant: u8,
    /// 0-100
    pub pitch: u32,
    /// Words per minute
    pub rate: u32,
    /// Engine buffer length per synthesis callback
    pub buffer_ms: u32,
}

/// Audio output configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub backend: OutputBackend,
    pub device: Option<String>,
    pub player: Option<String>,
    pub wav_dir: Option<PathBuf>,
}

/// Mouth cue configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MouthConfig {
    pub close_lead_ms: u64,
    pub renderer: RendererKind,
}

/// Synthesis engine selection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// `espeak-ng --stdout` subprocess
    Command,
    /// Linked libespeak-ng
    Espeak,
}

/// Voice gender hint passed to voice selection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    None,
    Male,
    Female,
}

/// Audio output selection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputBackend {
    /// Pipe WAV into aplay/paplay/ffplay
    Command,
    /// Native output device via cpal
    Device,
    /// Write numbered WAV files
    Wav,
    /// Discard audio
    Null,
}

impl OutputBackend {
    /// Parse a backend name as used in config files and env vars.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "command" => Some(Self::Command),
            "device" => Some(Self::Device),
            "wav" => Some(Self::Wav),
            "null" => Some(Self::Null),
            _ => None,
        }
    }
}

/// Where mouth cues go
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RendererKind {
    /// Print `open` / `close` to stdout
    Console,
    /// Log at debug level only
    Silent,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: defaults::BIND_ADDR.to_string(),
        }
    }
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            engine: EngineKind::Command,
            command: defaults::SYNTH_COMMAND.to_string(),
            name: defaults::VOICE_NAME.to_string(),
            language: defaults::LANGUAGE.to_string(),
            gender: Gender::Male,
            age: defaults::VOICE_AGE,
            variant: defaults::VOICE_VARIANT,
            pitch: defaults::PITCH,
            rate: defaults::RATE,
            buffer_ms: defaults::BUFFER_MS,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            backend: OutputBackend::Command,
            device: None,
            player: None,
            wav_dir: None,
        }
    }
}

impl Default for MouthConfig {
    fn default() -> Self {
        Self {
            close_lead_ms: defaults::CLOSE_LEAD_MS,
            renderer: RendererKind::Console,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing fields use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TalkboxError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                TalkboxError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if the file doesn't exist
    ///
    /// Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(TalkboxError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - TALKBOX_BIND → server.bind
    /// - TALKBOX_VOICE → voice.name
    /// - TALKBOX_LANGUAGE → voice.language
    /// - TALKBOX_AUDIO_DEVICE → audio.device
    /// - TALKBOX_AUDIO_BACKEND → audio.backend
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(bind) = std::env::var("TALKBOX_BIND")
            && !bind.is_empty()
        {
            self.server.bind = bind;
        }

        if let Ok(voice) = std::env::var("TALKBOX_VOICE")
            && !voice.is_empty()
        {
            self.voice.name = voice;
        }

        if let Ok(language) = std::env::var("TALKBOX_LANGUAGE")
            && !language.is_empty()
        {
            self.voice.language = language;
        }

        if let Ok(device) = std::env::var("TALKBOX_AUDIO_DEVICE")
            && !device.is_empty()
        {
            self.audio.device = Some(device);
        }

        if let Ok(backend) = std::env::var("TALKBOX_AUDIO_BACKEND")
            && !backend.is_empty()
        {
            match OutputBackend::parse(&backend) {
                Some(parsed) => self.audio.backend = parsed,
                None => tracing::warn!(value = %backend, "ignoring unknown TALKBOX_AUDIO_BACKEND"),
            }
        }

        self
    }

    /// Check values the engine and device would otherwise reject at startup.
    pub fn validate(&self) -> Result<()> {
        if self.voice.rate == 0 {
            return Err(invalid("voice.rate", "must be greater than zero"));
        }
        if self.voice.pitch > 100 {
            return Err(invalid("voice.pitch", "must be between 0 and 100"));
        }
        if self.voice.buffer_ms == 0 {
            return Err(invalid("voice.buffer_ms", "must be greater than zero"));
        }
        if self.voice.engine == EngineKind::Command && self.voice.command.trim().is_empty() {
            return Err(invalid("voice.command", "must name a synthesis binary"));
        }
        if self.audio.backend == OutputBackend::Wav && self.audio.wav_dir.is_none() {
            return Err(invalid("audio.wav_dir", "required when audio.backend = \"wav\""));
        }
        if self.server.bind.parse::<std::net::SocketAddr>().is_err() {
            return Err(invalid(
                "server.bind",
                &format!("'{}' is not a socket address", self.server.bind),
            ));
        }
        Ok(())
    }

    /// Render the configuration as TOML (for `talkbox config show`).
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| TalkboxError::Other(e.to_string()))
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/talkbox/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("talkbox")
            .join("config.toml")
    }
}

fn invalid(key: &str, message: &str) -> TalkboxError {
    TalkboxError::ConfigInvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}
