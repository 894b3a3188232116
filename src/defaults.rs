//! Default configuration constants for talkbox.
//!
//! Shared by the config types, the engine backends and the tests so the
//! reference voice setup lives in one place.

/// Sample rate of eSpeak NG output in Hz.
///
/// Half of the nominal 44.1kHz device rate; audio is resampled on output
/// when the device cannot run at this rate.
pub const SYNTH_SAMPLE_RATE: u32 = 22050;

/// How far before a word boundary the mouth closes when it is already open.
pub const CLOSE_LEAD_MS: u64 = 20;

/// Engine-side audio buffer length in milliseconds.
///
/// Controls how much audio each synthesis callback delivers.
pub const BUFFER_MS: u32 = 4096;

/// Default address for the HTTP intake.
pub const BIND_ADDR: &str = "0.0.0.0:80";

/// Default server URL used by `talkbox say`.
pub const SERVER_URL: &str = "http://127.0.0.1:80";

/// Default voice name.
pub const VOICE_NAME: &str = "klatt";

/// Default voice language.
pub const LANGUAGE: &str = "en";

/// Default voice age passed to the engine's voice selection.
pub const VOICE_AGE: u8 = 80;

/// Default voice variant.
pub const VOICE_VARIANT: u8 = 1;

/// Default pitch (0-100, 50 is the engine's neutral pitch).
pub const PITCH: u32 = 50;

/// Default speaking rate in words per minute.
pub const RATE: u32 = 120;

/// Default synthesis command for the subprocess engine.
pub const SYNTH_COMMAND: &str = "espeak-ng";

/// Players tried in order by the subprocess audio output.
pub const PLAYERS: &[&str] = &["aplay", "paplay", "ffplay"];
