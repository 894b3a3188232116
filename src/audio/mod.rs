//! Audio output backends.

pub mod command;
pub mod output;
#[cfg(feature = "cpal-audio")]
pub mod playback;
pub mod resample;
pub mod wav;

pub use command::CommandAudioOutput;
pub use output::{AudioOutput, MockAudioOutput, NullAudioOutput, PlayCall};
#[cfg(feature = "cpal-audio")]
pub use playback::{CpalAudioOutput, list_output_devices, suppress_audio_warnings};
pub use wav::{WavFileOutput, encode_wav};
