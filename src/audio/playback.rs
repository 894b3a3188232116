//! Native audio output using CPAL (Cross-Platform Audio Library).

use crate::audio::output::AudioOutput;
use crate::audio::resample::prepare_for_device;
use crate::error::{Result, TalkboxError};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample, StreamConfig};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// Extra time allowed past the expected duration before a stalled stream is an error.
const STALL_GRACE: Duration = Duration::from_secs(2);

/// Run a closure with stderr temporarily redirected to /dev/null.
///
/// This suppresses noisy ALSA/JACK/PipeWire messages that CPAL triggers
/// when probing audio backends.
///
/// # Safety
/// Uses `libc::dup`/`libc::dup2` to save and restore file descriptor 2 (stderr).
/// Safe as long as no other thread is concurrently manipulating fd 2.
fn with_suppressed_stderr<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    unsafe {
        let saved_fd = libc::dup(2);
        let devnull = libc::open(c"/dev/null".as_ptr(), libc::O_WRONLY);
        if saved_fd >= 0 && devnull >= 0 {
            libc::dup2(devnull, 2);
            libc::close(devnull);
        }

        let result = f();

        if saved_fd >= 0 {
            libc::dup2(saved_fd, 2);
            libc::close(saved_fd);
        }

        result
    }
}

/// Suppress noisy JACK/ALSA messages that occur during audio backend probing.
///
/// # Safety
/// Modifies environment variables; call at startup before spawning threads.
pub fn suppress_audio_warnings() {
    // SAFETY: Called at startup before any threads are spawned
    unsafe {
        std::env::set_var("JACK_NO_START_SERVER", "1");
        std::env::set_var("JACK_NO_AUDIO_RESERVATION", "1");
        std::env::set_var("PIPEWIRE_DEBUG", "0");
        std::env::set_var("ALSA_DEBUG", "0");
        std::env::set_var("PW_LOG", "0");
    }
}

/// List output device names, marking the host default.
pub fn list_output_devices() -> Result<Vec<String>> {
    let (default_name, devices) = with_suppressed_stderr(|| {
        let host = cpal::default_host();
        let default_name = host.default_output_device().and_then(|d| d.name().ok());
        let devices = host.output_devices().map(|devices| {
            devices
                .filter_map(|device| device.name().ok())
                .collect::<Vec<_>>()
        });
        (default_name, devices)
    });

    let devices = devices.map_err(|e| TalkboxError::AudioInit {
        message: format!("Failed to enumerate output devices: {}", e),
    })?;

    Ok(devices
        .into_iter()
        .map(|name| {
            if default_name.as_deref() == Some(name.as_str()) {
                format!("{} [default]", name)
            } else {
                name
            }
        })
        .collect())
}

fn find_output_device(device_name: Option<&str>) -> Result<cpal::Device> {
    with_suppressed_stderr(|| {
        let host = cpal::default_host();

        let Some(name) = device_name else {
            return host
                .default_output_device()
                .ok_or_else(|| TalkboxError::AudioDeviceNotFound {
                    device: "default".to_string(),
                });
        };

        let devices = host
            .output_devices()
            .map_err(|e| TalkboxError::AudioInit {
                message: format!("Failed to enumerate devices: {}", e),
            })?;

        for device in devices {
            if let Ok(dev_name) = device.name()
                && dev_name == name
            {
                return Ok(device);
            }
        }

        Err(TalkboxError::AudioDeviceNotFound {
            device: name.to_string(),
        })
    })
}

/// Playback state shared with the device callback.
#[derive(Default)]
struct Playback {
    frames: Vec<i16>,
    position: usize,
    active: bool,
    error: Option<String>,
}

type Shared = Arc<(Mutex<Playback>, Condvar)>;

/// Audio output backed by one long-lived CPAL output stream.
///
/// The stream runs for the life of the output and plays silence between
/// utterances. `play` hands the converted samples to the callback and waits on
/// a condition variable until the callback has consumed them.
pub struct CpalAudioOutput {
    _stream: cpal::Stream,
    shared: Shared,
    device_rate: u32,
    device_channels: usize,
    label: String,
}

impl CpalAudioOutput {
    /// Open the named device (or the default) and start its stream.
    pub fn new(device_name: Option<&str>) -> Result<Self> {
        let device = find_output_device(device_name)?;
        let label = device.name().unwrap_or_else(|_| "output".to_string());

        let supported = device
            .default_output_config()
            .map_err(|e| TalkboxError::AudioInit {
                message: format!("Failed to query default output config: {}", e),
            })?;

        let device_rate = supported.sample_rate().0;
        let device_channels = supported.channels() as usize;
        let config: StreamConfig = supported.clone().into();
        let shared: Shared = Arc::new((Mutex::new(Playback::default()), Condvar::new()));

        let stream = match supported.sample_format() {
            SampleFormat::I16 => build_stream::<i16>(&device, &config, Arc::clone(&shared))?,
            SampleFormat::F32 => build_stream::<f32>(&device, &config, Arc::clone(&shared))?,
            SampleFormat::U16 => build_stream::<u16>(&device, &config, Arc::clone(&shared))?,
            format => {
                return Err(TalkboxError::AudioInit {
                    message: format!(
                        "Unsupported output sample format: {:?}. \
                         Try specifying a device with audio.device.",
                        format
                    ),
                });
            }
        };

        stream.play().map_err(|e| TalkboxError::AudioInit {
            message: format!("Failed to start output stream: {}", e),
        })?;

        tracing::info!(
            device = %label,
            sample_rate = device_rate,
            channels = device_channels,
            "audio output opened"
        );

        Ok(Self {
            _stream: stream,
            shared,
            device_rate,
            device_channels,
            label,
        })
    }
}

impl AudioOutput for CpalAudioOutput {
    fn play(&mut self, samples: &[i16], sample_rate: u32) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let frames =
            prepare_for_device(samples, sample_rate, self.device_rate, self.device_channels);
        let expected = Duration::from_millis(
            samples.len() as u64 * 1000 / sample_rate.max(1) as u64,
        );

        let (lock, condvar) = &*self.shared;
        let mut state = lock
            .lock()
            .map_err(|_| TalkboxError::audio("playback state poisoned"))?;
        state.frames = frames;
        state.position = 0;
        state.error = None;
        state.active = true;

        let deadline = Instant::now() + expected + STALL_GRACE;
        while state.active {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                state.active = false;
                state.frames = Vec::new();
                return Err(TalkboxError::audio(format!(
                    "playback on '{}' stalled",
                    self.label
                )));
            }
            state = condvar
                .wait_timeout(state, remaining)
                .map_err(|_| TalkboxError::audio("playback state poisoned"))?
                .0;
        }

        state.frames = Vec::new();
        match state.error.take() {
            Some(message) => Err(TalkboxError::audio(message)),
            None => Ok(()),
        }
    }

    fn name(&self) -> &str {
        &self.label
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    shared: Shared,
) -> Result<cpal::Stream>
where
    T: SizedSample + FromSample<i16> + Default + Send + 'static,
{
    let error_shared = Arc::clone(&shared);

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let (lock, condvar) = &*shared;
                let Ok(mut state) = lock.lock() else {
                    data.fill(T::default());
                    return;
                };
                if !state.active {
                    data.fill(T::default());
                    return;
                }

                let remaining = state.frames.len().saturating_sub(state.position);
                let to_copy = remaining.min(data.len());
                let start = state.position;
                for (out, &sample) in data.iter_mut().zip(&state.frames[start..start + to_copy]) {
                    *out = T::from_sample(sample);
                }
                data[to_copy..].fill(T::default());
                state.position += to_copy;

                if state.position >= state.frames.len() {
                    state.active = false;
                    condvar.notify_all();
                }
            },
            move |err| {
                tracing::error!(error = %err, "output stream error");
                let (lock, condvar) = &*error_shared;
                if let Ok(mut state) = lock.lock() {
                    if state.active {
                        state.error = Some(format!("output stream error: {}", err));
                        state.active = false;
                    }
                    condvar.notify_all();
                }
            },
            None,
        )
        .map_err(|e| TalkboxError::AudioInit {
            message: format!("Failed to build output stream: {}", e),
        })
}
