//! Synthesis through an eSpeak-compatible command (`espeak-ng --stdout`).
//!
//! The CLI exposes no word timing, so the utterance is reported as a single
//! word at 0ms and an end boundary where the audio stops.

use crate::config::VoiceConfig;
use crate::defaults;
use crate::error::{Result, TalkboxError};
use crate::speech::engine::{BoundaryEvent, ChunkControl, SynthSink, SynthesisEngine};
use std::io::{Cursor, Write};
use std::process::{Command, Stdio};

/// Engine that shells out to an eSpeak-compatible binary per request.
pub struct CommandEngine {
    program: String,
    voice: String,
    rate: u32,
    pitch: u32,
    buffer_ms: u32,
    sample_rate: u32,
}

impl CommandEngine {
    /// Create an engine from the voice configuration.
    ///
    /// Fails if the configured binary cannot be run at all.
    pub fn new(config: &VoiceConfig) -> Result<Self> {
        let engine = Self {
            program: config.command.clone(),
            voice: voice_argument(&config.language, &config.name),
            rate: config.rate,
            pitch: config.pitch,
            buffer_ms: config.buffer_ms,
            sample_rate: defaults::SYNTH_SAMPLE_RATE,
        };

        Command::new(&engine.program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| TalkboxError::EngineInit {
                message: format!("cannot run '{}': {}", engine.program, e),
            })?;

        tracing::info!(
            program = %engine.program,
            voice = %engine.voice,
            "using command speech engine"
        );
        Ok(engine)
    }

    fn run(&self, text: &str) -> Result<Vec<u8>> {
        let mut child = Command::new(&self.program)
            .arg("--stdout")
            .arg("--stdin")
            .args(["-v", &self.voice])
            .args(["-s", &self.rate.to_string()])
            .args(["-p", &self.pitch.to_string()])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                TalkboxError::engine(format!("failed to start '{}': {}", self.program, e))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .map_err(|e| TalkboxError::engine(format!("failed to send text: {}", e)))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| {
                TalkboxError::engine(format!("'{}' did not finish: {}", self.program, e))
            })?;

        if !output.status.success() {
            return Err(TalkboxError::engine(format!(
                "'{}' exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(output.stdout)
    }
}

impl SynthesisEngine for CommandEngine {
    fn synthesize(&mut self, text: &str, sink: &mut dyn SynthSink) -> Result<()> {
        let wav = self.run(text)?;
        let (samples, sample_rate) = decode_wav(&wav)?;
        self.sample_rate = sample_rate;

        let chunk_len = chunk_samples(sample_rate, self.buffer_ms);
        deliver(&samples, sample_rate, chunk_len, sink);
        Ok(())
    }

    fn synchronize(&mut self) -> Result<()> {
        // The child process has exited before synthesize returns.
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn name(&self) -> &str {
        &self.program
    }
}

/// `-v` argument: the language with the configured variant appended.
fn voice_argument(language: &str, name: &str) -> String {
    if name.is_empty() || name == language {
        language.to_string()
    } else {
        format!("{}+{}", language, name)
    }
}

fn chunk_samples(sample_rate: u32, buffer_ms: u32) -> usize {
    ((sample_rate as u64 * buffer_ms as u64) / 1000).max(1) as usize
}

/// Decode WAV bytes into mono i16 samples and their sample rate.
///
/// eSpeak writing to a pipe cannot seek back to fix the data length, so the
/// header claims far more data than follows. The payload is read directly and
/// ends at whichever comes first: the declared length or the buffer.
fn decode_wav(bytes: &[u8]) -> Result<(Vec<i16>, u32)> {
    let reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| TalkboxError::engine(format!("Failed to parse WAV output: {}", e)))?;

    let spec = reader.spec();
    if spec.bits_per_sample != 16 || spec.sample_format != hound::SampleFormat::Int {
        return Err(TalkboxError::engine(format!(
            "unsupported WAV format: {} bit {:?}",
            spec.bits_per_sample, spec.sample_format
        )));
    }

    let declared_bytes = (reader.len() as usize).saturating_mul(2);
    // The header parser stops at the start of the data chunk.
    let data_start = reader.into_inner().position() as usize;
    let payload = bytes.get(data_start..).unwrap_or(&[]);
    let payload = &payload[..payload.len().min(declared_bytes)];

    let raw: Vec<i16> = payload
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    let channels = spec.channels.max(1) as usize;
    let samples = if channels == 1 {
        raw
    } else {
        raw.chunks_exact(channels)
            .map(|frame| {
                let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                (sum / channels as i32) as i16
            })
            .collect()
    };

    Ok((samples, spec.sample_rate))
}

/// Replay decoded audio through the chunk callback protocol.
fn deliver(samples: &[i16], sample_rate: u32, chunk_len: usize, sink: &mut dyn SynthSink) {
    let duration_ms = samples.len() as u64 * 1000 / sample_rate.max(1) as u64;
    let chunk_count = samples.chunks(chunk_len).len();

    for (index, chunk) in samples.chunks(chunk_len).enumerate() {
        let mut events = Vec::new();
        if index == 0 {
            events.push(BoundaryEvent::word(0));
        }
        if index + 1 == chunk_count {
            events.push(BoundaryEvent::end(duration_ms));
        }
        if sink.on_chunk(chunk, &events) == ChunkControl::Stop {
            return;
        }
    }

    sink.on_chunk(&[], &[]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Collect {
        samples: Vec<i16>,
        events: Vec<BoundaryEvent>,
        calls: usize,
    }

    impl SynthSink for Collect {
        fn on_chunk(&mut self, samples: &[i16], events: &[BoundaryEvent]) -> ChunkControl {
            self.calls += 1;
            self.events.extend_from_slice(events);
            if samples.is_empty() {
                return ChunkControl::Stop;
            }
            self.samples.extend_from_slice(samples);
            ChunkControl::Continue
        }
    }

    fn make_wav(sample_rate: u32, channels: u16, samples: &[i16]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
        cursor.into_inner()
    }

    #[test]
    fn voice_argument_appends_variant() {
        assert_eq!(voice_argument("en", "klatt"), "en+klatt");
        assert_eq!(voice_argument("en", "en"), "en");
        assert_eq!(voice_argument("de", ""), "de");
    }

    #[test]
    fn chunk_samples_from_buffer_length() {
        assert_eq!(chunk_samples(22050, 1000), 22050);
        assert_eq!(chunk_samples(22050, 100), 2205);
        assert_eq!(chunk_samples(22050, 0), 1);
    }

    #[test]
    fn decode_mono_wav() {
        let wav = make_wav(22050, 1, &[1, 2, 3, 4]);
        let (samples, rate) = decode_wav(&wav).unwrap();
        assert_eq!(samples, vec![1, 2, 3, 4]);
        assert_eq!(rate, 22050);
    }

    #[test]
    fn decode_stereo_wav_downmixes() {
        let wav = make_wav(16000, 2, &[100, 200, 300, 500]);
        let (samples, _) = decode_wav(&wav).unwrap();
        assert_eq!(samples, vec![150, 400]);
    }

    #[test]
    fn decode_tolerates_oversized_data_length() {
        let mut wav = make_wav(22050, 1, &[7, 8, 9]);
        // Patch the data chunk length (last header field before the payload)
        let data_pos = wav
            .windows(4)
            .position(|w| w == b"data")
            .unwrap();
        wav[data_pos + 4..data_pos + 8].copy_from_slice(&0x7fff_f000u32.to_le_bytes());

        let (samples, _) = decode_wav(&wav).unwrap();
        assert_eq!(samples, vec![7, 8, 9]);
    }

    #[test]
    fn decode_stops_at_declared_length() {
        let mut wav = make_wav(22050, 1, &[7, 8, 9]);
        // Trailing chunk after the data, e.g. LIST metadata
        wav.extend_from_slice(b"LIST\x00\x00\x00\x00");
        let (samples, _) = decode_wav(&wav).unwrap();
        assert_eq!(samples, vec![7, 8, 9]);
    }

    #[test]
    fn decode_ignores_odd_trailing_byte() {
        let mut wav = make_wav(22050, 1, &[7, 8]);
        let data_pos = wav.windows(4).position(|w| w == b"data").unwrap();
        wav[data_pos + 4..data_pos + 8].copy_from_slice(&0x7fff_f000u32.to_le_bytes());
        wav.push(0x01);

        let (samples, _) = decode_wav(&wav).unwrap();
        assert_eq!(samples, vec![7, 8]);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_wav(b"definitely not a wav file").is_err());
    }

    #[test]
    fn deliver_reports_word_and_end() {
        let samples = vec![0i16; 22050]; // one second
        let mut sink = Collect::default();

        deliver(&samples, 22050, 10000, &mut sink);

        assert_eq!(sink.samples.len(), 22050);
        assert_eq!(sink.calls, 4); // three chunks plus end-of-stream
        assert_eq!(
            sink.events,
            vec![BoundaryEvent::word(0), BoundaryEvent::end(1000)]
        );
    }

    #[test]
    fn deliver_empty_audio_only_signals_end_of_stream() {
        let mut sink = Collect::default();
        deliver(&[], 22050, 100, &mut sink);
        assert_eq!(sink.calls, 1);
        assert!(sink.events.is_empty());
    }

    #[test]
    fn missing_binary_is_init_error() {
        let config = VoiceConfig {
            command: "/nonexistent/talkbox-speak-binary".to_string(),
            ..VoiceConfig::default()
        };
        assert!(matches!(
            CommandEngine::new(&config),
            Err(TalkboxError::EngineInit { .. })
        ));
    }

    /// Stand-in for `espeak-ng` that prints a streamed WAV: the data length
    /// is left at eSpeak's pipe placeholder.
    #[cfg(unix)]
    fn fake_espeak(dir: &std::path::Path, sample_count: usize) -> String {
        use std::os::unix::fs::PermissionsExt;

        let mut wav = make_wav(22050, 1, &vec![3i16; sample_count]);
        let data_pos = wav.windows(4).position(|w| w == b"data").unwrap();
        wav[data_pos + 4..data_pos + 8].copy_from_slice(&0x7fff_f000u32.to_le_bytes());
        let wav_path = dir.join("speech.wav");
        std::fs::write(&wav_path, wav).unwrap();

        let script = dir.join("espeak-ng");
        std::fs::write(
            &script,
            format!(
                concat!(
                    "#!/bin/sh\n",
                    "if [ \"$1\" = \"--version\" ]; then exit 0; fi\n",
                    "cat >/dev/null\n",
                    "cat '{}'\n"
                ),
                wav_path.display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script.to_string_lossy().into_owned()
    }

    #[cfg(unix)]
    #[test]
    fn streamed_espeak_output_is_spoken() {
        use crate::voice::Session;

        let dir = tempfile::tempdir().unwrap();
        let config = VoiceConfig {
            command: fake_espeak(dir.path(), 100),
            ..VoiceConfig::default()
        };
        let mut engine = CommandEngine::new(&config).unwrap();
        let mut session = Session::default();
        session.begin(engine.sample_rate());

        engine.synthesize("hello", &mut session).unwrap();

        assert_eq!(session.samples().len(), 100);
        assert_eq!(engine.sample_rate(), 22050);
        assert!(!session.mouth_events().is_empty());
    }
}
