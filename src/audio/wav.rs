//! WAV encoding and the file-writing output.

use crate::audio::output::AudioOutput;
use crate::error::{Result, TalkboxError};
use std::io::{Cursor, Seek, Write};
use std::path::{Path, PathBuf};

fn mono_spec(sample_rate: u32) -> hound::WavSpec {
    hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

fn write_samples<W: Write + Seek>(writer: W, samples: &[i16], sample_rate: u32) -> Result<()> {
    let mut wav = hound::WavWriter::new(writer, mono_spec(sample_rate))
        .map_err(|e| TalkboxError::audio(format!("Failed to start WAV: {}", e)))?;
    for &sample in samples {
        wav.write_sample(sample)
            .map_err(|e| TalkboxError::audio(format!("Failed to write WAV sample: {}", e)))?;
    }
    wav.finalize()
        .map_err(|e| TalkboxError::audio(format!("Failed to finalize WAV: {}", e)))?;
    Ok(())
}

/// Encode mono 16-bit samples as an in-memory WAV file.
pub fn encode_wav(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    write_samples(&mut cursor, samples, sample_rate)?;
    Ok(cursor.into_inner())
}

/// Writes each utterance to `<dir>/utterance-NNNN.wav`.
///
/// Numbering continues after the highest existing file so restarts never
/// overwrite earlier output.
pub struct WavFileOutput {
    dir: PathBuf,
    next_index: u32,
    last_path: Option<PathBuf>,
}

impl WavFileOutput {
    pub fn new(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|e| TalkboxError::AudioInit {
            message: format!("cannot create {}: {}", dir.display(), e),
        })?;

        let next_index = next_free_index(dir)?;
        tracing::info!(dir = %dir.display(), next_index, "writing utterances as WAV files");

        Ok(Self {
            dir: dir.to_path_buf(),
            next_index,
            last_path: None,
        })
    }

    /// Path of the most recently written file.
    pub fn last_path(&self) -> Option<&Path> {
        self.last_path.as_deref()
    }
}

impl AudioOutput for WavFileOutput {
    fn play(&mut self, samples: &[i16], sample_rate: u32) -> Result<()> {
        let path = self.dir.join(file_name(self.next_index));
        let file = std::fs::File::create(&path)?;
        write_samples(std::io::BufWriter::new(file), samples, sample_rate)?;

        tracing::debug!(path = %path.display(), samples = samples.len(), "wrote utterance");
        self.next_index += 1;
        self.last_path = Some(path);
        Ok(())
    }

    fn name(&self) -> &str {
        "wav"
    }
}

fn file_name(index: u32) -> String {
    format!("utterance-{:04}.wav", index)
}

fn next_free_index(dir: &Path) -> Result<u32> {
    let mut next = 1;
    for entry in std::fs::read_dir(dir)? {
        let name = entry?.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if let Some(index) = name
            .strip_prefix("utterance-")
            .and_then(|rest| rest.strip_suffix(".wav"))
            .and_then(|digits| digits.parse::<u32>().ok())
        {
            next = next.max(index + 1);
        }
    }
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn read_back(path: &Path) -> (hound::WavSpec, Vec<i16>) {
        let mut reader = hound::WavReader::open(path).unwrap();
        let spec = reader.spec();
        let samples = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        (spec, samples)
    }

    #[test]
    fn encode_wav_produces_readable_mono() {
        let bytes = encode_wav(&[1, -2, 3], 22050).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");

        let mut reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.spec().sample_rate, 22050);
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![1, -2, 3]);
    }

    #[test]
    fn writes_numbered_files() {
        let dir = TempDir::new().unwrap();
        let mut output = WavFileOutput::new(dir.path()).unwrap();

        output.play(&[10, 20], 22050).unwrap();
        output.play(&[30], 16000).unwrap();

        let first = dir.path().join("utterance-0001.wav");
        let second = dir.path().join("utterance-0002.wav");
        assert_eq!(read_back(&first).1, vec![10, 20]);

        let (spec, samples) = read_back(&second);
        assert_eq!(spec.sample_rate, 16000);
        assert_eq!(samples, vec![30]);
        assert_eq!(output.last_path(), Some(second.as_path()));
    }

    #[test]
    fn numbering_continues_after_existing_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("utterance-0007.wav"), b"").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();

        let mut output = WavFileOutput::new(dir.path()).unwrap();
        output.play(&[1], 22050).unwrap();

        assert!(dir.path().join("utterance-0008.wav").exists());
    }

    #[test]
    fn creates_missing_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        let mut output = WavFileOutput::new(&nested).unwrap();
        output.play(&[], 22050).unwrap();
        assert!(nested.join("utterance-0001.wav").exists());
    }
}
