//! Playback through an external player process reading WAV from stdin.

use crate::audio::output::AudioOutput;
use crate::audio::wav::encode_wav;
use crate::defaults;
use crate::error::{Result, TalkboxError};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Audio output that pipes each utterance into `aplay`, `paplay` or `ffplay`.
///
/// `play` returns once the player exits, which is when playback is complete.
pub struct CommandAudioOutput {
    player: PathBuf,
    kind: PlayerKind,
    device: Option<String>,
    label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlayerKind {
    Aplay,
    Paplay,
    Ffplay,
    Other,
}

impl PlayerKind {
    fn from_path(path: &Path) -> Self {
        match path.file_name().and_then(|s| s.to_str()).unwrap_or("") {
            "aplay" => Self::Aplay,
            "paplay" => Self::Paplay,
            "ffplay" => Self::Ffplay,
            _ => Self::Other,
        }
    }

    fn args(self, device: Option<&str>) -> Vec<String> {
        let mut args = Vec::new();
        match self {
            Self::Aplay => {
                args.push("-q".to_string());
                if let Some(device) = device {
                    args.extend(["-D".to_string(), device.to_string()]);
                }
                args.push("-".to_string());
            }
            Self::Paplay => {
                if let Some(device) = device {
                    args.push(format!("--device={}", device));
                }
            }
            Self::Ffplay => {
                args.extend(
                    ["-autoexit", "-nodisp", "-loglevel", "error", "-i", "pipe:0"]
                        .map(String::from),
                );
            }
            Self::Other => {}
        }
        args
    }
}

impl CommandAudioOutput {
    /// Pick a player: the preferred one if given and found, else the first of
    /// `aplay`, `paplay`, `ffplay` on `PATH`.
    pub fn new(preferred: Option<&str>, device: Option<&str>) -> Result<Self> {
        let player = find_player(preferred).ok_or_else(|| TalkboxError::AudioInit {
            message: match preferred {
                Some(name) => format!("audio player '{}' not found", name),
                None => format!("no audio player found (tried {})", defaults::PLAYERS.join(", ")),
            },
        })?;

        let kind = PlayerKind::from_path(&player);
        let label = player
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("player")
            .to_string();

        tracing::info!(player = %player.display(), device = ?device, "using command audio output");

        Ok(Self {
            player,
            kind,
            device: device.map(String::from),
            label,
        })
    }
}

impl AudioOutput for CommandAudioOutput {
    fn play(&mut self, samples: &[i16], sample_rate: u32) -> Result<()> {
        let wav = encode_wav(samples, sample_rate)?;

        let mut child = Command::new(&self.player)
            .args(self.kind.args(self.device.as_deref()))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| TalkboxError::audio(format!("failed to start {}: {}", self.label, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            // A player that exits early closes the pipe; its exit status says why.
            if let Err(e) = stdin.write_all(&wav) {
                tracing::debug!(error = %e, "player closed stdin early");
            }
        }

        let output = child
            .wait_with_output()
            .map_err(|e| TalkboxError::audio(format!("{} did not finish: {}", self.label, e)))?;

        if !output.status.success() {
            return Err(TalkboxError::audio(format!(
                "{} exited with {}: {}",
                self.label,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.label
    }
}

/// Resolve a player binary: `preferred` if given, else the first default on `PATH`.
pub fn find_player(preferred: Option<&str>) -> Option<PathBuf> {
    if let Some(name) = preferred {
        return find_in_path(name);
    }
    defaults::PLAYERS.iter().find_map(|name| find_in_path(name))
}

fn find_in_path(bin: &str) -> Option<PathBuf> {
    if bin.contains(std::path::MAIN_SEPARATOR) {
        let path = PathBuf::from(bin);
        return path.exists().then_some(path);
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(bin))
        .find(|candidate| candidate.is_file())
}
