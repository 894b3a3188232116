//! Process wiring: build the engine, output and renderer from configuration,
//! start the voice thread, serve the intake and shut down on signals.

use crate::audio::{AudioOutput, CommandAudioOutput, NullAudioOutput, WavFileOutput};
use crate::config::{
    AudioConfig, Config, EngineKind, MouthConfig, OutputBackend, RendererKind, VoiceConfig,
};
use crate::error::{Result, TalkboxError};
use crate::intake::{self, IntakeState};
use crate::mouth::{ConsoleRenderer, LogRenderer, MouthRenderer};
use crate::speech::{CommandEngine, SynthesisEngine};
use crate::voice::{VoiceHandle, VoiceRequest, VoiceWorker};
use std::sync::Arc;

/// Create the configured synthesis engine. Must run on the voice thread.
pub fn build_engine(config: &VoiceConfig) -> Result<Box<dyn SynthesisEngine>> {
    match config.engine {
        EngineKind::Command => Ok(Box::new(CommandEngine::new(config)?)),
        #[cfg(feature = "espeak")]
        EngineKind::Espeak => Ok(Box::new(crate::speech::EspeakEngine::new(config)?)),
        #[cfg(not(feature = "espeak"))]
        EngineKind::Espeak => Err(TalkboxError::EngineInit {
            message: "talkbox was built without the 'espeak' feature".to_string(),
        }),
    }
}

/// Create the configured audio output. Must run on the voice thread.
pub fn build_output(config: &AudioConfig) -> Result<Box<dyn AudioOutput>> {
    match config.backend {
        OutputBackend::Command => Ok(Box::new(CommandAudioOutput::new(
            config.player.as_deref(),
            config.device.as_deref(),
        )?)),
        #[cfg(feature = "cpal-audio")]
        OutputBackend::Device => Ok(Box::new(crate::audio::CpalAudioOutput::new(
            config.device.as_deref(),
        )?)),
        #[cfg(not(feature = "cpal-audio"))]
        OutputBackend::Device => Err(TalkboxError::AudioInit {
            message: "talkbox was built without the 'cpal-audio' feature".to_string(),
        }),
        OutputBackend::Wav => {
            let dir = config.wav_dir.as_deref().ok_or_else(|| TalkboxError::AudioInit {
                message: "audio.wav_dir is required for the wav backend".to_string(),
            })?;
            Ok(Box::new(WavFileOutput::new(dir)?))
        }
        OutputBackend::Null => Ok(Box::new(NullAudioOutput)),
    }
}

pub fn build_renderer(config: &MouthConfig) -> Arc<dyn MouthRenderer> {
    match config.renderer {
        RendererKind::Console => Arc::new(ConsoleRenderer),
        RendererKind::Silent => Arc::new(LogRenderer),
    }
}

/// Start the voice thread with the configured engine and output.
///
/// Fails if either cannot be initialized.
pub fn start_worker(config: &Config) -> Result<VoiceHandle> {
    config.validate()?;

    let voice = config.voice.clone();
    let audio = config.audio.clone();

    VoiceWorker::new(build_renderer(&config.mouth))
        .with_close_lead_ms(config.mouth.close_lead_ms)
        .spawn(move || {
            let engine = build_engine(&voice)?;
            let output = build_output(&audio)?;
            Ok((engine, output))
        })
}

/// Speak one text through a local voice thread and wait until it is done.
pub fn speak_once(config: &Config, text: &str) -> Result<()> {
    let request = VoiceRequest::new(text);
    if request.text.trim().is_empty() {
        return Err(TalkboxError::InvalidRequest {
            message: "text must not be empty".to_string(),
        });
    }

    let handle = start_worker(config)?;
    let stats = handle.stats();
    handle.enqueue(request)?;
    handle.join()?;

    if stats.failed() > 0 {
        return Err(TalkboxError::Other(
            "speaking failed, see log for details".to_string(),
        ));
    }
    Ok(())
}

/// Run the server: voice thread plus HTTP intake, until SIGINT or SIGTERM.
pub async fn run_server(config: Config) -> Result<()> {
    #[cfg(feature = "cpal-audio")]
    if config.audio.backend == OutputBackend::Device {
        crate::audio::suppress_audio_warnings();
    }

    let handle = start_worker(&config)?;
    let listener = intake::bind(&config.server.bind).await?;
    let state = IntakeState::from_handle(&handle);

    intake::serve(listener, state, wait_for_shutdown()).await?;

    tracing::info!("intake stopped, waiting for voice thread");
    tokio::task::spawn_blocking(move || handle.join())
        .await
        .map_err(|e| TalkboxError::Other(format!("voice thread join failed: {}", e)))??;

    tracing::info!("talkbox stopped");
    Ok(())
}

async fn wait_for_shutdown() {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received SIGINT, shutting down");
        }
        res = wait_for_sigterm() => match res {
            Ok(()) => tracing::info!("received SIGTERM, shutting down"),
            Err(e) => {
                tracing::error!(error = %e, "failed to set up signal handler");
                // Keep serving until Ctrl+C.
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "failed to listen for SIGINT");
                }
                tracing::info!("received SIGINT, shutting down");
            }
        },
    }
}

/// Wait for SIGTERM signal (used by systemd).
#[cfg(unix)]
async fn wait_for_sigterm() -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| TalkboxError::Other(format!("Failed to register SIGTERM handler: {}", e)))?;
    sigterm.recv().await;
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_sigterm() -> Result<()> {
    std::future::pending::<()>().await;
    Ok(())
}
