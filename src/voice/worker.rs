//! The voice thread and its request mailbox.

use crate::audio::output::AudioOutput;
use crate::defaults;
use crate::error::{Result, TalkboxError};
use crate::mouth::{MouthRenderer, MouthScheduler};
use crate::speech::engine::SynthesisEngine;
use crate::voice::processor::{ProcessorStats, VoiceProcessor};
use crate::voice::report::{ErrorReporter, LogReporter};
use crate::voice::request::VoiceRequest;
use crossbeam_channel::{Sender, bounded};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Producer side of the voice queue.
///
/// The channel has no buffer: `enqueue` returns only once the voice thread has
/// taken the request, which it does only when idle.
#[derive(Debug, Clone)]
pub struct RequestSender {
    tx: Sender<VoiceRequest>,
}

impl RequestSender {
    /// Hand a request to the voice thread, blocking until it is taken.
    pub fn enqueue(&self, request: VoiceRequest) -> Result<()> {
        self.tx
            .send(request)
            .map_err(|_| TalkboxError::WorkerStopped)
    }
}

/// Names reported by the voice thread once its engine and output are up.
#[derive(Debug, Clone)]
struct Started {
    engine: String,
    output: String,
}

/// Spawns the dedicated voice thread.
pub struct VoiceWorker {
    renderer: Arc<dyn MouthRenderer>,
    close_lead_ms: u64,
    error_reporter: Arc<dyn ErrorReporter>,
}

impl VoiceWorker {
    pub fn new(renderer: Arc<dyn MouthRenderer>) -> Self {
        Self {
            renderer,
            close_lead_ms: defaults::CLOSE_LEAD_MS,
            error_reporter: Arc::new(LogReporter),
        }
    }

    pub fn with_close_lead_ms(mut self, close_lead_ms: u64) -> Self {
        self.close_lead_ms = close_lead_ms;
        self
    }

    pub fn with_error_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.error_reporter = reporter;
        self
    }

    /// Start the voice thread.
    ///
    /// `build` runs on the new thread and creates the engine and the audio
    /// output there. Its error is returned from `spawn`, so a missing engine or
    /// device fails startup instead of every request.
    pub fn spawn<E, A, F>(self, build: F) -> Result<VoiceHandle>
    where
        E: SynthesisEngine + 'static,
        A: AudioOutput + 'static,
        F: FnOnce() -> Result<(E, A)> + Send + 'static,
    {
        let (tx, rx) = bounded::<VoiceRequest>(0);
        let (init_tx, init_rx) = bounded::<Result<Started>>(1);
        let stats = Arc::new(ProcessorStats::new());
        let thread_stats = Arc::clone(&stats);

        let Self {
            renderer,
            close_lead_ms,
            error_reporter,
        } = self;

        let handle = thread::Builder::new()
            .name("talkbox-voice".to_string())
            .spawn(move || {
                let built = build().and_then(|(engine, output)| {
                    let scheduler = MouthScheduler::spawn(renderer)?;
                    Ok(VoiceProcessor::new(engine, output, scheduler, close_lead_ms)
                        .with_stats(thread_stats)
                        .with_error_reporter(error_reporter))
                });

                let mut processor = match built {
                    Ok(processor) => processor,
                    Err(e) => {
                        if init_tx.send(Err(e)).is_err() {
                            tracing::error!("voice thread startup result was not received");
                        }
                        return;
                    }
                };

                let started = Started {
                    engine: processor.engine_name().to_string(),
                    output: processor.output_name().to_string(),
                };
                if init_tx.send(Ok(started)).is_err() {
                    return;
                }
                drop(init_tx);

                processor.run(rx);
            })
            .map_err(|e| TalkboxError::Other(format!("Failed to spawn voice thread: {e}")))?;

        let started = match init_rx.recv() {
            Ok(Ok(started)) => started,
            Ok(Err(e)) => {
                join_quietly(handle);
                return Err(e);
            }
            Err(_) => {
                join_quietly(handle);
                return Err(TalkboxError::EngineInit {
                    message: "voice thread exited during startup".to_string(),
                });
            }
        };

        tracing::info!(engine = %started.engine, output = %started.output, "voice worker ready");

        Ok(VoiceHandle {
            sender: RequestSender { tx },
            stats,
            engine: started.engine,
            output: started.output,
            thread: Some(handle),
        })
    }
}

/// Handle to a running voice thread.
pub struct VoiceHandle {
    sender: RequestSender,
    stats: Arc<ProcessorStats>,
    engine: String,
    output: String,
    thread: Option<JoinHandle<()>>,
}

impl VoiceHandle {
    /// A new producer for the voice queue.
    pub fn sender(&self) -> RequestSender {
        self.sender.clone()
    }

    /// Convenience for `sender().enqueue(request)`.
    pub fn enqueue(&self, request: VoiceRequest) -> Result<()> {
        self.sender.enqueue(request)
    }

    pub fn stats(&self) -> Arc<ProcessorStats> {
        Arc::clone(&self.stats)
    }

    pub fn engine_name(&self) -> &str {
        &self.engine
    }

    pub fn output_name(&self) -> &str {
        &self.output
    }

    /// Drop this handle's sender and wait for the voice thread to finish.
    ///
    /// The thread finishes once every other [`RequestSender`] is gone too, after
    /// the request in flight (if any) has been spoken.
    pub fn join(mut self) -> Result<()> {
        let thread = self.thread.take();
        drop(self);
        match thread {
            Some(handle) => handle
                .join()
                .map_err(|_| TalkboxError::Other("voice thread panicked".to_string())),
            None => Ok(()),
        }
    }
}

fn join_quietly(handle: JoinHandle<()>) {
    if handle.join().is_err() {
        tracing::error!("voice thread panicked during startup");
    }
}
