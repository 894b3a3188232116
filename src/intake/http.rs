//! HTTP intake: `POST /` with `{"text": "..."}` hands the text to the voice thread.

use crate::error::{Result, TalkboxError};
use crate::voice::{ProcessorState, ProcessorStats, RequestSender, VoiceHandle, VoiceRequest};
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Shared state for the intake handlers.
#[derive(Clone)]
pub struct IntakeState {
    sender: RequestSender,
    stats: Arc<ProcessorStats>,
    engine: Arc<str>,
    output: Arc<str>,
}

impl IntakeState {
    pub fn new(
        sender: RequestSender,
        stats: Arc<ProcessorStats>,
        engine: &str,
        output: &str,
    ) -> Self {
        Self {
            sender,
            stats,
            engine: Arc::from(engine),
            output: Arc::from(output),
        }
    }

    /// State wired to a running voice worker.
    pub fn from_handle(handle: &VoiceHandle) -> Self {
        Self::new(
            handle.sender(),
            handle.stats(),
            handle.engine_name(),
            handle.output_name(),
        )
    }
}

/// Body of `GET /status`.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub busy: bool,
    pub state: ProcessorState,
    pub processed: u64,
    pub failed: u64,
    pub engine: String,
    pub output: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
struct Accepted {
    status: &'static str,
    chars: usize,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Create the intake router.
pub fn router(state: IntakeState) -> Router {
    Router::new()
        .route("/", post(speak))
        .route("/speak", post(speak))
        .route("/status", get(status))
        .with_state(state)
}

/// Accept a voice request.
///
/// Responds once the voice thread has taken the request, not when it has
/// finished speaking.
async fn speak(State(state): State<IntakeState>, body: Bytes) -> Response {
    let request = match VoiceRequest::from_json(&body) {
        Ok(request) => request,
        Err(e) => {
            tracing::debug!(error = %e, "rejecting voice request");
            return error_response(StatusCode::BAD_REQUEST, e.to_string());
        }
    };

    let chars = request.text.chars().count();
    let sender = state.sender.clone();

    // The hand-off blocks until the voice thread is idle.
    match tokio::task::spawn_blocking(move || sender.enqueue(request)).await {
        Ok(Ok(())) => {
            tracing::debug!(chars, "voice request accepted");
            (
                StatusCode::ACCEPTED,
                Json(Accepted {
                    status: "accepted",
                    chars,
                }),
            )
                .into_response()
        }
        Ok(Err(e @ TalkboxError::WorkerStopped)) => {
            tracing::warn!("voice request dropped: worker stopped");
            error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
        Ok(Err(e)) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        Err(e) => {
            tracing::error!(error = %e, "enqueue task failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "enqueue task failed")
        }
    }
}

async fn status(State(state): State<IntakeState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        busy: state.stats.busy(),
        state: state.stats.state(),
        processed: state.stats.processed(),
        failed: state.stats.failed(),
        engine: state.engine.to_string(),
        output: state.output.to_string(),
        version: crate::version_string(),
    })
}

/// Bind the intake listener.
pub async fn bind(addr: &str) -> Result<TcpListener> {
    let addr: SocketAddr = addr.parse().map_err(|_| TalkboxError::Intake {
        message: format!("'{}' is not a socket address", addr),
    })?;
    TcpListener::bind(addr)
        .await
        .map_err(|e| TalkboxError::Intake {
            message: format!("cannot listen on {}: {}", addr, e),
        })
}

/// Serve the intake on `listener` until `shutdown` resolves.
pub async fn serve<S>(listener: TcpListener, state: IntakeState, shutdown: S) -> Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "intake listening");
    }

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| TalkboxError::Intake {
            message: e.to_string(),
        })
}
