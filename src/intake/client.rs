//! Client for a running talkbox server (`talkbox say`).

use crate::error::{Result, TalkboxError};
use crate::voice::VoiceRequest;
use std::time::Duration;

/// How long `say` waits for the server to accept a request.
///
/// Acceptance waits for the voice thread, so this covers the utterance in
/// progress.
const SAY_TIMEOUT: Duration = Duration::from_secs(120);

fn intake_error(message: impl Into<String>) -> TalkboxError {
    TalkboxError::Intake {
        message: message.into(),
    }
}

/// Post `text` to the server at `server_url`.
pub async fn say(server_url: &str, text: &str) -> Result<()> {
    let body = serde_json::to_vec(&VoiceRequest::new(text))
        .map_err(|e| intake_error(format!("cannot encode request: {}", e)))?;

    let client = reqwest::Client::builder()
        .timeout(SAY_TIMEOUT)
        .build()
        .map_err(|e| intake_error(e.to_string()))?;

    let url = format!("{}/speak", server_url.trim_end_matches('/'));
    let response = client
        .post(&url)
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body(body)
        .send()
        .await
        .map_err(|e| intake_error(format!("cannot reach {}: {}", url, e)))?;

    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let detail = response.text().await.unwrap_or_default();
    Err(intake_error(format!(
        "server answered {}: {}",
        status,
        detail.trim()
    )))
}
