use crate::error::{Result, TalkboxError};
use serde::{Deserialize, Serialize};

/// One piece of text to be spoken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceRequest {
    pub text: String,
}

impl VoiceRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Decode a `{"text": "..."}` body. Unknown fields are ignored.
    ///
    /// Only a JSON object is accepted; the derived decoder alone would also
    /// take the array form `["..."]`.
    pub fn from_json(body: &[u8]) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_slice(body).map_err(invalid)?;
        if !value.is_object() {
            return Err(TalkboxError::InvalidRequest {
                message: "request body must be a JSON object".to_string(),
            });
        }
        let request: VoiceRequest = serde_json::from_value(value).map_err(invalid)?;
        if request.text.trim().is_empty() {
            return Err(TalkboxError::InvalidRequest {
                message: "text must not be empty".to_string(),
            });
        }
        Ok(request)
    }
}

fn invalid(e: serde_json::Error) -> TalkboxError {
    TalkboxError::InvalidRequest {
        message: e.to_string(),
    }
}
