//! Model name extraction from OpenAI-style request bodies.

use crate::ports::{ExtractError, ModelExtractor, RequestSnapshot};
use async_trait::async_trait;
use axum::http::header::CONTENT_TYPE;
use serde_json::{Map, Value};

/// Reads the `model` field of a JSON body, falling back to the default model
/// of routes that have one.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonModelExtractor;

impl JsonModelExtractor {
    fn path_default(path: &str) -> Option<&'static str> {
        if path.starts_with("/v1/moderations") {
            Some("text-moderation-stable")
        } else if path.starts_with("/v1/images/generations") {
            Some("dall-e-2")
        } else if path.starts_with("/v1/audio/transcriptions")
            || path.starts_with("/v1/audio/translations")
        {
            Some("whisper-1")
        } else {
            None
        }
    }

    fn is_multipart(request: &RequestSnapshot) -> bool {
        request
            .headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.starts_with("multipart/form-data"))
            .unwrap_or(false)
    }
}

#[async_trait]
impl ModelExtractor for JsonModelExtractor {
    async fn extract(&self, request: &RequestSnapshot) -> Result<String, ExtractError> {
        let default = Self::path_default(&request.path);

        // Audio uploads are multipart; only the route default applies there
        if Self::is_multipart(request) {
            return default
                .map(str::to_string)
                .ok_or_else(|| ExtractError("multipart body without a default model".into()));
        }

        // Map keeps the last of repeated keys, the same value handlers see
        let object: Map<String, Value> =
            serde_json::from_slice(&request.body).map_err(|e| ExtractError(e.to_string()))?;

        match object.get("model") {
            Some(Value::String(model)) if !model.is_empty() => Ok(model.clone()),
            None | Some(Value::Null) | Some(Value::String(_)) => {
                Ok(default.unwrap_or_default().to_string())
            }
            Some(other) => Err(ExtractError(format!("model is not a string: {other}"))),
        }
    }
}
