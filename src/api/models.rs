//! API data models

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use scribe_transcription::{AudioSource, TranscriptionError};

/// API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

/// A transcription request after the body has been read
#[derive(Debug, Clone)]
pub struct TranscribeRequest {
    pub audio: AudioSource,
    /// Everything else the client sent; option groups are picked out of it
    pub raw_config: Value,
}

/// Handler failure with the status it maps to
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<TranscriptionError> for ApiError {
    fn from(err: TranscriptionError) -> Self {
        let status = match &err {
            TranscriptionError::Api { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            TranscriptionError::Vendor(_) | TranscriptionError::Http(_) | TranscriptionError::Json(_) => {
                StatusCode::BAD_GATEWAY
            }
            TranscriptionError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            TranscriptionError::Io(_) | TranscriptionError::Unsupported(_) => StatusCode::BAD_REQUEST,
            TranscriptionError::Cancelled | TranscriptionError::Configuration(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        // Vendor messages go to the client verbatim
        Self {
            status,
            message: err.to_string(),
        }
    }
}
