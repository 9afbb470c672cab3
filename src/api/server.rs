//! HTTP server implementation for the API

use anyhow::Result;
use axum::{
    extract::{DefaultBodyLimit, FromRequest, Multipart, Request, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use scribe_transcription::AudioSource;

use super::handlers;
use super::models::{ApiError, ApiResponse, TranscribeRequest};
use crate::config::AppConfig;
use crate::processing::TranscriptionPipeline;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<TranscriptionPipeline>,
    pub config: Arc<AppConfig>,
}

/// Routes plus middleware, ready to serve
pub fn build_router(app_state: AppState) -> Router {
    let body_limit = app_state.config.server.max_upload_mb * 1024 * 1024;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/health", get(health_handler))
        .route("/api/options/defaults", get(default_options_handler))
        .route("/api/options/normalize", post(normalize_options_handler))
        .route("/api/transcribe", post(transcribe_handler))
        .with_state(app_state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
}

/// Configure and start the HTTP server
pub async fn start_http_server(
    pipeline: Arc<TranscriptionPipeline>,
    config: Arc<AppConfig>,
) -> Result<()> {
    let address = format!("{}:{}", config.server.host, config.server.port);
    info!("🚀 Starting HTTP server on {}", address);

    let app = build_router(AppState { pipeline, config });

    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("🌐 API server listening on http://{}", address);

    axum::serve(listener, app).await?;

    Ok(())
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(ApiResponse::<()>::error(message))).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error_response(self.status, self.message)
    }
}

/// Health check handler
async fn health_handler() -> impl IntoResponse {
    match handlers::health_check().await {
        Ok(data) => (StatusCode::OK, Json(data)).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn default_options_handler(State(state): State<AppState>) -> impl IntoResponse {
    let data = handlers::default_options(&state.pipeline);
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}

async fn normalize_options_handler(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> impl IntoResponse {
    let data = handlers::normalize_options(&state.pipeline, &payload);
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}

/// Transcribe from a JSON body or a multipart upload
async fn transcribe_handler(State(state): State<AppState>, request: Request) -> Response {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.starts_with("multipart/form-data"))
        .unwrap_or(false);

    let parsed = if is_multipart {
        match Multipart::from_request(request, &state).await {
            Ok(multipart) => read_multipart(multipart).await,
            Err(rejection) => Err(ApiError::bad_request(rejection.body_text())),
        }
    } else {
        match Json::<Value>::from_request(request, &state).await {
            Ok(Json(body)) => handlers::transcribe_request_from_json(body),
            Err(rejection) => Err(ApiError::bad_request(rejection.body_text())),
        }
    };

    let request = match parsed {
        Ok(request) => request,
        Err(e) => return e.into_response(),
    };

    match handlers::transcribe(&state.pipeline, request).await {
        Ok(payload) => (StatusCode::OK, Json(ApiResponse::success(payload))).into_response(),
        Err(e) => {
            warn!("Transcription request failed: {}", e.message);
            e.into_response()
        }
    }
}

/// `file` carries the audio; every other field is a JSON string (or the
/// plain `audioUrl`)
async fn read_multipart(mut multipart: Multipart) -> Result<TranscribeRequest, ApiError> {
    let mut upload: Option<AudioSource> = None;
    let mut fields = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == "file" {
            let file_name = field.file_name().unwrap_or("upload").to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(e.body_text()))?;
            if data.is_empty() {
                return Err(ApiError::bad_request("Uploaded file is empty"));
            }
            upload = Some(AudioSource::Bytes {
                file_name,
                data: data.to_vec(),
            });
        } else {
            let text = field
                .text()
                .await
                .map_err(|e| ApiError::bad_request(e.body_text()))?;
            fields.push((name, text));
        }
    }

    let raw = handlers::raw_config_from_fields(fields);
    let audio = match upload {
        Some(audio) => audio,
        None => {
            let url = raw
                .get("audioUrl")
                .or_else(|| raw.get("audio_url"))
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .ok_or_else(|| ApiError::bad_request("audioUrl or file is required"))?;
            handlers::remote_audio(url)?
        }
    };

    Ok(TranscribeRequest {
        audio,
        raw_config: Value::Object(raw),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use scribe_core::Transcript;
    use scribe_transcription::{PollingConfig, Transcriber, TranscriptionProvider};
    use serde_json::{json, Map};
    use std::sync::Mutex;
    use tower::ServiceExt;

    const BOUNDARY: &str = "scribe-test-boundary";

    /// Records what reached the vendor and answers with a fixed transcript
    #[derive(Default)]
    struct RecordingProvider {
        calls: Mutex<Vec<(AudioSource, Map<String, Value>)>>,
    }

    #[async_trait]
    impl TranscriptionProvider for RecordingProvider {
        fn provider_id(&self) -> &str {
            "recording"
        }

        async fn submit(
            &self,
            audio: &AudioSource,
            options: &Map<String, Value>,
            _polling: &PollingConfig,
        ) -> scribe_transcription::Result<Transcript> {
            self.calls
                .lock()
                .unwrap()
                .push((audio.clone(), options.clone()));
            Ok(Transcript::from_value(json!({
                "id": "tx-7",
                "status": "completed",
                "text": "router test",
                "words": [{ "text": "router", "start": 0, "end": 300 }]
            }))
            .unwrap())
        }
    }

    fn app() -> (Arc<RecordingProvider>, Router) {
        let provider = Arc::new(RecordingProvider::default());
        let pipeline = TranscriptionPipeline::new(Transcriber::new(provider.clone()))
            .with_default_options(json!({ "transcriptionOptions": { "auto_chapters": true } }));
        let router = build_router(AppState {
            pipeline: Arc::new(pipeline),
            config: Arc::new(AppConfig::default()),
        });
        (provider, router)
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request {
        axum::http::Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    /// Text fields as `(name, value)`, optional `(file name, bytes)` upload
    fn multipart_request(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Request {
        let mut body: Vec<u8> = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                    BOUNDARY, name, value
                )
                .as_bytes(),
            );
        }
        if let Some((file_name, data)) = file {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: audio/wav\r\n\r\n",
                    BOUNDARY, file_name
                )
                .as_bytes(),
            );
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        axum::http::Request::builder()
            .method("POST")
            .uri("/api/transcribe")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn send(router: Router, request: Request) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health_routes() {
        for uri in ["/health", "/api/health"] {
            let (_, router) = app();
            let request = axum::http::Request::builder().uri(uri).body(Body::empty()).unwrap();
            let (status, body) = send(router, request).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["status"], "healthy");
        }
    }

    #[tokio::test]
    async fn test_json_transcribe_success_envelope() {
        let (provider, router) = app();
        let (status, body) = send(
            router,
            json_request(
                "POST",
                "/api/transcribe",
                json!({
                    "audioUrl": "https://cdn.example.com/talk.mp3",
                    "options": { "speaker_labels": true }
                }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(true));
        assert!(body.get("error").is_none());
        assert_eq!(body["data"]["id"], "tx-7");
        assert_eq!(body["data"]["text"], "router test");
        assert_eq!(body["data"]["request_options"]["auto_chapters"], json!(true));

        let calls = provider.calls.lock().unwrap();
        assert_eq!(
            calls[0].0,
            AudioSource::Url("https://cdn.example.com/talk.mp3".to_string())
        );
        assert_eq!(calls[0].1.get("speaker_labels"), Some(&json!(true)));
    }

    #[tokio::test]
    async fn test_json_without_audio_is_rejected() {
        let (provider, router) = app();
        let (status, body) = send(
            router,
            json_request("POST", "/api/transcribe", json!({ "options": {} })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["error"], "audioUrl or file is required");
        assert!(body.get("data").is_none());
        assert!(provider.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_upload_is_rejected() {
        let (provider, router) = app();
        let (status, body) = send(router, multipart_request(&[], Some(("empty.wav", b"")))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "success": false, "error": "Uploaded file is empty" }));
        assert!(provider.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_multipart_upload_with_options() {
        let (provider, router) = app();
        let (status, body) = send(
            router,
            multipart_request(
                &[("transcriptionOptions", r#"{"language_code":"de"}"#)],
                Some(("meeting.wav", b"RIFF audio")),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["data"]["file_name"], "meeting.wav");

        let calls = provider.calls.lock().unwrap();
        assert_eq!(
            calls[0].0,
            AudioSource::Bytes {
                file_name: "meeting.wav".to_string(),
                data: b"RIFF audio".to_vec(),
            }
        );
        assert_eq!(calls[0].1.get("language_code"), Some(&json!("de")));
    }

    #[tokio::test]
    async fn test_multipart_falls_back_to_audio_url() {
        let (provider, router) = app();
        let (status, body) = send(
            router,
            multipart_request(
                &[
                    ("audioUrl", "https://cdn.example.com/remote.mp3"),
                    ("transcriptionOptions", r#"{"speaker_labels":true}"#),
                ],
                None,
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(true));

        let calls = provider.calls.lock().unwrap();
        assert_eq!(
            calls[0].0,
            AudioSource::Url("https://cdn.example.com/remote.mp3".to_string())
        );
        assert_eq!(calls[0].1.get("speaker_labels"), Some(&json!(true)));
    }

    #[tokio::test]
    async fn test_multipart_without_audio_is_rejected() {
        let (_, router) = app();
        let (status, body) = send(
            router,
            multipart_request(&[("transcriptionOptions", "{}")], None),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["error"], "audioUrl or file is required");
    }

    #[tokio::test]
    async fn test_normalize_route_merges_groups_over_defaults() {
        let (_, router) = app();
        let (status, body) = send(
            router,
            json_request(
                "POST",
                "/api/options/normalize",
                json!({
                    "options": { "speaker_labels": true },
                    "transcriptionOptions": { "language_code": "tr" }
                }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let submission = &body["data"]["submission"]["transcriptionOptions"];
        assert_eq!(submission["speaker_labels"], json!(true));
        assert_eq!(submission["language_code"], json!("tr"));
        assert_eq!(submission["auto_chapters"], json!(true));
    }

    #[tokio::test]
    async fn test_defaults_route_reports_server_defaults() {
        let (_, router) = app();
        let request = axum::http::Request::builder()
            .uri("/api/options/defaults")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(router, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(true));
        assert_eq!(
            body["data"]["submission"]["transcriptionOptions"]["auto_chapters"],
            json!(true)
        );
    }
}
