//! API module for Scribe Studio
//!
//! REST endpoints for option normalization and transcription requests.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use crate::config::AppConfig;
use crate::processing::TranscriptionPipeline;

pub mod handlers;
pub mod models;
pub mod server;

/// API Server for handling REST requests
pub struct ApiServer {
    pipeline: Arc<TranscriptionPipeline>,
    config: Arc<AppConfig>,
}

impl ApiServer {
    pub fn new(pipeline: Arc<TranscriptionPipeline>, config: Arc<AppConfig>) -> Self {
        Self { pipeline, config }
    }

    /// Serve until the listener fails
    pub async fn start(self) -> Result<()> {
        info!("🚀 Starting API server on port {}", self.config.server.port);
        server::start_http_server(self.pipeline, self.config).await
    }
}
