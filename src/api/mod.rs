//! HTTP API server for consultations

pub mod consult;
pub mod health;

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::{Config, Pipeline, Result};

/// Configuration summary reported by `/api/status`
#[derive(Debug, Clone, Default, Serialize)]
pub struct ServiceInfo {
    pub vision_model: String,
    pub stt_model: String,
    pub tts_provider: &'static str,
    pub playback: &'static str,
    pub groq_key: bool,
    pub elevenlabs_key: bool,
}

impl ServiceInfo {
    /// Summarize a configuration without exposing any secrets
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            vision_model: config.consult.vision_model.clone(),
            stt_model: config.consult.stt_model.clone(),
            tts_provider: config.tts.provider.as_str(),
            playback: config.playback.as_str(),
            groq_key: config.api_keys.groq.is_some(),
            elevenlabs_key: config.api_keys.elevenlabs.is_some(),
        }
    }
}

/// Shared state for API handlers
pub struct ApiState {
    pub pipeline: Arc<Pipeline>,
    /// Where reply audio is served from
    pub output_dir: PathBuf,
    pub info: ServiceInfo,
}

impl ApiState {
    /// Create state serving replies from the pipeline's output directory
    #[must_use]
    pub fn new(pipeline: Arc<Pipeline>, info: ServiceInfo) -> Self {
        let output_dir = pipeline.output_dir().to_path_buf();
        Self {
            pipeline,
            output_dir,
            info,
        }
    }
}

/// Configuration for building an API server
pub struct ApiServerBuilder {
    pipeline: Arc<Pipeline>,
    info: ServiceInfo,
    port: u16,
    static_dir: Option<PathBuf>,
}

impl ApiServerBuilder {
    /// Create a new API server builder
    #[must_use]
    pub fn new(pipeline: Arc<Pipeline>, port: u16) -> Self {
        Self {
            pipeline,
            info: ServiceInfo::default(),
            port,
            static_dir: None,
        }
    }

    /// Describe the running configuration on `/api/status`
    #[must_use]
    pub fn info(mut self, info: ServiceInfo) -> Self {
        self.info = info;
        self
    }

    /// Serve the demo UI from this directory
    #[must_use]
    pub fn static_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.static_dir = dir;
        self
    }

    /// Build the API server
    #[must_use]
    pub fn build(self) -> ApiServer {
        ApiServer {
            state: Arc::new(ApiState::new(self.pipeline, self.info)),
            port: self.port,
            static_dir: self.static_dir,
        }
    }
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
    static_dir: Option<PathBuf>,
}

impl ApiServer {
    /// Build the router with all routes
    pub fn router(&self) -> Router {
        let mut router = Router::new()
            .nest("/api", consult::router(self.state.clone()))
            .merge(health::router())
            .merge(health::status_router(self.state.clone()));

        // Serve the demo UI if configured
        if let Some(static_dir) = &self.static_dir {
            let index_file = static_dir.join("index.html");
            let serve_dir =
                ServeDir::new(static_dir).not_found_service(ServeFile::new(&index_file));

            router = router.fallback_service(serve_dir);
            tracing::info!(path = %static_dir.display(), "serving static files");
        }

        // CORS layer for cross-origin requests from frontend
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        router.layer(cors).layer(TraceLayer::new_for_http())
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(port = self.port, "API server listening");

        axum::serve(listener, self.router())
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}
