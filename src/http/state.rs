use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::Config;
use crate::pipeline::TranscriptionPipeline;

/// Where the service is in its startup lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    Loading,
    Ready,
    Error,
}

impl ServiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Loading => "loading",
            ServiceStatus::Ready => "ready",
            ServiceStatus::Error => "error",
        }
    }
}

/// Shared application state for HTTP handlers.
///
/// The pipeline is absent until model loading finishes; requests arriving
/// before that get a 503.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<RwLock<Option<Arc<TranscriptionPipeline>>>>,
    pub status: Arc<RwLock<ServiceStatus>>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            pipeline: Arc::new(RwLock::new(None)),
            status: Arc::new(RwLock::new(ServiceStatus::Loading)),
            config,
        }
    }

    /// Publish a loaded pipeline and flip the service to ready.
    pub async fn set_ready(&self, pipeline: Arc<TranscriptionPipeline>) {
        {
            let mut slot = self.pipeline.write().await;
            *slot = Some(pipeline);
        }
        let mut status = self.status.write().await;
        *status = ServiceStatus::Ready;
    }

    /// Record a startup failure; the service stays up to report it.
    pub async fn set_error(&self) {
        let mut status = self.status.write().await;
        *status = ServiceStatus::Error;
    }
}
