//! HTTP API server (stable contract for thin clients)
//!
//! - POST /asr/transcribe - transcribe an uploaded file or remote URL
//! - GET /models - snapshot of loaded model identifiers
//! - GET /health - readiness and device

mod handlers;
mod routes;
mod state;

pub use handlers::{ErrorResponse, HealthResponse, ModelsResponse, TranscribeResponse};
pub use routes::create_router;
pub use state::{AppState, ServiceStatus};
