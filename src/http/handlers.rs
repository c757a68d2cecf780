use super::state::AppState;
use crate::error::{InputError, TranscribeError};
use crate::pipeline::{parse_hotwords, AudioRequest, TranscriptionResult, UploadedAudio};
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use tracing::{error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub device: String,
}

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub asr_model: String,
    pub vad_model: String,
    pub punc_model: String,
    pub spk_model: Option<String>,
    pub device: String,
    pub enable_spk: bool,
}

#[derive(Debug, Serialize)]
pub struct TranscribeResponse {
    /// The canonical result object.
    pub result: TranscriptionResult,

    /// Convenience mirror: `processed_text` when present, else `raw_text`.
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
}

impl ErrorResponse {
    fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
/// Report service readiness and the inference device.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let status = *state.status.read().await;
    Json(HealthResponse {
        status: status.as_str(),
        device: state.config.models.resolve_device(),
    })
}

/// GET /models
/// Snapshot of the loaded model identifiers.
pub async fn get_models(State(state): State<AppState>) -> impl IntoResponse {
    let models = &state.config.models;
    Json(ModelsResponse {
        asr_model: models.asr_model.clone(),
        vad_model: models.vad_model.clone(),
        punc_model: models.punc_model.clone(),
        spk_model: models.enable_spk.then(|| models.spk_model.clone()).flatten(),
        device: models.resolve_device(),
        enable_spk: models.enable_spk,
    })
}

/// POST /asr/transcribe
/// Transcribe an uploaded file or a remote URL.
pub async fn transcribe(
    State(state): State<AppState>,
    multipart: Multipart,
) -> impl IntoResponse {
    let pipeline = { state.pipeline.read().await.clone() };
    let Some(pipeline) = pipeline else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse::new("Model is not ready")),
        )
            .into_response();
    };

    let max_bytes = state.config.limits.max_file_size_mb * 1024 * 1024;
    let request = match parse_transcribe_form(multipart, max_bytes).await {
        Ok(request) => request,
        Err(e) => {
            warn!("Rejected transcription request: {e}");
            return error_response(TranscribeError::Input(e));
        }
    };

    match pipeline.transcribe(request).await {
        Ok(result) => {
            info!(
                "Transcription complete: {} segments, {} chars",
                result.segments.len(),
                result.raw_text.chars().count()
            );
            let text = result.display_text().to_string();
            (StatusCode::OK, Json(TranscribeResponse { result, text })).into_response()
        }
        Err(e) => {
            error!("Transcription failed: {e}");
            error_response(e)
        }
    }
}

fn error_response(err: TranscribeError) -> axum::response::Response {
    let status = match &err {
        TranscribeError::Input(InputError::FileTooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
        TranscribeError::Input(_) => StatusCode::BAD_REQUEST,
        TranscribeError::DeadlineExceeded(_) => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorResponse::new(err.to_string()))).into_response()
}

// ============================================================================
// Form parsing
// ============================================================================

/// Drain the multipart form into an [`AudioRequest`]. The upload size
/// ceiling is enforced while streaming the file field.
async fn parse_transcribe_form(
    mut multipart: Multipart,
    max_bytes: usize,
) -> Result<AudioRequest, InputError> {
    let malformed = |field: &str, message: String| InputError::MalformedField {
        field: field.to_string(),
        message,
    };

    let mut request = AudioRequest::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(malformed("multipart", e.to_string())),
        };

        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        match name.as_str() {
            "file" => {
                let file_name = field.file_name().map(str::to_string);
                let mut bytes = Vec::new();
                let mut field = field;
                while let Some(chunk) = field
                    .chunk()
                    .await
                    .map_err(|e| malformed("file", e.to_string()))?
                {
                    bytes.extend_from_slice(&chunk);
                    if bytes.len() > max_bytes {
                        return Err(InputError::FileTooLarge {
                            size: bytes.len(),
                            max: max_bytes,
                        });
                    }
                }
                request.file = Some(UploadedAudio { file_name, bytes });
            }
            "audio_url" => {
                let url = read_text(field, &name).await?;
                if !url.trim().is_empty() {
                    request.audio_url = Some(url.trim().to_string());
                }
            }
            "hotword" | "hotwords" => {
                let raw = read_text(field, &name).await?;
                request.hotwords = parse_hotwords(&raw);
            }
            "use_itn" => request.use_itn = parse_bool(&read_text(field, &name).await?),
            "enable_postprocess" => {
                request.enable_postprocess = parse_bool(&read_text(field, &name).await?)
            }
            "merge_vad" => request.merge_vad = parse_bool(&read_text(field, &name).await?),
            "batch_size_s" => {
                let raw = read_text(field, &name).await?;
                request.batch_size_s = raw
                    .trim()
                    .parse()
                    .map_err(|_| malformed("batch_size_s", format!("not a number: {raw}")))?;
            }
            "language" => {
                let language = read_text(field, &name).await?;
                if !language.trim().is_empty() {
                    request.language = language.trim().to_string();
                }
            }
            "device" => {
                let device = read_text(field, &name).await?;
                if !device.trim().is_empty() {
                    request.device = Some(device.trim().to_string());
                }
            }
            _ => {
                // Unknown fields are ignored, not rejected.
            }
        }
    }

    Ok(request)
}

async fn read_text(field: axum::extract::multipart::Field<'_>, name: &str) -> Result<String, InputError> {
    field.text().await.map_err(|e| InputError::MalformedField {
        field: name.to_string(),
        message: e.to_string(),
    })
}

fn parse_bool(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
