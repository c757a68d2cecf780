//! Error types for the transcription service.

use std::time::Duration;
use thiserror::Error;

/// Failure of a whole transcription request.
///
/// Per-span recognition failures and post-processing failures are recoverable
/// and never surface here; the pipeline degrades instead (empty-text segment,
/// omitted `processed_text`).
#[derive(Error, Debug)]
pub enum TranscribeError {
    /// Request rejected before the pipeline started.
    #[error("Invalid input: {0}")]
    Input(#[from] InputError),

    /// Recognition backend failed in a way that cannot be degraded.
    #[error("Recognition failed: {message}")]
    Recognition { message: String },

    /// Text post-processing failed (recoverable at the orchestrator level).
    #[error("Post-processing failed: {message}")]
    PostProcess { message: String },

    /// The whole-request deadline expired; no partial result is returned.
    #[error("Transcription deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    /// Infrastructure failure in a model collaborator (segmenter, diarizer).
    #[error("Model backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

/// Input validation failures. These map to 4xx responses and are raised
/// before any model is invoked.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("Either 'file' or 'audio_url' must be provided")]
    MissingSource,

    #[error("Provide either 'file' or 'audio_url', not both")]
    ConflictingSources,

    #[error("File too large: {size} bytes (max {max})")]
    FileTooLarge { size: usize, max: usize },

    #[error("Unsupported file type: {suffix}")]
    UnsupportedFormat { suffix: String },

    #[error("Failed to decode audio: {message}")]
    UndecodableAudio { message: String },

    #[error("Failed to download audio: {message}")]
    Download { message: String },

    #[error("Malformed form field '{field}': {message}")]
    MalformedField { field: String, message: String },
}
