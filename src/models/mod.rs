//! Model collaborators
//!
//! The acoustic/language models are black boxes behind async traits:
//! - `SpeechSegmenter` finds speech-activity spans (VAD)
//! - `Recognizer` maps a span's audio to a text hypothesis
//! - `PostProcessor` normalizes recognized text (punctuation, ITN)
//! - `Diarizer` assigns speaker labels to spans (optional)
//!
//! `ModelContext` is the explicit, shared, read-only bundle constructed once
//! at startup and passed by reference into the pipeline. A backend that is
//! not safe for concurrent inference is guarded by a single-slot semaphore
//! acquired for the duration of one call.

pub mod energy_vad;
pub mod postprocess;
pub mod remote;

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::info;

use crate::audio::AudioClip;
use crate::config::ModelsConfig;
use crate::pipeline::SpeechSpan;

pub use energy_vad::EnergySegmenter;
pub use postprocess::RulePostProcessor;
pub use remote::{HttpDiarizer, HttpRecognizer};

/// Per-call recognition parameters derived from the request.
#[derive(Debug, Clone)]
pub struct RecognizeOptions {
    pub hotwords: Vec<String>,
    pub language: String,
    pub batch_size_s: u32,
    pub device: Option<String>,
}

impl RecognizeOptions {
    /// The retry profile: same call with default (non-hotword) parameters.
    pub fn without_hotwords(&self) -> Self {
        Self {
            hotwords: Vec::new(),
            ..self.clone()
        }
    }
}

/// A recognizer output for one span. Word timestamps are relative to the
/// start of the audio the recognizer was given.
#[derive(Debug, Clone, Default)]
pub struct Hypothesis {
    pub text: String,
    pub word_timestamps: Vec<(u64, u64)>,
    pub confidence: Option<f32>,
}

#[async_trait]
pub trait SpeechSegmenter: Send + Sync {
    /// Detect ordered, non-overlapping speech spans in the clip.
    async fn detect_spans(&self, clip: &AudioClip) -> Result<Vec<SpeechSpan>>;

    fn name(&self) -> &str;
}

#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Transcribe one span's audio.
    async fn recognize(&self, clip: &AudioClip, opts: &RecognizeOptions) -> Result<Hypothesis>;

    fn name(&self) -> &str;
}

#[async_trait]
pub trait PostProcessor: Send + Sync {
    /// Normalize recognized text. `use_itn` toggles inverse text
    /// normalization; the rest of the cleanup always runs.
    async fn process(&self, text: &str, use_itn: bool) -> Result<String>;

    fn name(&self) -> &str;
}

#[async_trait]
pub trait Diarizer: Send + Sync {
    /// Assign a speaker id to each span, in span order. `None` entries mean
    /// the model could not attribute that span.
    async fn assign_speakers(
        &self,
        clip: &AudioClip,
        spans: &[SpeechSpan],
    ) -> Result<Vec<Option<u32>>>;

    fn name(&self) -> &str;
}

/// Loaded models plus inference metadata. Read-only after startup; shared
/// across concurrent requests.
pub struct ModelContext {
    pub segmenter: Arc<dyn SpeechSegmenter>,
    pub recognizer: Arc<dyn Recognizer>,
    pub postprocessor: Option<Arc<dyn PostProcessor>>,
    pub diarizer: Option<Arc<dyn Diarizer>>,

    /// Single-slot guard for backends that cannot serve concurrent calls.
    /// `None` when the backend is reentrant.
    pub inference_slot: Option<Semaphore>,

    pub model_id: String,
    pub device: String,
}

impl ModelContext {
    /// Build the context from configuration. Called once at process start.
    pub async fn from_config(cfg: &ModelsConfig) -> Result<Self> {
        let device = cfg.resolve_device();
        info!(
            "Loading models: asr={} vad={} punc={} spk={:?} device={}",
            cfg.asr_model, cfg.vad_model, cfg.punc_model, cfg.spk_model, device
        );

        let segmenter: Arc<dyn SpeechSegmenter> = Arc::new(EnergySegmenter::default());

        let recognizer: Arc<dyn Recognizer> = Arc::new(
            HttpRecognizer::new(&cfg.runtime_url, &cfg.asr_model, cfg.timeout_secs)
                .context("Failed to create recognizer client")?,
        );

        let postprocessor: Option<Arc<dyn PostProcessor>> =
            Some(Arc::new(RulePostProcessor::new(&cfg.punc_model)));

        let diarizer: Option<Arc<dyn Diarizer>> = match (&cfg.spk_model, cfg.enable_spk) {
            (Some(model), true) => Some(Arc::new(
                HttpDiarizer::new(&cfg.runtime_url, model, cfg.timeout_secs)
                    .context("Failed to create diarizer client")?,
            )),
            _ => None,
        };

        Ok(Self {
            segmenter,
            recognizer,
            postprocessor,
            diarizer,
            inference_slot: cfg.serialize_inference.then(|| Semaphore::new(1)),
            model_id: cfg.asr_model.clone(),
            device,
        })
    }

    /// Acquire the inference slot when one is configured. The permit is
    /// released on drop, on every exit path.
    pub async fn acquire_slot(&self) -> Result<Option<SemaphorePermit<'_>>> {
        match &self.inference_slot {
            Some(slot) => {
                let permit = slot
                    .acquire()
                    .await
                    .context("Inference slot unexpectedly closed")?;
                Ok(Some(permit))
            }
            None => Ok(None),
        }
    }
}

/// Raw model output at the ingestion boundary. Only `text` is required;
/// everything else defaults to absent rather than null-propagating.
#[derive(Debug, Deserialize)]
pub struct RawHypothesis {
    pub text: Option<String>,
    #[serde(default)]
    pub timestamp: Vec<(i64, i64)>,
    #[serde(default)]
    pub confidence: Option<f32>,
}

/// Validate raw model output into a [`Hypothesis`].
///
/// Word timestamps are clamped into `[0, span_duration_ms]`; out-of-order
/// pairs are dropped so the sequence stays non-decreasing. Confidence is
/// clamped into [0, 1].
pub fn ingest_hypothesis(raw: RawHypothesis, span_duration_ms: u64) -> Result<Hypothesis> {
    let text = raw
        .text
        .context("Model output is missing required field 'text'")?;

    let mut word_timestamps: Vec<(u64, u64)> = Vec::with_capacity(raw.timestamp.len());
    let mut last_start = 0u64;
    for (start, end) in raw.timestamp {
        let start = start.clamp(0, span_duration_ms as i64) as u64;
        let end = end.clamp(0, span_duration_ms as i64) as u64;
        if end < start || start < last_start {
            continue;
        }
        last_start = start;
        word_timestamps.push((start, end));
    }

    Ok(Hypothesis {
        text,
        word_timestamps,
        confidence: raw.confidence.map(|c| c.clamp(0.0, 1.0)),
    })
}
