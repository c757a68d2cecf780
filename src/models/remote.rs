//! HTTP clients for the model runtime.
//!
//! Recognition and diarization run in an external inference server; spans
//! are shipped as WAV multipart uploads and results come back as JSON. The
//! response shape is validated at this boundary (`ingest_hypothesis`) so the
//! rest of the pipeline never sees loosely-typed model output.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{ingest_hypothesis, Diarizer, Hypothesis, RawHypothesis, RecognizeOptions, Recognizer};
use crate::audio::AudioClip;
use crate::pipeline::SpeechSpan;

/// Recognition client for one ASR model hosted by the runtime.
pub struct HttpRecognizer {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl HttpRecognizer {
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to create recognizer HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    /// Probe the runtime's health endpoint.
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Model runtime health check failed")?;
        Ok(response.status().is_success())
    }
}

#[async_trait]
impl Recognizer for HttpRecognizer {
    async fn recognize(&self, clip: &AudioClip, opts: &RecognizeOptions) -> Result<Hypothesis> {
        let wav = clip.to_wav_bytes()?;
        let duration_ms = clip.duration_ms();

        debug!(
            "Recognizing {} ms of audio (hotwords={}, language={})",
            duration_ms,
            opts.hotwords.len(),
            opts.language
        );

        let part = reqwest::multipart::Part::bytes(wav)
            .file_name("span.wav")
            .mime_str("audio/wav")
            .context("Failed to build multipart audio part")?;

        let mut form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("language", opts.language.clone())
            .text("batch_size_s", opts.batch_size_s.to_string());

        if !opts.hotwords.is_empty() {
            form = form.text("hotword", opts.hotwords.join(" "));
        }
        if let Some(device) = &opts.device {
            form = form.text("device", device.clone());
        }

        let url = format!("{}/recognize", self.base_url);
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .context("Recognition request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Model runtime returned {status}: {body}");
        }

        let raw: RawHypothesis = response
            .json()
            .await
            .context("Failed to parse recognition response")?;

        ingest_hypothesis(raw, duration_ms)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Deserialize)]
struct RawSpeakerLabel {
    #[serde(default)]
    spk: Option<u32>,
}

/// Diarization client. Ships the whole clip plus span boundaries; gets back
/// one label per span.
pub struct HttpDiarizer {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl HttpDiarizer {
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to create diarizer HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl Diarizer for HttpDiarizer {
    async fn assign_speakers(
        &self,
        clip: &AudioClip,
        spans: &[SpeechSpan],
    ) -> Result<Vec<Option<u32>>> {
        let wav = clip.to_wav_bytes()?;

        let part = reqwest::multipart::Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .context("Failed to build multipart audio part")?;

        let spans_json = serde_json::to_string(
            &spans
                .iter()
                .map(|s| (s.start_ms, s.end_ms))
                .collect::<Vec<_>>(),
        )?;

        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("spans", spans_json);

        let url = format!("{}/diarize", self.base_url);
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .context("Diarization request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Model runtime returned {status}: {body}");
        }

        let labels: Vec<RawSpeakerLabel> = response
            .json()
            .await
            .context("Failed to parse diarization response")?;

        if labels.len() != spans.len() {
            bail!(
                "Diarizer returned {} labels for {} spans",
                labels.len(),
                spans.len()
            );
        }

        Ok(labels.into_iter().map(|l| l.spk).collect())
    }

    fn name(&self) -> &str {
        &self.model
    }
}
