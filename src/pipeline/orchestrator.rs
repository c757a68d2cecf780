//! Stage sequencing for one transcription request.
//!
//! Order is fixed: validate → segment → recognize (fan-out/fan-in) →
//! post-process → attribute speakers → merge → assemble. Recognition and
//! post-processing degrade instead of failing the request; input problems
//! and deadline expiry fail it atomically.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesOrdered, StreamExt};
use tracing::{info, warn};

use super::assemble::{assemble, join_texts};
use super::merge::{merge_segments, premerge_spans};
use super::resplit::{allocate_processed, rejoin_pieces};
use super::types::{AudioRequest, Segment, SpeechSpan, TranscriptionResult};
use crate::audio::{check_suffix, decode_audio, AudioClip, RemoteFetcher};
use crate::config::Config;
use crate::error::{InputError, TranscribeError};
use crate::models::{Hypothesis, ModelContext, RecognizeOptions};

/// Tunables lifted out of [`Config`] at startup.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Merge gap threshold for same-speaker segments.
    pub merge_gap_ms: u64,

    /// Span length cap applied during VAD pre-merging.
    pub premerge_max_span_ms: u64,

    /// Upload/download size ceiling in bytes.
    pub max_file_bytes: usize,

    /// Whole-request deadline.
    pub request_timeout: Duration,
}

impl PipelineOptions {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            merge_gap_ms: cfg.pipeline.merge_gap_ms,
            premerge_max_span_ms: cfg.pipeline.vad_merge_length_s * 1000,
            max_file_bytes: cfg.limits.max_file_size_mb * 1024 * 1024,
            request_timeout: Duration::from_secs(cfg.limits.request_timeout_secs),
        }
    }
}

/// The transcription orchestrator. Holds no per-request state; safe to share
/// across concurrent requests.
pub struct TranscriptionPipeline {
    ctx: Arc<ModelContext>,
    options: PipelineOptions,
    fetcher: RemoteFetcher,
}

impl TranscriptionPipeline {
    pub fn new(ctx: Arc<ModelContext>, options: PipelineOptions) -> anyhow::Result<Self> {
        let fetcher = RemoteFetcher::new(options.max_file_bytes)?;
        Ok(Self {
            ctx,
            options,
            fetcher,
        })
    }

    pub fn context(&self) -> &ModelContext {
        &self.ctx
    }

    /// Run the full pipeline under the request deadline. On expiry the
    /// request fails as a whole; no partial result escapes.
    pub async fn transcribe(
        &self,
        request: AudioRequest,
    ) -> Result<TranscriptionResult, TranscribeError> {
        let deadline = self.options.request_timeout;
        match tokio::time::timeout(deadline, self.run(request)).await {
            Ok(result) => result,
            Err(_) => Err(TranscribeError::DeadlineExceeded(deadline)),
        }
    }

    async fn run(&self, request: AudioRequest) -> Result<TranscriptionResult, TranscribeError> {
        let request_id = uuid::Uuid::new_v4();
        let started_at = chrono::Utc::now();

        // 1. Validate input and materialize audio bytes.
        let clip = self.ingest(&request).await?;
        info!(
            "[{request_id}] Transcribing {:.1}s of audio (hotwords={}, postprocess={}, merge_vad={})",
            clip.duration_ms() as f64 / 1000.0,
            request.hotwords.len(),
            request.enable_postprocess,
            request.merge_vad
        );

        // 2. Speech-activity spans.
        let mut spans = self.ctx.segmenter.detect_spans(&clip).await?;
        if spans.is_empty() && clip.duration_ms() > 0 {
            // No structure detected; recognize the whole clip as one span.
            spans = vec![SpeechSpan {
                start_ms: 0,
                end_ms: clip.duration_ms(),
            }];
        }
        if request.merge_vad {
            let before = spans.len();
            spans = premerge_spans(spans, self.options.merge_gap_ms, self.options.premerge_max_span_ms);
            if spans.len() != before {
                info!("Pre-merged VAD spans: {} -> {}", before, spans.len());
            }
        }

        // 3. Per-span recognition, fan-out with an ordered fan-in barrier.
        let opts = RecognizeOptions {
            hotwords: request.hotwords.clone(),
            language: request.language.clone(),
            batch_size_s: request.batch_size_s,
            device: request.device.clone(),
        };
        let mut segments = self.recognize_spans(&clip, &spans, &opts).await;

        // 4. Post-process the concatenated text, then re-split onto segment
        // boundaries. Failure here degrades to raw text only.
        let processed_text = if request.enable_postprocess {
            self.postprocess(&segments, request.use_itn).await
        } else {
            None
        };

        // 5. Speaker attribution. A missing diarizer is not an error.
        if let Some(diarizer) = &self.ctx.diarizer {
            match diarizer.assign_speakers(&clip, &spans).await {
                Ok(speakers) => {
                    for (segment, speaker) in segments.iter_mut().zip(speakers) {
                        segment.speaker = speaker;
                    }
                }
                Err(e) => warn!("Diarization unavailable, leaving speakers unset: {e:#}"),
            }
        }

        // 6. Merge adjacent same-speaker segments.
        let merged = merge_segments(segments, self.options.merge_gap_ms);

        // 7. Assemble the canonical result.
        let device = request
            .device
            .clone()
            .unwrap_or_else(|| self.ctx.device.clone());
        let result = assemble(merged, processed_text, None, &self.ctx.model_id, &device);

        let elapsed = chrono::Utc::now().signed_duration_since(started_at);
        info!(
            "[{request_id}] Pipeline complete: {} segments in {:.1}s",
            result.segments.len(),
            elapsed.num_milliseconds() as f64 / 1000.0
        );

        Ok(result)
    }

    /// Validate the audio source (exactly one of file/url), enforce the size
    /// ceiling, and decode. All failures here are input errors; no model has
    /// run yet.
    async fn ingest(&self, request: &AudioRequest) -> Result<AudioClip, TranscribeError> {
        let (bytes, file_name) = match (&request.file, &request.audio_url) {
            (Some(_), Some(_)) => return Err(InputError::ConflictingSources.into()),
            (None, None) => return Err(InputError::MissingSource.into()),
            (Some(upload), None) => {
                if let Some(name) = &upload.file_name {
                    check_suffix(name)?;
                }
                (upload.bytes.clone(), upload.file_name.clone())
            }
            (None, Some(url)) => (self.fetcher.fetch(url).await?, None),
        };

        if bytes.len() > self.options.max_file_bytes {
            return Err(InputError::FileTooLarge {
                size: bytes.len(),
                max: self.options.max_file_bytes,
            }
            .into());
        }

        Ok(decode_audio(&bytes, file_name.as_deref())?)
    }

    async fn recognize_spans(
        &self,
        clip: &AudioClip,
        spans: &[SpeechSpan],
        opts: &RecognizeOptions,
    ) -> Vec<Segment> {
        let mut futures = FuturesOrdered::new();
        for &span in spans {
            futures.push_back(self.recognize_one(clip, span, opts));
        }

        let hypotheses: Vec<Hypothesis> = futures.collect().await;

        spans
            .iter()
            .zip(hypotheses)
            .map(|(&span, hyp)| segment_from_span(span, hyp))
            .collect()
    }

    /// Recognize one span. A failure is retried once with default
    /// (non-hotword) parameters; persistent failure degrades to an
    /// empty-text segment instead of aborting the request.
    async fn recognize_one(
        &self,
        clip: &AudioClip,
        span: SpeechSpan,
        opts: &RecognizeOptions,
    ) -> Hypothesis {
        let piece = clip.slice_ms(span.start_ms, span.end_ms);

        match self.invoke_recognizer(&piece, opts).await {
            Ok(hyp) => hyp,
            Err(first) => {
                warn!(
                    "Recognition failed for span {}-{} ms, retrying with default parameters: {first:#}",
                    span.start_ms, span.end_ms
                );
                match self.invoke_recognizer(&piece, &opts.without_hotwords()).await {
                    Ok(hyp) => hyp,
                    Err(second) => {
                        warn!(
                            "Recognition failed twice for span {}-{} ms, emitting empty segment: {second:#}",
                            span.start_ms, span.end_ms
                        );
                        Hypothesis::default()
                    }
                }
            }
        }
    }

    async fn invoke_recognizer(
        &self,
        clip: &AudioClip,
        opts: &RecognizeOptions,
    ) -> anyhow::Result<Hypothesis> {
        let _permit = self.ctx.acquire_slot().await?;
        self.ctx.recognizer.recognize(clip, opts).await
    }

    async fn postprocess(&self, segments: &[Segment], use_itn: bool) -> Option<String> {
        let postprocessor = self.ctx.postprocessor.as_ref()?;
        let raw_join = join_texts(segments);
        if raw_join.trim().is_empty() {
            return None;
        }

        match postprocessor.process(&raw_join, use_itn).await {
            Ok(processed) => {
                let pieces = allocate_processed(&processed, segments);
                Some(rejoin_pieces(&pieces))
            }
            Err(e) => {
                warn!("Post-processing failed, returning raw text only: {e:#}");
                None
            }
        }
    }
}

/// Build a segment from a span and its (possibly empty) hypothesis. Word
/// timestamps arrive relative to the span and are rebased to absolute
/// milliseconds, clamped into the span bounds.
fn segment_from_span(span: SpeechSpan, hyp: Hypothesis) -> Segment {
    let word_timestamps = hyp
        .word_timestamps
        .into_iter()
        .map(|(start, end)| {
            (
                (span.start_ms + start).min(span.end_ms),
                (span.start_ms + end).min(span.end_ms),
            )
        })
        .collect();

    Segment {
        start_ms: span.start_ms,
        end_ms: span.end_ms,
        text: hyp.text,
        speaker: None,
        word_timestamps,
        confidence: hyp.confidence,
    }
}
