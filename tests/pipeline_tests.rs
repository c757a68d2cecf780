// Integration tests for the transcription orchestrator.
//
// Model collaborators are replaced by in-crate mocks so the stage sequencing
// and failure policy can be exercised without an inference runtime.

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use echoscript::audio::AudioClip;
use echoscript::error::{InputError, TranscribeError};
use echoscript::models::{
    Diarizer, Hypothesis, ModelContext, PostProcessor, RecognizeOptions, Recognizer,
    SpeechSegmenter,
};
use echoscript::pipeline::{
    parse_hotwords, AudioRequest, PipelineOptions, SpeechSpan, TranscriptionPipeline,
    UploadedAudio,
};

// ============================================================================
// Mock collaborators
// ============================================================================

struct MockSegmenter {
    spans: Vec<SpeechSpan>,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl SpeechSegmenter for MockSegmenter {
    async fn detect_spans(&self, _clip: &AudioClip) -> Result<Vec<SpeechSpan>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.spans.clone())
    }

    fn name(&self) -> &str {
        "mock-vad"
    }
}

#[derive(Default)]
struct MockRecognizer {
    /// Fail every call on a clip of exactly this duration.
    fail_duration_ms: Option<u64>,
    /// Fail any call carrying hotwords (exercises the retry profile).
    fail_with_hotwords: bool,
    /// Sleep before answering (exercises the deadline).
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Recognizer for MockRecognizer {
    async fn recognize(&self, clip: &AudioClip, opts: &RecognizeOptions) -> Result<Hypothesis> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_with_hotwords && !opts.hotwords.is_empty() {
            bail!("hotword-biased decoding failed");
        }
        if self.fail_duration_ms == Some(clip.duration_ms()) {
            bail!("inference failed");
        }

        Ok(Hypothesis {
            text: format!("text{}", clip.duration_ms()),
            word_timestamps: Vec::new(),
            confidence: Some(0.9),
        })
    }

    fn name(&self) -> &str {
        "mock-asr"
    }
}

struct FailingPostProcessor;

#[async_trait]
impl PostProcessor for FailingPostProcessor {
    async fn process(&self, _text: &str, _use_itn: bool) -> Result<String> {
        bail!("normalization model crashed")
    }

    fn name(&self) -> &str {
        "mock-punc"
    }
}

struct UppercasePostProcessor;

#[async_trait]
impl PostProcessor for UppercasePostProcessor {
    async fn process(&self, text: &str, _use_itn: bool) -> Result<String> {
        Ok(text.to_uppercase())
    }

    fn name(&self) -> &str {
        "mock-punc"
    }
}

struct FixedDiarizer {
    speakers: Vec<Option<u32>>,
}

#[async_trait]
impl Diarizer for FixedDiarizer {
    async fn assign_speakers(
        &self,
        _clip: &AudioClip,
        _spans: &[SpeechSpan],
    ) -> Result<Vec<Option<u32>>> {
        Ok(self.speakers.clone())
    }

    fn name(&self) -> &str {
        "mock-spk"
    }
}

// ============================================================================
// Fixtures
// ============================================================================

fn wav_bytes(duration_ms: u64) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..(16 * duration_ms) {
            let sample = if i % 2 == 0 { 8000i16 } else { -8000i16 };
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

fn upload(duration_ms: u64) -> Option<UploadedAudio> {
    Some(UploadedAudio {
        file_name: Some("clip.wav".to_string()),
        bytes: wav_bytes(duration_ms),
    })
}

fn span(start_ms: u64, end_ms: u64) -> SpeechSpan {
    SpeechSpan { start_ms, end_ms }
}

fn options() -> PipelineOptions {
    PipelineOptions {
        merge_gap_ms: 0,
        premerge_max_span_ms: 8000,
        max_file_bytes: 100 * 1024 * 1024,
        request_timeout: Duration::from_secs(30),
    }
}

struct Mocks {
    spans: Vec<SpeechSpan>,
    recognizer: MockRecognizer,
    postprocessor: Option<Arc<dyn PostProcessor>>,
    diarizer: Option<Arc<dyn Diarizer>>,
}

impl Mocks {
    fn build(self) -> (TranscriptionPipeline, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let segmenter_calls = Arc::new(AtomicUsize::new(0));
        let recognizer_calls = Arc::clone(&self.recognizer.calls);

        let ctx = ModelContext {
            segmenter: Arc::new(MockSegmenter {
                spans: self.spans,
                calls: Arc::clone(&segmenter_calls),
            }),
            recognizer: Arc::new(self.recognizer),
            postprocessor: self.postprocessor,
            diarizer: self.diarizer,
            inference_slot: None,
            model_id: "mock-asr".to_string(),
            device: "cpu".to_string(),
        };

        let pipeline = TranscriptionPipeline::new(Arc::new(ctx), options()).unwrap();
        (pipeline, segmenter_calls, recognizer_calls)
    }
}

// ============================================================================
// Input validation
// ============================================================================

#[tokio::test]
async fn both_sources_fail_before_any_model_runs() {
    let (pipeline, segmenter_calls, recognizer_calls) = Mocks {
        spans: vec![span(0, 1000)],
        recognizer: MockRecognizer::default(),
        postprocessor: None,
        diarizer: None,
    }
    .build();

    let request = AudioRequest {
        file: upload(1000),
        audio_url: Some("http://example.com/a.wav".to_string()),
        ..AudioRequest::default()
    };

    let err = pipeline.transcribe(request).await.unwrap_err();

    assert!(matches!(
        err,
        TranscribeError::Input(InputError::ConflictingSources)
    ));
    assert_eq!(segmenter_calls.load(Ordering::SeqCst), 0);
    assert_eq!(recognizer_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_source_fails_before_any_model_runs() {
    let (pipeline, segmenter_calls, recognizer_calls) = Mocks {
        spans: vec![span(0, 1000)],
        recognizer: MockRecognizer::default(),
        postprocessor: None,
        diarizer: None,
    }
    .build();

    let err = pipeline.transcribe(AudioRequest::default()).await.unwrap_err();

    assert!(matches!(
        err,
        TranscribeError::Input(InputError::MissingSource)
    ));
    assert_eq!(segmenter_calls.load(Ordering::SeqCst), 0);
    assert_eq!(recognizer_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let mut opts = options();
    opts.max_file_bytes = 64;

    let ctx = ModelContext {
        segmenter: Arc::new(MockSegmenter {
            spans: Vec::new(),
            calls: Arc::new(AtomicUsize::new(0)),
        }),
        recognizer: Arc::new(MockRecognizer::default()),
        postprocessor: None,
        diarizer: None,
        inference_slot: None,
        model_id: "mock-asr".to_string(),
        device: "cpu".to_string(),
    };
    let pipeline = TranscriptionPipeline::new(Arc::new(ctx), opts).unwrap();

    let request = AudioRequest {
        file: upload(1000),
        ..AudioRequest::default()
    };

    let err = pipeline.transcribe(request).await.unwrap_err();

    assert!(matches!(
        err,
        TranscribeError::Input(InputError::FileTooLarge { .. })
    ));
}

#[tokio::test]
async fn undecodable_audio_is_an_input_error() {
    let (pipeline, _, recognizer_calls) = Mocks {
        spans: vec![span(0, 1000)],
        recognizer: MockRecognizer::default(),
        postprocessor: None,
        diarizer: None,
    }
    .build();

    let request = AudioRequest {
        file: Some(UploadedAudio {
            file_name: Some("clip.wav".to_string()),
            bytes: b"definitely not audio".to_vec(),
        }),
        ..AudioRequest::default()
    };

    let err = pipeline.transcribe(request).await.unwrap_err();

    assert!(matches!(
        err,
        TranscribeError::Input(InputError::UndecodableAudio { .. })
    ));
    assert_eq!(recognizer_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unsupported_suffix_is_rejected() {
    let (pipeline, _, _) = Mocks {
        spans: vec![span(0, 1000)],
        recognizer: MockRecognizer::default(),
        postprocessor: None,
        diarizer: None,
    }
    .build();

    let request = AudioRequest {
        file: Some(UploadedAudio {
            file_name: Some("notes.txt".to_string()),
            bytes: wav_bytes(500),
        }),
        ..AudioRequest::default()
    };

    let err = pipeline.transcribe(request).await.unwrap_err();

    assert!(matches!(
        err,
        TranscribeError::Input(InputError::UnsupportedFormat { .. })
    ));
}

// ============================================================================
// Degradation policy
// ============================================================================

#[tokio::test]
async fn one_failing_span_degrades_to_an_empty_segment() {
    // The middle span is 500 ms; the recognizer fails on it every time.
    let (pipeline, _, recognizer_calls) = Mocks {
        spans: vec![span(0, 1000), span(1100, 1600), span(2000, 3000)],
        recognizer: MockRecognizer {
            fail_duration_ms: Some(500),
            ..MockRecognizer::default()
        },
        postprocessor: None,
        diarizer: None,
    }
    .build();

    let request = AudioRequest {
        file: upload(3000),
        merge_vad: false,
        ..AudioRequest::default()
    };

    let result = pipeline.transcribe(request).await.unwrap();

    assert_eq!(result.segments.len(), 3);
    assert_eq!(result.segments[0].text, "text1000");
    assert_eq!(result.segments[1].text, "");
    assert_eq!(result.segments[2].text, "text1000");
    // Failed span: one attempt plus one retry.
    assert_eq!(recognizer_calls.load(Ordering::SeqCst), 4);

    // The raw_text invariant includes the empty segment.
    assert_eq!(result.raw_text, "text1000  text1000");
}

#[tokio::test]
async fn hotword_failure_retries_once_with_default_parameters() {
    let (pipeline, _, recognizer_calls) = Mocks {
        spans: vec![span(0, 1000)],
        recognizer: MockRecognizer {
            fail_with_hotwords: true,
            ..MockRecognizer::default()
        },
        postprocessor: None,
        diarizer: None,
    }
    .build();

    let request = AudioRequest {
        file: upload(1000),
        hotwords: parse_hotwords("关联交易:5 净利润"),
        merge_vad: false,
        ..AudioRequest::default()
    };

    let result = pipeline.transcribe(request).await.unwrap();

    assert_eq!(recognizer_calls.load(Ordering::SeqCst), 2);
    assert_eq!(result.segments.len(), 1);
    assert_eq!(result.segments[0].text, "text1000");
}

#[tokio::test]
async fn postprocess_failure_degrades_to_raw_text() {
    let (pipeline, _, _) = Mocks {
        spans: vec![span(0, 1000)],
        recognizer: MockRecognizer::default(),
        postprocessor: Some(Arc::new(FailingPostProcessor)),
        diarizer: None,
    }
    .build();

    let request = AudioRequest {
        file: upload(1000),
        merge_vad: false,
        ..AudioRequest::default()
    };

    let result = pipeline.transcribe(request).await.unwrap();

    assert!(result.processed_text.is_none());
    assert!(!result.raw_text.is_empty());
}

#[tokio::test]
async fn successful_postprocess_produces_processed_text() {
    let (pipeline, _, _) = Mocks {
        spans: vec![span(0, 1000)],
        recognizer: MockRecognizer::default(),
        postprocessor: Some(Arc::new(UppercasePostProcessor)),
        diarizer: None,
    }
    .build();

    let request = AudioRequest {
        file: upload(1000),
        merge_vad: false,
        ..AudioRequest::default()
    };

    let result = pipeline.transcribe(request).await.unwrap();

    assert_eq!(result.raw_text, "text1000");
    assert_eq!(result.processed_text.as_deref(), Some("TEXT1000"));
}

#[tokio::test]
async fn postprocess_is_skipped_when_disabled() {
    let (pipeline, _, _) = Mocks {
        spans: vec![span(0, 1000)],
        recognizer: MockRecognizer::default(),
        postprocessor: Some(Arc::new(UppercasePostProcessor)),
        diarizer: None,
    }
    .build();

    let request = AudioRequest {
        file: upload(1000),
        enable_postprocess: false,
        merge_vad: false,
        ..AudioRequest::default()
    };

    let result = pipeline.transcribe(request).await.unwrap();

    assert!(result.processed_text.is_none());
}

// ============================================================================
// Speakers, merging, deadline
// ============================================================================

#[tokio::test]
async fn absent_diarizer_leaves_speakers_unset() {
    let (pipeline, _, _) = Mocks {
        spans: vec![span(0, 1000), span(2000, 3000)],
        recognizer: MockRecognizer::default(),
        postprocessor: None,
        diarizer: None,
    }
    .build();

    let request = AudioRequest {
        file: upload(3000),
        merge_vad: false,
        ..AudioRequest::default()
    };

    let result = pipeline.transcribe(request).await.unwrap();

    assert!(result.segments.iter().all(|s| s.speaker.is_none()));
}

#[tokio::test]
async fn same_speaker_segments_merge_in_the_final_result() {
    let ctx = ModelContext {
        segmenter: Arc::new(MockSegmenter {
            spans: vec![span(0, 1000), span(1100, 2100)],
            calls: Arc::new(AtomicUsize::new(0)),
        }),
        recognizer: Arc::new(MockRecognizer::default()),
        postprocessor: None,
        diarizer: Some(Arc::new(FixedDiarizer {
            speakers: vec![Some(0), Some(0)],
        })),
        inference_slot: None,
        model_id: "mock-asr".to_string(),
        device: "cpu".to_string(),
    };

    let mut opts = options();
    opts.merge_gap_ms = 2000;
    let pipeline = TranscriptionPipeline::new(Arc::new(ctx), opts).unwrap();

    let request = AudioRequest {
        file: upload(2100),
        merge_vad: false,
        ..AudioRequest::default()
    };

    let result = pipeline.transcribe(request).await.unwrap();

    assert_eq!(result.segments.len(), 1);
    assert_eq!(result.segments[0].start_ms, 0);
    assert_eq!(result.segments[0].end_ms, 2100);
    assert_eq!(result.segments[0].speaker, Some(0));
    assert_eq!(result.segments[0].text, "text1000 text1000");
    assert_eq!(result.raw_text, "text1000 text1000");
}

#[tokio::test]
async fn deadline_expiry_fails_the_request_atomically() {
    let ctx = ModelContext {
        segmenter: Arc::new(MockSegmenter {
            spans: vec![span(0, 1000)],
            calls: Arc::new(AtomicUsize::new(0)),
        }),
        recognizer: Arc::new(MockRecognizer {
            delay: Some(Duration::from_millis(500)),
            ..MockRecognizer::default()
        }),
        postprocessor: None,
        diarizer: None,
        inference_slot: None,
        model_id: "mock-asr".to_string(),
        device: "cpu".to_string(),
    };

    let mut opts = options();
    opts.request_timeout = Duration::from_millis(50);
    let pipeline = TranscriptionPipeline::new(Arc::new(ctx), opts).unwrap();

    let request = AudioRequest {
        file: upload(1000),
        merge_vad: false,
        ..AudioRequest::default()
    };

    let err = pipeline.transcribe(request).await.unwrap_err();

    assert!(matches!(err, TranscribeError::DeadlineExceeded(_)));
}

#[tokio::test]
async fn device_override_is_reflected_in_meta() {
    let (pipeline, _, _) = Mocks {
        spans: vec![span(0, 1000)],
        recognizer: MockRecognizer::default(),
        postprocessor: None,
        diarizer: None,
    }
    .build();

    let request = AudioRequest {
        file: upload(1000),
        device: Some("cuda".to_string()),
        merge_vad: false,
        ..AudioRequest::default()
    };

    let result = pipeline.transcribe(request).await.unwrap();

    assert_eq!(result.meta.device, "cuda");
    assert_eq!(result.meta.time_unit, "ms");
    assert_eq!(result.meta.model_id, "mock-asr");
}

// ============================================================================
// Hotword parsing
// ============================================================================

#[test]
fn hotwords_parse_from_commas_spaces_and_chinese_commas() {
    assert_eq!(
        parse_hotwords("关联交易,净利润,应收账款"),
        vec!["关联交易", "净利润", "应收账款"]
    );
    assert_eq!(
        parse_hotwords("关联交易 净利润"),
        vec!["关联交易", "净利润"]
    );
    assert_eq!(
        parse_hotwords("关联交易，净利润"),
        vec!["关联交易", "净利润"]
    );
}

#[test]
fn weighted_hotwords_pass_through_verbatim() {
    assert_eq!(
        parse_hotwords("关联交易:5 净利润:3 应收账款"),
        vec!["关联交易:5", "净利润:3", "应收账款"]
    );
}

#[test]
fn empty_hotword_strings_parse_to_nothing() {
    assert!(parse_hotwords("").is_empty());
    assert!(parse_hotwords("  ,， ").is_empty());
}
