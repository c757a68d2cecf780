use serde::{Deserialize, Serialize};

/// Separator used when joining segment texts into `raw_text`.
///
/// The assembler guarantees `raw_text == segments.map(text).join(TEXT_SEPARATOR)`
/// for every non-empty segment list.
pub const TEXT_SEPARATOR: &str = " ";

/// An uploaded audio payload.
#[derive(Debug, Clone)]
pub struct UploadedAudio {
    /// Original filename, if the client sent one (used for format hints).
    pub file_name: Option<String>,

    /// Raw container bytes.
    pub bytes: Vec<u8>,
}

/// Immutable per-call input. Constructed at request entry, dropped when the
/// pipeline completes. Exactly one of `file` / `audio_url` must be present.
#[derive(Debug, Clone)]
pub struct AudioRequest {
    pub file: Option<UploadedAudio>,
    pub audio_url: Option<String>,

    /// Recognition bias vocabulary, in client order. Entries may carry a
    /// weight suffix ("净利润:3") which is passed through verbatim.
    pub hotwords: Vec<String>,

    /// Run the text post-processor over the recognized text.
    pub enable_postprocess: bool,

    /// Apply inverse text normalization during post-processing.
    pub use_itn: bool,

    /// Pre-merge adjacent speech-activity spans before recognition.
    pub merge_vad: bool,

    /// Language hint ("auto" = let the model decide).
    pub language: String,

    /// Recognition batching window hint, in seconds.
    pub batch_size_s: u32,

    /// Inference device override for this request.
    pub device: Option<String>,
}

impl Default for AudioRequest {
    fn default() -> Self {
        Self {
            file: None,
            audio_url: None,
            hotwords: Vec::new(),
            enable_postprocess: true,
            use_itn: true,
            merge_vad: true,
            language: "auto".to_string(),
            batch_size_s: 300,
            device: None,
        }
    }
}

/// Parse a client-supplied hotword string.
///
/// Accepts comma-, Chinese-comma- and whitespace-separated lists. Weighted
/// entries ("关联交易:5") are kept verbatim.
pub fn parse_hotwords(raw: &str) -> Vec<String> {
    raw.replace(['，', ','], " ")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// A speech-activity time span produced by the segmenter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeechSpan {
    pub start_ms: u64,
    pub end_ms: u64,
}

impl SpeechSpan {
    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }
}

/// One recognized speech unit with its time bounds and optional speaker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Start time in milliseconds.
    pub start_ms: u64,

    /// End time in milliseconds (>= start_ms).
    pub end_ms: u64,

    /// Recognized text for this span (unprocessed).
    pub text: String,

    /// Speaker id assigned by diarization, 0-based. Absent when no diarizer
    /// is configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<u32>,

    /// Word-level (start, end) pairs, each contained within the segment
    /// bounds and non-decreasing.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub word_timestamps: Vec<(u64, u64)>,

    /// Recognition confidence in [0, 1], if the model reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl Segment {
    pub fn new(start_ms: u64, end_ms: u64, text: impl Into<String>) -> Self {
        Self {
            start_ms,
            end_ms,
            text: text.into(),
            speaker: None,
            word_timestamps: Vec::new(),
            confidence: None,
        }
    }
}

/// Metadata attached to every result. Clients must ignore fields they do not
/// recognize.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultMeta {
    /// Unit for all timestamps in the result. Always "ms".
    pub time_unit: String,

    /// Identifier of the recognition model that produced the result.
    pub model_id: String,

    /// Device the inference ran on.
    pub device: String,
}

/// The canonical transcription result. Produced exactly once per request and
/// immutable once returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionResult {
    /// Ordered join of unprocessed segment texts (see [`TEXT_SEPARATOR`]).
    /// When `segments` is empty this carries the full-pass plain text and
    /// the result acts as a single implicit segment.
    pub raw_text: String,

    /// Final normalized text. Present iff post-processing was requested and
    /// succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_text: Option<String>,

    /// Merged segments, ordered by `start_ms`, non-overlapping.
    pub segments: Vec<Segment>,

    pub meta: ResultMeta,
}

impl TranscriptionResult {
    /// The text a thin client should display: processed when available,
    /// raw otherwise.
    pub fn display_text(&self) -> &str {
        self.processed_text.as_deref().unwrap_or(&self.raw_text)
    }
}
