//! Result assembly.
//!
//! A deterministic, pure function from merged segments plus metadata to the
//! canonical [`TranscriptionResult`]. The `raw_text` invariant is established
//! here by construction; the debug assertions exist so a regression is caught
//! by tests, not handled at runtime.

use super::types::{ResultMeta, Segment, TranscriptionResult, TEXT_SEPARATOR};

/// Join segment texts in order with the canonical separator.
pub fn join_texts(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(TEXT_SEPARATOR)
}

/// Build the canonical result.
///
/// `fallback_text` supplies `raw_text` when there are no segments (the
/// single-implicit-segment case, e.g. a recognizer that returned plain text
/// without sentence structure).
pub fn assemble(
    segments: Vec<Segment>,
    processed_text: Option<String>,
    fallback_text: Option<String>,
    model_id: &str,
    device: &str,
) -> TranscriptionResult {
    let raw_text = if segments.is_empty() {
        fallback_text.unwrap_or_default()
    } else {
        join_texts(&segments)
    };

    debug_assert!(
        segments.windows(2).all(|w| w[0].end_ms <= w[1].start_ms),
        "segments must be ordered and non-overlapping after merging"
    );
    debug_assert!(
        segments.is_empty() || raw_text == join_texts(&segments),
        "raw_text must equal the ordered join of segment texts"
    );

    TranscriptionResult {
        raw_text,
        processed_text,
        segments,
        meta: ResultMeta {
            time_unit: "ms".to_string(),
            model_id: model_id.to_string(),
            device: device.to_string(),
        },
    }
}
