//! Transcript rendering and plain-text export
//!
//! The client-side half of the contract: turn a [`TranscriptionResult`] into
//! visual rows and a round-trippable plain-text form. Rendering is pure and
//! wholesale; every new result replaces the previous view entirely.

mod view;

pub use view::{RequestPhase, TranscriptView, ViewContent};

use crate::pipeline::TranscriptionResult;

/// Fixed speaker color palette. Purely a presentation hint; the color for
/// speaker `k` is `SPEAKER_PALETTE[k % SPEAKER_PALETTE.len()]`.
pub const SPEAKER_PALETTE: [&str; 6] = [
    "#4e79a7", "#f28e2b", "#e15759", "#76b7b2", "#59a14f", "#edc948",
];

/// One visual transcript row, derived from one segment. Recomputed wholesale
/// on every new result.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedTranscriptItem {
    /// Formatted `m:ss - m:ss` range.
    pub time_range: String,

    /// User-facing speaker label ("Speaker 1"), 1-based. Absent when the
    /// segment carries no speaker.
    pub speaker_label: Option<String>,

    /// Display color for the speaker row, from [`SPEAKER_PALETTE`].
    pub color: Option<&'static str>,

    pub text: String,
}

/// Format milliseconds as `minutes:seconds`, seconds zero-padded, minutes
/// unbounded (no hour rollover).
pub fn format_timestamp(ms: u64) -> String {
    format!("{}:{:02}", ms / 60_000, ms % 60_000 / 1000)
}

/// Render one row per segment.
pub fn render(result: &TranscriptionResult) -> Vec<RenderedTranscriptItem> {
    result
        .segments
        .iter()
        .map(|segment| {
            let (speaker_label, color) = match segment.speaker {
                Some(k) => (
                    Some(format!("Speaker {}", k + 1)),
                    Some(SPEAKER_PALETTE[k as usize % SPEAKER_PALETTE.len()]),
                ),
                None => (None, None),
            };

            RenderedTranscriptItem {
                time_range: format!(
                    "{} - {}",
                    format_timestamp(segment.start_ms),
                    format_timestamp(segment.end_ms)
                ),
                speaker_label,
                color,
                text: segment.text.clone(),
            }
        })
        .collect()
}

/// Serialize rendered rows as audit-ready plain text. Pure and idempotent:
/// the same rows always produce byte-identical output.
///
/// A row with a speaker renders as `[start - end] Speaker N: text`, without
/// one as `[start - end] text`; blocks are joined by a blank line.
pub fn to_plain_text(items: &[RenderedTranscriptItem]) -> String {
    items
        .iter()
        .map(|item| match &item.speaker_label {
            Some(label) => format!("[{}] {}: {}", item.time_range, label, item.text),
            None => format!("[{}] {}", item.time_range, item.text),
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Export a result as plain text. With zero structured segments the export
/// falls back to the result's display text verbatim.
pub fn export_transcript(result: &TranscriptionResult) -> String {
    let items = render(result);
    if items.is_empty() {
        result.display_text().to_string()
    } else {
        to_plain_text(&items)
    }
}
