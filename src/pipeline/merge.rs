//! Segment merge policy.
//!
//! Adjacent short segments from the same speaker are merged under a time-gap
//! threshold so the transcript reads as sentences instead of fragments. The
//! same policy (without text) pre-merges VAD spans before recognition when
//! `merge_vad` is requested.

use super::types::{Segment, SpeechSpan};

/// Greedy, single-pass, non-backtracking merge. O(n) in segment count.
///
/// Segment `i+1` is merged into the running segment when both carry the same
/// speaker (both-unset counts as same) and the gap `start_ms - running.end_ms`
/// does not exceed `max_gap_ms`. Merging joins text with a single space,
/// extends `end_ms`, concatenates word timestamps in order and recomputes
/// confidence as the text-length-weighted average of the constituents that
/// report one.
pub fn merge_segments(segments: Vec<Segment>, max_gap_ms: u64) -> Vec<Segment> {
    let mut runs: Vec<Run> = Vec::with_capacity(segments.len());

    for seg in segments {
        match runs.last_mut() {
            Some(run)
                if run.segment.speaker == seg.speaker
                    && seg.start_ms.saturating_sub(run.segment.end_ms) <= max_gap_ms =>
            {
                run.absorb(seg);
            }
            _ => runs.push(Run::start(seg)),
        }
    }

    runs.into_iter().map(Run::finish).collect()
}

/// Pre-merge speech-activity spans before recognition.
///
/// Uses the same gap policy as [`merge_segments`] but additionally caps the
/// merged span length at `max_span_ms` so recognition batches stay bounded.
pub fn premerge_spans(spans: Vec<SpeechSpan>, max_gap_ms: u64, max_span_ms: u64) -> Vec<SpeechSpan> {
    let mut merged: Vec<SpeechSpan> = Vec::with_capacity(spans.len());

    for span in spans {
        match merged.last_mut() {
            Some(run)
                if span.start_ms.saturating_sub(run.end_ms) <= max_gap_ms
                    && span.end_ms.saturating_sub(run.start_ms) <= max_span_ms =>
            {
                run.end_ms = run.end_ms.max(span.end_ms);
            }
            _ => merged.push(span),
        }
    }

    merged
}

/// A running merge accumulator. Confidence is tracked as (weighted sum,
/// weight) so later absorptions do not re-average an already averaged value.
struct Run {
    segment: Segment,
    conf_sum: f64,
    conf_weight: f64,
    absorbed: usize,
}

impl Run {
    fn start(segment: Segment) -> Self {
        let mut run = Self {
            segment,
            conf_sum: 0.0,
            conf_weight: 0.0,
            absorbed: 0,
        };
        let (confidence, text_len) = (run.segment.confidence, run.segment.text.chars().count());
        run.accumulate_confidence(confidence, text_len);
        run
    }

    fn absorb(&mut self, seg: Segment) {
        if self.segment.text.is_empty() {
            self.segment.text = seg.text.clone();
        } else if !seg.text.is_empty() {
            self.segment.text.push(' ');
            self.segment.text.push_str(&seg.text);
        }

        self.segment.end_ms = self.segment.end_ms.max(seg.end_ms);
        self.segment.word_timestamps.extend(seg.word_timestamps);
        self.accumulate_confidence(seg.confidence, seg.text.chars().count());
        self.absorbed += 1;
    }

    fn accumulate_confidence(&mut self, confidence: Option<f32>, text_len: usize) {
        // Segments without a confidence are excluded from the average.
        if let Some(c) = confidence {
            self.conf_sum += f64::from(c) * text_len as f64;
            self.conf_weight += text_len as f64;
        }
    }

    fn finish(self) -> Segment {
        let mut segment = self.segment;
        if self.absorbed > 0 {
            segment.confidence = if self.conf_weight > 0.0 {
                Some((self.conf_sum / self.conf_weight) as f32)
            } else {
                None
            };
        }
        segment
    }
}
