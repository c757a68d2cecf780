//! Re-splitting of post-processed text onto segment boundaries.
//!
//! Post-processing runs over the concatenated transcript to keep punctuation
//! context across segment edges, so its output has to be allocated back onto
//! the original segments. The allocation is proportional character-offset
//! mapping: each cut point is placed at the processed-text offset matching
//! the cumulative share of raw segment characters, then snapped forward to
//! the nearest whitespace within a short window. Whitespace-free scripts cut
//! at the exact offset. The last segment absorbs any remainder.

use super::types::Segment;

/// How far a cut point may move forward looking for a whitespace boundary.
const SNAP_WINDOW: usize = 12;

/// Allocate `processed` across the segments, one piece per segment.
///
/// Pieces are trimmed; a segment whose raw text is empty (e.g. a degraded
/// recognition span) receives an empty piece. Returns exactly
/// `segments.len()` pieces.
pub fn allocate_processed(processed: &str, segments: &[Segment]) -> Vec<String> {
    let n = segments.len();
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![processed.trim().to_string()];
    }

    let chars: Vec<char> = processed.chars().collect();
    let total_weight: usize = segments.iter().map(|s| s.text.chars().count()).sum();
    if total_weight == 0 {
        // No raw text to apportion by; everything lands on the first piece.
        let mut pieces = vec![String::new(); n];
        pieces[0] = processed.trim().to_string();
        return pieces;
    }

    let mut pieces = Vec::with_capacity(n);
    let mut cursor = 0usize;
    let mut cumulative = 0usize;

    for (i, seg) in segments.iter().enumerate() {
        if i == n - 1 {
            pieces.push(collect_piece(&chars, cursor, chars.len()));
            break;
        }

        cumulative += seg.text.chars().count();
        let ideal = (cumulative as f64 / total_weight as f64 * chars.len() as f64).round() as usize;
        let cut = snap_to_whitespace(&chars, ideal.clamp(cursor, chars.len()));

        pieces.push(collect_piece(&chars, cursor, cut));
        cursor = cut;
    }

    pieces
}

/// Rejoin allocated pieces into one normalized string, dropping empty pieces.
pub fn rejoin_pieces(pieces: &[String]) -> String {
    pieces
        .iter()
        .filter(|p| !p.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join(super::types::TEXT_SEPARATOR)
}

fn collect_piece(chars: &[char], start: usize, end: usize) -> String {
    chars[start..end].iter().collect::<String>().trim().to_string()
}

fn snap_to_whitespace(chars: &[char], target: usize) -> usize {
    let limit = chars.len().min(target + SNAP_WINDOW);
    for i in target..limit {
        if chars[i].is_whitespace() {
            return i;
        }
    }
    target
}
