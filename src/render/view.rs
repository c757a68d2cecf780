//! Request lifecycle as an explicit state machine.
//!
//! The display surface is always in exactly one of four phases; what it
//! shows (transcript rows or a single status line, never both) and whether
//! export controls are enabled are pure functions of that state.

use super::{export_transcript, render, RenderedTranscriptItem};
use crate::pipeline::TranscriptionResult;

/// Lifecycle of one transcription request from the client's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    Idle,
    InFlight,
    Succeeded,
    Failed,
}

/// What the display surface shows. Exactly one variant at any time.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewContent<'a> {
    Transcript(&'a [RenderedTranscriptItem]),
    Status(String),
}

/// Owns the rendered rows. Rows are rebuilt wholesale when a result arrives;
/// there is no incremental patching.
#[derive(Debug, Default)]
pub struct TranscriptView {
    phase: Option<Phase>,
}

#[derive(Debug)]
enum Phase {
    InFlight,
    Succeeded {
        result: TranscriptionResult,
        items: Vec<RenderedTranscriptItem>,
    },
    Failed {
        message: String,
    },
}

impl TranscriptView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> RequestPhase {
        match &self.phase {
            None => RequestPhase::Idle,
            Some(Phase::InFlight) => RequestPhase::InFlight,
            Some(Phase::Succeeded { .. }) => RequestPhase::Succeeded,
            Some(Phase::Failed { .. }) => RequestPhase::Failed,
        }
    }

    /// A request was submitted; any previous output is discarded.
    pub fn submit(&mut self) {
        self.phase = Some(Phase::InFlight);
    }

    /// A result arrived; the view is re-rendered from scratch.
    pub fn complete(&mut self, result: TranscriptionResult) {
        let items = render(&result);
        self.phase = Some(Phase::Succeeded { result, items });
    }

    /// The request failed; only the message is shown.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.phase = Some(Phase::Failed {
            message: message.into(),
        });
    }

    /// The one thing currently on screen.
    pub fn content(&self) -> ViewContent<'_> {
        match &self.phase {
            None => ViewContent::Status("Upload an audio file to begin".to_string()),
            Some(Phase::InFlight) => ViewContent::Status("Transcribing…".to_string()),
            Some(Phase::Succeeded { result, items }) => {
                if items.is_empty() {
                    // Plain-text result without structure still renders as text.
                    ViewContent::Status(result.display_text().to_string())
                } else {
                    ViewContent::Transcript(items)
                }
            }
            Some(Phase::Failed { message }) => ViewContent::Status(message.clone()),
        }
    }

    /// Export controls are enabled iff there is text to export.
    pub fn export_enabled(&self) -> bool {
        match &self.phase {
            Some(Phase::Succeeded { result, .. }) => !export_transcript(result).is_empty(),
            _ => false,
        }
    }

    /// The exported plain text, when export is available.
    pub fn export_plain_text(&self) -> Option<String> {
        match &self.phase {
            Some(Phase::Succeeded { result, .. }) => {
                let text = export_transcript(result);
                (!text.is_empty()).then_some(text)
            }
            _ => None,
        }
    }
}
