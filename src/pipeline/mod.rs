//! Transcription pipeline
//!
//! The orchestrator that turns raw audio plus per-span model outputs into
//! one canonical, versioned result:
//! - stage sequencing with per-stage failure policy (`orchestrator`)
//! - same-speaker segment merging under a gap threshold (`merge`)
//! - post-processed text re-allocation onto segment boundaries (`resplit`)
//! - canonical result assembly with the raw_text invariant (`assemble`)

mod assemble;
mod merge;
mod orchestrator;
mod resplit;
mod types;

pub use assemble::{assemble, join_texts};
pub use merge::{merge_segments, premerge_spans};
pub use orchestrator::{PipelineOptions, TranscriptionPipeline};
pub use resplit::{allocate_processed, rejoin_pieces};
pub use types::{
    parse_hotwords, AudioRequest, ResultMeta, Segment, SpeechSpan, TranscriptionResult,
    UploadedAudio, TEXT_SEPARATOR,
};
