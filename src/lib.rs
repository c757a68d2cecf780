pub mod audio;
pub mod config;
pub mod error;
pub mod http;
pub mod models;
pub mod pipeline;
pub mod render;

pub use audio::{decode_audio, AudioClip};
pub use config::Config;
pub use error::{InputError, TranscribeError};
pub use http::{create_router, AppState};
pub use models::{
    Diarizer, Hypothesis, ModelContext, PostProcessor, RecognizeOptions, Recognizer,
    SpeechSegmenter,
};
pub use pipeline::{
    AudioRequest, PipelineOptions, Segment, SpeechSpan, TranscriptionPipeline,
    TranscriptionResult, UploadedAudio,
};
pub use render::{render, to_plain_text, RenderedTranscriptItem, TranscriptView};
