//! Audio intake and decoding
//!
//! This module turns request audio (uploaded bytes or a remote URL) into a
//! mono PCM clip the pipeline can slice per speech span:
//! - suffix filtering and size-bounded URL download
//! - multi-format container decoding via symphonia
//! - mono mixdown and decimation toward the recognition sample rate

pub mod clip;
pub mod decode;
pub mod ingest;

pub use clip::AudioClip;
pub use decode::{decode_audio, TARGET_SAMPLE_RATE};
pub use ingest::{check_suffix, RemoteFetcher, ALLOWED_SUFFIXES};
