//! Container decoding to mono PCM.
//!
//! Uploaded bytes are probed and decoded with symphonia (WAV, MP3, M4A/AAC,
//! FLAC, OGG, MP4), mixed to mono and decimated toward the recognition
//! sample rate. Decode failure is an input error: the pipeline never starts
//! on audio it cannot read.

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::info;

use super::clip::AudioClip;
use crate::error::InputError;

/// Sample rate the recognition models expect.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Decode container bytes into a mono clip.
///
/// The original filename (when known) seeds the format probe. The decoded
/// stream is mixed to mono and decimated when the source rate is an integer
/// multiple of the target; fractional rates are passed through at their
/// native rate, which the recognizer wire format carries explicitly.
pub fn decode_audio(bytes: &[u8], file_name: Option<&str>) -> Result<AudioClip, InputError> {
    let undecodable = |message: String| InputError::UndecodableAudio { message };

    let cursor = Cursor::new(bytes.to_vec());
    let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = file_name.and_then(|n| n.rsplit('.').next()) {
        hint.with_extension(&ext.to_ascii_lowercase());
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| undecodable(format!("probe failed: {e}")))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| undecodable("no audio track found".to_string()))?;

    let codec_params = track.codec_params.clone();
    let track_id = track.id;
    let source_rate = codec_params.sample_rate.unwrap_or(TARGET_SAMPLE_RATE);
    let channels = codec_params.channels.map_or(1, |c| c.count()).max(1);

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| undecodable(format!("codec init failed: {e}")))?;

    let mut samples: Vec<i16> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(undecodable(format!("packet read: {e}"))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder
            .decode(&packet)
            .map_err(|e| undecodable(format!("decode: {e}")))?;

        let spec = *decoded.spec();
        let mut buf = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
        buf.copy_interleaved_ref(decoded);
        mix_to_mono(buf.samples(), channels, &mut samples);
    }

    if samples.is_empty() {
        return Err(undecodable("no audio samples decoded".to_string()));
    }

    let clip = decimate(AudioClip::new(samples, source_rate), TARGET_SAMPLE_RATE);

    info!(
        "Audio decoded: {:.1}s, {} Hz, {} samples",
        clip.duration_ms() as f64 / 1000.0,
        clip.sample_rate,
        clip.samples.len()
    );

    Ok(clip)
}

/// Average interleaved channels into the mono output buffer.
fn mix_to_mono(interleaved: &[i16], channels: usize, out: &mut Vec<i16>) {
    if channels == 1 {
        out.extend_from_slice(interleaved);
        return;
    }

    for frame in interleaved.chunks_exact(channels) {
        let sum: i32 = frame.iter().map(|&s| i32::from(s)).sum();
        let mono = (sum / channels as i32).clamp(i32::from(i16::MIN), i32::from(i16::MAX));
        out.push(mono as i16);
    }
}

/// Downsample by taking every Nth sample when the source rate is at least
/// twice the target. Cannot upsample.
fn decimate(clip: AudioClip, target_rate: u32) -> AudioClip {
    let ratio = clip.sample_rate / target_rate;
    if ratio <= 1 {
        return clip;
    }

    let samples: Vec<i16> = clip.samples.iter().step_by(ratio as usize).copied().collect();

    AudioClip::new(samples, clip.sample_rate / ratio)
}
