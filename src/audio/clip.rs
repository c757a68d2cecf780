use std::io::Cursor;

use anyhow::{Context, Result};

/// Decoded audio: mono 16-bit PCM at a known sample rate.
#[derive(Debug, Clone)]
pub struct AudioClip {
    /// Mono PCM samples.
    pub samples: Vec<i16>,

    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Total duration in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.samples.len() as u64 * 1000 / u64::from(self.sample_rate)
    }

    /// Copy out the samples covering `[start_ms, end_ms)`, clamped to the
    /// clip bounds.
    pub fn slice_ms(&self, start_ms: u64, end_ms: u64) -> AudioClip {
        let to_index = |ms: u64| -> usize {
            let idx = ms as u128 * u128::from(self.sample_rate) / 1000;
            (idx as usize).min(self.samples.len())
        };

        let start = to_index(start_ms);
        let end = to_index(end_ms.max(start_ms));

        AudioClip {
            samples: self.samples[start..end].to_vec(),
            sample_rate: self.sample_rate,
        }
    }

    /// Encode the clip as an in-memory WAV file (recognizer wire format).
    pub fn to_wav_bytes(&self) -> Result<Vec<u8>> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)
                .context("Failed to create WAV writer")?;
            for &sample in &self.samples {
                writer
                    .write_sample(sample)
                    .context("Failed to write sample to WAV")?;
            }
            writer.finalize().context("Failed to finalize WAV")?;
        }

        Ok(cursor.into_inner())
    }
}
