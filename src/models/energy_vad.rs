//! Energy-threshold voice activity detection.
//!
//! Frames the clip into fixed windows, compares per-frame RMS energy against
//! a threshold, and closes a span once silence exceeds the hangover. Short
//! blips below the minimum speech duration are dropped.

use anyhow::Result;
use async_trait::async_trait;

use super::SpeechSegmenter;
use crate::audio::AudioClip;
use crate::pipeline::SpeechSpan;

#[derive(Debug, Clone)]
pub struct EnergyVadConfig {
    /// Analysis frame length in milliseconds.
    pub frame_ms: u64,

    /// Normalized RMS threshold above which a frame counts as speech.
    pub energy_threshold: f32,

    /// Spans shorter than this are discarded.
    pub min_speech_ms: u64,

    /// Silence run that closes an open span.
    pub max_silence_ms: u64,
}

impl Default for EnergyVadConfig {
    fn default() -> Self {
        Self {
            frame_ms: 30,
            energy_threshold: 0.015,
            min_speech_ms: 200,
            max_silence_ms: 300,
        }
    }
}

#[derive(Debug, Default)]
pub struct EnergySegmenter {
    config: EnergyVadConfig,
}

impl EnergySegmenter {
    pub fn new(config: EnergyVadConfig) -> Self {
        Self { config }
    }

    fn detect(&self, clip: &AudioClip) -> Vec<SpeechSpan> {
        let frame_len = (u64::from(clip.sample_rate) * self.config.frame_ms / 1000) as usize;
        if frame_len == 0 || clip.samples.is_empty() {
            return Vec::new();
        }

        let mut spans = Vec::new();
        let mut open: Option<(u64, u64)> = None; // (start_ms, last_active_end_ms)

        for (i, frame) in clip.samples.chunks(frame_len).enumerate() {
            let start_ms = i as u64 * self.config.frame_ms;
            let end_ms = start_ms + self.config.frame_ms;
            let active = rms(frame) >= self.config.energy_threshold;

            match (&mut open, active) {
                (None, true) => open = Some((start_ms, end_ms)),
                (Some((_, last_end)), true) => *last_end = end_ms,
                (Some((start, last_end)), false) => {
                    if end_ms.saturating_sub(*last_end) >= self.config.max_silence_ms {
                        spans.push(SpeechSpan {
                            start_ms: *start,
                            end_ms: *last_end,
                        });
                        open = None;
                    }
                }
                (None, false) => {}
            }
        }

        if let Some((start, last_end)) = open {
            spans.push(SpeechSpan {
                start_ms: start,
                end_ms: last_end.min(clip.duration_ms().max(start)),
            });
        }

        spans.retain(|s| s.duration_ms() >= self.config.min_speech_ms);
        spans
    }
}

#[async_trait]
impl SpeechSegmenter for EnergySegmenter {
    async fn detect_spans(&self, clip: &AudioClip) -> Result<Vec<SpeechSpan>> {
        Ok(self.detect(clip))
    }

    fn name(&self) -> &str {
        "energy-vad"
    }
}

fn rms(frame: &[i16]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = frame
        .iter()
        .map(|&s| {
            let x = f64::from(s) / f64::from(i16::MAX);
            x * x
        })
        .sum();
    (sum_sq / frame.len() as f64).sqrt() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip_with(pattern: &[(u64, bool)]) -> AudioClip {
        // (duration_ms, loud) runs at 16 kHz
        let mut samples = Vec::new();
        for &(ms, loud) in pattern {
            let n = (16_000 * ms / 1000) as usize;
            let amplitude = if loud { 8000i16 } else { 0i16 };
            for i in 0..n {
                samples.push(if i % 2 == 0 { amplitude } else { -amplitude });
            }
        }
        AudioClip::new(samples, 16_000)
    }

    #[tokio::test]
    async fn silence_yields_no_spans() {
        let vad = EnergySegmenter::default();
        let spans = vad
            .detect_spans(&clip_with(&[(2000, false)]))
            .await
            .unwrap();
        assert!(spans.is_empty());
    }

    #[tokio::test]
    async fn speech_between_silence_is_one_span() {
        let vad = EnergySegmenter::default();
        let spans = vad
            .detect_spans(&clip_with(&[(600, false), (900, true), (600, false)]))
            .await
            .unwrap();
        assert_eq!(spans.len(), 1);
        assert!(spans[0].start_ms >= 500 && spans[0].start_ms <= 700);
        assert!(spans[0].duration_ms() >= 800);
    }

    #[tokio::test]
    async fn long_silence_splits_spans() {
        let vad = EnergySegmenter::default();
        let spans = vad
            .detect_spans(&clip_with(&[(800, true), (1000, false), (800, true)]))
            .await
            .unwrap();
        assert_eq!(spans.len(), 2);
        assert!(spans[0].end_ms <= spans[1].start_ms);
    }

    #[tokio::test]
    async fn short_blip_is_dropped() {
        let vad = EnergySegmenter::default();
        let spans = vad
            .detect_spans(&clip_with(&[(500, false), (90, true), (500, false)]))
            .await
            .unwrap();
        assert!(spans.is_empty());
    }
}
