//! Energy-based voice activity detection
//!
//! Frames the signal (30 ms / 10 ms hop), marks frames above an adaptive
//! energy threshold as voiced, smooths the decisions with a median filter,
//! then merges short gaps and drops short bursts.

use super::signal::{frame_rms_db, median_filter, percentile, samples_for};
use serde::{Deserialize, Serialize};

/// A voiced region in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeechSegment {
    pub start: f64,
    pub end: f64,
}

impl SpeechSegment {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VadConfig {
    pub frame_seconds: f64,
    pub hop_seconds: f64,
    /// Fixed energy threshold (dB); the adaptive threshold never goes below it
    pub threshold_db: f64,
    /// Adaptive threshold sits this fraction of the dynamic range above the noise floor
    pub adaptive_fraction: f64,
    /// Below this dynamic range (dB) the fixed threshold is used
    pub min_dynamic_range_db: f64,
    pub median_window: usize,
    pub min_speech_seconds: f64,
    pub merge_gap_seconds: f64,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            frame_seconds: 0.030,
            hop_seconds: 0.010,
            threshold_db: -50.0,
            adaptive_fraction: 0.3,
            min_dynamic_range_db: 3.0,
            median_window: 5,
            min_speech_seconds: 0.1,
            merge_gap_seconds: 0.2,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct VoiceActivityDetector {
    config: VadConfig,
}

impl VoiceActivityDetector {
    pub fn new(config: VadConfig) -> Self {
        Self { config }
    }

    /// Same detector with a different fixed threshold
    pub fn with_threshold_db(&self, threshold_db: f64) -> Self {
        Self {
            config: VadConfig {
                threshold_db,
                ..self.config.clone()
            },
        }
    }

    pub fn detect(&self, samples: &[f32], sample_rate: u32) -> Vec<SpeechSegment> {
        let frame_len = samples_for(self.config.frame_seconds, sample_rate);
        let hop = samples_for(self.config.hop_seconds, sample_rate);
        let db = frame_rms_db(samples, frame_len, hop);
        if db.is_empty() {
            return Vec::new();
        }

        let threshold = self.effective_threshold(&db);
        let raw: Vec<bool> = db.iter().map(|&d| d > threshold).collect();
        let voiced = median_filter(&raw, self.config.median_window);

        let sr = sample_rate as f64;
        let total = samples.len() as f64 / sr;
        let mut segments = Vec::new();
        let mut run_start: Option<usize> = None;
        for (i, &v) in voiced.iter().enumerate() {
            match (v, run_start) {
                (true, None) => run_start = Some(i),
                (false, Some(start)) => {
                    segments.push(self.segment(start, i - 1, frame_len, hop, sr, total));
                    run_start = None;
                }
                _ => {}
            }
        }
        if let Some(start) = run_start {
            segments.push(self.segment(start, voiced.len() - 1, frame_len, hop, sr, total));
        }

        self.merge_and_filter(segments)
    }

    fn effective_threshold(&self, db: &[f64]) -> f64 {
        let (Some(p10), Some(p90)) = (percentile(db, 10.0), percentile(db, 90.0)) else {
            return self.config.threshold_db;
        };
        let range = p90 - p10;
        if range < self.config.min_dynamic_range_db {
            self.config.threshold_db
        } else {
            self.config
                .threshold_db
                .max(p10 + self.config.adaptive_fraction * range)
        }
    }

    fn segment(
        &self,
        first: usize,
        last: usize,
        frame_len: usize,
        hop: usize,
        sr: f64,
        total: f64,
    ) -> SpeechSegment {
        SpeechSegment {
            start: (first * hop) as f64 / sr,
            end: (((last * hop) + frame_len) as f64 / sr).min(total),
        }
    }

    fn merge_and_filter(&self, segments: Vec<SpeechSegment>) -> Vec<SpeechSegment> {
        let mut merged: Vec<SpeechSegment> = Vec::with_capacity(segments.len());
        for seg in segments {
            match merged.last_mut() {
                Some(prev) if seg.start - prev.end < self.config.merge_gap_seconds => {
                    prev.end = seg.end.max(prev.end);
                }
                _ => merged.push(seg),
            }
        }
        merged.retain(|s| s.duration() >= self.config.min_speech_seconds);
        merged
    }
}

/// Join segments separated by pauses shorter than `min_pause` seconds
///
/// Used to measure how long a speaker talks between inhalations.
pub fn breath_cycles(segments: &[SpeechSegment], min_pause: f64) -> Vec<SpeechSegment> {
    let mut cycles: Vec<SpeechSegment> = Vec::with_capacity(segments.len());
    for seg in segments {
        match cycles.last_mut() {
            Some(prev) if seg.start - prev.end < min_pause => prev.end = seg.end,
            _ => cycles.push(*seg),
        }
    }
    cycles
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone_with_gaps(pattern: &[(bool, f64)], sr: u32) -> Vec<f32> {
        let mut out = Vec::new();
        for &(on, seconds) in pattern {
            let n = (seconds * sr as f64) as usize;
            for i in 0..n {
                let t = i as f32 / sr as f32;
                out.push(if on {
                    0.3 * (2.0 * std::f32::consts::PI * 200.0 * t).sin()
                } else {
                    0.0
                });
            }
        }
        out
    }

    #[test]
    fn test_detects_single_segment() {
        let sr = 16000;
        let samples = tone_with_gaps(&[(false, 0.5), (true, 1.0), (false, 0.5)], sr);
        let segments = VoiceActivityDetector::default().detect(&samples, sr);
        assert_eq!(segments.len(), 1);
        assert!((segments[0].duration() - 1.0).abs() < 0.06);
    }

    #[test]
    fn test_short_gaps_merged() {
        let sr = 16000;
        let samples = tone_with_gaps(
            &[(true, 1.0), (false, 0.1), (true, 1.0), (false, 0.5), (true, 1.0)],
            sr,
        );
        let segments = VoiceActivityDetector::default().detect(&samples, sr);
        assert_eq!(segments.len(), 2);
        assert!(segments[0].duration() > 2.0);
    }

    #[test]
    fn test_silence_has_no_segments() {
        let segments = VoiceActivityDetector::default().detect(&[0.0; 16000], 16000);
        assert!(segments.is_empty());
        assert!(VoiceActivityDetector::default().detect(&[], 16000).is_empty());
    }

    #[test]
    fn test_breath_cycles_join_short_pauses() {
        let segments = [
            SpeechSegment { start: 0.0, end: 5.0 },
            SpeechSegment { start: 5.25, end: 10.0 },
            SpeechSegment { start: 11.0, end: 12.0 },
        ];
        let cycles = breath_cycles(&segments, 0.3);
        assert_eq!(cycles.len(), 2);
        assert_eq!(cycles[0].end, 10.0);
    }
}
