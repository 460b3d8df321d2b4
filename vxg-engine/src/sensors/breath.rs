//! Breath / phonation-duration sensor
//!
//! Human speakers must inhale. Two checks on the voice activity map:
//! - the longest continuous voiced segment must not exceed the biological
//!   maximum phonation time (default 14 s)
//! - voiced time accumulated between real inhalation pauses must not exceed
//!   lung capacity (default 15 s)

use super::signal::{frame_rms_db, percentile, samples_for, sigmoid};
use super::vad::{breath_cycles, SpeechSegment, VoiceActivityDetector};
use super::{Sensor, SensorError};
use crate::types::{FailureCode, SensorResult, Waveform};
use tracing::debug;

pub const NAME: &str = "breath";

/// Default biological maximum for one continuous phonation (seconds)
pub const DEFAULT_MAX_PHONATION: f64 = 14.0;

#[derive(Debug, Clone)]
pub struct BreathSensor {
    max_phonation_seconds: f64,
    lung_capacity_seconds: f64,
    /// Pauses at least this long count as an inhalation
    min_inhalation_seconds: f64,
    silence_threshold_db: f64,
    vad: VoiceActivityDetector,
}

impl BreathSensor {
    pub fn new(max_phonation_seconds: f64) -> Self {
        Self {
            max_phonation_seconds,
            ..Default::default()
        }
    }

    pub fn with_lung_capacity(mut self, seconds: f64) -> Self {
        self.lung_capacity_seconds = seconds;
        self
    }

    /// Raise the silence threshold above a noisy floor
    ///
    /// Noise floor is the 10th percentile of 100 ms frame levels. Within
    /// (-80, -30) dB the threshold becomes `max(silence, floor + 10)`.
    fn tuned_threshold(&self, samples: &[f32], sample_rate: u32) -> f64 {
        let frame = samples_for(0.1, sample_rate);
        let db = frame_rms_db(samples, frame, frame);
        match percentile(&db, 10.0) {
            Some(floor) if floor > -80.0 && floor < -30.0 => {
                self.silence_threshold_db.max(floor + 10.0)
            }
            _ => self.silence_threshold_db,
        }
    }
}

impl Default for BreathSensor {
    fn default() -> Self {
        Self {
            max_phonation_seconds: DEFAULT_MAX_PHONATION,
            lung_capacity_seconds: 15.0,
            min_inhalation_seconds: 0.3,
            silence_threshold_db: -50.0,
            vad: VoiceActivityDetector::default(),
        }
    }
}

fn longest(segments: &[SpeechSegment]) -> f64 {
    segments.iter().map(|s| s.duration()).fold(0.0, f64::max)
}

impl Sensor for BreathSensor {
    fn name(&self) -> &str {
        NAME
    }

    fn threshold(&self) -> f64 {
        self.max_phonation_seconds
    }

    fn analyze(&self, waveform: &Waveform) -> Result<SensorResult, SensorError> {
        let threshold = self.max_phonation_seconds;
        if waveform.is_empty() {
            return Ok(SensorResult::unknown(NAME, 0.0, threshold, "No audio to analyze"));
        }

        let samples = waveform.samples();
        let sr = waveform.sample_rate();
        let silence_db = self.tuned_threshold(samples, sr);
        let segments = self.vad.with_threshold_db(silence_db).detect(samples, sr);
        if segments.is_empty() {
            return Ok(SensorResult::unknown(NAME, 0.0, threshold, "No voiced segments detected")
                .with_metadata("silence_threshold_db", silence_db));
        }

        let max_phonation = longest(&segments);
        let cycles = breath_cycles(&segments, self.min_inhalation_seconds);
        let max_cycle = longest(&cycles);
        debug!(
            "breath: {} segments, max phonation {:.2}s, max breath cycle {:.2}s",
            segments.len(),
            max_phonation,
            max_cycle
        );

        let phonation_risk = sigmoid(max_phonation - self.max_phonation_seconds);
        let cycle_risk = sigmoid(max_cycle - self.lung_capacity_seconds);

        let result = if max_phonation > self.max_phonation_seconds {
            SensorResult::fail(
                NAME,
                max_phonation,
                threshold,
                FailureCode::BiologicallyImpossible,
                format!(
                    "Continuous phonation of {:.1}s exceeds the biological limit of {:.1}s",
                    max_phonation, threshold
                ),
            )
            .with_score(phonation_risk)
        } else if max_cycle > self.lung_capacity_seconds {
            SensorResult::fail(
                NAME,
                max_phonation,
                threshold,
                FailureCode::InfiniteLungCapacity,
                format!(
                    "{:.1}s of speech without an inhalation pause (lung capacity {:.1}s)",
                    max_cycle, self.lung_capacity_seconds
                ),
            )
            .with_score(cycle_risk.max(phonation_risk))
        } else {
            SensorResult::pass(
                NAME,
                max_phonation,
                threshold,
                format!("Longest phonation {:.1}s within biological limits", max_phonation),
            )
            .with_score(phonation_risk.max(cycle_risk))
        };

        Ok(result
            .with_metadata("segment_count", segments.len())
            .with_metadata("max_breath_cycle_seconds", max_cycle)
            .with_metadata("silence_threshold_db", silence_db))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PassState;

    fn voiced(seconds: f64, sr: u32) -> Vec<f32> {
        let n = (seconds * sr as f64) as usize;
        (0..n)
            .map(|i| {
                let t = i as f32 / sr as f32;
                0.3 * (2.0 * std::f32::consts::PI * 150.0 * t).sin()
            })
            .collect()
    }

    #[test]
    fn test_empty_is_unknown_with_trace() {
        let w = Waveform::new(Vec::new(), 16000).unwrap();
        let r = BreathSensor::default().analyze(&w).unwrap();
        assert_eq!(r.passed, PassState::Unknown);
        assert_eq!(r.value, 0.0);
        assert_eq!(r.threshold, 14.0);
    }

    #[test]
    fn test_short_speech_passes() {
        let w = Waveform::new(voiced(3.0, 8000), 8000).unwrap();
        let r = BreathSensor::default().analyze(&w).unwrap();
        assert_eq!(r.passed, PassState::Pass);
        assert!(r.score.unwrap() < 0.01);
    }

    #[test]
    fn test_long_phonation_fails() {
        let w = Waveform::new(voiced(16.0, 8000), 8000).unwrap();
        let r = BreathSensor::default().analyze(&w).unwrap();
        assert_eq!(r.passed, PassState::Fail);
        assert_eq!(r.reason, Some(FailureCode::BiologicallyImpossible));
        assert!(r.value > 15.5);
    }

    #[test]
    fn test_no_inhalation_fails_lung_capacity() {
        // 8 s phrases separated by 0.25 s pauses: each phrase is plausible
        // but the speaker never pauses long enough to breathe
        let sr = 8000;
        let mut samples = voiced(8.0, sr);
        samples.extend(vec![0.0; (0.25 * sr as f64) as usize]);
        samples.extend(voiced(8.0, sr));
        let w = Waveform::new(samples, sr).unwrap();
        let r = BreathSensor::default().analyze(&w).unwrap();
        assert_eq!(r.reason, Some(FailureCode::InfiniteLungCapacity));
    }

    #[test]
    fn test_configurable_limit() {
        let w = Waveform::new(voiced(5.0, 8000), 8000).unwrap();
        let r = BreathSensor::new(4.0).analyze(&w).unwrap();
        assert_eq!(r.passed, PassState::Fail);
        assert_eq!(r.threshold, 4.0);
    }
}
