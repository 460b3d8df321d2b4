//! Digital silence sensor
//!
//! Real rooms are never silent: pauses carry a fluctuating noise floor.
//! Spliced or synthesized audio often contains exact digital zeros,
//! perfectly constant floors, and pauses that begin and end instantly.
//! Each artifact adds to a suspicion score; above 0.5 the sensor fails.

use super::signal::{frame_rms_db, percentile, samples_for, variance};
use super::{Sensor, SensorError};
use crate::types::{FailureCode, SensorResult, Waveform};
use tracing::debug;

pub const NAME: &str = "digital_silence";

/// Frames below this level are exact digital silence
const PERFECT_SILENCE_DB: f64 = -120.0;
/// Quiet frames with a level variance below this are unnaturally constant
const ZERO_VARIANCE_DB2: f64 = 0.01;
/// A level step of this size between adjacent frames is instantaneous
const INSTANT_FLUX_DB: f64 = 50.0;
/// Quiet frames must sit this far below the loud frames
const QUIET_MARGIN_DB: f64 = 10.0;
/// A room tone below this level means there is no room
const MIN_ROOM_TONE_DB: f64 = -90.0;
/// Minimum samples for a meaningful analysis
const MIN_SAMPLES: usize = 2048;

#[derive(Debug, Clone)]
pub struct DigitalSilenceSensor {
    threshold: f64,
}

impl DigitalSilenceSensor {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

impl Default for DigitalSilenceSensor {
    fn default() -> Self {
        Self::new(0.5)
    }
}

/// Indicator breakdown for one analysis
#[derive(Debug, Default)]
struct Indicators {
    interior_perfect_silence: usize,
    zero_variance_floor: bool,
    instant_transitions: usize,
    missing_room_tone: bool,
}

impl Indicators {
    fn suspicion(&self) -> f64 {
        let mut score = 0.0;
        if self.interior_perfect_silence > 0 {
            score += 0.4;
        }
        if self.zero_variance_floor {
            score += 0.3;
        }
        if self.instant_transitions > 0 {
            score += 0.3;
        }
        if self.missing_room_tone {
            score += 0.3;
        }
        f64::min(score, 1.0)
    }
}

fn inspect(db: &[f64]) -> Indicators {
    let mut indicators = Indicators::default();

    // Perfect silence strictly between sounding frames (edge padding is normal)
    let first_sound = db.iter().position(|&d| d >= PERFECT_SILENCE_DB);
    let last_sound = db.iter().rposition(|&d| d >= PERFECT_SILENCE_DB);
    if let (Some(first), Some(last)) = (first_sound, last_sound) {
        indicators.interior_perfect_silence = db[first..=last]
            .iter()
            .filter(|&&d| d < PERFECT_SILENCE_DB)
            .count();
    }

    indicators.instant_transitions = db
        .windows(2)
        .filter(|w| (w[1] - w[0]).abs() >= INSTANT_FLUX_DB)
        .count();

    // Quiet frames: bottom 30% that also sit well below the loud frames
    if let (Some(p30), Some(p90)) = (percentile(db, 30.0), percentile(db, 90.0)) {
        let quiet: Vec<f64> = db
            .iter()
            .copied()
            .filter(|&d| d <= p30 && d < p90 - QUIET_MARGIN_DB)
            .collect();
        if quiet.len() >= 2 {
            indicators.zero_variance_floor = variance(&quiet) < ZERO_VARIANCE_DB2;
            indicators.missing_room_tone =
                percentile(&quiet, 50.0).is_some_and(|m| m < MIN_ROOM_TONE_DB);
        }
    }

    indicators
}

impl Sensor for DigitalSilenceSensor {
    fn name(&self) -> &str {
        NAME
    }

    fn threshold(&self) -> f64 {
        self.threshold
    }

    fn analyze(&self, waveform: &Waveform) -> Result<SensorResult, SensorError> {
        if waveform.len() < MIN_SAMPLES {
            return Ok(SensorResult::unknown(
                NAME,
                0.0,
                self.threshold,
                format!("Need at least {} samples, got {}", MIN_SAMPLES, waveform.len()),
            ));
        }

        let sr = waveform.sample_rate();
        let db = frame_rms_db(
            waveform.samples(),
            samples_for(0.025, sr),
            samples_for(0.010, sr),
        );
        let indicators = inspect(&db);
        let suspicion = indicators.suspicion();
        debug!("digital_silence: {:?} -> suspicion {:.2}", indicators, suspicion);

        let failed = suspicion > self.threshold;
        let detail = if failed {
            format!(
                "Digital silence artifacts: {} zero frames inside speech, \
                 {} instantaneous transitions",
                indicators.interior_perfect_silence,
                indicators.instant_transitions
            )
        } else {
            "Pauses carry a natural noise floor".to_string()
        };

        Ok(SensorResult::decide(
            NAME,
            failed,
            suspicion,
            self.threshold,
            FailureCode::DigitalSilenceArtifact,
            detail,
        )
        .with_score(suspicion)
        .with_metadata("interior_perfect_silence_frames", indicators.interior_perfect_silence)
        .with_metadata("instant_transitions", indicators.instant_transitions)
        .with_metadata("zero_variance_floor", indicators.zero_variance_floor)
        .with_metadata("missing_room_tone", indicators.missing_room_tone))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PassState;

    const SR: u32 = 16000;

    fn speech_like(seconds: f64, seed: u32) -> Vec<f32> {
        let n = (seconds * SR as f64) as usize;
        let mut state = seed;
        (0..n)
            .map(|i| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                let noise = (state >> 8) as f32 / (1u32 << 24) as f32 - 0.5;
                let t = i as f32 / SR as f32;
                0.3 * (2.0 * std::f32::consts::PI * 180.0 * t).sin() + 0.05 * noise
            })
            .collect()
    }

    fn room_noise(seconds: f64, seed: u32) -> Vec<f32> {
        let n = (seconds * SR as f64) as usize;
        let mut state = seed;
        (0..n)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                ((state >> 8) as f32 / (1u32 << 24) as f32 - 0.5) * 0.004
            })
            .collect()
    }

    #[test]
    fn test_spliced_zeros_fail() {
        let mut samples = speech_like(1.0, 1);
        samples.extend(vec![0.0; SR as usize / 2]);
        samples.extend(speech_like(1.0, 2));
        let w = Waveform::new(samples, SR).unwrap();
        let r = DigitalSilenceSensor::default().analyze(&w).unwrap();
        assert_eq!(r.passed, PassState::Fail);
        assert_eq!(r.reason, Some(FailureCode::DigitalSilenceArtifact));
        assert_eq!(r.value, 1.0);
    }

    #[test]
    fn test_room_tone_pause_passes() {
        let mut samples = speech_like(1.0, 1);
        samples.extend(room_noise(0.5, 9));
        samples.extend(speech_like(1.0, 2));
        let w = Waveform::new(samples, SR).unwrap();
        let r = DigitalSilenceSensor::default().analyze(&w).unwrap();
        assert_eq!(r.passed, PassState::Pass, "{}", r.detail);
    }

    #[test]
    fn test_steady_tone_passes() {
        let w = Waveform::new(speech_like(2.0, 5), SR).unwrap();
        let r = DigitalSilenceSensor::default().analyze(&w).unwrap();
        assert_eq!(r.passed, PassState::Pass);
        assert_eq!(r.value, 0.0);
    }

    #[test]
    fn test_too_short_unknown() {
        let w = Waveform::new(vec![0.1; 1000], SR).unwrap();
        let r = DigitalSilenceSensor::default().analyze(&w).unwrap();
        assert_eq!(r.passed, PassState::Unknown);
        assert_eq!(r.value, 0.0);
        assert_eq!(r.threshold, 0.5);
    }
}
