//! Bandwidth sensor
//!
//! Measures the spectral rolloff (frequency below which a fixed share of
//! the long-term power lies). Wideband recordings whose energy stops short
//! of the threshold look band-limited, as many vocoders are.

use super::{Sensor, SensorError};
use crate::features::stft::Stft;
use crate::types::{FailureCode, SensorResult, Waveform};
use tracing::debug;

pub const NAME: &str = "bandwidth";

pub const DEFAULT_ROLLOFF_THRESHOLD_HZ: f64 = 4000.0;

#[derive(Debug, Clone)]
pub struct BandwidthSensor {
    rolloff_threshold_hz: f64,
    /// Share of total power below the rolloff frequency
    rolloff_percent: f64,
    n_fft: usize,
}

impl BandwidthSensor {
    pub fn new(rolloff_threshold_hz: f64) -> Self {
        Self {
            rolloff_threshold_hz,
            ..Default::default()
        }
    }
}

impl Default for BandwidthSensor {
    fn default() -> Self {
        Self {
            rolloff_threshold_hz: DEFAULT_ROLLOFF_THRESHOLD_HZ,
            rolloff_percent: 0.99,
            n_fft: 2048,
        }
    }
}

impl Sensor for BandwidthSensor {
    fn name(&self) -> &str {
        NAME
    }

    fn threshold(&self) -> f64 {
        self.rolloff_threshold_hz
    }

    fn analyze(&self, waveform: &Waveform) -> Result<SensorResult, SensorError> {
        let threshold = self.rolloff_threshold_hz;
        let stft = Stft::new(self.n_fft, self.n_fft / 4, self.n_fft);
        let sr = waveform.sample_rate();

        let Some(power) = stft.average_power(waveform.samples()) else {
            return Ok(SensorResult::unknown(NAME, 0.0, threshold, "No audio to analyze"));
        };
        let total: f64 = power.iter().sum();
        if total <= 0.0 {
            return Ok(SensorResult::unknown(
                NAME,
                0.0,
                threshold,
                "Silent audio has no bandwidth",
            ));
        }

        let target = total * self.rolloff_percent;
        let mut cumulative = 0.0;
        let mut rolloff_bin = power.len() - 1;
        for (k, p) in power.iter().enumerate() {
            cumulative += p;
            if cumulative >= target {
                rolloff_bin = k;
                break;
            }
        }
        let rolloff_hz = stft.bin_frequency(rolloff_bin, sr);
        let nyquist = sr as f64 / 2.0;
        let context = if rolloff_hz < threshold {
            "NARROWBAND"
        } else {
            "WIDEBAND"
        };
        debug!("bandwidth: rolloff {:.0} Hz ({})", rolloff_hz, context);

        // A recording that cannot carry energy above the threshold says
        // nothing about the source
        if nyquist <= threshold {
            return Ok(SensorResult::unknown(
                NAME,
                rolloff_hz,
                threshold,
                format!(
                    "Sample rate {} Hz cannot represent the {:.0} Hz threshold",
                    sr, threshold
                ),
            )
            .with_metadata("context", context));
        }

        let score = ((threshold - rolloff_hz) / threshold).clamp(0.0, 1.0);
        let detail = format!(
            "Spectral rolloff at {:.0} Hz ({})",
            rolloff_hz, context
        );
        Ok(SensorResult::decide(
            NAME,
            rolloff_hz < threshold,
            rolloff_hz,
            threshold,
            FailureCode::NarrowbandArtifact,
            detail,
        )
        .with_score(score)
        .with_metadata("context", context)
        .with_metadata("rolloff_percent", self.rolloff_percent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PassState;

    fn noise(n: usize) -> Vec<f32> {
        let mut state = 987_654_321u64;
        (0..n)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                ((state % 20_000) as f32 / 10_000.0 - 1.0) * 0.2
            })
            .collect()
    }

    #[test]
    fn test_white_noise_is_wideband() {
        let w = Waveform::new(noise(32000), 16000).unwrap();
        let r = BandwidthSensor::default().analyze(&w).unwrap();
        assert_eq!(r.passed, PassState::Pass);
        assert!(r.value > 7000.0);
    }

    #[test]
    fn test_low_tone_is_narrowband() {
        let samples: Vec<f32> = (0..16000)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 16000.0).sin())
            .collect();
        let w = Waveform::new(samples, 16000).unwrap();
        let r = BandwidthSensor::default().analyze(&w).unwrap();
        assert_eq!(r.passed, PassState::Fail);
        assert_eq!(r.reason, Some(FailureCode::NarrowbandArtifact));
        assert!(r.score.unwrap() > 0.85);
    }

    #[test]
    fn test_8k_audio_unknown() {
        let w = Waveform::new(noise(8000), 8000).unwrap();
        let r = BandwidthSensor::default().analyze(&w).unwrap();
        assert_eq!(r.passed, PassState::Unknown);
        assert!(r.value > 0.0);
    }

    #[test]
    fn test_empty_unknown() {
        let w = Waveform::new(Vec::new(), 16000).unwrap();
        let r = BandwidthSensor::default().analyze(&w).unwrap();
        assert_eq!(r.passed, PassState::Unknown);
        assert_eq!(r.value, 0.0);
    }
}
