//! Dynamic range (crest factor) sensor
//!
//! Natural speech is peaky: its crest factor (peak / RMS) is high. Heavy
//! limiting and many vocoders flatten it. In noisy recordings the noise
//! floor lifts the RMS, so the threshold is relaxed linearly from 100% at
//! 15 dB SNR down to 60% at 5 dB SNR and below. The result reports the
//! configured threshold; the relaxed one goes into `adapted_threshold`.

use super::signal::{calculate_rms, frame_rms_db, percentile, samples_for};
use super::{Sensor, SensorError};
use crate::types::{FailureCode, SensorResult, Waveform};
use tracing::debug;

pub const NAME: &str = "dynamic_range";

pub const DEFAULT_CREST_THRESHOLD: f64 = 5.0;

/// SNR (dB) at and above which no relaxation applies
const CLEAN_SNR_DB: f64 = 15.0;
/// Lowest relaxation factor
const MIN_RELAXATION: f64 = 0.6;

#[derive(Debug, Clone)]
pub struct DynamicRangeSensor {
    crest_factor_threshold: f64,
}

impl DynamicRangeSensor {
    pub fn new(crest_factor_threshold: f64) -> Self {
        Self {
            crest_factor_threshold,
        }
    }

    /// Loud-frame level minus noise floor over 20 ms frames
    fn estimate_snr_db(&self, samples: &[f32], sample_rate: u32) -> f64 {
        let frame = samples_for(0.02, sample_rate);
        let db = frame_rms_db(samples, frame, frame);
        match (percentile(&db, 10.0), percentile(&db, 95.0)) {
            (Some(noise), Some(signal)) => signal - noise,
            _ => 0.0,
        }
    }

    fn adapted_threshold(&self, snr_db: f64) -> f64 {
        let factor = if snr_db >= CLEAN_SNR_DB {
            1.0
        } else {
            (MIN_RELAXATION + (1.0 - MIN_RELAXATION) * (snr_db - 5.0) / 10.0).max(MIN_RELAXATION)
        };
        self.crest_factor_threshold * factor
    }
}

impl Default for DynamicRangeSensor {
    fn default() -> Self {
        Self::new(DEFAULT_CREST_THRESHOLD)
    }
}

impl Sensor for DynamicRangeSensor {
    fn name(&self) -> &str {
        NAME
    }

    fn threshold(&self) -> f64 {
        self.crest_factor_threshold
    }

    fn analyze(&self, waveform: &Waveform) -> Result<SensorResult, SensorError> {
        let samples = waveform.samples();
        if samples.is_empty() {
            return Ok(SensorResult::unknown(
                NAME,
                0.0,
                self.crest_factor_threshold,
                "No audio to analyze",
            ));
        }

        let rms = calculate_rms(samples);
        if rms == 0.0 {
            return Ok(SensorResult::unknown(
                NAME,
                0.0,
                self.crest_factor_threshold,
                "Pure digital silence, crest factor undefined",
            ));
        }

        let peak = samples.iter().fold(0.0f64, |m, &s| m.max((s as f64).abs()));
        let crest_factor = peak / rms;
        let snr_db = self.estimate_snr_db(samples, waveform.sample_rate());
        let threshold = self.adapted_threshold(snr_db);
        let score = (1.0 - crest_factor / (2.0 * threshold)).clamp(0.0, 1.0);
        debug!(
            "dynamic_range: crest {:.2}, snr {:.1} dB, threshold {:.2} (adapted {:.2})",
            crest_factor, snr_db, self.crest_factor_threshold, threshold
        );

        let detail = if crest_factor < threshold {
            format!(
                "Crest factor {:.2} below {:.2}: dynamics look compressed",
                crest_factor, threshold
            )
        } else {
            format!("Crest factor {:.2} shows natural dynamics", crest_factor)
        };

        Ok(SensorResult::decide(
            NAME,
            crest_factor < threshold,
            crest_factor,
            self.crest_factor_threshold,
            FailureCode::CompressionArtifact,
            detail,
        )
        .with_score(score)
        .with_metadata("peak", peak)
        .with_metadata("rms", rms)
        .with_metadata("snr_db", snr_db)
        .with_metadata("adapted_threshold", threshold))
    }
}
