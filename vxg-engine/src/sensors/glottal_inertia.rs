//! Glottal inertia sensor
//!
//! Vocal folds have mass: a voiced onset cannot reach full amplitude, and a
//! voiced offset cannot decay to silence, faster than roughly 10 ms.
//! Synthesis and splicing produce step-like envelopes that violate this.
//! Turbulent onsets (plosive bursts) are exempt: they are broadband, which
//! is measured as normalized spectral entropy of the onset.

use super::signal::{calculate_rms, linear_to_db, samples_for};
use super::{Sensor, SensorError};
use crate::features::stft::Stft;
use crate::types::{FailureCode, SensorResult, Waveform};
use tracing::debug;

pub const NAME: &str = "glottal_inertia";

/// Envelope hop and window (seconds)
const HOP_SECONDS: f64 = 0.0025;
const WINDOW_SECONDS: f64 = 0.005;

/// Onset/offset searches look ahead this many envelope frames (50 ms)
const LOOKAHEAD_FRAMES: usize = 20;

/// Onset analysis FFT size for the turbulence check
const ONSET_FFT: usize = 256;

#[derive(Debug, Clone)]
pub struct GlottalInertiaSensor {
    /// Minimum physiological rise/decay time (seconds)
    min_rise_seconds: f64,
    silence_db: f64,
    speech_db: f64,
    /// Energy a hard cut must start from
    cut_from_db: f64,
    /// Normalized spectral entropy above which an onset is turbulent
    turbulence_entropy: f64,
    /// Score above which the sensor fails
    threshold: f64,
}

impl Default for GlottalInertiaSensor {
    fn default() -> Self {
        Self {
            min_rise_seconds: 0.010,
            silence_db: -60.0,
            speech_db: -20.0,
            cut_from_db: -40.0,
            turbulence_entropy: 0.75,
            threshold: 0.5,
        }
    }
}

impl GlottalInertiaSensor {
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    fn envelope_db(&self, samples: &[f32], sample_rate: u32) -> (Vec<f64>, usize) {
        let hop = samples_for(HOP_SECONDS, sample_rate);
        let window = samples_for(WINDOW_SECONDS, sample_rate);
        let n_frames = if samples.len() < window {
            0
        } else {
            1 + (samples.len() - window) / hop
        };
        let db = (0..n_frames)
            .map(|i| linear_to_db(calculate_rms(&samples[i * hop..i * hop + window])))
            .collect();
        (db, hop)
    }

    /// Normalized (0..1) spectral entropy of the samples starting at `start`
    fn onset_entropy(&self, samples: &[f32], start: usize) -> f64 {
        let end = (start + ONSET_FFT).min(samples.len());
        let stft = Stft::new(ONSET_FFT, ONSET_FFT, ONSET_FFT);
        let Some(power) = stft.average_power(&samples[start..end]) else {
            return 0.0;
        };
        let total: f64 = power.iter().sum();
        if total <= 0.0 {
            return 0.0;
        }
        let entropy: f64 = power
            .iter()
            .map(|p| p / total)
            .filter(|&p| p > 0.0)
            .map(|p| -p * p.log2())
            .sum();
        entropy / (power.len() as f64).log2()
    }

    /// Count onsets rising from silence to speech level too fast
    fn onset_violations(
        &self,
        db: &[f64],
        hop: usize,
        sr: f64,
        samples: &[f32],
    ) -> (usize, usize) {
        let mut onsets = 0;
        let mut violations = 0;
        let mut i = 1;
        while i < db.len() {
            if db[i - 1] < self.silence_db && db[i] >= self.silence_db {
                onsets += 1;
                let reached =
                    (i..(i + LOOKAHEAD_FRAMES).min(db.len())).find(|&j| db[j] >= self.speech_db);
                if let Some(j) = reached {
                    let rise = (j - i) as f64 * hop as f64 / sr;
                    if rise < self.min_rise_seconds
                        && self.onset_entropy(samples, i * hop) < self.turbulence_entropy
                    {
                        violations += 1;
                    }
                    i = j;
                }
            }
            i += 1;
        }
        (onsets, violations)
    }

    /// Count entries into silence that decayed from speech energy too fast
    fn offset_violations(&self, db: &[f64], hop: usize, sr: f64) -> (usize, usize) {
        let mut offsets = 0;
        let mut violations = 0;
        for j in 1..db.len() {
            if db[j - 1] >= self.silence_db && db[j] < self.silence_db {
                offsets += 1;
                let lo = j.saturating_sub(LOOKAHEAD_FRAMES);
                // Last frame still carrying speech energy before the silence
                if let Some(k) = (lo..j).rev().find(|&k| db[k] >= self.cut_from_db) {
                    let decay = (j - k) as f64 * hop as f64 / sr;
                    if decay < self.min_rise_seconds {
                        violations += 1;
                    }
                }
            }
        }
        (offsets, violations)
    }
}

impl Sensor for GlottalInertiaSensor {
    fn name(&self) -> &str {
        NAME
    }

    fn threshold(&self) -> f64 {
        self.threshold
    }

    fn analyze(&self, waveform: &Waveform) -> Result<SensorResult, SensorError> {
        let samples = waveform.samples();
        let sr = waveform.sample_rate();
        let (db, hop) = self.envelope_db(samples, sr);
        if db.len() < 2 {
            return Ok(SensorResult::unknown(
                NAME,
                0.0,
                self.threshold,
                "Audio too short for envelope analysis",
            ));
        }

        let (onsets, onset_violations) = self.onset_violations(&db, hop, sr as f64, samples);
        let (offsets, offset_violations) = self.offset_violations(&db, hop, sr as f64);
        let violations = onset_violations + offset_violations;
        let score = (0.6 * violations as f64).min(1.0);
        debug!(
            "glottal_inertia: {} onsets ({} violations), {} offsets ({} violations)",
            onsets, onset_violations, offsets, offset_violations
        );

        let detail = if violations == 0 {
            format!("{} onsets and {} offsets within physiological limits", onsets, offsets)
        } else {
            format!(
                "{} envelope transition(s) faster than {:.0} ms",
                violations,
                self.min_rise_seconds * 1000.0
            )
        };

        Ok(SensorResult::decide(
            NAME,
            score >= self.threshold,
            score,
            self.threshold,
            FailureCode::GlottalInertiaViolation,
            detail,
        )
        .with_score(score)
        .with_metadata("onsets", onsets)
        .with_metadata("offsets", offsets)
        .with_metadata("onset_violations", onset_violations)
        .with_metadata("offset_violations", offset_violations))
    }
}
