//! Phase coherence sensor
//!
//! Vocoders rebuild phase frame by frame. The instantaneous frequency of
//! the result is either too regular or broken by abrupt phase resets. The
//! sensor takes the analytic signal (FFT Hilbert transform), measures the
//! Shannon entropy of the instantaneous-frequency distribution and
//! subtracts a penalty per phase reset. Coherence below the threshold fails.

use super::signal::{calculate_rms, mean, percentile, samples_for, variance};
use super::{Sensor, SensorError};
use crate::types::{FailureCode, SensorResult, Waveform};
use rustfft::{num_complex::Complex, FftPlanner};
use std::f64::consts::PI;
use tracing::debug;

pub const NAME: &str = "phase_coherence";

pub const DEFAULT_COHERENCE_THRESHOLD: f64 = 0.4;

/// Histogram bins for the entropy estimate
const ENTROPY_BINS: usize = 50;
/// Histogram resolution floor, so numerical noise on a steady tone stays in one bin
const MIN_BIN_HZ: f64 = 1.0;
/// Entropy (nats) that maps to full coherence
const ENTROPY_SCALE_NATS: f64 = 6.0;
/// Instantaneous-frequency estimates beyond this z-score are dropped
const OUTLIER_Z: f64 = 3.0;
/// Phase advance deviating from the median advance by more than this is a reset
const PHASE_JUMP_RAD: f64 = 0.75 * PI;
const JUMP_PENALTY: f64 = 0.05;
const MAX_JUMP_PENALTY: f64 = 0.3;
/// Envelope share of its 99th percentile below which phase is meaningless
const ENVELOPE_GATE: f64 = 0.1;
/// Trimmed from both ends against circular wrap-around of the transform
const EDGE_SECONDS: f64 = 0.01;
/// Fewest usable phase advances
const MIN_ESTIMATES: usize = 256;

#[derive(Debug, Clone)]
pub struct PhaseCoherenceSensor {
    coherence_threshold: f64,
}

impl PhaseCoherenceSensor {
    pub fn new(coherence_threshold: f64) -> Self {
        Self {
            coherence_threshold,
        }
    }
}

impl Default for PhaseCoherenceSensor {
    fn default() -> Self {
        Self::new(DEFAULT_COHERENCE_THRESHOLD)
    }
}

impl Sensor for PhaseCoherenceSensor {
    fn name(&self) -> &str {
        NAME
    }

    fn threshold(&self) -> f64 {
        self.coherence_threshold
    }

    fn analyze(&self, waveform: &Waveform) -> Result<SensorResult, SensorError> {
        let threshold = self.coherence_threshold;
        let samples = waveform.samples();
        if calculate_rms(samples) == 0.0 {
            return Ok(SensorResult::unknown(
                NAME,
                0.0,
                threshold,
                "No signal to analyze",
            ));
        }

        let sr = waveform.sample_rate();
        let edge = samples_for(EDGE_SECONDS, sr);
        let analytic = analytic_signal(samples);
        let interior = if analytic.len() > 2 * edge {
            &analytic[edge..analytic.len() - edge]
        } else {
            &[][..]
        };
        let increments = phase_increments(interior);
        if increments.len() < MIN_ESTIMATES {
            return Ok(SensorResult::unknown(
                NAME,
                0.0,
                threshold,
                "Too little audio for phase analysis",
            ));
        }

        let jumps = count_phase_jumps(&increments);
        let to_hz = sr as f64 / (2.0 * PI);
        let freqs: Vec<f64> = increments.iter().map(|d| d * to_hz).collect();
        let freqs = remove_outliers(&freqs);
        let entropy = histogram_entropy(&freqs);

        let normalized = (entropy / ENTROPY_SCALE_NATS).min(1.0);
        let penalty = (jumps as f64 * JUMP_PENALTY).min(MAX_JUMP_PENALTY);
        let coherence = (normalized - penalty).max(0.0);
        let score = (1.0 - coherence / (2.0 * threshold).max(f64::EPSILON)).clamp(0.0, 1.0);
        debug!(
            "phase_coherence: entropy {:.3} nats, {} jumps, coherence {:.3}",
            entropy, jumps, coherence
        );

        let detail = if coherence < threshold {
            format!(
                "Phase coherence {:.3} below {:.2} (entropy {:.3} nats, {} phase resets): \
                 vocoder artifacts",
                coherence, threshold, entropy, jumps
            )
        } else {
            format!(
                "Phase coherence {:.3} (entropy {:.3} nats, {} phase resets)",
                coherence, entropy, jumps
            )
        };

        Ok(SensorResult::decide(
            NAME,
            coherence < threshold,
            coherence,
            threshold,
            FailureCode::VocoderArtifact,
            detail,
        )
        .with_score(score)
        .with_metadata("phase_entropy_nats", entropy)
        .with_metadata("phase_jumps", jumps)
        .with_metadata("mean_inst_freq_hz", mean(&freqs)))
    }
}

/// Analytic signal `x + i·H{x}` via the FFT
///
/// Negative frequencies are zeroed and positive ones doubled; DC and (for
/// even lengths) Nyquist are kept as is.
fn analytic_signal(samples: &[f32]) -> Vec<Complex<f64>> {
    let n = samples.len();
    if n == 0 {
        return Vec::new();
    }
    let mut buffer: Vec<Complex<f64>> = samples
        .iter()
        .map(|&s| Complex::new(s as f64, 0.0))
        .collect();

    let mut planner = FftPlanner::new();
    planner.plan_fft_forward(n).process(&mut buffer);
    let positive_end = (n + 1) / 2;
    for (k, bin) in buffer.iter_mut().enumerate() {
        let gain = if k == 0 || (n % 2 == 0 && k == n / 2) {
            1.0
        } else if k < positive_end {
            2.0
        } else {
            0.0
        };
        *bin *= gain;
    }
    planner.plan_fft_inverse(n).process(&mut buffer);

    let scale = 1.0 / n as f64;
    for z in &mut buffer {
        *z *= scale;
    }
    buffer
}

/// Wrapped phase advance (radians per sample) between neighbouring samples
/// whose envelope clears the gate
fn phase_increments(analytic: &[Complex<f64>]) -> Vec<f64> {
    let envelope: Vec<f64> = analytic.iter().map(|z| z.norm()).collect();
    let gate = percentile(&envelope, 99.0).unwrap_or(0.0) * ENVELOPE_GATE;
    analytic
        .windows(2)
        .zip(envelope.windows(2))
        .filter(|(_, env)| env[0] > gate && env[1] > gate)
        .map(|(z, _)| (z[1] * z[0].conj()).arg())
        .collect()
}

fn count_phase_jumps(increments: &[f64]) -> usize {
    let Some(median) = percentile(increments, 50.0) else {
        return 0;
    };
    increments
        .iter()
        .filter(|d| (*d - median).abs() > PHASE_JUMP_RAD)
        .count()
}

/// Drop values more than [`OUTLIER_Z`] standard deviations from the mean
fn remove_outliers(values: &[f64]) -> Vec<f64> {
    let m = mean(values);
    let std = variance(values).sqrt();
    if std == 0.0 {
        return values.to_vec();
    }
    values
        .iter()
        .copied()
        .filter(|v| ((v - m) / std).abs() < OUTLIER_Z)
        .collect()
}

/// Shannon entropy (nats) of a histogram over the value range
fn histogram_entropy(values: &[f64]) -> f64 {
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if values.is_empty() || max <= min {
        return 0.0;
    }
    let width = ((max - min) / ENTROPY_BINS as f64).max(MIN_BIN_HZ);
    let mut counts = [0usize; ENTROPY_BINS];
    for v in values {
        let bin = (((v - min) / width) as usize).min(ENTROPY_BINS - 1);
        counts[bin] += 1;
    }
    let n = values.len() as f64;
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / n;
            -p * p.ln()
        })
        .sum()
}
