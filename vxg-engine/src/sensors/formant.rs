//! Two-formant vocal tract plausibility sensor
//!
//! A human vocal tract shapes voiced sound with several resonances: energy
//! is spread across many harmonics, and a second formant (F2) stands out
//! in the 0.8-3 kHz region next to the first (F1, 0.2-1 kHz). Two measures
//! on the long-term average spectrum (LTAS):
//! - tonal concentration: share of in-band power within ±3 bins of the
//!   strongest peak (a pure tone puts nearly all energy there)
//! - F2 presence: level of the strongest F2-region peak relative to F1

use super::{Sensor, SensorError};
use crate::features::stft::Stft;
use crate::types::{FailureCode, SensorResult, Waveform};
use tracing::debug;

pub const NAME: &str = "formant";

/// Analysis band for the LTAS
const BAND_LOW_HZ: f64 = 80.0;
const BAND_HIGH_HZ: f64 = 4000.0;

const F1_RANGE: (f64, f64) = (200.0, 1000.0);
const F2_MIN_HZ: f64 = 800.0;
const F2_MAX_HZ: f64 = 3000.0;
/// Minimum F1-F2 separation
const F2_SEPARATION_HZ: f64 = 250.0;

/// Bins either side of the peak counted as the peak's energy
const PEAK_HALF_WIDTH: usize = 3;
/// Spectral smoothing width for formant picking (Hz)
const SMOOTHING_HZ: f64 = 100.0;

#[derive(Debug, Clone)]
pub struct FormantSensor {
    threshold: f64,
    n_fft: usize,
}

impl FormantSensor {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            ..Default::default()
        }
    }
}

impl Default for FormantSensor {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            n_fft: 2048,
        }
    }
}

/// Concentration risk: 0 at 30% concentration, 1 at 80% and above
fn concentration_risk(concentration: f64) -> f64 {
    ((concentration - 0.3) / 0.5).clamp(0.0, 1.0)
}

/// F2 risk: 0 when F2 is within 30 dB of F1, 1 when 50 dB or more below
fn f2_absence_risk(f2_relative_db: f64) -> f64 {
    ((-f2_relative_db - 30.0) / 20.0).clamp(0.0, 1.0)
}

fn moving_average(values: &[f64], half_width: usize) -> Vec<f64> {
    (0..values.len())
        .map(|i| {
            let lo = i.saturating_sub(half_width);
            let hi = (i + half_width + 1).min(values.len());
            values[lo..hi].iter().sum::<f64>() / (hi - lo) as f64
        })
        .collect()
}

fn argmax_in(values: &[f64], lo: usize, hi: usize) -> Option<usize> {
    (lo..=hi.min(values.len().saturating_sub(1)))
        .max_by(|&a, &b| values[a].total_cmp(&values[b]))
}

impl Sensor for FormantSensor {
    fn name(&self) -> &str {
        NAME
    }

    fn threshold(&self) -> f64 {
        self.threshold
    }

    fn analyze(&self, waveform: &Waveform) -> Result<SensorResult, SensorError> {
        let sr = waveform.sample_rate();
        let stft = Stft::new(self.n_fft, self.n_fft / 4, self.n_fft);
        let Some(ltas) = stft.average_power(waveform.samples()) else {
            return Ok(SensorResult::unknown(NAME, 0.0, self.threshold, "No audio to analyze"));
        };

        let bin_hz = sr as f64 / self.n_fft as f64;
        let to_bin = |hz: f64| (hz / bin_hz).round() as usize;
        let nyquist = sr as f64 / 2.0;
        let band_hi_hz = BAND_HIGH_HZ.min(nyquist);
        if band_hi_hz < F2_MIN_HZ + F2_SEPARATION_HZ {
            return Ok(SensorResult::unknown(
                NAME,
                0.0,
                self.threshold,
                format!("Sample rate {} Hz too low for formant analysis", sr),
            ));
        }

        let (lo, hi) = (to_bin(BAND_LOW_HZ), to_bin(band_hi_hz).min(ltas.len() - 1));
        let band = &ltas[lo..=hi];
        let band_power: f64 = band.iter().sum();
        if band_power <= 0.0 {
            return Ok(SensorResult::unknown(
                NAME,
                0.0,
                self.threshold,
                "No energy in the voice band",
            ));
        }

        // Tonal concentration around the strongest peak
        let peak = argmax_in(band, 0, band.len() - 1).unwrap_or(0);
        let around_end = (peak + PEAK_HALF_WIDTH + 1).min(band.len());
        let around = &band[peak.saturating_sub(PEAK_HALF_WIDTH)..around_end];
        let concentration = around.iter().sum::<f64>() / band_power;

        // Formant picking on the power-smoothed LTAS, in dB
        let half_width = (SMOOTHING_HZ / bin_hz / 2.0).round().max(1.0) as usize;
        let smoothed: Vec<f64> = moving_average(&ltas, half_width)
            .iter()
            .map(|p| 10.0 * (p + 1e-20).log10())
            .collect();
        let f1_bin = argmax_in(&smoothed, to_bin(F1_RANGE.0), to_bin(F1_RANGE.1)).unwrap_or(0);
        let f1_hz = f1_bin as f64 * bin_hz;
        let f2_lo = to_bin((f1_hz + F2_SEPARATION_HZ).max(F2_MIN_HZ));
        let f2_hi = to_bin(F2_MAX_HZ.min(band_hi_hz));
        let f2_bin = argmax_in(&smoothed, f2_lo, f2_hi).unwrap_or(f2_lo);
        let f2_hz = f2_bin as f64 * bin_hz;
        let f2_relative_db = smoothed[f2_bin.min(smoothed.len() - 1)] - smoothed[f1_bin];

        let score = concentration_risk(concentration).max(f2_absence_risk(f2_relative_db));
        debug!(
            "formant: concentration {:.3}, F1 {:.0} Hz, F2 {:.0} Hz ({:+.1} dB), score {:.3}",
            concentration, f1_hz, f2_hz, f2_relative_db, score
        );

        let detail = if score >= self.threshold {
            format!(
                "Implausible vocal tract: {:.0}% of energy in one spectral peak, \
                 F2 {:+.1} dB vs F1",
                concentration * 100.0,
                f2_relative_db
            )
        } else {
            format!("Formant structure plausible (F1 {:.0} Hz, F2 {:.0} Hz)", f1_hz, f2_hz)
        };

        Ok(SensorResult::decide(
            NAME,
            score >= self.threshold,
            score,
            self.threshold,
            FailureCode::FormantImplausible,
            detail,
        )
        .with_score(score)
        .with_metadata("tonal_concentration", concentration)
        .with_metadata("f1_hz", f1_hz)
        .with_metadata("f2_hz", f2_hz)
        .with_metadata("f2_relative_db", f2_relative_db))
    }
}
