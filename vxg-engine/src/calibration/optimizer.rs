// Per-sensor threshold optimizer
//
// Sweeps a sensor's decision threshold across the observed value range and
// picks the point where false-accept and false-reject rates balance.

use serde::{Deserialize, Serialize};

/// Number of candidate thresholds per sweep
const SWEEP_STEPS: usize = 100;

/// Fraction of the value span added on both sides of the sweep range
const SWEEP_PADDING: f64 = 0.05;

/// Which side of the threshold indicates spoofing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdDirection {
    /// Fail when value > threshold (phonation length, violation scores)
    AboveIsSpoof,
    /// Fail when value < threshold (crest factor, rolloff)
    BelowIsSpoof,
}

impl ThresholdDirection {
    fn flags(self, value: f64, threshold: f64) -> bool {
        match self {
            ThresholdDirection::AboveIsSpoof => value > threshold,
            ThresholdDirection::BelowIsSpoof => value < threshold,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRecommendation {
    pub sensor: String,
    pub direction: ThresholdDirection,
    pub threshold: f64,
    /// Spoof samples accepted
    pub far: f64,
    /// Genuine samples rejected
    pub frr: f64,
    pub n_genuine: usize,
    pub n_spoof: usize,
}

/// Find the balanced threshold for one sensor's `(value, is_spoof)` samples
///
/// The direction is taken from the class means. Returns `None` when either
/// class is missing or every value is identical.
pub fn optimize_threshold(
    sensor: &str,
    samples: &[(f64, bool)],
) -> Option<ThresholdRecommendation> {
    let genuine: Vec<f64> = samples.iter().filter(|s| !s.1).map(|s| s.0).collect();
    let spoof: Vec<f64> = samples.iter().filter(|s| s.1).map(|s| s.0).collect();
    if genuine.is_empty() || spoof.is_empty() {
        return None;
    }

    let mean = |v: &[f64]| v.iter().sum::<f64>() / v.len() as f64;
    let direction = if mean(&spoof) >= mean(&genuine) {
        ThresholdDirection::AboveIsSpoof
    } else {
        ThresholdDirection::BelowIsSpoof
    };

    let (min, max) = samples
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
            (lo.min(s.0), hi.max(s.0))
        });
    let span = max - min;
    if span <= 0.0 {
        return None;
    }
    let start = min - span * SWEEP_PADDING;
    let step = span * (1.0 + 2.0 * SWEEP_PADDING) / SWEEP_STEPS as f64;

    let mut best: Option<(f64, f64, f64)> = None;
    for i in 0..=SWEEP_STEPS {
        let threshold = start + step * i as f64;
        let frr = genuine
            .iter()
            .filter(|&&v| direction.flags(v, threshold))
            .count() as f64
            / genuine.len() as f64;
        let far = spoof
            .iter()
            .filter(|&&v| !direction.flags(v, threshold))
            .count() as f64
            / spoof.len() as f64;

        let better = match best {
            None => true,
            Some((_, best_far, best_frr)) => {
                let gap = (far - frr).abs();
                let best_gap = (best_far - best_frr).abs();
                gap < best_gap - 1e-12
                    || ((gap - best_gap).abs() <= 1e-12 && far + frr < best_far + best_frr)
            }
        };
        if better {
            best = Some((threshold, far, frr));
        }
    }

    best.map(|(threshold, far, frr)| ThresholdRecommendation {
        sensor: sensor.to_string(),
        direction,
        threshold,
        far,
        frr,
        n_genuine: genuine.len(),
        n_spoof: spoof.len(),
    })
}
