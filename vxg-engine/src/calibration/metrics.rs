// Detection-error metrics: ROC, AUC, EER, operating point for a target FPR
//
// Convention: label `true` = spoof (positive class), and a higher score
// means more spoof-like. A sample is flagged when `score >= threshold`.

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};

/// One ROC operating point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RocPoint {
    pub threshold: f64,
    /// False-positive rate (genuine flagged as spoof)
    pub fpr: f64,
    /// True-positive rate (spoof flagged)
    pub tpr: f64,
}

/// ROC curve ordered by descending threshold (ascending FPR)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RocCurve {
    pub points: Vec<RocPoint>,
    pub n_genuine: usize,
    pub n_spoof: usize,
}

/// Compute the ROC curve over every distinct score
///
/// # Errors
/// * `InvalidInput` - length mismatch or non-finite scores
/// * `InsufficientData` - either class is absent
pub fn roc_curve(labels: &[bool], scores: &[f64]) -> Result<RocCurve> {
    if labels.len() != scores.len() {
        return Err(EngineError::InvalidInput(format!(
            "{} labels for {} scores",
            labels.len(),
            scores.len()
        )));
    }
    if scores.iter().any(|s| !s.is_finite()) {
        return Err(EngineError::InvalidInput("non-finite score".to_string()));
    }

    let n_spoof = labels.iter().filter(|&&l| l).count();
    let n_genuine = labels.len() - n_spoof;
    if n_spoof == 0 || n_genuine == 0 {
        return Err(EngineError::InsufficientData(format!(
            "ROC needs both classes (genuine {}, spoof {})",
            n_genuine, n_spoof
        )));
    }

    let mut pairs: Vec<(f64, bool)> = scores.iter().copied().zip(labels.iter().copied()).collect();
    pairs.sort_by(|a, b| b.0.total_cmp(&a.0));

    let mut points = vec![RocPoint {
        threshold: pairs[0].0 + 1e-6,
        fpr: 0.0,
        tpr: 0.0,
    }];
    let (mut tp, mut fp) = (0usize, 0usize);
    let mut i = 0;
    while i < pairs.len() {
        let threshold = pairs[i].0;
        // All samples sharing a score cross the threshold together
        while i < pairs.len() && pairs[i].0 == threshold {
            if pairs[i].1 {
                tp += 1;
            } else {
                fp += 1;
            }
            i += 1;
        }
        points.push(RocPoint {
            threshold,
            fpr: fp as f64 / n_genuine as f64,
            tpr: tp as f64 / n_spoof as f64,
        });
    }

    Ok(RocCurve {
        points,
        n_genuine,
        n_spoof,
    })
}

impl RocCurve {
    /// Area under the curve (trapezoid rule)
    pub fn auc(&self) -> f64 {
        self.points
            .windows(2)
            .map(|w| (w[1].fpr - w[0].fpr) * (w[1].tpr + w[0].tpr) / 2.0)
            .sum()
    }

    /// Equal error rate and the threshold where FAR is closest to FRR
    ///
    /// Returns `(eer, threshold)`; the EER is the mean of FPR and FNR at
    /// that point.
    pub fn eer(&self) -> (f64, f64) {
        let mut best = (f64::INFINITY, 0.5, self.points[0].threshold);
        for p in &self.points {
            let fnr = 1.0 - p.tpr;
            let gap = (p.fpr - fnr).abs();
            if gap < best.0 {
                best = (gap, (p.fpr + fnr) / 2.0, p.threshold);
            }
        }
        (best.1, best.2)
    }

    /// Operating point with the largest FPR not exceeding `target_fpr`
    ///
    /// Ties on FPR go to the higher TPR. The first point (nothing flagged)
    /// always qualifies, so a result exists for any target >= 0.
    pub fn threshold_for_target_fpr(&self, target_fpr: f64) -> RocPoint {
        let mut best = self.points[0];
        for p in &self.points {
            if p.fpr <= target_fpr + 1e-12
                && (p.fpr > best.fpr || (p.fpr == best.fpr && p.tpr > best.tpr))
            {
                best = *p;
            }
        }
        best
    }
}
