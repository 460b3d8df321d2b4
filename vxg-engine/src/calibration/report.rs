// Calibration report (write-once per benchmark run)

use super::optimizer::ThresholdRecommendation;
use crate::error::Result;
use crate::telephony::CodecProfile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;

/// Metrics for one codec condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodecMetrics {
    pub codec: CodecProfile,
    pub n_genuine: usize,
    pub n_spoof: usize,
    /// Samples whose analysis failed and were left out
    pub n_failed: usize,
    pub eer: f64,
    pub eer_threshold: f64,
    pub auc: f64,
    /// Global-score threshold meeting the target FPR
    pub recommended_threshold: f64,
    pub achieved_fpr: f64,
    pub achieved_tpr: f64,
    pub sensor_thresholds: Vec<ThresholdRecommendation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub generated_at: DateTime<Utc>,
    pub target_fpr: f64,
    pub codecs: Vec<CodecMetrics>,
}

impl CalibrationReport {
    pub fn new(target_fpr: f64, codecs: Vec<CodecMetrics>) -> Self {
        Self {
            generated_at: Utc::now(),
            target_fpr,
            codecs,
        }
    }

    pub fn codec(&self, codec: CodecProfile) -> Option<&CodecMetrics> {
        self.codecs.iter().find(|m| m.codec == codec)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Plain-text table, one row per codec
    pub fn summary_table(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:<10} {:>8} {:>8} {:>8} {:>8} {:>10} {:>8} {:>8}",
            "codec", "genuine", "spoof", "EER", "AUC", "threshold", "FPR", "TPR"
        );
        for m in &self.codecs {
            let _ = writeln!(
                out,
                "{:<10} {:>8} {:>8} {:>7.2}% {:>8.3} {:>10.4} {:>8.3} {:>8.3}",
                m.codec,
                m.n_genuine,
                m.n_spoof,
                m.eer * 100.0,
                m.auc,
                m.recommended_threshold,
                m.achieved_fpr,
                m.achieved_tpr
            );
        }
        let _ = write!(out, "target FPR {:.3}", self.target_fpr);
        out
    }
}
