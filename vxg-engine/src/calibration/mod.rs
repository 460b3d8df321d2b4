//! Calibration / benchmark harness
//!
//! Runs the full detection pipeline over a labeled corpus, once per codec
//! profile, and reports EER, AUC and the global-score threshold meeting a
//! target false-positive rate, plus balanced per-sensor thresholds.
//!
//! Samples are analyzed in parallel with rayon. Outcomes are collected in
//! corpus order and packet loss is seeded per sample index, so results do not
//! depend on scheduling.

pub mod metrics;
pub mod optimizer;
pub mod report;

pub use metrics::{roc_curve, RocCurve, RocPoint};
pub use optimizer::{optimize_threshold, ThresholdDirection, ThresholdRecommendation};
pub use report::{CalibrationReport, CodecMetrics};

use crate::error::{EngineError, Result};
use crate::pipeline::DetectionPipeline;
use crate::telephony::{ChannelSimulator, CodecProfile};
use crate::types::Waveform;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Genuine,
    Spoof,
}

impl Label {
    pub fn is_spoof(self) -> bool {
        matches!(self, Label::Spoof)
    }
}

#[derive(Debug, Clone)]
pub struct LabeledSample {
    pub id: String,
    pub label: Label,
    pub waveform: Waveform,
}

/// Per-sample evidence kept for the metrics
#[derive(Debug, Clone)]
struct SampleOutcome {
    score: f64,
    /// Measured values of sensors that reached a pass/fail decision
    sensor_values: Vec<(String, f64)>,
}

pub struct BenchmarkHarness<'a> {
    pipeline: &'a DetectionPipeline,
    channel: ChannelSimulator,
    /// Dedicated pool; `None` runs on rayon's global pool
    pool: Option<ThreadPool>,
}

impl<'a> BenchmarkHarness<'a> {
    pub fn new(pipeline: &'a DetectionPipeline, channel: ChannelSimulator) -> Self {
        Self {
            pipeline,
            channel,
            pool: None,
        }
    }

    /// Limit the analysis to `workers` threads
    pub fn with_workers(mut self, workers: usize) -> Self {
        match ThreadPoolBuilder::new().num_threads(workers.max(1)).build() {
            Ok(pool) => self.pool = Some(pool),
            Err(e) => warn!(
                "Could not build a {}-thread pool, using the global pool: {}",
                workers, e
            ),
        }
        self
    }

    /// Benchmark each codec profile independently
    pub fn run(
        &self,
        corpus: &[LabeledSample],
        codecs: &[CodecProfile],
        target_fpr: f64,
    ) -> Result<CalibrationReport> {
        let mut metrics = Vec::with_capacity(codecs.len());
        for &codec in codecs {
            metrics.push(self.run_codec(corpus, codec, target_fpr)?);
        }
        Ok(CalibrationReport::new(target_fpr, metrics))
    }

    /// Benchmark one codec profile
    ///
    /// # Errors
    /// * `InvalidInput` - target FPR outside [0, 1]
    /// * `InsufficientData` - fewer than one successful sample per class
    pub fn run_codec(
        &self,
        corpus: &[LabeledSample],
        codec: CodecProfile,
        target_fpr: f64,
    ) -> Result<CodecMetrics> {
        if !(0.0..=1.0).contains(&target_fpr) {
            return Err(EngineError::InvalidInput(format!(
                "target FPR must lie in [0, 1], got {}",
                target_fpr
            )));
        }

        info!(
            "Benchmarking {} samples over {} channel",
            corpus.len(),
            codec
        );
        let outcomes = self.analyze_corpus(corpus, codec);
        let failed = outcomes.iter().filter(|o| o.is_none()).count();

        let mut labels = Vec::new();
        let mut scores = Vec::new();
        let mut per_sensor: BTreeMap<String, Vec<(f64, bool)>> = BTreeMap::new();
        for (sample, outcome) in corpus.iter().zip(&outcomes) {
            let Some(outcome) = outcome else { continue };
            let spoof = sample.label.is_spoof();
            labels.push(spoof);
            scores.push(outcome.score);
            for (name, value) in &outcome.sensor_values {
                per_sensor
                    .entry(name.clone())
                    .or_default()
                    .push((*value, spoof));
            }
        }

        let roc = roc_curve(&labels, &scores)?;
        let (eer, eer_threshold) = roc.eer();
        let auc = roc.auc();
        let operating = roc.threshold_for_target_fpr(target_fpr);
        let sensor_thresholds = per_sensor
            .iter()
            .filter_map(|(name, samples)| optimize_threshold(name, samples))
            .collect();

        info!(
            "{}: EER {:.2}%, AUC {:.3}, threshold {:.4} at FPR {:.3} (TPR {:.3})",
            codec,
            eer * 100.0,
            auc,
            operating.threshold,
            operating.fpr,
            operating.tpr
        );

        Ok(CodecMetrics {
            codec,
            n_genuine: roc.n_genuine,
            n_spoof: roc.n_spoof,
            n_failed: failed,
            eer,
            eer_threshold,
            auc,
            recommended_threshold: operating.threshold,
            achieved_fpr: operating.fpr,
            achieved_tpr: operating.tpr,
            sensor_thresholds,
        })
    }

    /// One outcome per sample, in corpus order; `None` marks a failed analysis
    fn analyze_corpus(
        &self,
        corpus: &[LabeledSample],
        codec: CodecProfile,
    ) -> Vec<Option<SampleOutcome>> {
        match &self.pool {
            Some(pool) => pool.install(|| self.analyze_parallel(corpus, codec)),
            None => self.analyze_parallel(corpus, codec),
        }
    }

    fn analyze_parallel(
        &self,
        corpus: &[LabeledSample],
        codec: CodecProfile,
    ) -> Vec<Option<SampleOutcome>> {
        let base_seed = self.channel.config().seed;

        corpus
            .par_iter()
            .enumerate()
            .map(|(index, sample)| {
                let seed = base_seed.wrapping_add(index as u64);
                let degraded = self.channel.apply_with_seed(&sample.waveform, codec, seed);
                match self.pipeline.analyze_detailed(&degraded, Some(codec)) {
                    Ok(analysis) => {
                        debug!(
                            "{} [{}]: score {:.3}",
                            sample.id, codec, analysis.verdict.global_risk_score
                        );
                        Some(SampleOutcome {
                            score: analysis.verdict.global_risk_score,
                            sensor_values: analysis
                                .sensor_results
                                .iter()
                                .filter(|r| !r.passed.is_unknown())
                                .map(|r| (r.sensor_name.clone(), r.value))
                                .collect(),
                        })
                    }
                    Err(e) => {
                        warn!("{} [{}]: analysis failed: {}", sample.id, codec, e);
                        None
                    }
                }
            })
            .collect()
    }
}
