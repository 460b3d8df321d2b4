//! Core Types for the detection pipeline
//!
//! Defines the per-request data that flows between the stages:
//! - **Waveform:** immutable samples + sample rate
//! - **SensorResult:** atomic unit of evidence from one sensor
//! - **SensorResults:** ordered results of one registry pass

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

// ============================================================================
// Waveform
// ============================================================================

/// Mono audio samples in [-1, 1] plus sample rate
///
/// Immutable once constructed. Cloning shares the sample buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    samples: Arc<[f32]>,
    sample_rate: u32,
}

impl Waveform {
    /// Create a waveform, rejecting a zero sample rate or non-finite samples
    ///
    /// An empty sample vector is valid (very short calls happen).
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(EngineError::InvalidInput(
                "sample rate must be positive".to_string(),
            ));
        }
        if let Some(pos) = samples.iter().position(|s| !s.is_finite()) {
            return Err(EngineError::InvalidInput(format!(
                "non-finite sample at index {}",
                pos
            )));
        }
        Ok(Self {
            samples: samples.into(),
            sample_rate,
        })
    }

    /// Build from samples produced by an internal transform
    ///
    /// Caller guarantees finiteness and a non-zero rate inherited from a
    /// validated waveform.
    pub(crate) fn from_processed(samples: Vec<f32>, sample_rate: u32) -> Self {
        debug_assert!(sample_rate > 0);
        Self {
            samples: samples.into(),
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds
    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

// ============================================================================
// Sensor Evidence
// ============================================================================

/// Tri-state sensor outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PassState {
    Pass,
    Fail,
    /// Sensor could not evaluate (too little audio, internal error)
    Unknown,
}

impl PassState {
    pub fn is_fail(self) -> bool {
        matches!(self, PassState::Fail)
    }

    pub fn is_unknown(self) -> bool {
        matches!(self, PassState::Unknown)
    }
}

/// Fixed failure-code tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureCode {
    /// Continuous phonation beyond the biological maximum
    BiologicallyImpossible,
    /// Voiced time without an inhalation pause beyond lung capacity
    InfiniteLungCapacity,
    /// Vocal-fold onset/offset faster than the folds can move
    GlottalInertiaViolation,
    /// Crest factor too low (heavy limiting or synthesis)
    CompressionArtifact,
    /// Spectral energy ends below the bandwidth threshold
    NarrowbandArtifact,
    /// No plausible two-formant vocal tract structure
    FormantImplausible,
    /// Exact zero runs or splice boundaries
    DigitalSilenceArtifact,
    /// Instantaneous phase too regular or broken by resets
    VocoderArtifact,
    /// Machine-learned classifier flags spoof
    DeepfakeDetected,
    /// Sensor evaluation failed
    Error,
}

impl FailureCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCode::BiologicallyImpossible => "BIOLOGICALLY_IMPOSSIBLE",
            FailureCode::InfiniteLungCapacity => "INFINITE_LUNG_CAPACITY",
            FailureCode::GlottalInertiaViolation => "GLOTTAL_INERTIA_VIOLATION",
            FailureCode::CompressionArtifact => "COMPRESSION_ARTIFACT",
            FailureCode::NarrowbandArtifact => "NARROWBAND_ARTIFACT",
            FailureCode::FormantImplausible => "FORMANT_IMPLAUSIBLE",
            FailureCode::DigitalSilenceArtifact => "DIGITAL_SILENCE_ARTIFACT",
            FailureCode::VocoderArtifact => "VOCODER_ARTIFACT",
            FailureCode::DeepfakeDetected => "DEEPFAKE_DETECTED",
            FailureCode::Error => "ERROR",
        }
    }
}

impl fmt::Display for FailureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Evidence from a single sensor
///
/// `value` and `threshold` are always populated, including for `Unknown`
/// results, so every result renders as a numeric trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorResult {
    /// Registered sensor name
    pub sensor_name: String,
    /// Pass / fail / unknown
    pub passed: PassState,
    /// Measured statistic
    pub value: f64,
    /// Decision boundary used
    pub threshold: f64,
    /// Failure code (only for `Fail`, or `ERROR` on evaluation failure)
    pub reason: Option<FailureCode>,
    /// Human-readable explanation
    pub detail: String,
    /// Auxiliary measurements
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// Sensor's own anomaly estimate in [0, 1], if it has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl SensorResult {
    fn build(
        name: impl Into<String>,
        passed: PassState,
        value: f64,
        threshold: f64,
        reason: Option<FailureCode>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            sensor_name: name.into(),
            passed,
            value,
            threshold,
            reason,
            detail: detail.into(),
            metadata: BTreeMap::new(),
            score: None,
        }
    }

    pub fn pass(
        name: impl Into<String>,
        value: f64,
        threshold: f64,
        detail: impl Into<String>,
    ) -> Self {
        Self::build(name, PassState::Pass, value, threshold, None, detail)
    }

    pub fn fail(
        name: impl Into<String>,
        value: f64,
        threshold: f64,
        reason: FailureCode,
        detail: impl Into<String>,
    ) -> Self {
        Self::build(name, PassState::Fail, value, threshold, Some(reason), detail)
    }

    pub fn unknown(
        name: impl Into<String>,
        value: f64,
        threshold: f64,
        detail: impl Into<String>,
    ) -> Self {
        Self::build(name, PassState::Unknown, value, threshold, None, detail)
    }

    /// Result synthesized when a sensor errors or panics
    pub fn error(name: impl Into<String>, threshold: f64, message: impl fmt::Display) -> Self {
        Self::build(
            name,
            PassState::Unknown,
            0.0,
            threshold,
            Some(FailureCode::Error),
            format!("Sensor analysis failed: {}", message),
        )
    }

    /// Pass or fail depending on `failed`
    pub fn decide(
        name: impl Into<String>,
        failed: bool,
        value: f64,
        threshold: f64,
        reason: FailureCode,
        detail: impl Into<String>,
    ) -> Self {
        if failed {
            Self::fail(name, value, threshold, reason, detail)
        } else {
            Self::pass(name, value, threshold, detail)
        }
    }

    /// Attach the sensor's own anomaly estimate
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// Results of one registry pass, in registration order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorResults {
    results: Vec<SensorResult>,
}

impl SensorResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a result, replacing any earlier result with the same name
    pub fn insert(&mut self, result: SensorResult) {
        match self
            .results
            .iter_mut()
            .find(|r| r.sensor_name == result.sensor_name)
        {
            Some(existing) => *existing = result,
            None => self.results.push(result),
        }
    }

    pub fn get(&self, name: &str) -> Option<&SensorResult> {
        self.results.iter().find(|r| r.sensor_name == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SensorResult> {
        self.results.iter()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

impl FromIterator<SensorResult> for SensorResults {
    fn from_iter<I: IntoIterator<Item = SensorResult>>(iter: I) -> Self {
        let mut results = SensorResults::new();
        for r in iter {
            results.insert(r);
        }
        results
    }
}

impl<'a> IntoIterator for &'a SensorResults {
    type Item = &'a SensorResult;
    type IntoIter = std::slice::Iter<'a, SensorResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}
