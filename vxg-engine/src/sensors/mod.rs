//! Sensor framework
//!
//! A **Sensor** inspects a waveform for one physically implausible or
//! statistically anomalous signature and emits a [`SensorResult`].
//! The [`SensorRegistry`] holds named sensors in registration order, runs
//! them with per-sensor fault isolation, and reduces the results to a
//! registry-level verdict.

pub mod bandwidth;
pub mod breath;
pub mod classifier_sensor;
pub mod digital_silence;
pub mod dynamic_range;
pub mod formant;
pub mod glottal_inertia;
pub mod phase_coherence;
pub mod signal;
pub mod vad;

pub use bandwidth::BandwidthSensor;
pub use breath::BreathSensor;
pub use classifier_sensor::ClassifierSensor;
pub use digital_silence::DigitalSilenceSensor;
pub use dynamic_range::DynamicRangeSensor;
pub use formant::FormantSensor;
pub use glottal_inertia::GlottalInertiaSensor;
pub use phase_coherence::PhaseCoherenceSensor;

use crate::error::{EngineError, Result};
use crate::types::{FailureCode, SensorResult, SensorResults, Waveform};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use thiserror::Error;
use tracing::{debug, warn};

// ============================================================================
// Sensor Trait
// ============================================================================

/// Sensor-local failure, converted into an `ERROR` result by the registry
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("{0}")]
    Analysis(String),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// A pluggable detector
pub trait Sensor: Send + Sync {
    /// Default registration name
    fn name(&self) -> &str;

    /// Decision boundary, reported even when analysis fails
    fn threshold(&self) -> f64;

    /// Analyze a waveform
    ///
    /// # Returns
    /// * `Ok(SensorResult)` - Pass, fail, or unknown when the input cannot
    ///   be evaluated (too short, silent)
    /// * `Err(_)` - Analysis failed (recovered by the registry)
    fn analyze(&self, waveform: &Waveform) -> std::result::Result<SensorResult, SensorError>;
}

// ============================================================================
// Sensor Thresholds
// ============================================================================

/// Per-sensor decision thresholds (`[fusion.thresholds]`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorThresholds {
    /// Maximum continuous phonation (seconds)
    pub breath: f64,
    /// Minimum crest factor
    pub dynamic_range: f64,
    /// Minimum spectral rolloff (Hz)
    pub bandwidth: f64,
    /// Minimum phase coherence
    pub phase_coherence: f64,
    /// Violation score at which the sensor fails
    pub glottal_inertia: f64,
    /// Implausibility score at which the sensor fails
    pub formant: f64,
    /// Suspicion score above which the sensor fails
    pub digital_silence: f64,
}

impl Default for SensorThresholds {
    fn default() -> Self {
        Self {
            breath: breath::DEFAULT_MAX_PHONATION,
            dynamic_range: dynamic_range::DEFAULT_CREST_THRESHOLD,
            bandwidth: bandwidth::DEFAULT_ROLLOFF_THRESHOLD_HZ,
            phase_coherence: phase_coherence::DEFAULT_COHERENCE_THRESHOLD,
            glottal_inertia: 0.5,
            formant: 0.5,
            digital_silence: 0.5,
        }
    }
}

impl SensorThresholds {
    pub fn get(&self, sensor: &str) -> Option<f64> {
        match sensor {
            breath::NAME => Some(self.breath),
            dynamic_range::NAME => Some(self.dynamic_range),
            bandwidth::NAME => Some(self.bandwidth),
            phase_coherence::NAME => Some(self.phase_coherence),
            glottal_inertia::NAME => Some(self.glottal_inertia),
            formant::NAME => Some(self.formant),
            digital_silence::NAME => Some(self.digital_silence),
            _ => None,
        }
    }

    /// Update one threshold; unknown sensors and non-finite values are rejected
    pub fn set(&mut self, sensor: &str, value: f64) -> Result<()> {
        if !value.is_finite() {
            return Err(EngineError::InvalidInput(format!(
                "threshold for '{}' must be finite",
                sensor
            )));
        }
        let slot = match sensor {
            breath::NAME => &mut self.breath,
            dynamic_range::NAME => &mut self.dynamic_range,
            bandwidth::NAME => &mut self.bandwidth,
            phase_coherence::NAME => &mut self.phase_coherence,
            glottal_inertia::NAME => &mut self.glottal_inertia,
            formant::NAME => &mut self.formant,
            digital_silence::NAME => &mut self.digital_silence,
            other => {
                return Err(EngineError::InvalidInput(format!(
                    "no configurable threshold for sensor '{}'",
                    other
                )))
            }
        };
        *slot = value;
        Ok(())
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Registry-level verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistryVerdict {
    Real,
    Synthetic,
    /// First failing sensor's reason
    Failed(FailureCode),
    /// No sensor produced a pass/fail result
    Unknown,
}

impl fmt::Display for RegistryVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryVerdict::Real => f.write_str("REAL"),
            RegistryVerdict::Synthetic => f.write_str("SYNTHETIC"),
            RegistryVerdict::Failed(code) => write!(f, "{}", code),
            RegistryVerdict::Unknown => f.write_str("UNKNOWN"),
        }
    }
}

/// Custom verdict policy over a result set
pub type Aggregator<'a> = &'a dyn Fn(&SensorResults) -> (RegistryVerdict, String);

/// Ordered collection of named sensors
pub struct SensorRegistry {
    sensors: Vec<(String, Box<dyn Sensor>)>,
    /// Failures needed for SYNTHETIC when not failing on any
    min_fail_count: usize,
}

impl SensorRegistry {
    pub fn new() -> Self {
        Self {
            sensors: Vec::new(),
            min_fail_count: 2,
        }
    }

    pub fn with_min_fail_count(mut self, min_fail_count: usize) -> Self {
        self.min_fail_count = min_fail_count.max(1);
        self
    }

    /// Register a sensor under `name` (or its own name)
    ///
    /// Registering an existing name replaces that sensor in place, keeping
    /// its position in the evaluation order.
    pub fn register(&mut self, sensor: Box<dyn Sensor>, name: Option<&str>) -> &mut Self {
        let name = name.unwrap_or_else(|| sensor.name()).to_string();
        match self.sensors.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => {
                debug!("Replacing sensor '{}'", name);
                entry.1 = sensor;
            }
            None => {
                debug!("Registered sensor '{}'", name);
                self.sensors.push((name, sensor));
            }
        }
        self
    }

    pub fn unregister(&mut self, name: &str) -> Option<Box<dyn Sensor>> {
        let index = self.sensors.iter().position(|(n, _)| n == name)?;
        Some(self.sensors.remove(index).1)
    }

    pub fn get(&self, name: &str) -> Option<&dyn Sensor> {
        self.sensors
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, s)| s.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.sensors.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    /// Run every sensor (or the named subset) in registration order
    ///
    /// A sensor that returns an error, panics, or reports a non-finite
    /// value yields an `Unknown` result with reason `ERROR`; the remaining
    /// sensors still run.
    pub fn analyze_all(&self, waveform: &Waveform, subset: Option<&[&str]>) -> SensorResults {
        if let Some(subset) = subset {
            for name in subset {
                if !self.contains(name) {
                    warn!("Requested sensor '{}' is not registered", name);
                }
            }
        }

        let mut results = SensorResults::new();
        for (name, sensor) in &self.sensors {
            if subset.is_some_and(|s| !s.contains(&name.as_str())) {
                continue;
            }
            results.insert(run_isolated(name, sensor.as_ref(), waveform));
        }
        results
    }

    /// Reduce results to a verdict and detail text
    ///
    /// - No pass/fail result at all: `Unknown`
    /// - `fail_on_any`: the first failure in registration order decides
    /// - otherwise the aggregator decides, defaulting to a consensus of
    ///   `min_fail_count` failures
    pub fn get_verdict(
        &self,
        results: &SensorResults,
        fail_on_any: bool,
        aggregator: Option<Aggregator<'_>>,
    ) -> (RegistryVerdict, String) {
        if results.iter().all(|r| r.passed.is_unknown()) {
            return (
                RegistryVerdict::Unknown,
                "No sensor produced a conclusive result".to_string(),
            );
        }

        if fail_on_any {
            if let Some(first) = results.iter().find(|r| r.passed.is_fail()) {
                let code = first.reason.unwrap_or(FailureCode::Error);
                return (RegistryVerdict::Failed(code), first.detail.clone());
            }
            return (RegistryVerdict::Real, "All physics checks passed.".to_string());
        }

        match aggregator {
            Some(aggregate) => aggregate(results),
            None => consensus(self.min_fail_count)(results),
        }
    }
}

impl Default for SensorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SensorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SensorRegistry")
            .field("sensors", &self.names())
            .field("min_fail_count", &self.min_fail_count)
            .finish()
    }
}

fn run_isolated(name: &str, sensor: &dyn Sensor, waveform: &Waveform) -> SensorResult {
    let threshold = sensor.threshold();
    match catch_unwind(AssertUnwindSafe(|| sensor.analyze(waveform))) {
        Ok(Ok(mut result)) => {
            result.sensor_name = name.to_string();
            if !result.value.is_finite() || !result.threshold.is_finite() {
                return recovered(name, threshold, "non-finite measurement".to_string());
            }
            result
        }
        Ok(Err(e)) => recovered(name, threshold, e.to_string()),
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panic".to_string());
            recovered(name, threshold, format!("panicked: {}", message))
        }
    }
}

/// Log a sensor failure and turn it into an `ERROR` result
fn recovered(name: &str, threshold: f64, message: String) -> SensorResult {
    warn!(
        "{}",
        EngineError::SensorEvaluation {
            sensor: name.to_string(),
            message: message.clone(),
        }
    );
    SensorResult::error(name, threshold, message)
}

/// Consensus-of-N aggregator: SYNTHETIC when at least `min_failures` fail
pub fn consensus(min_failures: usize) -> impl Fn(&SensorResults) -> (RegistryVerdict, String) {
    move |results: &SensorResults| {
        let failures: Vec<&SensorResult> = results.iter().filter(|r| r.passed.is_fail()).collect();
        if failures.is_empty() {
            return (RegistryVerdict::Real, "All physics checks passed.".to_string());
        }
        let detail = failures
            .iter()
            .map(|r| format!("{}: {}", r.sensor_name, r.detail))
            .collect::<Vec<_>>()
            .join("; ");
        if failures.len() >= min_failures {
            (RegistryVerdict::Synthetic, detail)
        } else {
            (
                RegistryVerdict::Real,
                format!(
                    "{} failure(s) below consensus of {}: {}",
                    failures.len(),
                    min_failures,
                    detail
                ),
            )
        }
    }
}

/// The physics sensors in evaluation order, using configured thresholds
pub fn default_registry(thresholds: &SensorThresholds) -> SensorRegistry {
    let mut registry = SensorRegistry::new();
    registry
        .register(Box::new(BreathSensor::new(thresholds.breath)), None)
        .register(
            Box::new(GlottalInertiaSensor::default().with_threshold(thresholds.glottal_inertia)),
            None,
        )
        .register(Box::new(DynamicRangeSensor::new(thresholds.dynamic_range)), None)
        .register(Box::new(BandwidthSensor::new(thresholds.bandwidth)), None)
        .register(
            Box::new(PhaseCoherenceSensor::new(thresholds.phase_coherence)),
            None,
        )
        .register(Box::new(FormantSensor::new(thresholds.formant)), None)
        .register(Box::new(DigitalSilenceSensor::new(thresholds.digital_silence)), None);
    registry
}
