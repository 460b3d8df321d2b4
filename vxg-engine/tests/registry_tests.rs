//! Sensor Registry Integration Tests
//!
//! **Coverage:**
//! - Fault isolation: a sensor that errors or panics becomes one ERROR result
//! - Registration order, replacement by name, subsets
//! - Verdict policies (fail-on-any, consensus, custom aggregator)

mod helpers;

use helpers::signals::{waveform, SR};
use helpers::sine;
use vxg_engine::sensors::{
    consensus, default_registry, Aggregator, RegistryVerdict, Sensor, SensorError, SensorThresholds,
};
use vxg_engine::{FailureCode, PassState, SensorRegistry, SensorResult, SensorResults, Waveform};

/// Reports the waveform's peak amplitude and fails above `limit`
struct PeakSensor {
    limit: f64,
}

impl Sensor for PeakSensor {
    fn name(&self) -> &str {
        "peak"
    }

    fn threshold(&self) -> f64 {
        self.limit
    }

    fn analyze(&self, waveform: &Waveform) -> Result<SensorResult, SensorError> {
        let peak = waveform
            .samples()
            .iter()
            .fold(0.0f32, |m, s| m.max(s.abs())) as f64;
        Ok(SensorResult::decide(
            "peak",
            peak > self.limit,
            peak,
            self.limit,
            FailureCode::CompressionArtifact,
            format!("peak {:.2}", peak),
        ))
    }
}

struct ErroringSensor;

impl Sensor for ErroringSensor {
    fn name(&self) -> &str {
        "erroring"
    }

    fn threshold(&self) -> f64 {
        0.5
    }

    fn analyze(&self, _waveform: &Waveform) -> Result<SensorResult, SensorError> {
        Err(SensorError::Analysis("model file missing".to_string()))
    }
}

struct PanickingSensor;

impl Sensor for PanickingSensor {
    fn name(&self) -> &str {
        "panicking"
    }

    fn threshold(&self) -> f64 {
        0.25
    }

    fn analyze(&self, _waveform: &Waveform) -> Result<SensorResult, SensorError> {
        panic!("frame index out of range");
    }
}

fn tone() -> Waveform {
    waveform(sine(200.0, 0.5, SR, 0.5), SR)
}

#[test]
fn test_panicking_sensor_isolated() {
    let mut registry = SensorRegistry::new();
    registry
        .register(Box::new(PeakSensor { limit: 0.9 }), None)
        .register(Box::new(PanickingSensor), None)
        .register(Box::new(PeakSensor { limit: 0.1 }), Some("peak_strict"));

    let results = registry.analyze_all(&tone(), None);
    assert_eq!(results.len(), 3);

    let broken = results.get("panicking").unwrap();
    assert_eq!(broken.passed, PassState::Unknown);
    assert_eq!(broken.reason, Some(FailureCode::Error));
    assert_eq!(broken.value, 0.0);
    assert_eq!(broken.threshold, 0.25);

    assert_eq!(results.get("peak").unwrap().passed, PassState::Pass);
    assert_eq!(results.get("peak_strict").unwrap().passed, PassState::Fail);
}

#[test]
fn test_erroring_sensor_isolated() {
    let mut registry = SensorRegistry::new();
    registry
        .register(Box::new(ErroringSensor), None)
        .register(Box::new(PeakSensor { limit: 0.9 }), None);

    let results = registry.analyze_all(&tone(), None);
    assert_eq!(results.len(), 2);
    let broken = results.get("erroring").unwrap();
    assert_eq!(broken.reason, Some(FailureCode::Error));
    assert!(broken.detail.contains("model file missing"));
}

#[test]
fn test_results_follow_registration_order() {
    let registry = default_registry(&SensorThresholds::default());
    let results = registry.analyze_all(&tone(), None);
    let names: Vec<&str> = results.iter().map(|r| r.sensor_name.as_str()).collect();
    assert_eq!(names, registry.names());
}

#[test]
fn test_register_same_name_replaces() {
    let mut registry = SensorRegistry::new();
    registry
        .register(Box::new(PeakSensor { limit: 0.1 }), None)
        .register(Box::new(ErroringSensor), None)
        .register(Box::new(PeakSensor { limit: 0.9 }), None);

    assert_eq!(registry.names(), vec!["peak", "erroring"]);
    assert_eq!(registry.get("peak").unwrap().threshold(), 0.9);
}

#[test]
fn test_subset_runs_only_named() {
    let registry = default_registry(&SensorThresholds::default());
    let subset = ["breath", "formant", "no_such_sensor"];
    let results = registry.analyze_all(&tone(), Some(&subset[..]));
    assert_eq!(results.len(), 2);
    assert!(results.get("breath").is_some());
    assert!(results.get("formant").is_some());
}

#[test]
fn test_fail_on_any_first_failure_wins() {
    let results: SensorResults = [
        SensorResult::pass("a", 0.1, 1.0, "ok"),
        SensorResult::fail("b", 2.0, 1.0, FailureCode::NarrowbandArtifact, "b failed"),
        SensorResult::fail("c", 3.0, 1.0, FailureCode::FormantImplausible, "c failed"),
    ]
    .into_iter()
    .collect();

    let registry = SensorRegistry::new();
    let (verdict, detail) = registry.get_verdict(&results, true, None);
    assert_eq!(verdict, RegistryVerdict::Failed(FailureCode::NarrowbandArtifact));
    assert_eq!(detail, "b failed");

    // Default consensus of two
    let (verdict, _) = registry.get_verdict(&results, false, None);
    assert_eq!(verdict, RegistryVerdict::Synthetic);

    // Custom policy: require three failures
    let strict: Aggregator = &consensus(3);
    let (verdict, _) = registry.get_verdict(&results, false, Some(strict));
    assert_eq!(verdict, RegistryVerdict::Real);
}

#[test]
fn test_all_unknown_is_unknown_verdict() {
    let results: SensorResults = [SensorResult::unknown("a", 0.0, 1.0, "too short")]
        .into_iter()
        .collect();
    let (verdict, _) = SensorRegistry::new().get_verdict(&results, true, None);
    assert_eq!(verdict, RegistryVerdict::Unknown);
}
