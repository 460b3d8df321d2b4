//! Machine-learned deepfake classifier as a registry sensor
//!
//! Optional: not part of the default registry. Wraps a shared spoof
//! classifier and the feature extractor it was trained with.

use super::{Sensor, SensorError};
use crate::classifier::{ClassifierScore, GmmSpoofClassifier};
use crate::error::EngineError;
use crate::features::{FeatureExtractor, FeatureType};
use crate::types::{FailureCode, SensorResult, Waveform};
use std::sync::Arc;

pub const NAME: &str = "deepfake_classifier";

#[derive(Debug, Clone)]
pub struct ClassifierSensor {
    classifier: Arc<GmmSpoofClassifier>,
    extractor: FeatureExtractor,
    feature_type: FeatureType,
    threshold: f64,
}

impl ClassifierSensor {
    pub fn new(
        classifier: Arc<GmmSpoofClassifier>,
        extractor: FeatureExtractor,
        feature_type: FeatureType,
    ) -> Self {
        Self {
            classifier,
            extractor,
            feature_type,
            threshold: 0.5,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }
}

impl Sensor for ClassifierSensor {
    fn name(&self) -> &str {
        NAME
    }

    fn threshold(&self) -> f64 {
        self.threshold
    }

    fn analyze(&self, waveform: &Waveform) -> Result<SensorResult, SensorError> {
        let features = self.extractor.extract_one(waveform, self.feature_type);
        if features.is_empty() {
            return Ok(SensorResult::unknown(NAME, 0.0, self.threshold, "No audio to analyze"));
        }

        let score = match self.classifier.predict_score(&features) {
            Ok(score) => score,
            Err(EngineError::ClassifierUntrained) => {
                return Ok(SensorResult::unknown(
                    NAME,
                    0.0,
                    self.threshold,
                    "Spoof classifier not trained",
                ))
            }
            Err(e) => return Err(e.into()),
        };

        let mode = match score {
            ClassifierScore::Trained(_) => "trained",
            ClassifierScore::Heuristic(_) => "heuristic",
        };
        let value = score.value();
        Ok(SensorResult::decide(
            NAME,
            value > self.threshold,
            value,
            self.threshold,
            FailureCode::DeepfakeDetected,
            format!("Spoof likelihood {:.3} ({} model)", value, mode),
        )
        .with_score(value)
        .with_metadata("mode", mode)
        .with_metadata("frames", features.n_frames()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PassState;

    fn tone() -> Waveform {
        let samples = (0..8000)
            .map(|i| 0.3 * (2.0 * std::f32::consts::PI * 300.0 * i as f32 / 16000.0).sin())
            .collect();
        Waveform::new(samples, 16000).unwrap()
    }

    #[test]
    fn test_untrained_is_unknown() {
        let sensor = ClassifierSensor::new(
            Arc::new(GmmSpoofClassifier::new()),
            FeatureExtractor::default(),
            FeatureType::Lfcc,
        );
        let r = sensor.analyze(&tone()).unwrap();
        assert_eq!(r.passed, PassState::Unknown);
        assert_eq!(r.value, 0.0);
        assert_eq!(r.threshold, 0.5);
    }

    #[test]
    fn test_heuristic_mode_reported() {
        let sensor = ClassifierSensor::new(
            Arc::new(GmmSpoofClassifier::new().with_heuristic_fallback()),
            FeatureExtractor::default(),
            FeatureType::Lfcc,
        );
        let r = sensor.analyze(&tone()).unwrap();
        assert_ne!(r.passed, PassState::Unknown);
        assert_eq!(r.metadata["mode"], "heuristic");
    }
}
