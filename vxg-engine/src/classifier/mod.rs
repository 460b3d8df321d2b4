//! Statistical spoof classifier
//!
//! One diagonal GMM per class (genuine, spoof) over standardized feature
//! frames. The spoof score is the logistic of the average log-likelihood
//! ratio: `1 / (1 + exp(ll_genuine - ll_spoof))`, so higher means more
//! spoof-like.
//!
//! An untrained classifier refuses to score (`ClassifierUntrained`) unless
//! heuristic fallback was requested explicitly. Heuristic scores are tagged
//! [`ClassifierScore::Heuristic`] so they can never pass for trained output.
//!
//! Training is offline and produces a new classifier value; a loaded model
//! is never mutated.

pub mod gmm;
pub mod scaler;

pub use gmm::{DiagGmm, GmmConfig};
pub use scaler::StandardScaler;

use crate::error::{EngineError, Result};
use crate::features::FeatureSet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// A spoof-likelihood score in [0, 1], tagged with how it was produced
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "score", rename_all = "snake_case")]
pub enum ClassifierScore {
    /// From trained class models
    Trained(f64),
    /// Demonstration heuristic, no trained model behind it
    Heuristic(f64),
}

impl ClassifierScore {
    pub fn value(&self) -> f64 {
        match self {
            ClassifierScore::Trained(v) | ClassifierScore::Heuristic(v) => *v,
        }
    }

    pub fn is_heuristic(&self) -> bool {
        matches!(self, ClassifierScore::Heuristic(_))
    }
}

/// Trained parameters, the persisted model blob
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    /// Feature set name the model was trained on (e.g. "lfcc")
    pub feature_name: String,
    pub dim: usize,
    pub scaler: StandardScaler,
    pub genuine: DiagGmm,
    pub spoof: DiagGmm,
    pub trained_at: DateTime<Utc>,
    pub genuine_frames: usize,
    pub spoof_frames: usize,
}

#[derive(Debug, Clone, Default)]
pub struct GmmSpoofClassifier {
    model: Option<TrainedModel>,
    heuristic_fallback: bool,
}

impl GmmSpoofClassifier {
    /// An untrained classifier
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow heuristic scoring while untrained (demonstration only)
    pub fn with_heuristic_fallback(mut self) -> Self {
        self.heuristic_fallback = true;
        self
    }

    pub fn is_trained(&self) -> bool {
        self.model.is_some()
    }

    pub fn heuristic_fallback(&self) -> bool {
        self.heuristic_fallback
    }

    pub fn model(&self) -> Option<&TrainedModel> {
        self.model.as_ref()
    }

    /// Train with default EM settings and `n_components` per class
    pub fn train(genuine: &FeatureSet, spoof: &FeatureSet, n_components: usize) -> Result<Self> {
        let config = GmmConfig {
            n_components,
            ..Default::default()
        };
        Self::train_with(genuine, spoof, &config)
    }

    /// Train both class models; the scaler is fit on all frames
    pub fn train_with(
        genuine: &FeatureSet,
        spoof: &FeatureSet,
        config: &GmmConfig,
    ) -> Result<Self> {
        if genuine.n_coeffs() != spoof.n_coeffs() {
            return Err(EngineError::DimensionMismatch {
                expected: genuine.n_coeffs(),
                actual: spoof.n_coeffs(),
            });
        }
        if genuine.is_empty() || spoof.is_empty() {
            return Err(EngineError::InsufficientData(
                "both classes need at least one frame".to_string(),
            ));
        }
        let dim = genuine.n_coeffs();
        info!(
            "Training spoof classifier: {} genuine / {} spoof frames, dim {}, {} components",
            genuine.n_frames(),
            spoof.n_frames(),
            dim,
            config.n_components
        );

        let all = FeatureSet::concat(&[genuine.clone(), spoof.clone()])?;
        let scaler = StandardScaler::fit(all.data(), dim)?;
        let (genuine_gmm, g_report) =
            DiagGmm::fit(&scaler.transform(genuine.data())?, dim, config)?;
        let (spoof_gmm, s_report) = DiagGmm::fit(&scaler.transform(spoof.data())?, dim, config)?;
        if !g_report.converged || !s_report.converged {
            warn!(
                "EM did not converge within {} iterations (genuine: {}, spoof: {})",
                config.max_iter, g_report.converged, s_report.converged
            );
        }

        Ok(Self {
            model: Some(TrainedModel {
                feature_name: genuine.name.clone(),
                dim,
                scaler,
                genuine: genuine_gmm,
                spoof: spoof_gmm,
                trained_at: Utc::now(),
                genuine_frames: genuine.n_frames(),
                spoof_frames: spoof.n_frames(),
            }),
            heuristic_fallback: false,
        })
    }

    /// Spoof likelihood for one utterance's frames
    ///
    /// # Errors
    /// * `ClassifierUntrained` - no model and no heuristic fallback
    /// * `InsufficientData` - no frames, or a single frame in heuristic mode
    /// * `DimensionMismatch` - features differ from the trained dimension
    /// * `InvalidScore` - the score is not a finite value in [0, 1]
    pub fn predict_score(&self, features: &FeatureSet) -> Result<ClassifierScore> {
        if features.is_empty() {
            return Err(EngineError::InsufficientData(
                "no feature frames to score".to_string(),
            ));
        }

        let score = match &self.model {
            Some(model) => {
                if features.n_coeffs() != model.dim {
                    return Err(EngineError::DimensionMismatch {
                        expected: model.dim,
                        actual: features.n_coeffs(),
                    });
                }
                let scaled = model.scaler.transform(features.data())?;
                let ll_genuine = model.genuine.mean_log_likelihood(&scaled)?;
                let ll_spoof = model.spoof.mean_log_likelihood(&scaled)?;
                ClassifierScore::Trained(1.0 / (1.0 + (ll_genuine - ll_spoof).exp()))
            }
            None if self.heuristic_fallback => {
                if features.n_frames() < 2 {
                    return Err(EngineError::InsufficientData(
                        "heuristic scoring needs at least two frames".to_string(),
                    ));
                }
                ClassifierScore::Heuristic(heuristic_score(features))
            }
            None => return Err(EngineError::ClassifierUntrained),
        };

        let value = score.value();
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(EngineError::InvalidScore {
                factor: "spoof_classifier".to_string(),
                value,
            });
        }
        Ok(score)
    }

    pub fn to_json(&self) -> Result<String> {
        let model = self.model.as_ref().ok_or(EngineError::ClassifierUntrained)?;
        Ok(serde_json::to_string_pretty(model)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let model: TrainedModel = serde_json::from_str(json)?;
        if model.scaler.dim() != model.dim
            || model.genuine.dim() != model.dim
            || model.spoof.dim() != model.dim
        {
            return Err(EngineError::Model(format!(
                "inconsistent model dimensions (declared {})",
                model.dim
            )));
        }
        Ok(Self {
            model: Some(model),
            heuristic_fallback: false,
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        info!("Saved spoof classifier to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let classifier = Self::from_json(&json)?;
        info!("Loaded spoof classifier from {}", path.display());
        Ok(classifier)
    }
}

/// Frames that barely change over time look synthetic
///
/// `1 / (1 + mean per-coefficient temporal std)`. Needs two or more frames.
fn heuristic_score(features: &FeatureSet) -> f64 {
    let n = features.n_frames() as f64;
    let dim = features.n_coeffs();
    let mut mean = vec![0.0; dim];
    for frame in features.frames() {
        for (m, x) in mean.iter_mut().zip(frame) {
            *m += x / n;
        }
    }
    let mut var = vec![0.0; dim];
    for frame in features.frames() {
        for ((v, x), m) in var.iter_mut().zip(frame).zip(&mean) {
            *v += (x - m).powi(2) / n;
        }
    }
    let mean_std = var.iter().map(|v| v.sqrt()).sum::<f64>() / dim.max(1) as f64;
    1.0 / (1.0 + mean_std)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn gaussian_frames(name: &str, center: f64, n: usize, seed: u64) -> FeatureSet {
        let mut rng = StdRng::seed_from_u64(seed);
        let data = (0..n * 3)
            .map(|_| center + rng.gen_range(-1.0..1.0) + rng.gen_range(-1.0..1.0))
            .collect();
        FeatureSet::new(name, 3, data).unwrap()
    }

    fn trained() -> GmmSpoofClassifier {
        let genuine = gaussian_frames("lfcc", -2.0, 300, 1);
        let spoof = gaussian_frames("lfcc", 2.0, 300, 2);
        GmmSpoofClassifier::train(&genuine, &spoof, 4).unwrap()
    }

    #[test]
    fn test_untrained_refuses() {
        let clf = GmmSpoofClassifier::new();
        let features = gaussian_frames("lfcc", 0.0, 10, 3);
        assert!(matches!(
            clf.predict_score(&features),
            Err(EngineError::ClassifierUntrained)
        ));
    }

    #[test]
    fn test_heuristic_is_tagged() {
        let clf = GmmSpoofClassifier::new().with_heuristic_fallback();
        let score = clf.predict_score(&gaussian_frames("lfcc", 0.0, 10, 3)).unwrap();
        assert!(score.is_heuristic());
        assert!((0.0..=1.0).contains(&score.value()));
    }

    #[test]
    fn test_trained_separates_classes() {
        let clf = trained();
        let spoofish = clf.predict_score(&gaussian_frames("lfcc", 2.0, 50, 10)).unwrap();
        let genuineish = clf.predict_score(&gaussian_frames("lfcc", -2.0, 50, 11)).unwrap();
        assert!(!spoofish.is_heuristic());
        assert!(spoofish.value() > 0.9);
        assert!(genuineish.value() < 0.1);
    }

    #[test]
    fn test_dimension_mismatch() {
        let clf = trained();
        let wrong = FeatureSet::new("lfcc", 2, vec![0.0; 20]).unwrap();
        assert!(matches!(
            clf.predict_score(&wrong),
            Err(EngineError::DimensionMismatch { expected: 3, actual: 2 })
        ));
    }

    #[test]
    fn test_json_round_trip_preserves_scores() {
        let clf = trained();
        let restored = GmmSpoofClassifier::from_json(&clf.to_json().unwrap()).unwrap();
        let probe = gaussian_frames("lfcc", 0.5, 20, 12);
        let a = clf.predict_score(&probe).unwrap().value();
        let b = restored.predict_score(&probe).unwrap().value();
        assert!((a - b).abs() < 1e-9);
    }

    #[test]
    fn test_empty_features_rejected() {
        let clf = trained();
        let empty = FeatureSet::new("lfcc", 3, Vec::new()).unwrap();
        assert!(matches!(
            clf.predict_score(&empty),
            Err(EngineError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_heuristic_needs_two_frames() {
        let clf = GmmSpoofClassifier::new().with_heuristic_fallback();
        assert!(matches!(
            clf.predict_score(&gaussian_frames("lfcc", 0.0, 1, 4)),
            Err(EngineError::InsufficientData(_))
        ));
        assert!(clf.predict_score(&gaussian_frames("lfcc", 0.0, 2, 4)).is_ok());
    }
}
