//! Detection pipeline: `analyze_call` over a shared, read-only configuration
//!
//! The registry is fixed at construction. The fusion engine and the
//! classifier each sit behind an `RwLock<Arc<_>>`: readers clone the `Arc`
//! and release the lock before analysis, and reconfiguration builds a new
//! value and swaps the pointer, so a concurrent reader sees either the old
//! or the new configuration and never a mix.

use crate::classifier::{ClassifierScore, GmmSpoofClassifier};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::features::{FeatureExtractor, FeatureType};
use crate::fusion::{FusionConfig, FusionEngine, FusionVerdict};
use crate::sensors::{default_registry, SensorRegistry};
use crate::telephony::CodecProfile;
use crate::types::{SensorResults, Waveform};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};

/// Everything produced for one call
#[derive(Debug, Clone)]
pub struct Analysis {
    pub sensor_results: SensorResults,
    pub classifier_score: Option<ClassifierScore>,
    pub verdict: FusionVerdict,
}

#[derive(Debug)]
pub struct DetectionPipeline {
    registry: Arc<SensorRegistry>,
    fusion: RwLock<Arc<FusionEngine>>,
    classifier: RwLock<Option<Arc<GmmSpoofClassifier>>>,
    extractor: FeatureExtractor,
    feature_type: FeatureType,
}

impl DetectionPipeline {
    /// Build a pipeline; the fusion configuration is validated against the
    /// registry's sensor names
    pub fn new(
        registry: SensorRegistry,
        fusion: FusionConfig,
        extractor: FeatureExtractor,
        feature_type: FeatureType,
    ) -> Result<Self> {
        let engine = FusionEngine::new(fusion, &registry.names())?;
        info!(
            "Detection pipeline ready with {} sensors: {}",
            registry.len(),
            registry.names().join(", ")
        );
        Ok(Self {
            registry: Arc::new(registry),
            fusion: RwLock::new(Arc::new(engine)),
            classifier: RwLock::new(None),
            extractor,
            feature_type,
        })
    }

    /// Default sensors, thresholds and weights from `config`, plus the
    /// classifier model if one is configured
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let registry = default_registry(&config.fusion.thresholds);
        let extractor = FeatureExtractor::new(config.features.clone())?;
        let pipeline = Self::new(
            registry,
            config.fusion.clone(),
            extractor,
            config.classifier.feature_type,
        )?;

        let classifier = match &config.classifier.model_path {
            Some(path) => Some(GmmSpoofClassifier::load(path)?),
            None if config.classifier.heuristic_fallback => Some(GmmSpoofClassifier::new()),
            None => None,
        };
        if let Some(mut classifier) = classifier {
            if config.classifier.heuristic_fallback {
                classifier = classifier.with_heuristic_fallback();
            }
            pipeline.swap_classifier(classifier)?;
        }
        Ok(pipeline)
    }

    pub fn registry(&self) -> &Arc<SensorRegistry> {
        &self.registry
    }

    /// Current fusion engine snapshot
    pub fn fusion(&self) -> Arc<FusionEngine> {
        self.fusion
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Current classifier snapshot
    pub fn classifier(&self) -> Option<Arc<GmmSpoofClassifier>> {
        self.classifier
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Analyze one call and return the fused verdict
    ///
    /// Without a codec hint the audio is treated as `clean` (wideband).
    pub fn analyze_call(
        &self,
        waveform: &Waveform,
        codec_hint: Option<CodecProfile>,
    ) -> Result<FusionVerdict> {
        Ok(self.analyze_detailed(waveform, codec_hint)?.verdict)
    }

    /// Like [`analyze_call`](Self::analyze_call), keeping the evidence
    pub fn analyze_detailed(
        &self,
        waveform: &Waveform,
        codec_hint: Option<CodecProfile>,
    ) -> Result<Analysis> {
        let codec = codec_hint.unwrap_or(CodecProfile::Clean);
        let fusion = self.fusion();
        let classifier = self.classifier();

        debug!(
            "Analyzing {:.2}s at {} Hz (codec {})",
            waveform.duration_seconds(),
            waveform.sample_rate(),
            codec
        );

        let sensor_results = self.registry.analyze_all(waveform, None);

        let classifier_score = classifier.and_then(|classifier| {
            let features = self.extractor.extract_one(waveform, self.feature_type);
            match classifier.predict_score(&features) {
                Ok(score) => Some(score),
                Err(e) => {
                    warn!("Classifier excluded from fusion: {}", e);
                    None
                }
            }
        });

        let verdict = fusion.fuse(&sensor_results, classifier_score, codec)?;
        Ok(Analysis {
            sensor_results,
            classifier_score,
            verdict,
        })
    }

    /// Replace the fusion configuration after validating it
    ///
    /// On error the current configuration stays in place.
    pub fn reload_fusion(&self, config: FusionConfig) -> Result<()> {
        let engine = Arc::new(FusionEngine::new(config, &self.registry.names())?);
        *self.fusion.write().unwrap_or_else(PoisonError::into_inner) = engine;
        info!("Fusion configuration reloaded");
        Ok(())
    }

    /// Swap in a new classifier model
    ///
    /// Untrained classifiers are rejected unless heuristic fallback is on.
    pub fn swap_classifier(&self, classifier: GmmSpoofClassifier) -> Result<()> {
        if !classifier.is_trained() && !classifier.heuristic_fallback() {
            return Err(EngineError::ClassifierUntrained);
        }
        let mode = if classifier.is_trained() {
            "trained"
        } else {
            "heuristic"
        };
        *self.classifier.write().unwrap_or_else(PoisonError::into_inner) =
            Some(Arc::new(classifier));
        info!("Spoof classifier swapped in ({} mode)", mode);
        Ok(())
    }

    /// Drop the classifier; fusion continues on sensors alone
    pub fn clear_classifier(&self) {
        *self.classifier.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fusion::Verdict;

    fn pipeline() -> DetectionPipeline {
        DetectionPipeline::from_config(&EngineConfig::default()).unwrap()
    }

    #[test]
    fn test_untrained_classifier_rejected() {
        let p = pipeline();
        assert!(matches!(
            p.swap_classifier(GmmSpoofClassifier::new()),
            Err(EngineError::ClassifierUntrained)
        ));
        p.swap_classifier(GmmSpoofClassifier::new().with_heuristic_fallback())
            .unwrap();
        assert!(p.classifier().is_some());
    }

    #[test]
    fn test_invalid_reload_keeps_previous() {
        let p = pipeline();
        let before = p.fusion();
        let mut bad = FusionConfig::default();
        bad.profiles.wideband.insert("breath".to_string(), 0.15);
        assert!(p.reload_fusion(bad).is_err());
        assert!(Arc::ptr_eq(&before, &p.fusion()));
    }

    #[test]
    fn test_reload_swaps_pointer() {
        let p = pipeline();
        let before = p.fusion();
        let mut config = FusionConfig::default();
        config.veto.high_confidence = 0.9;
        p.reload_fusion(config).unwrap();
        let after = p.fusion();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(before.config().veto.high_confidence, 0.85);
        assert_eq!(after.config().veto.high_confidence, 0.9);
    }

    #[test]
    fn test_empty_waveform_neutral() {
        let p = pipeline();
        let waveform = Waveform::new(Vec::new(), 16000).unwrap();
        let verdict = p.analyze_call(&waveform, None).unwrap();
        assert!(verdict.global_risk_score.is_finite());
        assert_eq!(verdict.verdict, Verdict::Suspicious);
        assert_eq!(verdict.codec, CodecProfile::Clean);
    }

    #[test]
    fn test_heuristic_classifier_on_empty_input_excluded() {
        let p = pipeline();
        p.swap_classifier(GmmSpoofClassifier::new().with_heuristic_fallback())
            .unwrap();
        let waveform = Waveform::new(Vec::new(), 16000).unwrap();
        let analysis = p.analyze_detailed(&waveform, None).unwrap();
        assert!(analysis.classifier_score.is_none());
    }

    #[test]
    fn test_heuristic_classifier_skips_sub_frame_call() {
        let p = pipeline();
        p.swap_classifier(GmmSpoofClassifier::new().with_heuristic_fallback())
            .unwrap();
        // 25 ms voiced burst: shorter than one analysis frame
        let samples: Vec<f32> = (0..400)
            .map(|i| {
                let t = i as f32 / 16000.0;
                (1..=5)
                    .map(|h| {
                        0.3 / h as f32 * (2.0 * std::f32::consts::PI * 120.0 * h as f32 * t).sin()
                    })
                    .sum()
            })
            .collect();
        let waveform = Waveform::new(samples, 16000).unwrap();

        let analysis = p.analyze_detailed(&waveform, None).unwrap();
        assert!(analysis.classifier_score.is_none());
        assert!(analysis
            .verdict
            .contributing_factors
            .iter()
            .all(|f| f.sensor_name != crate::fusion::CLASSIFIER_FACTOR));
        assert!(analysis
            .verdict
            .veto
            .as_ref()
            .map_or(true, |v| v.factor != crate::fusion::CLASSIFIER_FACTOR));
    }
}
