// Fusion Engine - weighted evidence fusion with codec-aware profiles
//
// 1. Select the wideband or narrowband weight profile from the codec
// 2. Turn each applicable sensor result (and the classifier score) into a risk
// 3. Weighted mean over the factors actually applied
// 4. Two-tier veto
// 5. Map the score to REAL / SUSPICIOUS / SYNTHETIC

pub mod veto;
pub mod weights;

pub use veto::{Veto, VetoConfig, VetoTier};
pub use weights::{WeightProfileKind, WeightProfiles, CLASSIFIER_FACTOR};

use crate::classifier::ClassifierScore;
use crate::error::{EngineError, Result};
use crate::sensors::SensorThresholds;
use crate::telephony::CodecProfile;
use crate::types::{FailureCode, PassState, SensorResult, SensorResults};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, error, info, warn};

/// Verdict boundaries (`[fusion.verdict]`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerdictBoundaries {
    /// Scores below this are REAL
    pub real_below: f64,
    /// Scores above this are SYNTHETIC
    pub synthetic_above: f64,
}

impl Default for VerdictBoundaries {
    fn default() -> Self {
        Self {
            real_below: 0.3,
            synthetic_above: 0.7,
        }
    }
}

impl VerdictBoundaries {
    pub fn classify(&self, score: f64) -> Verdict {
        if score < self.real_below {
            Verdict::Real
        } else if score > self.synthetic_above {
            Verdict::Synthetic
        } else {
            Verdict::Suspicious
        }
    }
}

/// Complete fusion configuration (`[fusion]`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub verdict: VerdictBoundaries,
    pub veto: VetoConfig,
    pub thresholds: SensorThresholds,
    pub profiles: WeightProfiles,
}

impl FusionConfig {
    /// Check every load-time invariant against the registered sensor names
    pub fn validate(&self, registered: &[&str]) -> Result<()> {
        let VerdictBoundaries {
            real_below,
            synthetic_above,
        } = self.verdict;
        if !(0.0..=1.0).contains(&real_below)
            || !(0.0..=1.0).contains(&synthetic_above)
            || real_below > synthetic_above
        {
            return Err(EngineError::InvalidWeightConfiguration(format!(
                "verdict boundaries must satisfy 0 <= real_below ({}) <= synthetic_above ({}) <= 1",
                real_below, synthetic_above
            )));
        }
        self.veto.validate()?;
        self.profiles.validate(registered)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Real,
    Suspicious,
    Synthetic,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Real => f.write_str("REAL"),
            Verdict::Suspicious => f.write_str("SUSPICIOUS"),
            Verdict::Synthetic => f.write_str("SYNTHETIC"),
        }
    }
}

/// Origin of a contributing factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorKind {
    Sensor,
    Classifier,
    /// Classifier running in explicit heuristic mode
    HeuristicClassifier,
}

/// One applied factor; `contribution == risk_score * weight`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributingFactor {
    pub sensor_name: String,
    pub kind: FactorKind,
    pub risk_score: f64,
    pub weight: f64,
    pub contribution: f64,
    pub reason: Option<FailureCode>,
}

/// Final pipeline output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionVerdict {
    /// Σ contribution / Σ applied weight (0.5 when nothing applied)
    pub global_risk_score: f64,
    pub verdict: Verdict,
    pub confidence: f64,
    /// Applied factors, largest contribution first
    pub contributing_factors: Vec<ContributingFactor>,
    /// Veto that forced SYNTHETIC, if any
    pub veto: Option<Veto>,
    pub profile: WeightProfileKind,
    pub codec: CodecProfile,
    /// Factors skipped as unknown, unweighted, or unavailable
    pub excluded: Vec<String>,
}

impl FusionVerdict {
    /// Human-readable summary of the strongest evidence
    pub fn technical_evidence(&self) -> String {
        let mut lines = vec![format!(
            "Global risk {:.3} ({}, confidence {:.2}, {} profile)",
            self.global_risk_score, self.verdict, self.confidence, self.profile
        )];

        if let Some(veto) = &self.veto {
            lines.push(format!(
                "Veto ({}): {} risk {:.3} exceeds {:.2}",
                veto.tier, veto.factor, veto.risk_score, veto.threshold
            ));
        }

        for factor in self
            .contributing_factors
            .iter()
            .filter(|f| f.contribution > 0.0)
            .take(3)
        {
            let reason = factor
                .reason
                .map(|r| format!(" [{}]", r))
                .unwrap_or_default();
            lines.push(format!(
                "- {}: risk {:.3} x weight {:.2} = {:.3}{}",
                factor.sensor_name, factor.risk_score, factor.weight, factor.contribution, reason
            ));
        }

        if !self.excluded.is_empty() {
            lines.push(format!("Excluded: {}", self.excluded.join(", ")));
        }
        lines.join("\n")
    }
}

/// Validated fusion configuration; immutable once built
#[derive(Debug, Clone)]
pub struct FusionEngine {
    config: FusionConfig,
}

impl FusionEngine {
    /// Build an engine, failing fast on an invalid configuration
    pub fn new(config: FusionConfig, registered: &[&str]) -> Result<Self> {
        if let Err(e) = config.validate(registered) {
            error!("Rejected fusion configuration: {}", e);
            return Err(e);
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Fuse sensor results and an optional classifier score into a verdict
    ///
    /// # Errors
    /// * `InvalidScore` - a factor risk is non-finite or outside [0, 1]
    pub fn fuse(
        &self,
        results: &SensorResults,
        classifier: Option<ClassifierScore>,
        codec: CodecProfile,
    ) -> Result<FusionVerdict> {
        // 1. Weight profile
        let profile = WeightProfileKind::for_codec(codec);
        let weights = self.config.profiles.get(profile);
        debug!(
            "Fusing {} sensor results with {} profile (codec {})",
            results.len(),
            profile,
            codec
        );

        // 2. Factor risks
        let mut factors = Vec::new();
        let mut excluded = Vec::new();

        for result in results {
            let weight = weights.get(&result.sensor_name).copied().unwrap_or(0.0);
            if result.passed.is_unknown() || weight <= 0.0 {
                debug!(
                    "Excluding '{}' (state {:?}, weight {})",
                    result.sensor_name, result.passed, weight
                );
                excluded.push(result.sensor_name.clone());
                continue;
            }
            let risk = checked_risk(&result.sensor_name, sensor_risk(result))?;
            factors.push(ContributingFactor {
                sensor_name: result.sensor_name.clone(),
                kind: FactorKind::Sensor,
                risk_score: risk,
                weight,
                contribution: risk * weight,
                reason: result.reason,
            });
        }

        let classifier_weight = weights.get(CLASSIFIER_FACTOR).copied().unwrap_or(0.0);
        match classifier {
            Some(score) if classifier_weight > 0.0 => {
                let risk = checked_risk(CLASSIFIER_FACTOR, score.value())?;
                let kind = if score.is_heuristic() {
                    FactorKind::HeuristicClassifier
                } else {
                    FactorKind::Classifier
                };
                factors.push(ContributingFactor {
                    sensor_name: CLASSIFIER_FACTOR.to_string(),
                    kind,
                    risk_score: risk,
                    weight: classifier_weight,
                    contribution: risk * classifier_weight,
                    reason: None,
                });
            }
            _ => excluded.push(CLASSIFIER_FACTOR.to_string()),
        }

        // 3. Weighted mean over applied factors only
        let applied_weight: f64 = factors.iter().map(|f| f.weight).sum();
        if factors.is_empty() || applied_weight <= 0.0 {
            warn!("No applicable fusion factors; returning neutral score");
            return Ok(FusionVerdict {
                global_risk_score: 0.5,
                verdict: self.config.verdict.classify(0.5),
                confidence: 0.0,
                contributing_factors: Vec::new(),
                veto: None,
                profile,
                codec,
                excluded,
            });
        }
        let global: f64 = factors.iter().map(|f| f.contribution).sum::<f64>() / applied_weight;

        // 4. Veto
        let veto = self.config.veto.evaluate(
            factors.iter().map(|f| (f.sensor_name.as_str(), f.risk_score)),
            global,
            self.config.verdict.real_below,
        );

        // 5. Verdict and confidence
        let mut verdict = self.config.verdict.classify(global);
        let mut confidence = confidence_score(global, &factors);
        if let Some(v) = &veto {
            warn!(
                "{} veto by '{}' (risk {:.3} > {:.2}), weighted score {:.3}",
                v.tier, v.factor, v.risk_score, v.threshold, global
            );
            verdict = Verdict::Synthetic;
            confidence = confidence.max(v.risk_score);
        }

        factors.sort_by(|a, b| b.contribution.total_cmp(&a.contribution));

        info!(
            "Fusion verdict {} (score {:.3}, confidence {:.2}, {} factors, {} excluded)",
            verdict,
            global,
            confidence,
            factors.len(),
            excluded.len()
        );

        Ok(FusionVerdict {
            global_risk_score: global,
            verdict,
            confidence,
            contributing_factors: factors,
            veto,
            profile,
            codec,
            excluded,
        })
    }
}

/// The sensor's own score, or 1/0 for fail/pass when it has none
fn sensor_risk(result: &SensorResult) -> f64 {
    result.score.unwrap_or(match result.passed {
        PassState::Fail => 1.0,
        _ => 0.0,
    })
}

fn checked_risk(factor: &str, value: f64) -> Result<f64> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(EngineError::InvalidScore {
            factor: factor.to_string(),
            value,
        })
    }
}

/// 60% distance from the undecided midpoint, 40% agreement between factors
fn confidence_score(global: f64, factors: &[ContributingFactor]) -> f64 {
    let n = factors.len() as f64;
    let mean = factors.iter().map(|f| f.risk_score).sum::<f64>() / n;
    let variance = factors
        .iter()
        .map(|f| (f.risk_score - mean).powi(2))
        .sum::<f64>()
        / n;
    let distance = (global - 0.5).abs() * 2.0;
    (0.6 * distance + 0.4 * (1.0 - variance.min(1.0))).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REGISTERED: [&str; 7] = [
        "breath",
        "glottal_inertia",
        "dynamic_range",
        "bandwidth",
        "phase_coherence",
        "formant",
        "digital_silence",
    ];

    fn engine() -> FusionEngine {
        FusionEngine::new(FusionConfig::default(), &REGISTERED).unwrap()
    }

    fn scored(name: &str, risk: f64) -> SensorResult {
        let result = if risk >= 0.5 {
            SensorResult::fail(name, risk, 0.5, FailureCode::FormantImplausible, "fail")
        } else {
            SensorResult::pass(name, risk, 0.5, "pass")
        };
        result.with_score(risk)
    }

    #[test]
    fn test_empty_results_neutral() {
        let verdict = engine()
            .fuse(&SensorResults::new(), None, CodecProfile::Clean)
            .unwrap();
        assert_eq!(verdict.global_risk_score, 0.5);
        assert_eq!(verdict.verdict, Verdict::Suspicious);
        assert_eq!(verdict.confidence, 0.0);
    }

    #[test]
    fn test_contribution_invariant() {
        let results: SensorResults = [
            scored("breath", 0.2),
            scored("formant", 0.6),
            scored("bandwidth", 0.1),
        ]
        .into_iter()
        .collect();
        let verdict = engine().fuse(&results, None, CodecProfile::Clean).unwrap();

        let mut sum_c = 0.0;
        let mut sum_w = 0.0;
        for f in &verdict.contributing_factors {
            assert!((f.contribution - f.risk_score * f.weight).abs() < 1e-12);
            sum_c += f.contribution;
            sum_w += f.weight;
        }
        assert!((verdict.global_risk_score - sum_c / sum_w).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_excluded_not_zeroed() {
        let base: SensorResults = [scored("breath", 0.6), scored("formant", 0.6)]
            .into_iter()
            .collect();
        let mut with_unknown = base.clone();
        with_unknown.insert(SensorResult::unknown("digital_silence", 0.0, 0.5, "too short"));

        let a = engine().fuse(&base, None, CodecProfile::Clean).unwrap();
        let b = engine().fuse(&with_unknown, None, CodecProfile::Clean).unwrap();
        assert!((a.global_risk_score - b.global_risk_score).abs() < 1e-12);
        assert!(b.excluded.contains(&"digital_silence".to_string()));
    }

    #[test]
    fn test_high_confidence_veto_overrides_weighted_sum() {
        let results: SensorResults = REGISTERED
            .iter()
            .map(|name| scored(name, if *name == "digital_silence" { 0.90 } else { 0.05 }))
            .collect();
        let verdict = engine().fuse(&results, None, CodecProfile::Clean).unwrap();
        assert!(verdict.global_risk_score < 0.3);
        assert_eq!(verdict.verdict, Verdict::Synthetic);
        let veto = verdict.veto.unwrap();
        assert_eq!(veto.tier, VetoTier::HighConfidence);
        assert_eq!(veto.factor, "digital_silence");
    }

    #[test]
    fn test_narrowband_ignores_bandwidth() {
        let results: SensorResults = [scored("bandwidth", 0.95), scored("breath", 0.1)]
            .into_iter()
            .collect();
        let verdict = engine()
            .fuse(&results, None, CodecProfile::Landline)
            .unwrap();
        assert_eq!(verdict.profile, WeightProfileKind::Narrowband);
        assert!(verdict.veto.is_none());
        assert!((verdict.global_risk_score - 0.1).abs() < 1e-12);
        assert!(verdict.excluded.contains(&"bandwidth".to_string()));
    }

    #[test]
    fn test_classifier_factor_tagged() {
        let results: SensorResults = [scored("breath", 0.1)].into_iter().collect();
        let verdict = engine()
            .fuse(&results, Some(ClassifierScore::Heuristic(0.4)), CodecProfile::Voip)
            .unwrap();
        let factor = verdict
            .contributing_factors
            .iter()
            .find(|f| f.sensor_name == CLASSIFIER_FACTOR)
            .unwrap();
        assert_eq!(factor.kind, FactorKind::HeuristicClassifier);
    }

    #[test]
    fn test_out_of_range_score_raises() {
        let results: SensorResults =
            [SensorResult::pass("breath", 1.0, 14.0, "ok").with_score(1.4)]
                .into_iter()
                .collect();
        let err = engine()
            .fuse(&results, None, CodecProfile::Clean)
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidScore { .. }));
    }

    #[test]
    fn test_rejects_bad_boundaries() {
        let mut config = FusionConfig::default();
        config.verdict.real_below = 0.8;
        assert!(FusionEngine::new(config, &REGISTERED).is_err());
    }

    #[test]
    fn test_technical_evidence_mentions_veto() {
        let results: SensorResults = [scored("formant", 1.0), scored("breath", 0.0)]
            .into_iter()
            .collect();
        let verdict = engine().fuse(&results, None, CodecProfile::Clean).unwrap();
        let text = verdict.technical_evidence();
        assert!(text.contains("Veto (high-confidence): formant"));
        assert!(text.contains("[FORMANT_IMPLAUSIBLE]"));
    }
}
