// Two-tier adaptive veto
//
// A single confident factor must not be diluted by several weakly passing
// ones. The high tier fires on its own; the corroborated tier needs the
// weighted score to already sit outside the REAL band.

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Veto thresholds (`[fusion.veto]`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VetoConfig {
    /// Factor risk above which SYNTHETIC is forced unconditionally
    pub high_confidence: f64,
    /// Factor risk above which SYNTHETIC is forced when the weighted
    /// score is at least SUSPICIOUS
    pub corroborated: f64,
}

impl Default for VetoConfig {
    fn default() -> Self {
        Self {
            high_confidence: 0.85,
            corroborated: 0.75,
        }
    }
}

impl VetoConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("high_confidence", self.high_confidence),
            ("corroborated", self.corroborated),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(EngineError::InvalidWeightConfiguration(format!(
                    "veto threshold {} must lie in [0, 1], got {}",
                    name, value
                )));
            }
        }
        if self.corroborated > self.high_confidence {
            return Err(EngineError::InvalidWeightConfiguration(format!(
                "corroborated veto threshold {} exceeds high-confidence threshold {}",
                self.corroborated, self.high_confidence
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VetoTier {
    HighConfidence,
    Corroborated,
}

impl fmt::Display for VetoTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VetoTier::HighConfidence => f.write_str("high-confidence"),
            VetoTier::Corroborated => f.write_str("corroborated"),
        }
    }
}

/// A fired veto
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Veto {
    pub tier: VetoTier,
    /// Factor that triggered the veto
    pub factor: String,
    pub risk_score: f64,
    /// Threshold the factor exceeded
    pub threshold: f64,
}

impl VetoConfig {
    /// Evaluate the veto over `(factor, risk)` pairs of weighted factors
    ///
    /// The riskiest factor decides; `suspicious_floor` is the lower
    /// SUSPICIOUS boundary the weighted score must reach for the
    /// corroborated tier.
    pub fn evaluate<'a, I>(
        &self,
        factors: I,
        global_risk: f64,
        suspicious_floor: f64,
    ) -> Option<Veto>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let (factor, risk) = factors
            .into_iter()
            .fold(None::<(&str, f64)>, |best, (name, risk)| match best {
                Some((_, r)) if r >= risk => best,
                _ => Some((name, risk)),
            })?;

        if risk > self.high_confidence {
            Some(Veto {
                tier: VetoTier::HighConfidence,
                factor: factor.to_string(),
                risk_score: risk,
                threshold: self.high_confidence,
            })
        } else if risk > self.corroborated && global_risk >= suspicious_floor {
            Some(Veto {
                tier: VetoTier::Corroborated,
                factor: factor.to_string(),
                risk_score: risk,
                threshold: self.corroborated,
            })
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_high_confidence_fires_alone() {
        let veto = VetoConfig::default()
            .evaluate([("a", 0.05), ("b", 0.90), ("c", 0.05)], 0.1, 0.3)
            .unwrap();
        assert_eq!(veto.tier, VetoTier::HighConfidence);
        assert_eq!(veto.factor, "b");
    }

    #[test]
    fn test_corroborated_needs_suspicious_score() {
        let config = VetoConfig::default();
        assert!(config.evaluate([("a", 0.80)], 0.2, 0.3).is_none());
        let veto = config.evaluate([("a", 0.80)], 0.4, 0.3).unwrap();
        assert_eq!(veto.tier, VetoTier::Corroborated);
    }

    #[test]
    fn test_threshold_is_strict() {
        assert!(VetoConfig::default()
            .evaluate([("a", 0.85)], 0.1, 0.3)
            .is_none());
    }

    #[test]
    fn test_no_factors() {
        assert!(VetoConfig::default()
            .evaluate(std::iter::empty(), 0.5, 0.3)
            .is_none());
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let config = VetoConfig {
            high_confidence: 0.7,
            corroborated: 0.8,
        };
        assert!(config.validate().is_err());
    }
}
