// Codec-aware weight profiles
//
// Narrowband channels (landline, mobile) make some sensors unreliable: the
// bandwidth sensor sees every call as band-limited, so its weight drops to
// zero and codec-robust sensors take up the share. Companding and packet
// loss also disturb phase, so phase coherence counts for less.

use crate::error::{EngineError, Result};
use crate::sensors::{
    bandwidth, breath, digital_silence, dynamic_range, formant, glottal_inertia, phase_coherence,
};
use crate::telephony::CodecProfile;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Factor name of the statistical classifier score in weight profiles
pub const CLASSIFIER_FACTOR: &str = "spoof_classifier";

/// Allowed deviation of a profile's weight sum from 1.0
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightProfileKind {
    Wideband,
    Narrowband,
}

impl WeightProfileKind {
    pub fn for_codec(codec: CodecProfile) -> Self {
        if codec.is_narrowband() {
            WeightProfileKind::Narrowband
        } else {
            WeightProfileKind::Wideband
        }
    }
}

impl fmt::Display for WeightProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeightProfileKind::Wideband => f.write_str("wideband"),
            WeightProfileKind::Narrowband => f.write_str("narrowband"),
        }
    }
}

/// Factor name → weight, one map per profile (`[fusion.profiles.*]`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightProfiles {
    pub wideband: BTreeMap<String, f64>,
    pub narrowband: BTreeMap<String, f64>,
}

fn profile(entries: &[(&str, f64)]) -> BTreeMap<String, f64> {
    entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

impl Default for WeightProfiles {
    fn default() -> Self {
        Self {
            wideband: profile(&[
                (breath::NAME, 0.20),
                (glottal_inertia::NAME, 0.15),
                (dynamic_range::NAME, 0.15),
                (bandwidth::NAME, 0.10),
                (phase_coherence::NAME, 0.10),
                (formant::NAME, 0.10),
                (digital_silence::NAME, 0.10),
                (CLASSIFIER_FACTOR, 0.10),
            ]),
            narrowband: profile(&[
                (breath::NAME, 0.25),
                (glottal_inertia::NAME, 0.15),
                (dynamic_range::NAME, 0.10),
                (bandwidth::NAME, 0.0),
                (phase_coherence::NAME, 0.05),
                (formant::NAME, 0.15),
                (digital_silence::NAME, 0.15),
                (CLASSIFIER_FACTOR, 0.15),
            ]),
        }
    }
}

impl WeightProfiles {
    pub fn get(&self, kind: WeightProfileKind) -> &BTreeMap<String, f64> {
        match kind {
            WeightProfileKind::Wideband => &self.wideband,
            WeightProfileKind::Narrowband => &self.narrowband,
        }
    }

    /// Check both profiles against the registered sensor names
    ///
    /// Each profile must be non-empty, hold only finite non-negative
    /// weights for registered sensors (or the classifier factor), and sum
    /// to 1.0 within [`WEIGHT_SUM_TOLERANCE`].
    pub fn validate(&self, registered: &[&str]) -> Result<()> {
        for kind in [WeightProfileKind::Wideband, WeightProfileKind::Narrowband] {
            let weights = self.get(kind);
            if weights.is_empty() {
                return Err(EngineError::InvalidWeightConfiguration(format!(
                    "{} profile is empty",
                    kind
                )));
            }
            for (name, &weight) in weights {
                if name != CLASSIFIER_FACTOR && !registered.contains(&name.as_str()) {
                    return Err(EngineError::InvalidWeightConfiguration(format!(
                        "{} profile references unregistered sensor '{}'",
                        kind, name
                    )));
                }
                if !weight.is_finite() || weight < 0.0 {
                    return Err(EngineError::InvalidWeightConfiguration(format!(
                        "{} profile weight for '{}' must be finite and non-negative, got {}",
                        kind, name, weight
                    )));
                }
            }
            let sum: f64 = weights.values().sum();
            if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
                return Err(EngineError::InvalidWeightConfiguration(format!(
                    "{} profile weights sum to {:.6}, expected 1.00",
                    kind, sum
                )));
            }
        }
        Ok(())
    }
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

    #[test]
    fn test_defaults_valid() {
        WeightProfiles::default().validate(&REGISTERED).unwrap();
    }

    #[test]
    fn test_sum_095_rejected() {
        let mut profiles = WeightProfiles::default();
        profiles.wideband.insert("breath".to_string(), 0.15);
        let err = profiles.validate(&REGISTERED).unwrap_err();
        assert!(matches!(err, EngineError::InvalidWeightConfiguration(_)));
        assert!(err.to_string().contains("0.95"));
    }

    #[test]
    fn test_unregistered_sensor_rejected() {
        let mut profiles = WeightProfiles::default();
        profiles.narrowband.insert("two_mouth".to_string(), 0.0);
        assert!(profiles.validate(&REGISTERED).is_err());
    }

    #[test]
    fn test_negative_weight_rejected() {
        let mut profiles = WeightProfiles::default();
        profiles.wideband.insert("bandwidth".to_string(), -0.10);
        profiles.wideband.insert("breath".to_string(), 0.40);
        assert!(profiles.validate(&REGISTERED).is_err());
    }

    #[test]
    fn test_codec_selects_profile() {
        assert_eq!(
            WeightProfileKind::for_codec(CodecProfile::Landline),
            WeightProfileKind::Narrowband
        );
        assert_eq!(
            WeightProfileKind::for_codec(CodecProfile::Voip),
            WeightProfileKind::Wideband
        );
    }
}
