//! Engine configuration (`vxg-engine.toml`)
//!
//! Every section and field has a built-in default, so an absent file
//! yields a working engine. The fusion section is validated when the
//! pipeline is built, not here.

use crate::error::Result;
use crate::features::{FeatureConfig, FeatureType};
use crate::fusion::FusionConfig;
use crate::telephony::ChannelConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use vxg_common::config::{load_toml, resolve_config_path, LoggingConfig, ResolvedConfigPath};

/// Config file name under `<config_dir>/vxg/`
pub const CONFIG_FILE_NAME: &str = "vxg-engine.toml";

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "VXG_CONFIG";

/// `[classifier]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Trained model blob (JSON); no model when absent
    pub model_path: Option<PathBuf>,
    /// Feature set the model was trained on
    pub feature_type: FeatureType,
    /// Score with the demonstration heuristic when no model is loaded
    pub heuristic_fallback: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            feature_type: FeatureType::Lfcc,
            heuristic_fallback: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub logging: LoggingConfig,
    pub fusion: FusionConfig,
    pub channel: ChannelConfig,
    pub features: FeatureConfig,
    pub classifier: ClassifierConfig,
}

impl EngineConfig {
    /// Resolve and load: `--config` → `VXG_CONFIG` → per-user file → defaults
    pub fn load(cli_path: Option<&Path>) -> Result<(Self, Option<ResolvedConfigPath>)> {
        let resolved = resolve_config_path(cli_path, CONFIG_ENV_VAR, CONFIG_FILE_NAME);
        let config = load_toml(resolved.as_ref())?;
        Ok((config, resolved))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content).map_err(vxg_common::Error::from)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telephony::Concealment;

    #[test]
    fn test_empty_document_gives_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config.fusion, FusionConfig::default());
        assert_eq!(config.classifier, ClassifierConfig::default());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_sections() {
        let config = EngineConfig::from_toml_str(
            r#"
            [fusion.veto]
            high_confidence = 0.9

            [fusion.thresholds]
            breath = 12.0

            [channel]
            concealment = "zero"
            seed = 7

            [classifier]
            feature_type = "cqcc"
            heuristic_fallback = true
            "#,
        )
        .unwrap();
        assert_eq!(config.fusion.veto.high_confidence, 0.9);
        assert_eq!(config.fusion.veto.corroborated, 0.75);
        assert_eq!(config.fusion.thresholds.breath, 12.0);
        assert_eq!(config.channel.concealment, Concealment::Zero);
        assert_eq!(config.channel.seed, 7);
        assert_eq!(config.classifier.feature_type, FeatureType::Cqcc);
        assert!(config.classifier.heuristic_fallback);
    }

    #[test]
    fn test_malformed_toml_is_error() {
        assert!(EngineConfig::from_toml_str("[fusion\nbroken").is_err());
    }
}
