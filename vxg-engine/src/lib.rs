//! vxg-engine library interface
//!
//! Audio authenticity detection: telephony channel simulation, feature
//! extraction, physics sensors, the GMM spoof classifier, evidence fusion
//! and the offline calibration harness.

pub mod calibration;
pub mod classifier;
pub mod config;
pub mod error;
pub mod features;
pub mod fusion;
pub mod pipeline;
pub mod sensors;
pub mod telephony;
pub mod types;
pub mod wav;

pub use crate::classifier::{ClassifierScore, GmmSpoofClassifier};
pub use crate::config::EngineConfig;
pub use crate::error::{EngineError, Result};
pub use crate::features::{FeatureExtractor, FeatureSet, FeatureType};
pub use crate::fusion::{FusionConfig, FusionEngine, FusionVerdict, Verdict};
pub use crate::pipeline::DetectionPipeline;
pub use crate::sensors::{Sensor, SensorRegistry};
pub use crate::telephony::{ChannelSimulator, CodecProfile};
pub use crate::types::{FailureCode, PassState, SensorResult, SensorResults, Waveform};
