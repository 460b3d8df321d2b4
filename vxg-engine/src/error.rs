//! Error types for vxg-engine
//!
//! Propagation policy:
//! - Configuration errors (bad codec profile names, bad weight sets) are
//!   fatal and stop pipeline initialization.
//! - Per-sensor failures never leave the registry; they become
//!   `PassState::Unknown` results with reason `ERROR`.
//! - Numeric invariants (score ranges, weight sums) raise instead of clamping.

use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Engine error type
#[derive(Debug, Error)]
pub enum EngineError {
    /// Unknown channel-simulation profile requested
    #[error("Invalid codec profile: '{0}' (expected landline, mobile, voip or clean)")]
    InvalidCodecProfile(String),

    /// Fusion weights do not sum to 1.0, reference unregistered sensors, or
    /// the verdict/veto boundaries are out of order
    #[error("Invalid weight configuration: {0}")]
    InvalidWeightConfiguration(String),

    /// A single sensor failed during analysis (recovered by the registry)
    #[error("Sensor '{sensor}' failed: {message}")]
    SensorEvaluation { sensor: String, message: String },

    /// Spoof classifier used before training or loading
    #[error("Spoof classifier is not trained")]
    ClassifierUntrained,

    /// Unknown feature extractor name
    #[error("Invalid feature type: '{0}' (expected lfcc, cqcc or log_spectrogram)")]
    InvalidFeatureType(String),

    /// A risk or classifier score outside [0, 1] or not finite
    #[error("Score out of range for '{factor}': {value}")]
    InvalidScore { factor: String, value: f64 },

    /// Feature dimensions do not match the trained model
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Not enough frames or samples to carry out an operation
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Invalid waveform or argument
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Model blob could not be decoded
    #[error("Model error: {0}")]
    Model(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// WAV decode/encode error
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// vxg-common error
    #[error("Common error: {0}")]
    Common(#[from] vxg_common::Error),
}
