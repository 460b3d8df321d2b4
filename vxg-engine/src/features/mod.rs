//! Feature extraction
//!
//! Converts a waveform into frame × coefficient matrices:
//! - **LFCC:** DCT of the log linear-frequency magnitude spectrum
//! - **CQCC:** DCT of the log constant-Q spectrum
//! - **Log-spectrogram:** log magnitude spectrum, floored at epsilon
//!
//! Every extractor tolerates short input: an empty waveform yields zero
//! frames and anything shorter than one analysis frame yields one
//! zero-padded frame.

pub mod cepstral;
pub mod constant_q;
pub mod stft;

use crate::error::{EngineError, Result};
use crate::types::Waveform;
use cepstral::{deltas, Dct};
use constant_q::ConstantQBank;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use stft::Stft;
use tracing::debug;

/// Extraction method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureType {
    Lfcc,
    Cqcc,
    LogSpectrogram,
}

impl FeatureType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureType::Lfcc => "lfcc",
            FeatureType::Cqcc => "cqcc",
            FeatureType::LogSpectrogram => "log_spectrogram",
        }
    }
}

impl fmt::Display for FeatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeatureType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lfcc" => Ok(FeatureType::Lfcc),
            "cqcc" => Ok(FeatureType::Cqcc),
            "log_spectrogram" | "logspec" | "spectrogram" => Ok(FeatureType::LogSpectrogram),
            _ => Err(EngineError::InvalidFeatureType(s.to_string())),
        }
    }
}

/// Named frames × coefficients matrix (row-major)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    pub name: String,
    n_coeffs: usize,
    data: Vec<f64>,
}

impl FeatureSet {
    /// Build from row-major data; `data.len()` must be a multiple of `n_coeffs`
    pub fn new(name: impl Into<String>, n_coeffs: usize, data: Vec<f64>) -> Result<Self> {
        if n_coeffs == 0 || data.len() % n_coeffs != 0 {
            return Err(EngineError::DimensionMismatch {
                expected: n_coeffs,
                actual: data.len(),
            });
        }
        Ok(Self {
            name: name.into(),
            n_coeffs,
            data,
        })
    }

    fn from_frames(name: &str, n_coeffs: usize, frames: Vec<Vec<f64>>) -> Self {
        let data = frames.into_iter().flatten().collect();
        Self {
            name: name.to_string(),
            n_coeffs,
            data,
        }
    }

    pub fn n_frames(&self) -> usize {
        self.data.len().checked_div(self.n_coeffs).unwrap_or(0)
    }

    pub fn n_coeffs(&self) -> usize {
        self.n_coeffs
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn frame(&self, index: usize) -> &[f64] {
        &self.data[index * self.n_coeffs..(index + 1) * self.n_coeffs]
    }

    pub fn frames(&self) -> std::slice::ChunksExact<'_, f64> {
        self.data.chunks_exact(self.n_coeffs.max(1))
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Append delta and delta-delta coefficients (3× the columns)
    pub fn with_deltas(&self) -> FeatureSet {
        let d1 = deltas(&self.data, self.n_coeffs, 2);
        let d2 = deltas(&d1, self.n_coeffs, 2);
        let width = self.n_coeffs * 3;
        let mut data = Vec::with_capacity(self.n_frames() * width);
        for t in 0..self.n_frames() {
            let range = t * self.n_coeffs..(t + 1) * self.n_coeffs;
            data.extend_from_slice(&self.data[range.clone()]);
            data.extend_from_slice(&d1[range.clone()]);
            data.extend_from_slice(&d2[range]);
        }
        FeatureSet {
            name: format!("{}+delta", self.name),
            n_coeffs: width,
            data,
        }
    }

    /// Column-wise stack, trimming every set to the shortest frame count
    pub fn stack(sets: &[&FeatureSet]) -> Result<FeatureSet> {
        let Some(min_frames) = sets.iter().map(|s| s.n_frames()).min() else {
            return Err(EngineError::InsufficientData(
                "no feature sets to stack".to_string(),
            ));
        };
        let n_coeffs: usize = sets.iter().map(|s| s.n_coeffs).sum();
        let mut data = Vec::with_capacity(min_frames * n_coeffs);
        for t in 0..min_frames {
            for set in sets {
                data.extend_from_slice(set.frame(t));
            }
        }
        let name = sets.iter().map(|s| s.name.as_str()).collect::<Vec<_>>().join("+");
        Ok(FeatureSet {
            name,
            n_coeffs,
            data,
        })
    }

    /// Row-wise concatenation (pooling frames of many utterances)
    pub fn concat(sets: &[FeatureSet]) -> Result<FeatureSet> {
        let Some(first) = sets.first() else {
            return Err(EngineError::InsufficientData(
                "no feature sets to concatenate".to_string(),
            ));
        };
        let mut data = Vec::with_capacity(sets.iter().map(|s| s.data.len()).sum());
        for set in sets {
            if set.n_coeffs != first.n_coeffs {
                return Err(EngineError::DimensionMismatch {
                    expected: first.n_coeffs,
                    actual: set.n_coeffs,
                });
            }
            data.extend_from_slice(&set.data);
        }
        Ok(FeatureSet {
            name: first.name.clone(),
            n_coeffs: first.n_coeffs,
            data,
        })
    }
}

/// Extractor parameters (`[features]` in the engine TOML)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub n_fft: usize,
    pub hop_length: usize,
    pub win_length: usize,
    /// Cepstral coefficients kept (LFCC and CQCC)
    pub n_ceps: usize,
    /// FFT size of the spectrum underlying the constant-Q bank
    pub cq_n_fft: usize,
    pub cq_bins: usize,
    pub bins_per_octave: usize,
    /// Lowest constant-Q center frequency (C1)
    pub cq_fmin: f64,
    /// Magnitude floor before taking logarithms
    pub epsilon: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            n_fft: 512,
            hop_length: 160,
            win_length: 400,
            n_ceps: 20,
            cq_n_fft: 2048,
            cq_bins: 84,
            bins_per_octave: 12,
            cq_fmin: 32.703,
            epsilon: 1e-10,
        }
    }
}

/// Waveform → feature matrices
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    config: FeatureConfig,
    stft: Stft,
    cq_stft: Stft,
}

impl FeatureExtractor {
    pub fn new(config: FeatureConfig) -> Result<Self> {
        if config.hop_length == 0 || config.n_ceps == 0 || config.n_fft < 2 {
            return Err(EngineError::InvalidInput(
                "n_fft, hop_length and n_ceps must be positive".to_string(),
            ));
        }
        if config.win_length > config.n_fft {
            return Err(EngineError::InvalidInput(format!(
                "win_length {} exceeds n_fft {}",
                config.win_length, config.n_fft
            )));
        }
        if config.epsilon.is_nan() || config.epsilon <= 0.0 {
            return Err(EngineError::InvalidInput(
                "epsilon must be positive".to_string(),
            ));
        }
        Ok(Self::build(config))
    }

    fn build(config: FeatureConfig) -> Self {
        let stft = Stft::new(config.n_fft, config.hop_length, config.win_length);
        let cq_stft = Stft::new(config.cq_n_fft, config.hop_length, config.cq_n_fft);
        Self {
            config,
            stft,
            cq_stft,
        }
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Extract each requested feature type
    pub fn extract(
        &self,
        waveform: &Waveform,
        feature_types: &[FeatureType],
    ) -> BTreeMap<FeatureType, FeatureSet> {
        feature_types
            .iter()
            .map(|&t| (t, self.extract_one(waveform, t)))
            .collect()
    }

    pub fn extract_one(&self, waveform: &Waveform, feature_type: FeatureType) -> FeatureSet {
        let set = match feature_type {
            FeatureType::Lfcc => self.lfcc(waveform),
            FeatureType::Cqcc => self.cqcc(waveform),
            FeatureType::LogSpectrogram => self.log_spectrogram(waveform),
        };
        debug!(
            "Extracted {}: {} frames x {} coeffs",
            feature_type,
            set.n_frames(),
            set.n_coeffs()
        );
        set
    }

    /// Extract several types and stack them column-wise
    pub fn extract_stacked(
        &self,
        waveform: &Waveform,
        feature_types: &[FeatureType],
    ) -> Result<FeatureSet> {
        let sets = self.extract(waveform, feature_types);
        let refs: Vec<&FeatureSet> = feature_types.iter().filter_map(|t| sets.get(t)).collect();
        FeatureSet::stack(&refs)
    }

    pub fn lfcc(&self, waveform: &Waveform) -> FeatureSet {
        let dct = Dct::new(self.stft.n_bins(), self.config.n_ceps);
        let eps = self.config.epsilon;
        let frames = self
            .stft
            .magnitudes(waveform.samples())
            .into_iter()
            .map(|mag| {
                let log_mag: Vec<f64> = mag.iter().map(|m| (m + eps).ln()).collect();
                dct.apply(&log_mag)
            })
            .collect();
        FeatureSet::from_frames(FeatureType::Lfcc.as_str(), self.config.n_ceps, frames)
    }

    pub fn cqcc(&self, waveform: &Waveform) -> FeatureSet {
        let bank = ConstantQBank::new(
            self.cq_stft.n_fft(),
            waveform.sample_rate(),
            self.config.cq_fmin,
            self.config.cq_bins,
            self.config.bins_per_octave,
        );
        let dct = Dct::new(bank.len(), self.config.n_ceps);
        let eps = self.config.epsilon;
        let frames = self
            .cq_stft
            .power(waveform.samples())
            .into_iter()
            .map(|power| {
                let log_cq: Vec<f64> = bank.apply(&power).iter().map(|m| (m + eps).ln()).collect();
                dct.apply(&log_cq)
            })
            .collect();
        FeatureSet::from_frames(FeatureType::Cqcc.as_str(), self.config.n_ceps, frames)
    }

    pub fn log_spectrogram(&self, waveform: &Waveform) -> FeatureSet {
        let eps = self.config.epsilon;
        let frames = self
            .stft
            .magnitudes(waveform.samples())
            .into_iter()
            .map(|mag| mag.iter().map(|m| m.max(eps).ln()).collect())
            .collect();
        FeatureSet::from_frames(FeatureType::LogSpectrogram.as_str(), self.stft.n_bins(), frames)
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::build(FeatureConfig::default())
    }
}
