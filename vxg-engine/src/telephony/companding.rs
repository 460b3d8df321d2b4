//! G.711-style companding quantizers
//!
//! Each sample is compressed with the companding law, quantized to 8 bits
//! (sign + 127 levels) and expanded back, leaving the characteristic
//! logarithmic quantization noise of a telephone channel.

use serde::{Deserialize, Serialize};

/// µ-law compression parameter
pub const MU: f64 = 255.0;

/// A-law compression parameter
pub const A: f64 = 87.6;

/// Quantization levels per polarity (8-bit with sign)
const LEVELS: f64 = 127.0;

/// Companding law used by a codec profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompandingLaw {
    /// North American / Japanese telephony
    MuLaw,
    /// European telephony
    ALaw,
}

impl CompandingLaw {
    /// Compress, quantize and expand a buffer; output is clipped to [-1, 1]
    pub fn quantize(self, samples: &[f32]) -> Vec<f32> {
        samples
            .iter()
            .map(|&s| {
                let x = (s as f64).clamp(-1.0, 1.0);
                let compressed = match self {
                    CompandingLaw::MuLaw => mu_law_compress(x),
                    CompandingLaw::ALaw => a_law_compress(x),
                };
                let quantized = (compressed * LEVELS).round() / LEVELS;
                let expanded = match self {
                    CompandingLaw::MuLaw => mu_law_expand(quantized),
                    CompandingLaw::ALaw => a_law_expand(quantized),
                };
                expanded.clamp(-1.0, 1.0) as f32
            })
            .collect()
    }
}

fn mu_law_compress(x: f64) -> f64 {
    x.signum() * (MU * x.abs()).ln_1p() / MU.ln_1p()
}

fn mu_law_expand(y: f64) -> f64 {
    y.signum() * ((1.0 + MU).powf(y.abs()) - 1.0) / MU
}

fn a_law_compress(x: f64) -> f64 {
    let ax = x.abs();
    let denom = 1.0 + A.ln();
    let y = if ax < 1.0 / A {
        A * ax / denom
    } else {
        (1.0 + (A * ax).ln()) / denom
    };
    x.signum() * y
}

fn a_law_expand(y: f64) -> f64 {
    let ay = y.abs();
    let denom = 1.0 + A.ln();
    let x = if ay < 1.0 / denom {
        ay * denom / A
    } else {
        (ay * denom - 1.0).exp() / A
    };
    y.signum() * x
}
