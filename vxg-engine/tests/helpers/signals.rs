//! Synthetic Signal Generators
//!
//! All generators are deterministic so scores are reproducible.

use std::f32::consts::PI;
use vxg_engine::Waveform;

pub const SR: u32 = 16000;

/// Pure tone at `amplitude`
pub fn sine(freq: f32, seconds: f32, sample_rate: u32, amplitude: f32) -> Vec<f32> {
    let n = (seconds * sample_rate as f32) as usize;
    (0..n)
        .map(|i| amplitude * (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
        .collect()
}

/// Harmonic source at `f0` shaped by two vocal-tract resonances
pub fn vowel(seconds: f32, f0: f32, formants: [f32; 2], sample_rate: u32) -> Vec<f32> {
    let n = (seconds * sample_rate as f32) as usize;
    let nyquist = sample_rate as f32 / 2.0;
    let harmonics: Vec<(f32, f32)> = (1..)
        .map(|h| h as f32 * f0)
        .take_while(|&f| f < nyquist.min(4000.0))
        .map(|f| {
            let gain: f32 = formants
                .iter()
                .map(|&fc| 1.0 / (1.0 + ((f - fc) / 120.0).powi(2)))
                .sum();
            (f, gain)
        })
        .collect();
    let norm: f32 = harmonics.iter().map(|(_, g)| g).sum();
    (0..n)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            harmonics
                .iter()
                .enumerate()
                .map(|(k, (f, g))| g * (2.0 * PI * f * t + k as f32).sin())
                .sum::<f32>()
                * 0.5
                / norm
        })
        .collect()
}

/// Apply sin² fade-in and fade-out of `fade_seconds`
pub fn with_fades(mut samples: Vec<f32>, fade_seconds: f32, sample_rate: u32) -> Vec<f32> {
    let n = samples.len();
    let fade = ((fade_seconds * sample_rate as f32) as usize).min(n / 2);
    for i in 0..fade {
        let g = (i as f32 / fade as f32 * PI / 2.0).sin().powi(2);
        samples[i] *= g;
        samples[n - 1 - i] *= g;
    }
    samples
}

/// Bursts of `tone_seconds` switched on and off without any ramp
pub fn hard_gated(
    tone_seconds: f32,
    gap_seconds: f32,
    bursts: usize,
    sample_rate: u32,
) -> Vec<f32> {
    let gap = vec![0.0; (gap_seconds * sample_rate as f32) as usize];
    let mut out = gap.clone();
    for _ in 0..bursts {
        out.extend(sine(300.0, tone_seconds, sample_rate, 0.6));
        out.extend_from_slice(&gap);
    }
    out
}

/// Speech-like audio with a run of exact zeros spliced into the middle
pub fn spliced_with_digital_silence(sample_rate: u32) -> Vec<f32> {
    let mut out = vowel(1.0, 140.0, [600.0, 1100.0], sample_rate);
    out.extend(vec![0.0; (0.5 * sample_rate as f32) as usize]);
    out.extend(vowel(1.0, 140.0, [600.0, 1100.0], sample_rate));
    out
}

pub fn waveform(samples: Vec<f32>, sample_rate: u32) -> Waveform {
    Waveform::new(samples, sample_rate).unwrap()
}
