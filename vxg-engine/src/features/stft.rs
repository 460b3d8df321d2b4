//! Short-time Fourier transform with a Hann window

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// Framing and FFT plan for magnitude spectra
#[derive(Clone)]
pub struct Stft {
    n_fft: usize,
    hop: usize,
    win_length: usize,
    window: Vec<f64>,
    fft: Arc<dyn Fft<f64>>,
}

impl std::fmt::Debug for Stft {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stft")
            .field("n_fft", &self.n_fft)
            .field("hop", &self.hop)
            .field("win_length", &self.win_length)
            .finish()
    }
}

impl Stft {
    /// `win_length` is clamped to `n_fft`; the window is centered in the FFT frame
    pub fn new(n_fft: usize, hop: usize, win_length: usize) -> Self {
        let n_fft = n_fft.max(2);
        let win_length = win_length.clamp(1, n_fft);
        let hann = hann_window(win_length);
        let offset = (n_fft - win_length) / 2;
        let mut window = vec![0.0; n_fft];
        window[offset..offset + win_length].copy_from_slice(&hann);

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(n_fft);
        Self {
            n_fft,
            hop: hop.max(1),
            win_length,
            window,
            fft,
        }
    }

    pub fn n_fft(&self) -> usize {
        self.n_fft
    }

    pub fn hop(&self) -> usize {
        self.hop
    }

    /// Bins per spectrum (`n_fft / 2 + 1`)
    pub fn n_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Frequency (Hz) of bin `k`
    pub fn bin_frequency(&self, k: usize, sample_rate: u32) -> f64 {
        k as f64 * sample_rate as f64 / self.n_fft as f64
    }

    /// Number of frames for `len` samples
    ///
    /// Empty input has no frames; input shorter than one frame is zero-padded
    /// to exactly one frame.
    pub fn frame_count(&self, len: usize) -> usize {
        if len == 0 {
            0
        } else if len <= self.n_fft {
            1
        } else {
            1 + (len - self.n_fft) / self.hop
        }
    }

    /// Magnitude spectra, one `Vec` of `n_bins()` values per frame
    pub fn magnitudes(&self, samples: &[f32]) -> Vec<Vec<f64>> {
        let n_frames = self.frame_count(samples.len());
        let mut buffer = vec![Complex::new(0.0f64, 0.0); self.n_fft];
        let mut frames = Vec::with_capacity(n_frames);

        for frame in 0..n_frames {
            let start = frame * self.hop;
            for (i, slot) in buffer.iter_mut().enumerate() {
                let sample = samples.get(start + i).copied().unwrap_or(0.0) as f64;
                *slot = Complex::new(sample * self.window[i], 0.0);
            }
            self.fft.process(&mut buffer);
            frames.push(buffer[..self.n_bins()].iter().map(|c| c.norm()).collect());
        }
        frames
    }

    /// Power spectra (squared magnitudes)
    pub fn power(&self, samples: &[f32]) -> Vec<Vec<f64>> {
        let mut frames = self.magnitudes(samples);
        for frame in frames.iter_mut() {
            for v in frame.iter_mut() {
                *v *= *v;
            }
        }
        frames
    }

    /// Frame-averaged power spectrum, or `None` for empty input
    pub fn average_power(&self, samples: &[f32]) -> Option<Vec<f64>> {
        let frames = self.power(samples);
        if frames.is_empty() {
            return None;
        }
        let mut avg = vec![0.0; self.n_bins()];
        for frame in &frames {
            for (a, v) in avg.iter_mut().zip(frame) {
                *a += v;
            }
        }
        let n = frames.len() as f64;
        avg.iter_mut().for_each(|a| *a /= n);
        Some(avg)
    }
}

/// Periodic Hann window
pub fn hann_window(len: usize) -> Vec<f64> {
    (0..len)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f64::consts::PI * i as f64 / len as f64).cos())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_count_edges() {
        let stft = Stft::new(512, 160, 400);
        assert_eq!(stft.frame_count(0), 0);
        assert_eq!(stft.frame_count(10), 1);
        assert_eq!(stft.frame_count(512), 1);
        assert_eq!(stft.frame_count(512 + 160), 2);
    }

    #[test]
    fn test_peak_at_tone_bin() {
        let sr = 16000;
        let stft = Stft::new(512, 160, 400);
        let samples: Vec<f32> = (0..4000)
            .map(|i| (2.0 * std::f32::consts::PI * 1000.0 * i as f32 / sr as f32).sin())
            .collect();
        let avg = stft.average_power(&samples).unwrap();
        let peak = avg
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, 32); // 1000 Hz / 31.25 Hz per bin
    }
}
