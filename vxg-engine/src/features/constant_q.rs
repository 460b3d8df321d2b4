//! Constant-Q filterbank over a high-resolution power spectrum
//!
//! Each constant-Q bin is a triangular weighting of FFT bins centered on
//! `fmin · 2^(k / bins_per_octave)` with a bandwidth proportional to its
//! center frequency (never narrower than one FFT bin). Bins whose center
//! lies above Nyquist are dropped.

#[derive(Debug, Clone)]
pub struct ConstantQBank {
    /// Per CQ bin: (first FFT bin, weights)
    filters: Vec<(usize, Vec<f64>)>,
}

impl ConstantQBank {
    pub fn new(
        n_fft: usize,
        sample_rate: u32,
        fmin: f64,
        n_bins: usize,
        bins_per_octave: usize,
    ) -> Self {
        let sr = sample_rate as f64;
        let nyquist = sr / 2.0;
        let df = sr / n_fft as f64;
        let n_fft_bins = n_fft / 2 + 1;
        let ratio = 2f64.powf(1.0 / bins_per_octave.max(1) as f64) - 1.0;

        let mut filters = Vec::with_capacity(n_bins);
        for k in 0..n_bins {
            let center = fmin * 2f64.powf(k as f64 / bins_per_octave.max(1) as f64);
            if center >= nyquist {
                break;
            }
            let bandwidth = (center * ratio).max(df);
            let lo = ((center - bandwidth) / df).floor().max(0.0) as usize;
            let hi = (((center + bandwidth) / df).ceil() as usize).min(n_fft_bins - 1);

            let weights: Vec<f64> = (lo..=hi)
                .map(|j| (1.0 - (j as f64 * df - center).abs() / bandwidth).max(0.0))
                .collect();
            filters.push((lo, weights));
        }
        Self { filters }
    }

    /// Number of CQ bins below Nyquist
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Weighted-RMS magnitude per CQ bin
    pub fn apply(&self, power: &[f64]) -> Vec<f64> {
        self.filters
            .iter()
            .map(|(lo, weights)| {
                let (mut acc, mut norm) = (0.0, 0.0);
                for (i, w) in weights.iter().enumerate() {
                    acc += w * power.get(lo + i).copied().unwrap_or(0.0);
                    norm += w;
                }
                if norm > 0.0 {
                    (acc / norm).sqrt()
                } else {
                    0.0
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_bins_fit_at_16k() {
        let bank = ConstantQBank::new(2048, 16000, 32.70, 84, 12);
        assert_eq!(bank.len(), 84);
    }

    #[test]
    fn test_bins_above_nyquist_dropped() {
        let bank = ConstantQBank::new(2048, 4000, 32.70, 84, 12);
        assert!(bank.len() < 84);
        assert!(!bank.is_empty());
    }

    #[test]
    fn test_flat_spectrum_gives_flat_bins() {
        let bank = ConstantQBank::new(1024, 16000, 100.0, 24, 12);
        let out = bank.apply(&vec![4.0; 513]);
        for v in out {
            assert!((v - 2.0).abs() < 1e-9);
        }
    }
}
