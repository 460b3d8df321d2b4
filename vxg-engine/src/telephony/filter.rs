//! Zero-phase Butterworth band-pass filtering
//!
//! A 4th-order Butterworth high-pass and low-pass, each realized as two
//! cascaded biquad sections (RBJ cookbook coefficients), applied forward and
//! backward so the channel band edges introduce no phase shift.

/// Section Q values for a 4th-order Butterworth response
const BUTTERWORTH_Q4: [f64; 2] = [0.541_196_100_146_197, 1.306_562_964_876_376_7];

/// Normalized cutoffs are clamped into this open interval
const MIN_NORMALIZED: f64 = 0.001;
const MAX_NORMALIZED: f64 = 0.999;

#[derive(Debug, Clone, Copy)]
struct Biquad {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

#[derive(Debug, Clone, Copy)]
enum Kind {
    LowPass,
    HighPass,
}

impl Biquad {
    fn design(kind: Kind, cutoff_hz: f64, sample_rate: f64, q: f64) -> Self {
        let w0 = 2.0 * std::f64::consts::PI * cutoff_hz / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);
        let a0 = 1.0 + alpha;

        let (b0, b1, b2) = match kind {
            Kind::LowPass => ((1.0 - cos_w0) / 2.0, 1.0 - cos_w0, (1.0 - cos_w0) / 2.0),
            Kind::HighPass => ((1.0 + cos_w0) / 2.0, -(1.0 + cos_w0), (1.0 + cos_w0) / 2.0),
        };

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: -2.0 * cos_w0 / a0,
            a2: (1.0 - alpha) / a0,
        }
    }

    /// Transposed direct form II, in place
    fn run(&self, data: &mut [f64]) {
        let (mut z1, mut z2) = (0.0, 0.0);
        for x in data.iter_mut() {
            let input = *x;
            let y = self.b0 * input + z1;
            z1 = self.b1 * input - self.a1 * y + z2;
            z2 = self.b2 * input - self.a2 * y;
            *x = y;
        }
    }
}

/// Cascade of biquad sections forming a band-pass
#[derive(Debug, Clone)]
pub struct BandPass {
    sections: Vec<Biquad>,
}

impl BandPass {
    /// Design a band-pass for `[low_hz, high_hz]` at `sample_rate`
    ///
    /// Cutoffs are normalized to Nyquist and clamped to (0.001, 0.999). An
    /// edge that clamps to the top of the range is left out, since the
    /// channel band then extends past what the recording can represent.
    pub fn new(low_hz: f64, high_hz: f64, sample_rate: u32) -> Self {
        let fs = sample_rate as f64;
        let nyquist = fs / 2.0;
        let low = (low_hz / nyquist).clamp(MIN_NORMALIZED, MAX_NORMALIZED);
        let high = (high_hz / nyquist).clamp(MIN_NORMALIZED, MAX_NORMALIZED);

        let mut sections = Vec::with_capacity(4);
        if low < MAX_NORMALIZED {
            for q in BUTTERWORTH_Q4 {
                sections.push(Biquad::design(Kind::HighPass, low * nyquist, fs, q));
            }
        }
        if high < MAX_NORMALIZED && high > low {
            for q in BUTTERWORTH_Q4 {
                sections.push(Biquad::design(Kind::LowPass, high * nyquist, fs, q));
            }
        }
        Self { sections }
    }

    /// Number of biquad sections in the cascade
    pub fn order(&self) -> usize {
        self.sections.len() * 2
    }

    /// Zero-phase filtering (forward then backward pass)
    ///
    /// The signal is extended at both ends by odd reflection to suppress
    /// start-up transients, matching common filtfilt practice.
    pub fn filtfilt(&self, input: &[f32]) -> Vec<f32> {
        let n = input.len();
        if n == 0 || self.sections.is_empty() {
            return input.to_vec();
        }

        let pad = (3 * (self.order() + 1)).min(n.saturating_sub(1));
        let mut data = Vec::with_capacity(n + 2 * pad);
        let first = input[0] as f64;
        let last = input[n - 1] as f64;
        for i in (1..=pad).rev() {
            data.push(2.0 * first - input[i] as f64);
        }
        data.extend(input.iter().map(|&s| s as f64));
        for i in 1..=pad {
            data.push(2.0 * last - input[n - 1 - i] as f64);
        }

        for section in &self.sections {
            section.run(&mut data);
        }
        data.reverse();
        for section in &self.sections {
            section.run(&mut data);
        }
        data.reverse();

        data[pad..pad + n].iter().map(|&s| s as f32).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, sample_rate: u32, seconds: f64) -> Vec<f32> {
        let n = (sample_rate as f64 * seconds) as usize;
        (0..n)
            .map(|i| {
                let t = i as f64 / sample_rate as f64;
                (0.5 * (2.0 * std::f64::consts::PI * freq * t).sin()) as f32
            })
            .collect()
    }

    fn rms(samples: &[f32]) -> f64 {
        (samples.iter().map(|&s| (s as f64).powi(2)).sum::<f64>() / samples.len() as f64).sqrt()
    }

    #[test]
    fn test_passband_preserved() {
        let filter = BandPass::new(300.0, 3400.0, 16000);
        let input = sine(1000.0, 16000, 0.5);
        let output = filter.filtfilt(&input);
        let ratio = rms(&output) / rms(&input);
        assert!((ratio - 1.0).abs() < 0.05, "passband gain {}", ratio);
    }

    #[test]
    fn test_stopband_attenuated() {
        let filter = BandPass::new(300.0, 3400.0, 16000);
        let input = sine(7000.0, 16000, 0.5);
        let output = filter.filtfilt(&input);
        assert!(rms(&output) < 0.05 * rms(&input));

        let low = sine(50.0, 16000, 0.5);
        let output = filter.filtfilt(&low);
        assert!(rms(&output) < 0.1 * rms(&low));
    }

    #[test]
    fn test_high_edge_above_nyquist_is_dropped() {
        let filter = BandPass::new(50.0, 7000.0, 8000);
        assert_eq!(filter.order(), 4);
    }

    #[test]
    fn test_short_input() {
        let filter = BandPass::new(300.0, 3400.0, 16000);
        assert!(filter.filtfilt(&[]).is_empty());
        assert_eq!(filter.filtfilt(&[0.25]).len(), 1);
    }
}
