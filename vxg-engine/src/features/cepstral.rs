//! Cepstral helpers: orthonormal DCT-II and delta coefficients

/// DCT-II with orthonormal scaling, truncated to the first `n_out` coefficients
#[derive(Debug, Clone)]
pub struct Dct {
    n_in: usize,
    n_out: usize,
    table: Vec<f64>,
}

impl Dct {
    pub fn new(n_in: usize, n_out: usize) -> Self {
        let n_out_eff = n_out.min(n_in);
        let n = n_in as f64;
        let mut table = Vec::with_capacity(n_out_eff * n_in);
        for k in 0..n_out_eff {
            let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
            for i in 0..n_in {
                let angle = std::f64::consts::PI / n * (i as f64 + 0.5) * k as f64;
                table.push(scale * angle.cos());
            }
        }
        Self {
            n_in,
            n_out,
            table,
        }
    }

    /// Transform one frame; coefficients beyond `n_in` are zero
    pub fn apply(&self, input: &[f64]) -> Vec<f64> {
        debug_assert_eq!(input.len(), self.n_in);
        let mut out = vec![0.0; self.n_out];
        for (k, row) in self.table.chunks_exact(self.n_in.max(1)).enumerate() {
            out[k] = row.iter().zip(input).map(|(c, x)| c * x).sum();
        }
        out
    }
}

/// Regression deltas over a ±`width` frame window, edges replicated
///
/// `frames` is row-major with `n_coeffs` columns.
pub fn deltas(frames: &[f64], n_coeffs: usize, width: usize) -> Vec<f64> {
    if n_coeffs == 0 || frames.is_empty() {
        return Vec::new();
    }
    let n_frames = frames.len() / n_coeffs;
    let width = width.max(1);
    let denom: f64 = 2.0 * (1..=width).map(|n| (n * n) as f64).sum::<f64>();
    let last = n_frames - 1;

    let mut out = vec![0.0; frames.len()];
    for t in 0..n_frames {
        for n in 1..=width {
            let ahead = (t + n).min(last);
            let behind = t.saturating_sub(n);
            for c in 0..n_coeffs {
                out[t * n_coeffs + c] += n as f64
                    * (frames[ahead * n_coeffs + c] - frames[behind * n_coeffs + c])
                    / denom;
            }
        }
    }
    out
}
