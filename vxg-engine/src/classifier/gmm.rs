//! Diagonal-covariance Gaussian mixture model fitted with EM
//!
//! Initialization is k-means++ followed by a few Lloyd iterations, driven by
//! a seeded RNG so the same data always produces the same model.

use crate::error::{EngineError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::debug;

const LLOYD_ITERATIONS: usize = 10;

/// EM settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GmmConfig {
    pub n_components: usize,
    pub max_iter: usize,
    /// Convergence tolerance on the mean log-likelihood
    pub tol: f64,
    /// Added to every variance
    pub reg_covar: f64,
    pub seed: u64,
}

impl Default for GmmConfig {
    fn default() -> Self {
        Self {
            n_components: 32,
            max_iter: 100,
            tol: 1e-3,
            reg_covar: 1e-6,
            seed: 42,
        }
    }
}

/// Outcome of one EM fit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitReport {
    pub iterations: usize,
    pub converged: bool,
    pub mean_log_likelihood: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagGmm {
    dim: usize,
    weights: Vec<f64>,
    means: Vec<Vec<f64>>,
    variances: Vec<Vec<f64>>,
}

fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

impl DiagGmm {
    /// Fit on row-major `data` with `dim` columns
    ///
    /// The component count is reduced to the number of samples when fewer
    /// samples than components are available.
    pub fn fit(data: &[f64], dim: usize, config: &GmmConfig) -> Result<(Self, FitReport)> {
        if dim == 0 || data.len() < dim || data.len() % dim != 0 {
            return Err(EngineError::InsufficientData(format!(
                "cannot fit GMM on {} values with {} columns",
                data.len(),
                dim
            )));
        }
        let rows: Vec<&[f64]> = data.chunks_exact(dim).collect();
        let k = config.n_components.clamp(1, rows.len());
        let mut rng = StdRng::seed_from_u64(config.seed);

        let mut gmm = Self::initialize(&rows, dim, k, config.reg_covar, &mut rng);
        let mut resp = vec![vec![0.0; k]; rows.len()];
        let mut prev = f64::NEG_INFINITY;
        let mut report = FitReport {
            iterations: 0,
            converged: false,
            mean_log_likelihood: f64::NEG_INFINITY,
        };

        for iter in 1..=config.max_iter.max(1) {
            let ll = gmm.e_step(&rows, &mut resp);
            gmm.m_step(&rows, &resp, config.reg_covar);
            report.iterations = iter;
            report.mean_log_likelihood = ll;
            if (ll - prev).abs() < config.tol {
                report.converged = true;
                break;
            }
            prev = ll;
        }
        report.mean_log_likelihood = gmm.mean_log_likelihood(data)?;
        debug!(
            "GMM fit: k={}, dim={}, {} iterations, converged={}, mean ll {:.3}",
            k, dim, report.iterations, report.converged, report.mean_log_likelihood
        );
        Ok((gmm, report))
    }

    fn initialize(rows: &[&[f64]], dim: usize, k: usize, reg: f64, rng: &mut StdRng) -> Self {
        // k-means++ seeding
        let mut centers: Vec<Vec<f64>> = vec![rows[rng.gen_range(0..rows.len())].to_vec()];
        let mut dist: Vec<f64> = rows.iter().map(|r| squared_distance(r, &centers[0])).collect();
        while centers.len() < k {
            let total: f64 = dist.iter().sum();
            let next = if total > 0.0 {
                let mut target = rng.gen::<f64>() * total;
                let mut chosen = rows.len() - 1;
                for (i, d) in dist.iter().enumerate() {
                    if target < *d {
                        chosen = i;
                        break;
                    }
                    target -= d;
                }
                chosen
            } else {
                rng.gen_range(0..rows.len())
            };
            centers.push(rows[next].to_vec());
            for (d, r) in dist.iter_mut().zip(rows) {
                *d = d.min(squared_distance(r, &centers[centers.len() - 1]));
            }
        }

        // Lloyd refinement
        let mut labels = vec![0usize; rows.len()];
        for _ in 0..LLOYD_ITERATIONS {
            for (label, r) in labels.iter_mut().zip(rows) {
                *label = (0..k)
                    .min_by(|&a, &b| {
                        squared_distance(r, &centers[a])
                            .total_cmp(&squared_distance(r, &centers[b]))
                    })
                    .unwrap_or(0);
            }
            let mut sums = vec![vec![0.0; dim]; k];
            let mut counts = vec![0usize; k];
            for (label, r) in labels.iter().zip(rows) {
                counts[*label] += 1;
                for (s, x) in sums[*label].iter_mut().zip(r.iter()) {
                    *s += x;
                }
            }
            for c in 0..k {
                if counts[c] > 0 {
                    centers[c] = sums[c].iter().map(|s| s / counts[c] as f64).collect();
                }
            }
        }

        // Hard-assignment statistics
        let n = rows.len() as f64;
        let global_mean: Vec<f64> = (0..dim)
            .map(|d| rows.iter().map(|r| r[d]).sum::<f64>() / n)
            .collect();
        let global_var: Vec<f64> = (0..dim)
            .map(|d| rows.iter().map(|r| (r[d] - global_mean[d]).powi(2)).sum::<f64>() / n + reg)
            .collect();

        let mut weights = vec![0.0; k];
        let mut variances = vec![vec![0.0; dim]; k];
        for (label, r) in labels.iter().zip(rows) {
            weights[*label] += 1.0;
            for d in 0..dim {
                variances[*label][d] += (r[d] - centers[*label][d]).powi(2);
            }
        }
        for c in 0..k {
            if weights[c] > 1.0 {
                for d in 0..dim {
                    variances[c][d] = variances[c][d] / weights[c] + reg;
                }
            } else {
                variances[c] = global_var.clone();
            }
            weights[c] = weights[c].max(1.0) / n;
        }
        let total: f64 = weights.iter().sum();
        weights.iter_mut().for_each(|w| *w /= total);

        Self {
            dim,
            weights,
            means: centers,
            variances,
        }
    }

    fn component_log_probs(&self, x: &[f64], out: &mut [f64]) {
        for (c, slot) in out.iter_mut().enumerate() {
            let mut lp = self.weights[c].max(f64::MIN_POSITIVE).ln();
            for d in 0..self.dim {
                let var = self.variances[c][d];
                lp -= 0.5 * ((2.0 * PI * var).ln() + (x[d] - self.means[c][d]).powi(2) / var);
            }
            *slot = lp;
        }
    }

    /// Responsibilities into `resp`; returns the mean log-likelihood
    fn e_step(&self, rows: &[&[f64]], resp: &mut [Vec<f64>]) -> f64 {
        let mut total = 0.0;
        for (r, row_resp) in rows.iter().zip(resp.iter_mut()) {
            self.component_log_probs(r, row_resp);
            let lse = log_sum_exp(row_resp);
            total += lse;
            row_resp.iter_mut().for_each(|v| *v = (*v - lse).exp());
        }
        total / rows.len() as f64
    }

    fn m_step(&mut self, rows: &[&[f64]], resp: &[Vec<f64>], reg: f64) {
        let k = self.weights.len();
        let n = rows.len() as f64;
        for c in 0..k {
            let nk: f64 = resp.iter().map(|r| r[c]).sum::<f64>() + 10.0 * f64::EPSILON;
            let mut mean = vec![0.0; self.dim];
            for (r, row) in resp.iter().zip(rows) {
                for (m, x) in mean.iter_mut().zip(row.iter()) {
                    *m += r[c] * x;
                }
            }
            mean.iter_mut().for_each(|m| *m /= nk);

            let mut var = vec![0.0; self.dim];
            for (r, row) in resp.iter().zip(rows) {
                for d in 0..self.dim {
                    var[d] += r[c] * (row[d] - mean[d]).powi(2);
                }
            }
            var.iter_mut().for_each(|v| *v = *v / nk + reg);

            self.weights[c] = nk / n;
            self.means[c] = mean;
            self.variances[c] = var;
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn n_components(&self) -> usize {
        self.weights.len()
    }

    /// Per-sample log-likelihood
    pub fn score_samples(&self, data: &[f64]) -> Result<Vec<f64>> {
        if self.dim == 0 || data.len() % self.dim != 0 {
            return Err(EngineError::DimensionMismatch {
                expected: self.dim,
                actual: data.len(),
            });
        }
        let mut buf = vec![0.0; self.n_components()];
        Ok(data
            .chunks_exact(self.dim)
            .map(|x| {
                self.component_log_probs(x, &mut buf);
                log_sum_exp(&buf)
            })
            .collect())
    }

    /// Average log-likelihood over all samples
    pub fn mean_log_likelihood(&self, data: &[f64]) -> Result<f64> {
        let scores = self.score_samples(data)?;
        if scores.is_empty() {
            return Err(EngineError::InsufficientData(
                "no frames to score".to_string(),
            ));
        }
        Ok(scores.iter().sum::<f64>() / scores.len() as f64)
    }
}
