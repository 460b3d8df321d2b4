//! Per-dimension standardization (zero mean, unit variance)

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    /// Fit on row-major `data` with `dim` columns
    ///
    /// Constant columns get a scale of 1.0 so they map to zero.
    pub fn fit(data: &[f64], dim: usize) -> Result<Self> {
        if dim == 0 || data.is_empty() || data.len() % dim != 0 {
            return Err(EngineError::InsufficientData(format!(
                "cannot fit scaler on {} values with {} columns",
                data.len(),
                dim
            )));
        }
        let n = (data.len() / dim) as f64;
        let mut mean = vec![0.0; dim];
        for row in data.chunks_exact(dim) {
            for (m, x) in mean.iter_mut().zip(row) {
                *m += x;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut var = vec![0.0; dim];
        for row in data.chunks_exact(dim) {
            for ((v, x), m) in var.iter_mut().zip(row).zip(&mean) {
                *v += (x - m).powi(2);
            }
        }
        let scale = var
            .into_iter()
            .map(|v| {
                let std = (v / n).sqrt();
                if std < 1e-12 {
                    1.0
                } else {
                    std
                }
            })
            .collect();
        Ok(Self { mean, scale })
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    pub fn transform(&self, data: &[f64]) -> Result<Vec<f64>> {
        let dim = self.dim();
        if dim == 0 || data.len() % dim != 0 {
            return Err(EngineError::DimensionMismatch {
                expected: dim,
                actual: data.len(),
            });
        }
        let mut out = Vec::with_capacity(data.len());
        for row in data.chunks_exact(dim) {
            for ((x, m), s) in row.iter().zip(&self.mean).zip(&self.scale) {
                out.push((x - m) / s);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standardizes_columns() {
        let data = [1.0, 10.0, 3.0, 10.0, 5.0, 10.0];
        let scaler = StandardScaler::fit(&data, 2).unwrap();
        let out = scaler.transform(&data).unwrap();
        let col0: Vec<f64> = out.iter().step_by(2).copied().collect();
        assert!((col0.iter().sum::<f64>()).abs() < 1e-12);
        // Constant column maps to zero
        assert!(out.iter().skip(1).step_by(2).all(|&v| v == 0.0));
    }

    #[test]
    fn test_dimension_checked() {
        let scaler = StandardScaler::fit(&[1.0, 2.0, 3.0, 4.0], 2).unwrap();
        assert!(scaler.transform(&[1.0, 2.0, 3.0]).is_err());
    }
}
