//! The Gaussian perturbation kernel.
//!
//! Purpose
//! -------
//! Provide the multivariate normal used both to perturb resampled ancestors
//! and to evaluate the kernel-mixture density in the weight update. The
//! covariance is always `2 x Cov(x)` of the previous generation's particle
//! cloud — the optimal-kernel scaling from the ABC-SMC literature — with a
//! small ridge added before factorization so point-mass parameter clouds do
//! not break the Cholesky.
//!
//! Conventions
//! -----------
//! - The kernel is centered per call: `sample(center)` draws from
//!   `N(center, sigma)` and `log_pdf(x, center)` evaluates the same law.
//! - Factorization happens once per generation; sampling and density
//!   evaluation reuse the cached Cholesky factor.
use crate::priors::PriorError;
use crate::smc::errors::{AbcError, AbcResult};
use nalgebra::{Cholesky, DMatrix, DVector, Dyn};
use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::{prelude::Distribution, rngs::StdRng};
use statrs::distribution::Normal;

/// Ridge added to the scaled covariance before Cholesky factorization.
pub const COV_RIDGE: f64 = 1e-12;

const LN_TWO_PI: f64 = 1.8378770664093453;

/// A multivariate normal with the `2 x Cov` perturbation covariance.
#[derive(Debug, Clone)]
pub struct MvNormal {
    chol: Cholesky<f64, Dyn>,
    lower: DMatrix<f64>,
    log_norm: f64,
    std_normal: Normal,
}

impl MvNormal {
    /// Build the kernel from a particle cloud: `sigma = 2 Cov(x) + ridge I`.
    ///
    /// # Errors
    /// [`AbcError::KernelNotPositiveDefinite`] if the Cholesky factorization
    /// fails even after the ridge.
    pub fn from_particles(x: ArrayView2<f64>) -> AbcResult<Self> {
        MvNormal::from_covariance(scaled_covariance(x))
    }

    /// Build the kernel from an explicit covariance matrix.
    pub fn from_covariance(sigma: DMatrix<f64>) -> AbcResult<Self> {
        let dim = sigma.nrows();
        let chol = Cholesky::new(sigma).ok_or(AbcError::KernelNotPositiveDefinite { dim })?;
        let lower = chol.l();
        let ln_det: f64 = 2.0 * lower.diagonal().iter().map(|d| d.ln()).sum::<f64>();
        let log_norm = -0.5 * (dim as f64 * LN_TWO_PI + ln_det);
        let std_normal = Normal::new(0.0, 1.0)
            .map_err(|e| AbcError::Prior(PriorError::Statrs { message: e.to_string() }))?;
        Ok(MvNormal { chol, lower, log_norm, std_normal })
    }

    /// Kernel dimension `k`.
    pub fn dim(&self) -> usize {
        self.lower.nrows()
    }

    /// Draw `center + L z` with `z` standard normal.
    pub fn sample(&self, center: ArrayView1<f64>, rng: &mut StdRng) -> Array1<f64> {
        let k = self.dim();
        let z = DVector::from_iterator(k, (0..k).map(|_| self.std_normal.sample(rng)));
        let shifted = &self.lower * z;
        Array1::from_iter(center.iter().zip(shifted.iter()).map(|(&c, &s)| c + s))
    }

    /// Log-density of `x` under `N(center, sigma)`.
    pub fn log_pdf(&self, x: ArrayView1<f64>, center: ArrayView1<f64>) -> f64 {
        let diff =
            DVector::from_iterator(x.len(), x.iter().zip(center.iter()).map(|(&a, &b)| a - b));
        let solved = self.chol.solve(&diff);
        self.log_norm - 0.5 * diff.dot(&solved)
    }

    /// Density of `x` under `N(center, sigma)`.
    pub fn pdf(&self, x: ArrayView1<f64>, center: ArrayView1<f64>) -> f64 {
        self.log_pdf(x, center).exp()
    }
}

/// `2 Cov(x) + ridge I` over the rows of `x`.
///
/// The unbiased sample covariance (denominator `n - 1`) matches how the
/// previous generation's spread is measured; the factor 2 is the
/// optimal-kernel scaling.
pub fn scaled_covariance(x: ArrayView2<f64>) -> DMatrix<f64> {
    let n = x.nrows();
    let k = x.ncols();
    let mut mean = vec![0.0; k];
    for row in x.rows() {
        for (m, &value) in mean.iter_mut().zip(row.iter()) {
            *m += value;
        }
    }
    for m in &mut mean {
        *m /= n as f64;
    }

    let mut sigma = DMatrix::zeros(k, k);
    for row in x.rows() {
        for i in 0..k {
            let di = row[i] - mean[i];
            for j in i..k {
                let dj = row[j] - mean[j];
                sigma[(i, j)] += di * dj;
            }
        }
    }
    let denom = (n.max(2) - 1) as f64;
    for i in 0..k {
        for j in i..k {
            let value = 2.0 * sigma[(i, j)] / denom;
            sigma[(i, j)] = value;
            sigma[(j, i)] = value;
        }
        sigma[(i, i)] += COV_RIDGE;
    }
    sigma
}
