//! Gaussian-kernel density-ratio estimation (KLIEP).
//!
//! Purpose
//! -------
//! Fit the density ratio `r(x) = p_nu(x) / p_de(x)` between two particle
//! clouds as a non-negative mixture of Gaussian kernels centered on a subset
//! of the numerator sample:
//!
//! ```text
//! r(x) = sum_b alpha_b K(x, c_b; sigma),    K(x, c; sigma) = exp(-|x - c|^2 / (2 sigma^2))
//! ```
//!
//! The weights maximize the mean log-ratio over the numerator sample subject
//! to `alpha >= 0` and the unit-mean constraint `(1/n_de) sum r(x_de) = 1`,
//! via projected gradient ascent with backtracking. The kernel bandwidth is
//! chosen by leave-one-out cross-validation over a fixed grid of multiples
//! of the median pairwise distance of the pooled sample.
//!
//! Key behaviors
//! -------------
//! - Centers are a seeded random subset of the numerator rows (at most
//!   [`KliepOptions::n_centers`]), so a fit is deterministic given the seed.
//! - Ascent stops when the mean log-ratio improves by less than
//!   [`KliepOptions::tol`] or after [`KliepOptions::max_iter`] iterations.
//! - The fitted object exposes `density_ratio(x)` for arbitrary points; the
//!   tolerance selector maximizes it numerically.
//!
//! Invariants & assumptions
//! ------------------------
//! - Both samples share the particle dimension `k` and have at least two
//!   rows.
//! - After a successful fit, `alpha >= 0` and the unit-mean constraint holds
//!   exactly at the fitted weights.
use crate::smc::errors::{AbcResult, KliepError};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::rngs::StdRng;

/// Configuration for a KLIEP fit.
#[derive(Debug, Clone, PartialEq)]
pub struct KliepOptions {
    /// Maximum number of kernel centers drawn from the numerator sample.
    pub n_centers: usize,
    /// Bandwidth grid, as multiples of the median pairwise distance.
    pub bandwidth_multipliers: Vec<f64>,
    /// Iteration cap for the projected gradient ascent.
    pub max_iter: usize,
    /// Stop when the mean log-ratio improves by less than this.
    pub tol: f64,
}

impl Default for KliepOptions {
    fn default() -> Self {
        KliepOptions {
            n_centers: 100,
            bandwidth_multipliers: vec![0.1, 0.2, 0.5, 0.8, 1.0, 2.0, 5.0, 10.0],
            max_iter: 100,
            tol: 1e-5,
        }
    }
}

/// A fitted density-ratio model.
#[derive(Debug, Clone)]
pub struct KliepFit {
    centers: Array2<f64>,
    alpha: Array1<f64>,
    sigma: f64,
    mean_log_ratio: f64,
}

impl KliepFit {
    /// Fit the ratio of `xnu` (target) over `xde` (source).
    ///
    /// # Errors
    /// - [`KliepError::DimensionMismatch`] / [`KliepError::TooFewSamples`] on
    ///   malformed inputs.
    /// - [`KliepError::DegenerateKernel`] if every candidate bandwidth yields
    ///   a non-finite cross-validation score (e.g., all samples coincide).
    /// - [`KliepError::InfeasibleConstraint`] if the unit-mean constraint
    ///   cannot be satisfied with non-negative weights.
    pub fn fit(
        xnu: ArrayView2<f64>, xde: ArrayView2<f64>, opts: &KliepOptions, rng: &mut StdRng,
    ) -> AbcResult<Self> {
        if xnu.ncols() != xde.ncols() {
            return Err(
                KliepError::DimensionMismatch { nu_cols: xnu.ncols(), de_cols: xde.ncols() }
                    .into(),
            );
        }
        let n_nu = xnu.nrows();
        let n_de = xde.nrows();
        if n_nu < 2 || n_de < 2 {
            return Err(KliepError::TooFewSamples { n_nu, n_de }.into());
        }

        let b = opts.n_centers.min(n_nu);
        let center_rows = rand::seq::index::sample(rng, n_nu, b).into_vec();
        let mut centers = Array2::zeros((b, xnu.ncols()));
        for (target, &source) in center_rows.iter().enumerate() {
            centers.row_mut(target).assign(&xnu.row(source));
        }

        let scale = median_pairwise_distance(xnu, xde);
        if scale <= 0.0 {
            return Err(KliepError::DegenerateKernel { sigma: scale }.into());
        }

        let mut best: Option<(f64, f64)> = None;
        for &multiplier in &opts.bandwidth_multipliers {
            let sigma = multiplier * scale;
            let score = loo_score(xnu, xde, centers.view(), sigma, opts)?;
            if score.is_finite() && best.map_or(true, |(_, s)| score > s) {
                best = Some((sigma, score));
            }
        }
        let (sigma, _) =
            best.ok_or(KliepError::DegenerateKernel { sigma: scale })?;

        let k_nu = gram(xnu, centers.view(), sigma);
        let k_bar = de_mean_kernel(xde, centers.view(), sigma);
        let (alpha, mean_log_ratio) = fit_alpha(k_nu.view(), k_bar.view(), opts)?;
        Ok(KliepFit { centers, alpha, sigma, mean_log_ratio })
    }

    /// The fitted ratio at an arbitrary point.
    pub fn density_ratio(&self, x: ArrayView1<f64>) -> f64 {
        let two_sigma_sq = 2.0 * self.sigma * self.sigma;
        self.centers
            .rows()
            .into_iter()
            .zip(self.alpha.iter())
            .map(|(center, &alpha)| alpha * (-squared_distance(x, center) / two_sigma_sq).exp())
            .sum()
    }

    /// The selected kernel bandwidth.
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// The fitted non-negative mixture weights.
    pub fn alpha(&self) -> ArrayView1<f64> {
        self.alpha.view()
    }

    /// Mean log-ratio over the numerator sample at the fitted weights.
    pub fn mean_log_ratio(&self) -> f64 {
        self.mean_log_ratio
    }
}

/// Leave-one-out cross-validation score of one bandwidth: the mean held-out
/// log-ratio, refitting the weights without each numerator row in turn.
fn loo_score(
    xnu: ArrayView2<f64>, xde: ArrayView2<f64>, centers: ArrayView2<f64>, sigma: f64,
    opts: &KliepOptions,
) -> AbcResult<f64> {
    let n_nu = xnu.nrows();
    let k_nu = gram(xnu, centers, sigma);
    let k_bar = de_mean_kernel(xde, centers, sigma);

    let mut total = 0.0;
    let mut held_out = Array2::zeros((n_nu - 1, centers.nrows()));
    for i in 0..n_nu {
        let mut target = 0;
        for (source, row) in k_nu.rows().into_iter().enumerate() {
            if source != i {
                held_out.row_mut(target).assign(&row);
                target += 1;
            }
        }
        let (alpha, _) = match fit_alpha(held_out.view(), k_bar.view(), opts) {
            Ok(fitted) => fitted,
            Err(_) => return Ok(f64::NEG_INFINITY),
        };
        let ratio = k_nu.row(i).dot(&alpha);
        if ratio <= 0.0 {
            return Ok(f64::NEG_INFINITY);
        }
        total += ratio.ln();
    }
    Ok(total / n_nu as f64)
}

/// Projected gradient ascent on the constrained KLIEP objective.
///
/// Maximizes `J(alpha) = mean ln(K_nu alpha)` subject to `alpha >= 0` and
/// `k_bar . alpha = 1`, returning the weights and the achieved objective.
fn fit_alpha(
    k_nu: ArrayView2<f64>, k_bar: ArrayView1<f64>, opts: &KliepOptions,
) -> AbcResult<(Array1<f64>, f64)> {
    let b = k_bar.len();
    let mut alpha = Array1::from_elem(b, 1.0);
    project(&mut alpha, k_bar)?;
    let mut objective = mean_log_ratio(k_nu, alpha.view());

    for _ in 0..opts.max_iter {
        let ratios = k_nu.dot(&alpha);
        let mut gradient = Array1::zeros(b);
        for (row, &ratio) in k_nu.rows().into_iter().zip(ratios.iter()) {
            if ratio > 0.0 {
                gradient.scaled_add(1.0 / (k_nu.nrows() as f64 * ratio), &row);
            }
        }

        let mut step = 1.0;
        let mut improved = None;
        while step > 1e-12 {
            let mut candidate = &alpha + &(step * &gradient);
            if project(&mut candidate, k_bar).is_ok() {
                let value = mean_log_ratio(k_nu, candidate.view());
                if value > objective {
                    improved = Some((candidate, value));
                    break;
                }
            }
            step /= 2.0;
        }

        match improved {
            Some((candidate, value)) => {
                let gain = value - objective;
                alpha = candidate;
                objective = value;
                if gain < opts.tol {
                    break;
                }
            }
            None => break,
        }
    }
    Ok((alpha, objective))
}

/// Project onto the feasible set: equality correction toward
/// `k_bar . alpha = 1`, clip at zero, rescale.
fn project(alpha: &mut Array1<f64>, k_bar: ArrayView1<f64>) -> AbcResult<()> {
    let norm_sq = k_bar.dot(&k_bar);
    if norm_sq > 0.0 {
        let correction = (1.0 - k_bar.dot(alpha)) / norm_sq;
        alpha.scaled_add(correction, &k_bar);
    }
    alpha.mapv_inplace(|a| a.max(0.0));
    let mass = k_bar.dot(alpha);
    if !mass.is_finite() || mass <= 0.0 {
        return Err(KliepError::InfeasibleConstraint.into());
    }
    alpha.mapv_inplace(|a| a / mass);
    Ok(())
}

fn mean_log_ratio(k_nu: ArrayView2<f64>, alpha: ArrayView1<f64>) -> f64 {
    let ratios = k_nu.dot(&alpha);
    let mut total = 0.0;
    for &ratio in ratios.iter() {
        if ratio <= 0.0 {
            return f64::NEG_INFINITY;
        }
        total += ratio.ln();
    }
    total / k_nu.nrows() as f64
}

/// Kernel matrix between sample rows and centers.
fn gram(x: ArrayView2<f64>, centers: ArrayView2<f64>, sigma: f64) -> Array2<f64> {
    let two_sigma_sq = 2.0 * sigma * sigma;
    let mut k = Array2::zeros((x.nrows(), centers.nrows()));
    for (mut out_row, sample) in k.rows_mut().into_iter().zip(x.rows()) {
        for (out, center) in out_row.iter_mut().zip(centers.rows()) {
            *out = (-squared_distance(sample, center) / two_sigma_sq).exp();
        }
    }
    k
}

/// Mean kernel vector over the denominator sample (the constraint vector).
fn de_mean_kernel(xde: ArrayView2<f64>, centers: ArrayView2<f64>, sigma: f64) -> Array1<f64> {
    let k_de = gram(xde, centers, sigma);
    let mut k_bar = Array1::zeros(centers.nrows());
    for row in k_de.rows() {
        k_bar += &row;
    }
    k_bar / xde.nrows() as f64
}

/// Median pairwise Euclidean distance of the pooled sample.
fn median_pairwise_distance(xnu: ArrayView2<f64>, xde: ArrayView2<f64>) -> f64 {
    let mut rows: Vec<ArrayView1<f64>> = xnu.rows().into_iter().collect();
    rows.extend(xde.rows());
    let mut distances = Vec::with_capacity(rows.len() * (rows.len() - 1) / 2);
    for i in 0..rows.len() {
        for j in (i + 1)..rows.len() {
            distances.push(squared_distance(rows[i], rows[j]).sqrt());
        }
    }
    distances.sort_by(|a, b| a.partial_cmp(b).expect("distances are finite"));
    distances[distances.len() / 2]
}

fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(&x, &y)| (x - y) * (x - y)).sum()
}
