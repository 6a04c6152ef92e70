//! Importance-weight updates for accepted particles.
//!
//! Purpose
//! -------
//! Compute the unnormalized importance weight of each accepted particle —
//! prior density over the kernel-mixture density of the previous generation —
//! then normalize and report the effective sample size. The mixture term is
//! accumulated in log space with a max-shift log-sum-exp, since kernel
//! densities underflow quickly as tolerances tighten.
//!
//! Conventions
//! -----------
//! - Generation 1 weights are uniform.
//! - `ess = 1 / sum(w_i^2)` over the normalized weights.
use crate::priors::PriorSet;
use crate::smc::errors::{AbcError, AbcResult};
use crate::smc::generation::effective_sample_size;
use crate::smc::mvn::MvNormal;
use ndarray::{Array1, ArrayView1, ArrayView2};

/// Uniform weights for the first generation: `(weights, ess)`.
pub fn initial_weights(n: usize) -> (Array1<f64>, f64) {
    let weight = Array1::from_elem(n, 1.0 / n as f64);
    let ess = effective_sample_size(weight.view());
    (weight, ess)
}

/// Weights for generation g > 1: `w_i ~ pi(x_i) / sum_j w_j phi(x_i; x_j)`.
///
/// `previous_x` and `previous_w` are the committed previous generation;
/// `kernel` is the same `2 x Cov` Gaussian used to propose.
///
/// # Errors
/// - [`AbcError::DegenerateWeights`] if a mixture density is non-finite or
///   the normalizing sum vanishes.
/// - Prior density errors from the underlying distributions.
pub fn update_weights(
    x: ArrayView2<f64>, priors: &PriorSet, previous_x: ArrayView2<f64>,
    previous_w: ArrayView1<f64>, kernel: &MvNormal,
) -> AbcResult<(Array1<f64>, f64)> {
    let log_prev_w: Vec<f64> = previous_w.iter().map(|&w| w.ln()).collect();
    let mut log_terms = vec![0.0; previous_x.nrows()];

    let mut weight = Array1::zeros(x.nrows());
    for (value, particle) in weight.iter_mut().zip(x.rows()) {
        let log_prior = priors.joint_log_pdf(particle)?;
        for ((term, &log_w), ancestor) in
            log_terms.iter_mut().zip(&log_prev_w).zip(previous_x.rows())
        {
            *term = log_w + kernel.log_pdf(particle, ancestor);
        }
        let log_mixture = log_sum_exp(&log_terms);
        if !log_mixture.is_finite() {
            return Err(AbcError::DegenerateWeights { sum: log_mixture });
        }
        *value = (log_prior - log_mixture).exp();
    }

    let sum = weight.sum();
    if !sum.is_finite() || sum <= 0.0 {
        return Err(AbcError::DegenerateWeights { sum });
    }
    weight.mapv_inplace(|w| w / sum);
    let ess = effective_sample_size(weight.view());
    Ok((weight, ess))
}

/// Max-shift log-sum-exp over a slice of log terms.
fn log_sum_exp(log_terms: &[f64]) -> f64 {
    let max = log_terms.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    if !max.is_finite() {
        return max;
    }
    max + log_terms.iter().map(|&t| (t - max).exp()).sum::<f64>().ln()
}
