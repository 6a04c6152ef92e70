//! Proposal sampling for the particle loop.
//!
//! Purpose
//! -------
//! Draw candidate particles either independently from the priors (the first
//! generation) or by resampling an ancestor from the previous generation's
//! weights and perturbing it with the Gaussian kernel. Perturbed proposals
//! landing outside the joint prior support are rejected and redrawn in
//! place, so callers only ever see supported candidates.
//!
//! Conventions
//! -----------
//! - The ancestor carried with a proposal is always a row index into the
//!   *previous committed generation*, never into any transient batch.
//! - Ancestor selection walks the weight prefix sums; weights are normalized
//!   on commit so no renormalization happens here.
use crate::priors::PriorSet;
use crate::smc::errors::{AbcError, AbcResult};
use crate::smc::mvn::MvNormal;
use ndarray::{Array1, ArrayView2};
use rand::{rngs::StdRng, Rng};

/// Retry budget for perturbations that keep leaving the prior support.
pub const PROPOSAL_RETRY_LIMIT: usize = 1_000_000;

/// One candidate particle plus the ancestor it was perturbed from.
#[derive(Debug, Clone, PartialEq)]
pub struct Proposal {
    /// The candidate parameter vector (length `k`).
    pub particle: Array1<f64>,
    /// Row of the previous generation this candidate descends from; `None`
    /// for independent prior draws.
    pub ancestor: Option<usize>,
}

/// Draws proposals for one generation.
pub enum ProposalSampler<'a> {
    /// Generation 1: independent draws from the priors.
    Prior { priors: &'a PriorSet },
    /// Generation g > 1: weighted resample of the previous cloud plus a
    /// Gaussian perturbation.
    Perturbed {
        priors: &'a PriorSet,
        previous: ArrayView2<'a, f64>,
        weight_cdf: Array1<f64>,
        kernel: &'a MvNormal,
    },
}

impl<'a> ProposalSampler<'a> {
    /// Sampler for the first generation.
    pub fn from_prior(priors: &'a PriorSet) -> Self {
        ProposalSampler::Prior { priors }
    }

    /// Sampler for a later generation, resampling `previous` under `weight`.
    pub fn from_generation(
        priors: &'a PriorSet, previous: ArrayView2<'a, f64>,
        weight: ndarray::ArrayView1<'a, f64>, kernel: &'a MvNormal,
    ) -> Self {
        let mut cumulative = 0.0;
        let weight_cdf = Array1::from_iter(weight.iter().map(|&w| {
            cumulative += w;
            cumulative
        }));
        ProposalSampler::Perturbed { priors, previous, weight_cdf, kernel }
    }

    /// Draw one supported proposal.
    ///
    /// # Errors
    /// - Prior sampling errors from the underlying distributions.
    /// - [`AbcError::ProposalRetriesExhausted`] if `PROPOSAL_RETRY_LIMIT`
    ///   consecutive perturbations leave the joint support.
    pub fn draw(&self, rng: &mut StdRng) -> AbcResult<Proposal> {
        match self {
            ProposalSampler::Prior { priors } => {
                Ok(Proposal { particle: priors.sample_vector(rng)?, ancestor: None })
            }
            ProposalSampler::Perturbed { priors, previous, weight_cdf, kernel } => {
                for _ in 0..PROPOSAL_RETRY_LIMIT {
                    let ancestor = sample_index(weight_cdf, rng);
                    let particle = kernel.sample(previous.row(ancestor), rng);
                    if priors.support_contains(particle.view()) {
                        return Ok(Proposal { particle, ancestor: Some(ancestor) });
                    }
                }
                Err(AbcError::ProposalRetriesExhausted { retries: PROPOSAL_RETRY_LIMIT })
            }
        }
    }

    /// Draw a batch of `n` supported proposals.
    pub fn draw_batch(&self, n: usize, rng: &mut StdRng) -> AbcResult<Vec<Proposal>> {
        (0..n).map(|_| self.draw(rng)).collect()
    }
}

/// Inverse-CDF draw of an ancestor index from the weight prefix sums.
fn sample_index(weight_cdf: &Array1<f64>, rng: &mut StdRng) -> usize {
    let u: f64 = rng.gen();
    for (index, &cumulative) in weight_cdf.iter().enumerate() {
        if u < cumulative {
            return index;
        }
    }
    weight_cdf.len() - 1
}
