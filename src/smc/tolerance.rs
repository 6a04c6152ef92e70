//! Tolerance sequencing: explicit schedules and the adaptive selector.
//!
//! Purpose
//! -------
//! Decide the tolerance vector each generation runs under and when the loop
//! terminates. With an explicit schedule the source simply walks the columns.
//! In adaptive mode the next tolerance comes from the KLIEP density ratio
//! between the current and previous particle clouds: the supremum `c_t` of
//! the fitted ratio gives an acceptance quantile `q_t = 1 / c_t`, and the
//! next tolerance is the `ceil(q_t * n_particles)`-th smallest summed
//! distance of the current generation.
//!
//! Key behaviors
//! -------------
//! - The ratio supremum is located numerically: a bracketed Brent search on
//!   `[min(xnu), max(xnu)]` for one-dimensional particles, a Nelder-Mead
//!   simplex seeded at the first particle otherwise. Both run through
//!   `argmin` executors and minimize the negated ratio.
//! - Stopping rule: once `q_t > ADAPTIVE_STOP_Q` with at least
//!   `ADAPTIVE_MIN_GENERATIONS` committed generations, the source reports
//!   exhaustion and the loop ends.
//! - An adaptive tolerance that fails to strictly decrease (possible with
//!   tied summed distances) is also treated as exhaustion rather than
//!   committed.
//!
//! Conventions
//! -----------
//! - After the oversampled first generation, the full prior-draw cloud
//!   stands in as the "previous generation" for the first KLIEP fit.
use crate::smc::errors::{AbcResult, KliepError};
use crate::smc::generation::ParticleStore;
use crate::smc::kliep::{KliepFit, KliepOptions};
use crate::smc::options::ToleranceSpec;
use argmin::core::{CostFunction, Error, Executor, State};
use argmin::solver::brent::BrentOpt;
use argmin::solver::neldermead::NelderMead;
use ndarray::{array, Array1, Array2, ArrayView1, ArrayView2};
use rand::rngs::StdRng;

/// Acceptance-quantile threshold of the adaptive stopping rule.
pub const ADAPTIVE_STOP_Q: f64 = 0.99;

/// Minimum committed generations before the stopping rule may fire.
pub const ADAPTIVE_MIN_GENERATIONS: usize = 3;

const SUPREMUM_MAX_ITERS: u64 = 200;
const NELDER_MEAD_SD_TOL: f64 = 1e-8;

/// Where the next tolerance vector comes from.
#[derive(Debug, Clone)]
pub enum ToleranceSource {
    /// Walk the columns of an explicit, validated schedule.
    Schedule { matrix: Array2<f64>, next: usize },
    /// Derive tolerances from the KLIEP acceptance-quantile rule.
    Adaptive { n_init: usize, kliep: KliepOptions, prior_cloud: Option<Array2<f64>> },
}

impl ToleranceSource {
    /// Build the source from validated options.
    pub fn from_spec(spec: &ToleranceSpec, kliep: &KliepOptions) -> Self {
        match spec {
            ToleranceSpec::Schedule(matrix) => {
                ToleranceSource::Schedule { matrix: matrix.clone(), next: 0 }
            }
            ToleranceSpec::Adaptive { n_init } => ToleranceSource::Adaptive {
                n_init: *n_init,
                kliep: kliep.clone(),
                prior_cloud: None,
            },
        }
    }

    /// Whether this source selects tolerances adaptively.
    pub fn is_adaptive(&self) -> bool {
        matches!(self, ToleranceSource::Adaptive { .. })
    }

    /// The oversampling count for the first adaptive generation.
    pub fn n_init(&self) -> Option<usize> {
        match self {
            ToleranceSource::Adaptive { n_init, .. } => Some(*n_init),
            ToleranceSource::Schedule { .. } => None,
        }
    }

    /// The first generation's tolerance, when the source prescribes one.
    ///
    /// Adaptive mode returns `None`: the first tolerance is derived from the
    /// sorted oversample inside the fit loop.
    pub fn initial(&mut self) -> Option<Array1<f64>> {
        match self {
            ToleranceSource::Schedule { matrix, next } => {
                let column = matrix.column(*next).to_owned();
                *next += 1;
                Some(column)
            }
            ToleranceSource::Adaptive { .. } => None,
        }
    }

    /// Record the full prior-draw cloud of the oversampled first generation;
    /// it plays the denominator in the first adaptive KLIEP fit.
    pub fn set_prior_cloud(&mut self, cloud: Array2<f64>) {
        if let ToleranceSource::Adaptive { prior_cloud, .. } = self {
            *prior_cloud = Some(cloud);
        }
    }

    /// The tolerance for the next generation, or `None` when the run is
    /// finished (schedule exhausted or the adaptive stopping rule fired).
    pub fn next(
        &mut self, store: &ParticleStore, rng: &mut StdRng,
    ) -> AbcResult<Option<Array1<f64>>> {
        match self {
            ToleranceSource::Schedule { matrix, next } => {
                if *next >= matrix.ncols() {
                    return Ok(None);
                }
                let column = matrix.column(*next).to_owned();
                *next += 1;
                Ok(Some(column))
            }
            ToleranceSource::Adaptive { kliep, prior_cloud, .. } => {
                let g = store.len();
                let current = store.last().expect("adaptive next requires a committed generation");
                let xnu = current.x.view();
                let previous_owned;
                let xde: ArrayView2<f64> = if g >= 2 {
                    store.generations()[g - 2].x.view()
                } else {
                    previous_owned = prior_cloud
                        .clone()
                        .expect("the oversample cloud is recorded before the first adaptive step");
                    previous_owned.view()
                };

                let fit = KliepFit::fit(xnu, xde, kliep, rng)?;
                let supremum = sup_density_ratio(&fit, xnu)?;
                if supremum <= 0.0 {
                    return Err(KliepError::Supremum {
                        text: format!("non-positive supremum {supremum}"),
                    }
                    .into());
                }
                let q = (1.0 / supremum).min(1.0);
                if should_stop(q, g) {
                    return Ok(None);
                }

                let n_particles = current.n_particles();
                let rank = ((q * n_particles as f64).ceil() as usize).clamp(1, n_particles);
                let next_tolerance =
                    kth_smallest(summed_distances(current.distance.view()), rank);
                if next_tolerance >= current.tolerance[0] {
                    return Ok(None);
                }
                Ok(Some(array![next_tolerance]))
            }
        }
    }
}

/// The adaptive stopping rule: a near-unit acceptance quantile once enough
/// generations have committed.
pub fn should_stop(q: f64, generations: usize) -> bool {
    q > ADAPTIVE_STOP_Q && generations >= ADAPTIVE_MIN_GENERATIONS
}

/// Row sums of a distance matrix.
pub fn summed_distances(distance: ArrayView2<f64>) -> Array1<f64> {
    distance.rows().into_iter().map(|row| row.sum()).collect()
}

/// The `rank`-th smallest value (1-based) of `values`.
pub fn kth_smallest(values: Array1<f64>, rank: usize) -> f64 {
    let mut sorted: Vec<f64> = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("distances are finite"));
    sorted[rank - 1]
}

/// Numerically maximize the fitted density ratio over the numerator support.
pub fn sup_density_ratio(fit: &KliepFit, xnu: ArrayView2<f64>) -> AbcResult<f64> {
    if xnu.ncols() == 1 {
        let column = xnu.column(0);
        let lo = column.iter().cloned().fold(f64::INFINITY, f64::min);
        let hi = column.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        run_brent(fit, lo, hi)
    } else {
        run_nelder_mead(fit, xnu.row(0))
    }
}

struct NegRatio1d<'a> {
    fit: &'a KliepFit,
}

impl CostFunction for NegRatio1d<'_> {
    type Param = f64;
    type Output = f64;

    fn cost(&self, param: &f64) -> Result<f64, Error> {
        Ok(-self.fit.density_ratio(ndarray::aview1(std::slice::from_ref(param))))
    }
}

struct NegRatio<'a> {
    fit: &'a KliepFit,
}

impl CostFunction for NegRatio<'_> {
    type Param = Array1<f64>;
    type Output = f64;

    fn cost(&self, param: &Array1<f64>) -> Result<f64, Error> {
        Ok(-self.fit.density_ratio(param.view()))
    }
}

/// Bracketed scalar search on `[lo, hi]`, translated back to the supremum.
fn run_brent(fit: &KliepFit, lo: f64, hi: f64) -> AbcResult<f64> {
    if !(lo < hi) {
        // A single-support bracket degenerates to evaluating the point.
        return Ok(fit.density_ratio(ndarray::aview1(&[lo])));
    }
    let solver = BrentOpt::new(lo, hi);
    let result = Executor::new(NegRatio1d { fit }, solver)
        .configure(|state| state.max_iters(SUPREMUM_MAX_ITERS))
        .run()
        .map_err(|e| KliepError::Supremum { text: e.to_string() })?;
    Ok(-result.state().get_best_cost())
}

/// Derivative-free simplex search seeded at `x0`.
fn run_nelder_mead(fit: &KliepFit, x0: ArrayView1<f64>) -> AbcResult<f64> {
    let k = x0.len();
    let mut simplex = Vec::with_capacity(k + 1);
    simplex.push(x0.to_owned());
    for i in 0..k {
        let mut vertex = x0.to_owned();
        vertex[i] += 0.1 * vertex[i].abs().max(1.0);
        simplex.push(vertex);
    }
    let solver = NelderMead::new(simplex)
        .with_sd_tolerance(NELDER_MEAD_SD_TOL)
        .map_err(|e| KliepError::Supremum { text: e.to_string() })?;
    let result = Executor::new(NegRatio { fit }, solver)
        .configure(|state| state.max_iters(SUPREMUM_MAX_ITERS))
        .run()
        .map_err(|e| KliepError::Supremum { text: e.to_string() })?;
    Ok(-result.state().get_best_cost())
}
