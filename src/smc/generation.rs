//! Accepted-particle history: generations and the particle store.
//!
//! Purpose
//! -------
//! Hold the committed output of the ABC-SMC loop: one [`Generation`] per
//! tolerance step, each carrying the accepted particles, their normalized
//! importance weights, the distance matrix, the tolerance vector, the
//! effective sample size, and the proposal count. The [`ParticleStore`]
//! appends generations in O(1) and materializes the particles-by-generation
//! 3-D view only on demand.
//!
//! Invariants & assumptions
//! ------------------------
//! Enforced by [`ParticleStore::push_generation`] on every commit:
//! - Row counts agree across `x`, `weight`, and `distance`, and match the
//!   first generation's particle count.
//! - Weights are non-negative and sum to 1 within `WEIGHT_SUM_TOL`.
//! - `ess` equals `1 / sum(w_i^2)` within `ESS_TOL`.
//! - Every accepted particle satisfies `d <= epsilon` componentwise.
//! - Each tolerance component strictly decreases from the previous
//!   generation.
//! - `nprop >= n_particles`, so the reported acceptance rate lies in (0, 1].
use crate::smc::errors::{AbcError, AbcResult, DistanceError, ToleranceError};
use ndarray::{Array1, Array2, Array3, ArrayView1};
use serde::{Deserialize, Serialize};

/// Tolerance used when checking that committed weights sum to 1.
pub const WEIGHT_SUM_TOL: f64 = 1e-10;

/// Tolerance used when checking the stored effective sample size.
pub const ESS_TOL: f64 = 1e-8;

/// One committed generation of the particle population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    /// Accepted particles, one row per particle (`n_particles x k`).
    pub x: Array2<f64>,
    /// Normalized importance weights (`n_particles`).
    pub weight: Array1<f64>,
    /// Distances per particle and summary statistic (`n_particles x s`).
    pub distance: Array2<f64>,
    /// Per-statistic tolerance this generation was accepted under (`s`).
    pub tolerance: Array1<f64>,
    /// Effective sample size `1 / sum(w_i^2)`.
    pub ess: f64,
    /// Number of proposals evaluated to produce this generation.
    pub nprop: usize,
}

impl Generation {
    /// Number of particles in this generation.
    pub fn n_particles(&self) -> usize {
        self.x.nrows()
    }

    /// Particle dimension `k`.
    pub fn n_params(&self) -> usize {
        self.x.ncols()
    }

    /// Number of summary statistics `s`.
    pub fn n_statistics(&self) -> usize {
        self.distance.ncols()
    }

    /// Weighted posterior mean of the particle cloud.
    pub fn weighted_mean(&self) -> Array1<f64> {
        let mut mean = Array1::zeros(self.n_params());
        for (row, &w) in self.x.rows().into_iter().zip(self.weight.iter()) {
            mean.scaled_add(w, &row);
        }
        mean
    }
}

/// The ordered history of committed generations.
///
/// Mutated only through [`ParticleStore::push_generation`]; every accessor
/// sees populations that satisfy the module invariants.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParticleStore {
    generations: Vec<Generation>,
}

impl ParticleStore {
    /// An empty store.
    pub fn new() -> Self {
        ParticleStore { generations: Vec::new() }
    }

    /// Validate and append a generation.
    ///
    /// # Errors
    /// - [`AbcError::DegenerateWeights`] if the weights are negative,
    ///   non-finite, or do not sum to 1, or if the stored `ess` disagrees
    ///   with the weights.
    /// - [`AbcError::Tolerance`] with [`ToleranceError::NotDecreasing`] /
    ///   [`ToleranceError::WrongDimensions`] if the tolerance vector does not
    ///   strictly decrease or changes width.
    /// - [`AbcError::Distance`] if any stored distance is non-finite or
    ///   exceeds the tolerance it claims to have been accepted under.
    pub fn push_generation(&mut self, generation: Generation) -> AbcResult<()> {
        let n = generation.n_particles();
        if generation.weight.len() != n || generation.distance.nrows() != n {
            return Err(AbcError::Tolerance(ToleranceError::WrongDimensions {
                expected_rows: n,
                actual_rows: generation.weight.len().min(generation.distance.nrows()),
            }));
        }
        if generation.distance.ncols() != generation.tolerance.len() {
            return Err(AbcError::Tolerance(ToleranceError::WrongDimensions {
                expected_rows: generation.distance.ncols(),
                actual_rows: generation.tolerance.len(),
            }));
        }

        let sum: f64 = generation.weight.sum();
        if generation.weight.iter().any(|&w| !w.is_finite() || w < 0.0)
            || (sum - 1.0).abs() > WEIGHT_SUM_TOL
        {
            return Err(AbcError::DegenerateWeights { sum });
        }
        let ess = effective_sample_size(generation.weight.view());
        if (generation.ess - ess).abs() > ESS_TOL {
            return Err(AbcError::DegenerateWeights { sum: generation.ess });
        }

        for (row, d) in generation.distance.rows().into_iter().enumerate() {
            for (col, (&value, &tol)) in d.iter().zip(generation.tolerance.iter()).enumerate() {
                if !value.is_finite() {
                    return Err(AbcError::Distance(DistanceError::NonFiniteEntry {
                        row,
                        col,
                        value,
                    }));
                }
                if value > tol {
                    return Err(AbcError::Distance(DistanceError::ExceedsTolerance {
                        row,
                        col,
                        value,
                        tolerance: tol,
                    }));
                }
            }
        }

        if let Some(previous) = self.generations.last() {
            if previous.n_statistics() != generation.n_statistics() {
                return Err(AbcError::Tolerance(ToleranceError::WrongDimensions {
                    expected_rows: previous.n_statistics(),
                    actual_rows: generation.n_statistics(),
                }));
            }
            for (statistic, (&current, &prior)) in
                generation.tolerance.iter().zip(previous.tolerance.iter()).enumerate()
            {
                if !(current < prior) {
                    return Err(AbcError::Tolerance(ToleranceError::NotDecreasing {
                        statistic,
                        generation: self.generations.len() + 1,
                        previous: prior,
                        value: current,
                    }));
                }
            }
        }

        self.generations.push(generation);
        Ok(())
    }

    /// Number of committed generations.
    pub fn len(&self) -> usize {
        self.generations.len()
    }

    /// `true` before the first commit.
    pub fn is_empty(&self) -> bool {
        self.generations.is_empty()
    }

    /// All committed generations, oldest first.
    pub fn generations(&self) -> &[Generation] {
        &self.generations
    }

    /// The most recent committed generation, if any.
    pub fn last(&self) -> Option<&Generation> {
        self.generations.last()
    }

    /// Proposal counts per generation.
    pub fn nprop(&self) -> Vec<usize> {
        self.generations.iter().map(|g| g.nprop).collect()
    }

    /// Effective sample sizes per generation.
    pub fn ess(&self) -> Vec<f64> {
        self.generations.iter().map(|g| g.ess).collect()
    }

    /// Acceptance rate `n_particles / nprop` of generation `g` (0-based).
    pub fn acceptance_rate(&self, g: usize) -> f64 {
        let generation = &self.generations[g];
        generation.n_particles() as f64 / generation.nprop as f64
    }

    /// The `s x g` tolerance history, one column per generation.
    pub fn tolerance_history(&self) -> Array2<f64> {
        let g = self.generations.len();
        let s = self.generations.first().map_or(0, Generation::n_statistics);
        let mut history = Array2::zeros((s, g));
        for (col, generation) in self.generations.iter().enumerate() {
            history.column_mut(col).assign(&generation.tolerance);
        }
        history
    }

    /// Materialize the `n_particles x k x g` particle history on demand.
    pub fn x_3d(&self) -> Array3<f64> {
        let g = self.generations.len();
        let (n, k) = self
            .generations
            .first()
            .map_or((0, 0), |gen| (gen.n_particles(), gen.n_params()));
        let mut out = Array3::zeros((n, k, g));
        for (slab, generation) in self.generations.iter().enumerate() {
            out.slice_mut(ndarray::s![.., .., slab]).assign(&generation.x);
        }
        out
    }
}

/// `1 / sum(w_i^2)` for a normalized weight vector.
pub fn effective_sample_size(weight: ArrayView1<f64>) -> f64 {
    1.0 / weight.iter().map(|w| w * w).sum::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{array, Array2};

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Commit-time invariant enforcement (weights, ess, distances, strictly
    //   decreasing tolerances).
    // - Derived views: tolerance history, 3-D particle history, acceptance
    //   rates, weighted means.
    // - Serde round-tripping of the store.
    //
    // They intentionally DO NOT cover:
    // - How generations are produced; that is the fit loop's concern.
    // -------------------------------------------------------------------------

    fn generation(tolerance: f64, weight: Array1<f64>, nprop: usize) -> Generation {
        let n = weight.len();
        let ess = effective_sample_size(weight.view());
        Generation {
            x: Array2::from_elem((n, 2), 0.5),
            weight,
            distance: Array2::from_elem((n, 1), tolerance / 2.0),
            tolerance: array![tolerance],
            ess,
            nprop,
        }
    }

    #[test]
    // Purpose
    // -------
    // A valid sequence of generations commits, and the derived views have the
    // documented shapes and values.
    //
    // Given
    // -----
    // - Two generations with tolerances 1.0 then 0.5 and uniform weights.
    //
    // Expect
    // ------
    // - `len`, `tolerance_history` (1 x 2), `x_3d` (3 x 2 x 2),
    //   `acceptance_rate` in (0, 1], and `ess` matching `1/sum(w^2)`.
    fn push_commits_and_views_have_expected_shapes() {
        // Arrange
        let mut store = ParticleStore::new();
        let uniform = Array1::from_elem(3, 1.0 / 3.0);

        // Act
        store.push_generation(generation(1.0, uniform.clone(), 9)).unwrap();
        store.push_generation(generation(0.5, uniform, 30)).unwrap();

        // Assert
        assert_eq!(store.len(), 2);
        let history = store.tolerance_history();
        assert_eq!(history.shape(), &[1, 2]);
        assert_relative_eq!(history[(0, 0)], 1.0);
        assert_relative_eq!(history[(0, 1)], 0.5);
        assert_eq!(store.x_3d().shape(), &[3, 2, 2]);
        let rate = store.acceptance_rate(1);
        assert!(rate > 0.0 && rate <= 1.0);
        assert_relative_eq!(rate, 0.1);
        assert_relative_eq!(store.ess()[0], 3.0, epsilon = 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // Commit-time validation rejects each invariant violation.
    //
    // Given
    // -----
    // - Weights not summing to 1, a wrong stored ess, a distance above the
    //   tolerance, and a non-decreasing tolerance.
    //
    // Expect
    // ------
    // - `DegenerateWeights` for the first two, `Distance` for the third, and
    //   `Tolerance(NotDecreasing)` for the fourth.
    fn push_rejects_invariant_violations() {
        // Arrange
        let mut store = ParticleStore::new();
        let uniform = Array1::from_elem(2, 0.5);

        // Act / Assert
        let mut bad_sum = generation(1.0, array![0.5, 0.4], 4);
        bad_sum.ess = effective_sample_size(bad_sum.weight.view());
        assert!(matches!(
            store.push_generation(bad_sum),
            Err(AbcError::DegenerateWeights { .. })
        ));

        let mut bad_ess = generation(1.0, uniform.clone(), 4);
        bad_ess.ess = 5.0;
        assert!(matches!(
            store.push_generation(bad_ess),
            Err(AbcError::DegenerateWeights { .. })
        ));

        let mut too_far = generation(1.0, uniform.clone(), 4);
        too_far.distance[(1, 0)] = 2.0;
        assert!(matches!(store.push_generation(too_far), Err(AbcError::Distance(_))));

        store.push_generation(generation(1.0, uniform.clone(), 4)).unwrap();
        assert!(matches!(
            store.push_generation(generation(1.0, uniform, 4)),
            Err(AbcError::Tolerance(ToleranceError::NotDecreasing { .. }))
        ));
    }

    #[test]
    // Purpose
    // -------
    // The weighted mean respects the weights, not just the particle values.
    //
    // Given
    // -----
    // - Two particles at 0 and 1 with weights 0.25 and 0.75.
    //
    // Expect
    // ------
    // - Weighted mean 0.75 in every coordinate.
    fn weighted_mean_uses_weights() {
        // Arrange
        let generation = Generation {
            x: array![[0.0, 0.0], [1.0, 1.0]],
            weight: array![0.25, 0.75],
            distance: Array2::from_elem((2, 1), 0.1),
            tolerance: array![1.0],
            ess: effective_sample_size(array![0.25, 0.75].view()),
            nprop: 2,
        };

        // Act
        let mean = generation.weighted_mean();

        // Assert
        assert_relative_eq!(mean[0], 0.75, epsilon = 1e-12);
        assert_relative_eq!(mean[1], 0.75, epsilon = 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // The persisted store round-trips through serde with every field intact.
    //
    // Given
    // -----
    // - A store with one committed generation.
    //
    // Expect
    // ------
    // - JSON serialization followed by deserialization compares equal.
    fn store_round_trips_through_serde() {
        // Arrange
        let mut store = ParticleStore::new();
        store.push_generation(generation(1.0, Array1::from_elem(2, 0.5), 6)).unwrap();

        // Act
        let json = serde_json::to_string(&store).expect("serialize");
        let back: ParticleStore = serde_json::from_str(&json).expect("deserialize");

        // Assert
        assert_eq!(back, store);
    }
}
