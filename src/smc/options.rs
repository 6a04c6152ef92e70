//! Run configuration for the ABC-SMC engine.
//!
//! This module bundles every estimation knob into [`AbcOptions`]: the
//! particle count, the tolerance specification (an explicit schedule or the
//! adaptive selector), the RNG seed, the per-generation simulation-failure
//! budget, and the density-ratio settings used by adaptive selection.
//! Validation happens in the constructors; the fit loop assumes
//! already-validated options.
use crate::smc::errors::{AbcError, AbcResult, ToleranceError};
use crate::smc::kliep::KliepOptions;
use ndarray::{Array2, ArrayView1, ArrayView2};

/// Default per-generation budget of recoverable simulation failures.
pub const DEFAULT_MAX_FAILURES: usize = 1000;

/// How the tolerance sequence is determined.
#[derive(Debug, Clone, PartialEq)]
pub enum ToleranceSpec {
    /// An explicit `s x g` matrix, one column per generation, validated to be
    /// strictly decreasing along every row.
    Schedule(Array2<f64>),
    /// Adaptive selection: oversample `n_init` prior draws for the first
    /// generation, then pick tolerances from the KLIEP supremum rule.
    Adaptive { n_init: usize },
}

/// Configuration for one ABC-SMC fit.
///
/// Build through [`AbcOptions::with_schedule`] or [`AbcOptions::adaptive`];
/// both validate their inputs. The setter-style methods adjust the optional
/// knobs after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct AbcOptions {
    /// Number of particles per committed generation.
    pub n_particles: usize,
    /// Tolerance schedule or adaptive selection.
    pub tolerance: ToleranceSpec,
    /// Seed for every stochastic component of the engine.
    pub seed: u64,
    /// Per-generation budget of recoverable simulation failures.
    pub max_failures: usize,
    /// Emit per-generation progress through the `log` facade.
    pub verbose: bool,
    /// Density-ratio settings used by the adaptive selector.
    pub kliep: KliepOptions,
}

impl AbcOptions {
    /// Options with an explicit tolerance schedule.
    ///
    /// # Errors
    /// - [`AbcError::InvalidParticleCount`] if `n_particles < 2`.
    /// - [`AbcError::Tolerance`] if the schedule is empty, non-finite,
    ///   non-positive, or not strictly decreasing along a row.
    pub fn with_schedule(n_particles: usize, schedule: Array2<f64>, seed: u64) -> AbcResult<Self> {
        validate_particle_count(n_particles)?;
        validate_schedule(schedule.view(), None, 0)?;
        Ok(AbcOptions {
            n_particles,
            tolerance: ToleranceSpec::Schedule(schedule),
            seed,
            max_failures: DEFAULT_MAX_FAILURES,
            verbose: false,
            kliep: KliepOptions::default(),
        })
    }

    /// Options with adaptive tolerance selection.
    ///
    /// # Errors
    /// - [`AbcError::InvalidParticleCount`] if `n_particles < 2`.
    /// - [`AbcError::Tolerance`] with [`ToleranceError::InvalidNInit`] unless
    ///   `n_init > n_particles`.
    pub fn adaptive(n_particles: usize, n_init: usize, seed: u64) -> AbcResult<Self> {
        validate_particle_count(n_particles)?;
        if n_init <= n_particles {
            return Err(ToleranceError::InvalidNInit { n_init, n_particles }.into());
        }
        Ok(AbcOptions {
            n_particles,
            tolerance: ToleranceSpec::Adaptive { n_init },
            seed,
            max_failures: DEFAULT_MAX_FAILURES,
            verbose: false,
            kliep: KliepOptions::default(),
        })
    }

    /// Replace the per-generation simulation-failure budget.
    pub fn with_max_failures(mut self, max_failures: usize) -> Self {
        self.max_failures = max_failures;
        self
    }

    /// Enable per-generation progress logging.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Replace the density-ratio settings used by the adaptive selector.
    pub fn with_kliep(mut self, kliep: KliepOptions) -> Self {
        self.kliep = kliep;
        self
    }
}

fn validate_particle_count(n_particles: usize) -> AbcResult<()> {
    if n_particles < 2 {
        return Err(AbcError::InvalidParticleCount { n_particles });
    }
    Ok(())
}

/// Validate a tolerance schedule: finite, positive, strictly decreasing per
/// row, and (when `previous` is given, as in `continue_abc`) strictly below
/// the last committed column. `offset` shifts the generation index reported
/// in errors.
pub(crate) fn validate_schedule(
    schedule: ArrayView2<f64>, previous: Option<ArrayView1<f64>>, offset: usize,
) -> AbcResult<()> {
    if schedule.ncols() == 0 || schedule.nrows() == 0 {
        return Err(ToleranceError::EmptySchedule.into());
    }
    if let Some(previous) = previous {
        if previous.len() != schedule.nrows() {
            return Err(ToleranceError::WrongDimensions {
                expected_rows: previous.len(),
                actual_rows: schedule.nrows(),
            }
            .into());
        }
    }
    for (statistic, row) in schedule.rows().into_iter().enumerate() {
        let mut last = previous.map(|p| p[statistic]);
        for (generation, &value) in row.iter().enumerate() {
            if !value.is_finite() || value <= 0.0 {
                return Err(ToleranceError::NonFinite {
                    statistic,
                    generation: offset + generation + 1,
                    value,
                }
                .into());
            }
            if let Some(last) = last {
                if value >= last {
                    return Err(ToleranceError::NotDecreasing {
                        statistic,
                        generation: offset + generation + 1,
                        previous: last,
                        value,
                    }
                    .into());
                }
            }
            last = Some(value);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Constructor validation for both tolerance modes.
    // - Schedule validation, including continuation against a previous
    //   column.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Valid schedules construct; invalid ones name the violation.
    //
    // Given
    // -----
    // - A strictly decreasing schedule, then non-decreasing, non-positive,
    //   and empty variants, and a sub-minimal particle count.
    //
    // Expect
    // ------
    // - Ok, then `NotDecreasing`, `NonFinite`, `EmptySchedule`, and
    //   `InvalidParticleCount`.
    fn with_schedule_validates_inputs() {
        // Act / Assert
        assert!(AbcOptions::with_schedule(10, array![[0.5, 0.3, 0.1]], 1).is_ok());
        assert!(matches!(
            AbcOptions::with_schedule(10, array![[0.5, 0.5]], 1),
            Err(AbcError::Tolerance(ToleranceError::NotDecreasing { .. }))
        ));
        assert!(matches!(
            AbcOptions::with_schedule(10, array![[0.5, 0.0]], 1),
            Err(AbcError::Tolerance(ToleranceError::NonFinite { .. }))
        ));
        assert!(matches!(
            AbcOptions::with_schedule(10, Array2::zeros((1, 0)), 1),
            Err(AbcError::Tolerance(ToleranceError::EmptySchedule))
        ));
        assert!(matches!(
            AbcOptions::with_schedule(1, array![[0.5]], 1),
            Err(AbcError::InvalidParticleCount { n_particles: 1 })
        ));
    }

    #[test]
    // Purpose
    // -------
    // Adaptive mode requires n_init strictly above the particle count.
    //
    // Given
    // -----
    // - n_init equal to and above n_particles.
    //
    // Expect
    // ------
    // - `InvalidNInit` then Ok, with the default failure budget installed.
    fn adaptive_validates_n_init() {
        // Act / Assert
        assert!(matches!(
            AbcOptions::adaptive(50, 50, 1),
            Err(AbcError::Tolerance(ToleranceError::InvalidNInit { .. }))
        ));
        let options = AbcOptions::adaptive(50, 500, 1).unwrap();
        assert_eq!(options.max_failures, DEFAULT_MAX_FAILURES);
        assert_eq!(options.tolerance, ToleranceSpec::Adaptive { n_init: 500 });
    }

    #[test]
    // Purpose
    // -------
    // Continuation schedules must start strictly below the last committed
    // tolerance and keep the statistic dimension.
    //
    // Given
    // -----
    // - A previous column [0.4, 0.2]; continuation columns above, equal to,
    //   and below it, plus one with the wrong row count.
    //
    // Expect
    // ------
    // - `NotDecreasing` for the first two, Ok for the third,
    //   `WrongDimensions` for the fourth.
    fn validate_schedule_checks_continuation() {
        // Arrange
        let previous = array![0.4, 0.2];

        // Act / Assert
        assert!(matches!(
            validate_schedule(array![[0.5], [0.1]].view(), Some(previous.view()), 2),
            Err(AbcError::Tolerance(ToleranceError::NotDecreasing { statistic: 0, .. }))
        ));
        assert!(matches!(
            validate_schedule(array![[0.3], [0.2]].view(), Some(previous.view()), 2),
            Err(AbcError::Tolerance(ToleranceError::NotDecreasing { statistic: 1, .. }))
        ));
        assert!(
            validate_schedule(array![[0.3], [0.1]].view(), Some(previous.view()), 2).is_ok()
        );
        assert!(matches!(
            validate_schedule(array![[0.3]].view(), Some(previous.view()), 2),
            Err(AbcError::Tolerance(ToleranceError::WrongDimensions { .. }))
        ));
    }
}
