//! smc::errors — unified error taxonomy for the ABC-SMC core.
//!
//! Purpose
//! -------
//! Define the error surface of the particle loop and its supporting
//! machinery, and normalize errors from the event, prior, and simulator
//! layers into a single enum [`AbcError`]. The taxonomy mirrors how the
//! engine reacts to each failure:
//!
//! - *Construction* errors (tables, priors, options) are never retried and
//!   surface to the caller before any generation runs.
//! - *Simulation* failures are recoverable: individual trajectories are
//!   discarded and their proposals retried, until the per-generation failure
//!   budget is exhausted.
//! - *Distance* and *tolerance* errors are fatal; the in-progress generation
//!   is discarded and every committed generation stays intact.
//! - *Cancellation* surfaces as its own variant so callers can distinguish a
//!   deliberate stop from a failure.
//!
//! Conventions
//! -----------
//! - `Display` messages are user-facing; tests should not pin exact wording.
//! - `From` impls collapse module errors into `AbcError` so `?` works across
//!   the whole engine.
use crate::events::EventError;
use crate::priors::PriorError;
use crate::simulator::SimError;

/// Crate-wide result alias for ABC operations.
pub type AbcResult<T> = Result<T, AbcError>;

/// `DistanceError` — invalid output from the user distance callback.
///
/// All variants are fatal: a distance function that misbehaves once cannot
/// be trusted for the rest of the run.
#[derive(Debug, Clone, PartialEq)]
pub enum DistanceError {
    EmptyOutput,
    RowCountMismatch { expected: usize, actual: usize },
    WidthChanged { expected: usize, actual: usize },
    AdaptiveRequiresSingleStatistic { actual: usize },
    NonFiniteEntry { row: usize, col: usize, value: f64 },
    NegativeEntry { row: usize, col: usize, value: f64 },
    ExceedsTolerance { row: usize, col: usize, value: f64, tolerance: f64 },
    Evaluation { message: String },
}

impl std::fmt::Display for DistanceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DistanceError::EmptyOutput => {
                write!(f, "Distance function returned an empty result")
            }
            DistanceError::RowCountMismatch { expected, actual } => {
                write!(f, "Distance function returned {actual} rows, expected {expected}")
            }
            DistanceError::WidthChanged { expected, actual } => {
                write!(
                    f,
                    "Distance function changed its number of summary statistics: \
                     first call returned {expected}, later call {actual}"
                )
            }
            DistanceError::AdaptiveRequiresSingleStatistic { actual } => {
                write!(
                    f,
                    "Adaptive tolerance selection requires exactly one summary statistic, \
                     but the distance function returned {actual}"
                )
            }
            DistanceError::NonFiniteEntry { row, col, value } => {
                write!(f, "Non-finite distance {value} at ({row}, {col})")
            }
            DistanceError::NegativeEntry { row, col, value } => {
                write!(f, "Negative distance {value} at ({row}, {col})")
            }
            DistanceError::ExceedsTolerance { row, col, value, tolerance } => {
                write!(
                    f,
                    "Distance {value} at ({row}, {col}) exceeds the tolerance {tolerance} \
                     it was committed under"
                )
            }
            DistanceError::Evaluation { message } => {
                write!(f, "Distance function failed: {message}")
            }
        }
    }
}

/// `ToleranceError` — invalid tolerance schedules or adaptive settings.
#[derive(Debug, Clone, PartialEq)]
pub enum ToleranceError {
    EmptySchedule,
    NonFinite { statistic: usize, generation: usize, value: f64 },
    NotDecreasing { statistic: usize, generation: usize, previous: f64, value: f64 },
    WrongDimensions { expected_rows: usize, actual_rows: usize },
    InvalidNInit { n_init: usize, n_particles: usize },
    ContinueRequiresCommittedGeneration,
}

impl std::fmt::Display for ToleranceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToleranceError::EmptySchedule => {
                write!(f, "Tolerance schedule must contain at least one generation column")
            }
            ToleranceError::NonFinite { statistic, generation, value } => {
                write!(
                    f,
                    "Tolerance for statistic {statistic}, generation {generation} is {value}: \
                     must be finite and positive"
                )
            }
            ToleranceError::NotDecreasing { statistic, generation, previous, value } => {
                write!(
                    f,
                    "Tolerance for statistic {statistic} must be strictly decreasing: \
                     generation {generation} has {value}, previous was {previous}"
                )
            }
            ToleranceError::WrongDimensions { expected_rows, actual_rows } => {
                write!(
                    f,
                    "Tolerance matrix has {actual_rows} statistic rows, expected {expected_rows}"
                )
            }
            ToleranceError::InvalidNInit { n_init, n_particles } => {
                write!(
                    f,
                    "Adaptive tolerance requires n_init > n_particles, \
                     got n_init = {n_init}, n_particles = {n_particles}"
                )
            }
            ToleranceError::ContinueRequiresCommittedGeneration => {
                write!(f, "continue_abc requires at least one committed generation")
            }
        }
    }
}

/// `KliepError` — density-ratio estimation and supremum-search failures.
#[derive(Debug, Clone, PartialEq)]
pub enum KliepError {
    TooFewSamples { n_nu: usize, n_de: usize },
    DimensionMismatch { nu_cols: usize, de_cols: usize },
    DegenerateKernel { sigma: f64 },
    InfeasibleConstraint,
    Supremum { text: String },
}

impl std::fmt::Display for KliepError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KliepError::TooFewSamples { n_nu, n_de } => {
                write!(
                    f,
                    "Density-ratio estimation needs at least two samples on each side, \
                     got {n_nu} numerator and {n_de} denominator rows"
                )
            }
            KliepError::DimensionMismatch { nu_cols, de_cols } => {
                write!(
                    f,
                    "Numerator and denominator samples disagree in dimension: \
                     {nu_cols} vs {de_cols}"
                )
            }
            KliepError::DegenerateKernel { sigma } => {
                write!(f, "Kernel bandwidth {sigma} is degenerate: all samples coincide")
            }
            KliepError::InfeasibleConstraint => {
                write!(f, "Cannot satisfy the unit-mean constraint on the denominator sample")
            }
            KliepError::Supremum { text } => {
                write!(f, "Density-ratio supremum search failed: {text}")
            }
        }
    }
}

/// `AbcError` — unified error enum for the ABC-SMC engine.
///
/// Variants
/// --------
/// Construction:
/// - `Event` / `Prior` — table and prior failures, absorbed unchanged.
/// - `InvalidParticleCount` — `n_particles < 2`.
/// - `InitModelWithLdataTarget` — the init-model hook combined with a
///   per-node parameter target.
/// - `FitAlreadyRun` — `fit` invoked on a state that has committed
///   generations (use `continue_abc`).
///
/// Run-time:
/// - `Simulation` — a simulator handle misconfiguration (non-recoverable
///   variants of [`SimError`]).
/// - `SimulationBudgetExceeded` — too many recoverable trajectory failures
///   within one generation.
/// - `Distance` / `Tolerance` / `Kliep` — fatal validation failures from the
///   corresponding components.
/// - `DegenerateWeights` — the importance-weight update produced a zero or
///   non-finite normalizing sum.
/// - `KernelNotPositiveDefinite` — Cholesky failed on the perturbation
///   covariance even after ridge regularization.
/// - `ProposalRetriesExhausted` — the perturbation kernel kept leaving the
///   prior support.
/// - `Cancelled` — the cancellation token fired; committed generations
///   remain valid.
/// - `Callback` — an init-model or post-gen hook failed.
#[derive(Debug, Clone, PartialEq)]
pub enum AbcError {
    // ---- Construction ----
    Event(EventError),
    Prior(PriorError),
    InvalidParticleCount { n_particles: usize },
    InitModelWithLdataTarget,
    FitAlreadyRun,

    // ---- Simulation ----
    Simulation(SimError),
    SimulationBudgetExceeded { failures: usize, budget: usize, last: String },

    // ---- Distance ----
    Distance(DistanceError),

    // ---- Tolerance ----
    Tolerance(ToleranceError),

    // ---- Density ratio ----
    Kliep(KliepError),

    // ---- Numerical ----
    DegenerateWeights { sum: f64 },
    KernelNotPositiveDefinite { dim: usize },
    ProposalRetriesExhausted { retries: usize },

    // ---- Control ----
    Cancelled,
    Callback { message: String },
}

impl std::error::Error for AbcError {}

impl std::fmt::Display for AbcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Construction ----
            AbcError::Event(e) => write!(f, "{e}"),
            AbcError::Prior(e) => write!(f, "{e}"),
            AbcError::InvalidParticleCount { n_particles } => {
                write!(f, "Invalid particle count {n_particles}: must be at least 2")
            }
            AbcError::InitModelWithLdataTarget => {
                write!(f, "An init-model hook cannot be combined with an ldata parameter target")
            }
            AbcError::FitAlreadyRun => {
                write!(f, "fit has already run; use continue_abc to extend the schedule")
            }

            // ---- Simulation ----
            AbcError::Simulation(e) => write!(f, "{e}"),
            AbcError::SimulationBudgetExceeded { failures, budget, last } => {
                write!(
                    f,
                    "Simulation failure budget exceeded: {failures} failures \
                     (budget {budget}); last error: {last}"
                )
            }

            // ---- Distance ----
            AbcError::Distance(e) => write!(f, "{e}"),

            // ---- Tolerance ----
            AbcError::Tolerance(e) => write!(f, "{e}"),

            // ---- Density ratio ----
            AbcError::Kliep(e) => write!(f, "{e}"),

            // ---- Numerical ----
            AbcError::DegenerateWeights { sum } => {
                write!(f, "Importance weights degenerate: normalizing sum is {sum}")
            }
            AbcError::KernelNotPositiveDefinite { dim } => {
                write!(
                    f,
                    "Perturbation covariance ({dim} x {dim}) is not positive definite \
                     after ridge regularization"
                )
            }
            AbcError::ProposalRetriesExhausted { retries } => {
                write!(
                    f,
                    "Gave up proposing after {retries} perturbations landed outside \
                     the prior support"
                )
            }

            // ---- Control ----
            AbcError::Cancelled => write!(f, "Run cancelled"),
            AbcError::Callback { message } => write!(f, "User callback failed: {message}"),
        }
    }
}

impl From<EventError> for AbcError {
    fn from(e: EventError) -> Self {
        AbcError::Event(e)
    }
}

impl From<PriorError> for AbcError {
    fn from(e: PriorError) -> Self {
        AbcError::Prior(e)
    }
}

impl From<SimError> for AbcError {
    fn from(e: SimError) -> Self {
        AbcError::Simulation(e)
    }
}

impl From<DistanceError> for AbcError {
    fn from(e: DistanceError) -> Self {
        AbcError::Distance(e)
    }
}

impl From<ToleranceError> for AbcError {
    fn from(e: ToleranceError) -> Self {
        AbcError::Tolerance(e)
    }
}

impl From<KliepError> for AbcError {
    fn from(e: KliepError) -> Self {
        AbcError::Kliep(e)
    }
}

impl From<anyhow::Error> for AbcError {
    fn from(e: anyhow::Error) -> Self {
        AbcError::Callback { message: e.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - `From` conversions collapsing module errors into `AbcError`.
    // - Display formatting including key payload fields.
    //
    // They intentionally DO NOT cover:
    // - Every variant's exact wording, which may evolve.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Module errors convert into the matching `AbcError` variant with the
    // payload preserved.
    //
    // Given
    // -----
    // - An `EventError`, a `PriorError`, and a `ToleranceError`.
    //
    // Expect
    // ------
    // - `AbcError::Event`, `AbcError::Prior`, and `AbcError::Tolerance`
    //   wrapping the originals.
    fn from_module_errors_maps_to_matching_variants() {
        // Arrange
        let event = EventError::InvalidTime { row: 3, value: 0 };
        let prior = PriorError::EmptySet;
        let tolerance = ToleranceError::EmptySchedule;

        // Act
        let abc_event: AbcError = event.clone().into();
        let abc_prior: AbcError = prior.clone().into();
        let abc_tolerance: AbcError = tolerance.clone().into();

        // Assert
        assert_eq!(abc_event, AbcError::Event(event));
        assert_eq!(abc_prior, AbcError::Prior(prior));
        assert_eq!(abc_tolerance, AbcError::Tolerance(tolerance));
    }

    #[test]
    // Purpose
    // -------
    // Display output names the offending quantities for debugging.
    //
    // Given
    // -----
    // - A `SimulationBudgetExceeded` and a `NotDecreasing` tolerance error.
    //
    // Expect
    // ------
    // - The rendered strings include the failure count, budget, statistic
    //   index, and both tolerance values.
    fn display_includes_key_fields() {
        // Arrange
        let budget = AbcError::SimulationBudgetExceeded {
            failures: 12,
            budget: 10,
            last: "kernel panic".to_string(),
        };
        let not_decreasing = ToleranceError::NotDecreasing {
            statistic: 0,
            generation: 2,
            previous: 0.5,
            value: 0.6,
        };

        // Act
        let budget_msg = format!("{budget}");
        let tol_msg = format!("{not_decreasing}");

        // Assert
        assert!(budget_msg.contains("12"));
        assert!(budget_msg.contains("10"));
        assert!(budget_msg.contains("kernel panic"));
        assert!(tol_msg.contains("0.5"));
        assert!(tol_msg.contains("0.6"));
    }
}
