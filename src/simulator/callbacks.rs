//! User callback capabilities: distance, model initialization, and
//! per-generation hooks.
//!
//! Each capability is a small trait with a blanket implementation for the
//! matching closure shape, so callers can pass either a concrete type or a
//! function. The engine owns the observed data from construction and passes
//! it into every distance call alongside the trajectory and the 1-based
//! generation index, the same way the optimization layer of a fitting
//! library threads its data through each likelihood evaluation.
use crate::simulator::model::Simulator;
use crate::smc::fit::AbcState;
use ndarray::{Array1, Array2};

/// What a distance callback may return: one summary statistic per simulated
/// particle (a length-`n` vector) or `S` statistics (an `n x S` matrix).
#[derive(Debug, Clone, PartialEq)]
pub enum DistanceOutput {
    Vector(Array1<f64>),
    Matrix(Array2<f64>),
}

impl From<Array1<f64>> for DistanceOutput {
    fn from(v: Array1<f64>) -> Self {
        DistanceOutput::Vector(v)
    }
}

impl From<Array2<f64>> for DistanceOutput {
    fn from(m: Array2<f64>) -> Self {
        DistanceOutput::Matrix(m)
    }
}

/// Distance between one simulated trajectory and the observed data.
///
/// `generation` is the 1-based index of the generation being built; `data`
/// is the observed dataset the engine was constructed with, passed through
/// unchanged on every call. The returned rows must line up with the
/// particles encoded in the trajectory: one row for a global-parameter run,
/// one row per replicated first-node copy otherwise.
///
/// `Data` is a trait parameter rather than an associated type so that plain
/// closures `Fn(&T, usize, &Data)` can implement the capability.
pub trait Distance<T, Data>: Send + Sync {
    fn distance(
        &self, trajectory: &T, generation: usize, data: &Data,
    ) -> anyhow::Result<DistanceOutput>;
}

impl<T, Data, F> Distance<T, Data> for F
where
    F: Fn(&T, usize, &Data) -> anyhow::Result<DistanceOutput> + Send + Sync,
{
    fn distance(
        &self, trajectory: &T, generation: usize, data: &Data,
    ) -> anyhow::Result<DistanceOutput> {
        self(trajectory, generation, data)
    }
}

/// Hook applied to a freshly cloned model before each proposal's run.
///
/// Rejected at construction when the parameter target is `ldata`: a
/// replicated model carries many particles, and a per-run mutation hook has
/// no per-particle meaning there.
pub trait InitModel<M: Simulator>: Send + Sync {
    fn init(&self, model: &mut M) -> anyhow::Result<()>;
}

impl<M, F> InitModel<M> for F
where
    M: Simulator,
    F: Fn(&mut M) -> anyhow::Result<()> + Send + Sync,
{
    fn init(&self, model: &mut M) -> anyhow::Result<()> {
        self(model)
    }
}

/// Hook invoked after each committed generation with the engine state: the
/// bound priors, the committed particle history, the tolerance history, and
/// the index of the generation that just committed (see [`AbcState`]).
pub trait PostGen: Send + Sync {
    fn post_gen(&self, state: &AbcState<'_>) -> anyhow::Result<()>;
}

impl<F> PostGen for F
where
    F: Fn(&AbcState<'_>) -> anyhow::Result<()> + Send + Sync,
{
    fn post_gen(&self, state: &AbcState<'_>) -> anyhow::Result<()> {
        self(state)
    }
}
