//! The simulator capability trait.
//!
//! Purpose
//! -------
//! Define the seam between the inference engine and the stochastic simulator.
//! The engine writes parameter values into the model's `gdata`/`ldata` slots,
//! optionally replicates the first node, hands over the scheduled-event table,
//! and receives an opaque trajectory in return. It never inspects trajectory
//! internals; they flow straight into the user's distance callback.
//!
//! Invariants & assumptions
//! ------------------------
//! - Implementations are `Clone + Send + Sync`: the engine holds independent
//!   clones on parallel workers, each mutated and run in isolation.
//! - `run` consumes the handle's current parameter state; the engine always
//!   clones a fresh handle per trajectory, so implementations need not reset
//!   state between runs.
//! - All randomness used by `run` must come from the provided `StdRng`, so a
//!   fitted run is reproducible given the engine seed.
use crate::events::EventTable;
use crate::simulator::errors::SimResult;
use rand::rngs::StdRng;

/// A compiled stochastic compartment model the engine can parameterize and
/// run.
///
/// `replicate_first_node(n)` must clone column 0 of the model's initial
/// state (`u0`, `v0`) and of `ldata` `n` times, so one trajectory carries `n`
/// independent first-node copies. The engine replicates the scheduled events
/// separately through [`EventTable::replicate_first_node`] and passes the
/// replicated table to `run`.
pub trait Simulator: Clone + Send + Sync {
    /// The opaque trajectory type produced by `run`.
    type Trajectory: Send;

    /// Names of the global parameters, in `gdata` slot order.
    fn gdata_names(&self) -> Vec<String>;

    /// Names of the per-node parameters, in `ldata` row order.
    fn ldata_names(&self) -> Vec<String>;

    /// Number of nodes currently in the model.
    fn n_nodes(&self) -> usize;

    /// Write a scalar into the global parameter vector.
    fn set_gdata(&mut self, index: usize, value: f64) -> SimResult<()>;

    /// Write a scalar into row `index`, column `node` of the local parameter
    /// matrix.
    fn set_ldata(&mut self, index: usize, node: usize, value: f64) -> SimResult<()>;

    /// Clone the first node's initial state and `ldata` column `n` times.
    fn replicate_first_node(&mut self, n: usize) -> SimResult<()>;

    /// Execute one stochastic trajectory under the current parameters and the
    /// given scheduled events.
    fn run(&mut self, events: &EventTable, rng: &mut StdRng) -> SimResult<Self::Trajectory>;
}
