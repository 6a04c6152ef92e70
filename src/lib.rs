//! abc_smc — ABC-SMC inference for discrete-event compartment simulators.
//!
//! Purpose
//! -------
//! Fit the parameters of a stochastic compartment-model simulator to
//! observed data with Approximate Bayesian Computation Sequential Monte
//! Carlo: repeatedly propose parameter vectors ("particles"), run the
//! simulator, measure a distance to the observations, and evolve a weighted
//! particle population through successively tighter tolerances — supplied as
//! an explicit schedule or chosen adaptively from a KLIEP density ratio
//! between generations.
//!
//! Key behaviors
//! -------------
//! - The simulator is an external collaborator behind the
//!   [`simulator::Simulator`] capability trait: the engine writes `gdata` /
//!   `ldata` parameter slots, hands over the scheduled-event table, and
//!   treats trajectories as opaque values for the user distance callback.
//! - [`events::EventTable`] is the validated, time-ordered binary contract
//!   consumed by the simulator, with its sparse select matrix `E` and
//!   integer shift matrix `N`.
//! - [`priors::PriorSet`] parses `name ~ family(p1, p2)` expressions over
//!   the four supported families and binds them to one parameter space.
//! - [`smc::AbcSmc`] drives the generation loop; committed generations live
//!   in [`smc::ParticleStore`] and satisfy the invariants documented there
//!   after every generation.
//!
//! Invariants & assumptions
//! ------------------------
//! - Every stochastic component draws through a seeded `StdRng`, so a fit is
//!   reproducible given [`smc::AbcOptions::seed`].
//! - Committed state is never mutated by workers; parallel trajectory
//!   evaluation hands results back to the loop thread.
//!
//! Downstream usage
//! ----------------
//! ```no_run
//! use abc_smc::priors::PriorSet;
//! use abc_smc::smc::{AbcOptions, AbcSmc};
//! # fn demo<M, D>(model: M, events: abc_smc::events::EventTable, distance: D,
//! #     observed: Vec<f64>)
//! #     -> abc_smc::smc::AbcResult<()>
//! # where
//! #     M: abc_smc::simulator::Simulator,
//! #     D: abc_smc::simulator::Distance<M::Trajectory, Vec<f64>>,
//! # {
//! let priors = PriorSet::parse(&["beta ~ uniform(0, 1)"])?;
//! let options = AbcOptions::adaptive(100, 1000, 42)?;
//! let mut engine = AbcSmc::new(model, events, priors, distance, observed, options)?;
//! let store = engine.fit()?;
//! println!("{} generations committed", store.len());
//! # Ok(())
//! # }
//! ```

pub mod events;
pub mod priors;
pub mod simulator;
pub mod smc;

// ---- Re-exports ----
pub use events::{EventFrame, EventTable, SelectMatrix, ShiftMatrix};
pub use priors::{Prior, PriorSet};
pub use simulator::{Distance, DistanceOutput, Simulator};
pub use smc::{AbcOptions, AbcResult, AbcSmc, CancelToken, ParticleStore, ToleranceSpec};
