//! # Simulator boundary (capability trait, callbacks)
//!
//! The engine's seam to the external stochastic simulator and to the user's
//! callbacks. The simulator is an external collaborator: the engine only
//! writes parameter slots, replicates the first node, and runs trajectories
//! it never inspects.
//!
//! Re-exports: [`Simulator`], [`Distance`], [`DistanceOutput`],
//! [`InitModel`], [`PostGen`], [`SimError`], [`SimResult`].

pub mod callbacks;
pub mod errors;
pub mod model;

// ---- Re-exports ----
pub use self::callbacks::{Distance, DistanceOutput, InitModel, PostGen};
pub use self::errors::{SimError, SimResult};
pub use self::model::Simulator;
