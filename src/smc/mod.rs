//! # The ABC-SMC core (particle loop, tolerances, density ratios)
//!
//! Sequential Monte Carlo approximate Bayesian computation: a weighted
//! particle population evolves toward the posterior through successively
//! tighter per-statistic tolerances, either supplied as an explicit schedule
//! or selected adaptively from a KLIEP density ratio between consecutive
//! generations.
//!
//! ## Module map
//! - [`fit`] — the generation loop ([`AbcSmc`]), parallel trajectory fan-out,
//!   acceptance gating, batching, continuation.
//! - [`generation`] — committed populations and their invariants.
//! - [`proposal`] / [`weights`] / [`mvn`] — perturbation-kernel sampling and
//!   importance-weight updates.
//! - [`kliep`] / [`tolerance`] — density-ratio estimation and the adaptive
//!   tolerance selector with its stopping rule.
//! - [`distance`] — validation around the user distance callback.
//! - [`options`] / [`cancel`] / [`errors`] — configuration, cooperative
//!   cancellation, and the error taxonomy.
//!
//! Re-exports cover the public surface: [`AbcSmc`], [`AbcOptions`],
//! [`ToleranceSpec`], [`ParticleStore`], [`Generation`], [`CancelToken`],
//! [`KliepFit`], [`KliepOptions`], and the error types.

pub mod cancel;
pub mod distance;
pub mod errors;
pub mod fit;
pub mod generation;
pub mod kliep;
pub mod mvn;
pub mod options;
pub mod proposal;
pub mod tolerance;
pub mod weights;

// ---- Re-exports ----
pub use self::cancel::CancelToken;
pub use self::distance::DistanceAdapter;
pub use self::errors::{AbcError, AbcResult, DistanceError, KliepError, ToleranceError};
pub use self::fit::{AbcSmc, AbcSnapshot, AbcState};
pub use self::generation::{Generation, ParticleStore};
pub use self::kliep::{KliepFit, KliepOptions};
pub use self::mvn::MvNormal;
pub use self::options::{AbcOptions, ToleranceSpec};
pub use self::proposal::{Proposal, ProposalSampler};
