//! # Priors (families, expression parser, prior sets)
//!
//! Independent univariate priors over named parameters, parsed from
//! `name ~ family(p1, p2)` expressions and combined into a [`PriorSet`] that
//! binds each name to a slot in either the global `gdata` vector or the
//! per-node `ldata` matrix — never both.
//!
//! Re-exports: [`Prior`], [`PriorSpec`], [`PriorSet`], [`BoundPriorSet`],
//! [`ParamTarget`], [`PriorError`], [`PriorResult`].

pub mod distribution;
pub mod errors;
pub mod parse;
pub mod set;

// ---- Re-exports ----
pub use self::distribution::Prior;
pub use self::errors::{PriorError, PriorResult};
pub use self::parse::PriorSpec;
pub use self::set::{BoundPriorSet, ParamTarget, PriorSet};
