//! # Scheduled events (tables, auxiliary matrices, replication)
//!
//! The normalized, validated, time-ordered event set consumed by the
//! simulator, together with the sparse select matrix `E` and the integer
//! shift matrix `N`. Construction is all-or-nothing: any schema or invariant
//! violation fails with a descriptive [`EventError`] and no partial table is
//! exposed.
//!
//! Re-exports: [`EventTable`], [`EventFrame`], [`Event`], [`EventKind`],
//! [`SelectMatrix`], [`ShiftMatrix`], [`EventError`], [`EventResult`].

pub mod errors;
pub mod matrices;
pub mod replicate;
pub mod table;

// ---- Re-exports ----
pub use self::errors::{EventError, EventResult};
pub use self::matrices::{SelectMatrix, ShiftMatrix};
pub use self::table::{
    Event, EventColumn, EventFrame, EventKind, EventOrigin, EventTable, TimeColumn, TimeOrigin,
};
