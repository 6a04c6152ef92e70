//! events::errors — unified error type for scheduled-event construction.
//!
//! Purpose
//! -------
//! Provide a single error enum [`EventError`] covering schema, coercion, and
//! invariant failures raised while building an [`crate::events::EventTable`]
//! or its auxiliary select/shift matrices. Every variant names the offending
//! field and, where applicable, the zero-based row at which validation
//! stopped, so no partially constructed table ever escapes.
//!
//! Conventions
//! -----------
//! - Row indices in error payloads refer to the *input* row order, before the
//!   `(time, kind, select)` sort is applied.
//! - `Display` messages are user-facing; tests should not pin exact wording
//!   unless they intentionally do so.

/// Crate-wide result alias for scheduled-event operations.
pub type EventResult<T> = Result<T, EventError>;

/// `EventError` — construction and invariant failures for event tables.
///
/// Variants are grouped by the stage that raises them: column-level schema
/// checks, per-row field validation, auxiliary-matrix checks, and the
/// first-node replication adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum EventError {
    // ---- Schema ----
    ColumnLengthMismatch { column: &'static str, expected: usize, actual: usize },
    MissingTimeOrigin,

    // ---- Row validation ----
    InvalidEventCode { row: usize, code: i64 },
    UnknownEventLabel { row: usize, label: String },
    InvalidTime { row: usize, value: i64 },
    InvalidNode { row: usize, value: i64 },
    MissingDest { row: usize },
    InvalidDest { row: usize, value: i64 },
    InvalidCount { row: usize, value: i64 },
    InvalidProportion { row: usize, value: f64 },
    InvalidSelect { row: usize, value: i64, n_selectors: usize },
    MissingShift { row: usize },
    InvalidShift { row: usize, value: i64 },

    // ---- Auxiliary matrices ----
    NegativeSelectEntry { row: usize, col: usize, value: f64 },
    SelectRowOutOfBounds { row: usize, col: usize, n_compartments: usize },
    UnsortedSelectColumn { col: usize },
    RowLabelMismatch { index: usize, select_label: String, shift_label: String },
    RowLabelCountMismatch { select_rows: usize, shift_rows: usize },

    // ---- Replication ----
    ReplicateCountZero,
    ReplicateExternalTransfer { row: usize },
}

impl std::error::Error for EventError {}

impl std::fmt::Display for EventError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Schema ----
            EventError::ColumnLengthMismatch { column, expected, actual } => {
                write!(f, "Column '{column}' has length {actual}, expected {expected}")
            }
            EventError::MissingTimeOrigin => {
                write!(f, "Date-valued 'time' column requires a reference day t0")
            }

            // ---- Row validation ----
            EventError::InvalidEventCode { row, code } => {
                write!(f, "Invalid 'event' code {code} at row {row}: must be in 0..=3")
            }
            EventError::UnknownEventLabel { row, label } => {
                write!(
                    f,
                    "Unknown 'event' label '{label}' at row {row}: expected one of \
                     exit, enter, intTrans, extTrans"
                )
            }
            EventError::InvalidTime { row, value } => {
                write!(f, "Invalid 'time' {value} at row {row}: must be >= 1")
            }
            EventError::InvalidNode { row, value } => {
                write!(f, "Invalid 'node' {value} at row {row}: must be >= 1")
            }
            EventError::MissingDest { row } => {
                write!(f, "Missing 'dest' at row {row}: required for extTrans events")
            }
            EventError::InvalidDest { row, value } => {
                write!(f, "Invalid 'dest' {value} at row {row}: must be >= 1 for extTrans events")
            }
            EventError::InvalidCount { row, value } => {
                write!(f, "Invalid 'n' {value} at row {row}: must be >= 0")
            }
            EventError::InvalidProportion { row, value } => {
                write!(f, "Invalid 'proportion' {value} at row {row}: must be in [0, 1]")
            }
            EventError::InvalidSelect { row, value, n_selectors } => {
                write!(
                    f,
                    "Invalid 'select' {value} at row {row}: must be in 1..={n_selectors} \
                     (the number of selector columns in E)"
                )
            }
            EventError::MissingShift { row } => {
                write!(f, "Missing 'shift' at row {row}: required for intTrans events")
            }
            EventError::InvalidShift { row, value } => {
                write!(f, "Invalid 'shift' {value} at row {row}: must be >= 1 for intTrans events")
            }

            // ---- Auxiliary matrices ----
            EventError::NegativeSelectEntry { row, col, value } => {
                write!(f, "Negative entry {value} in E at ({row}, {col}): must be non-negative")
            }
            EventError::SelectRowOutOfBounds { row, col, n_compartments } => {
                write!(
                    f,
                    "Row index {row} in column {col} of E out of bounds: \
                     only {n_compartments} compartments"
                )
            }
            EventError::UnsortedSelectColumn { col } => {
                write!(f, "Row indices in column {col} of E must be strictly increasing")
            }
            EventError::RowLabelMismatch { index, select_label, shift_label } => {
                write!(
                    f,
                    "Row label mismatch at index {index}: E has '{select_label}', \
                     N has '{shift_label}'"
                )
            }
            EventError::RowLabelCountMismatch { select_rows, shift_rows } => {
                write!(f, "E has {select_rows} row labels but N has {shift_rows}")
            }

            // ---- Replication ----
            EventError::ReplicateCountZero => {
                write!(f, "Replication count must be >= 1")
            }
            EventError::ReplicateExternalTransfer { row } => {
                write!(
                    f,
                    "Cannot replicate the first node: row {row} is an extTrans event, \
                     which is not allowed under replication"
                )
            }
        }
    }
}
