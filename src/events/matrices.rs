//! Auxiliary select and shift matrices for scheduled events.
//!
//! The select matrix `E` tells the simulator which compartments an event
//! samples individuals from: column `s` of `E` is the selector referenced by
//! the 1-based `select` field of an event. It is stored in compact-column
//! (CSC) form because selectors are typically sparse indicator-like columns
//! over many compartments.
//!
//! The shift matrix `N` holds per-compartment integer offsets used by
//! internal-transfer events: column `h` (referenced by the 1-based `shift`
//! field) moves sampled individuals `N[i, h]` compartments forward.
//!
//! When both matrices are non-empty their compartment (row) labels must be
//! identical; this is checked at [`crate::events::EventTable`] construction.
use crate::events::errors::{EventError, EventResult};
use ndarray::Array2;

/// Sparse compartments-by-selectors matrix in compact-column form.
///
/// Invariants (enforced by [`SelectMatrix::from_triplets`]):
/// - `col_ptr.len() == n_selectors + 1`, `col_ptr[0] == 0`, non-decreasing.
/// - Row indices within each column are strictly increasing and in
///   `0..labels.len()`.
/// - All stored values are finite and non-negative.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectMatrix {
    labels: Vec<String>,
    col_ptr: Vec<usize>,
    row_idx: Vec<usize>,
    values: Vec<f64>,
}

impl SelectMatrix {
    /// Build a select matrix from `(row, col, value)` triplets.
    ///
    /// Triplets may arrive in any order; they are bucketed per column and
    /// sorted by row index internally. Duplicate `(row, col)` entries are
    /// rejected via the strict-ordering check.
    ///
    /// # Errors
    /// - [`EventError::SelectRowOutOfBounds`] if a row index exceeds the
    ///   number of compartment labels.
    /// - [`EventError::NegativeSelectEntry`] if a value is negative or
    ///   non-finite.
    /// - [`EventError::UnsortedSelectColumn`] if a column contains duplicate
    ///   row indices.
    pub fn from_triplets(
        labels: Vec<String>, n_selectors: usize, triplets: &[(usize, usize, f64)],
    ) -> EventResult<Self> {
        let n_rows = labels.len();
        let mut columns: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n_selectors];
        for &(row, col, value) in triplets {
            if col >= n_selectors || row >= n_rows {
                return Err(EventError::SelectRowOutOfBounds { row, col, n_compartments: n_rows });
            }
            if !value.is_finite() || value < 0.0 {
                return Err(EventError::NegativeSelectEntry { row, col, value });
            }
            columns[col].push((row, value));
        }

        let mut col_ptr = Vec::with_capacity(n_selectors + 1);
        let mut row_idx = Vec::with_capacity(triplets.len());
        let mut values = Vec::with_capacity(triplets.len());
        col_ptr.push(0);
        for (col, mut entries) in columns.into_iter().enumerate() {
            entries.sort_by_key(|&(row, _)| row);
            if entries.windows(2).any(|w| w[0].0 == w[1].0) {
                return Err(EventError::UnsortedSelectColumn { col });
            }
            for (row, value) in entries {
                row_idx.push(row);
                values.push(value);
            }
            col_ptr.push(row_idx.len());
        }
        Ok(SelectMatrix { labels, col_ptr, row_idx, values })
    }

    /// An empty select matrix with no compartments and no selectors.
    pub fn empty() -> Self {
        SelectMatrix { labels: Vec::new(), col_ptr: vec![0], row_idx: Vec::new(), values: Vec::new() }
    }

    /// Number of selector columns.
    pub fn n_selectors(&self) -> usize {
        self.col_ptr.len() - 1
    }

    /// Number of compartment rows.
    pub fn n_compartments(&self) -> usize {
        self.labels.len()
    }

    /// Compartment labels, in row order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Number of stored (structurally non-zero) entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// `true` when the matrix has no compartments and no selectors.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty() && self.n_selectors() == 0
    }

    /// Iterate the `(row, value)` entries of selector column `col`.
    ///
    /// # Panics
    /// Panics if `col >= self.n_selectors()`.
    pub fn col(&self, col: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let lo = self.col_ptr[col];
        let hi = self.col_ptr[col + 1];
        self.row_idx[lo..hi].iter().copied().zip(self.values[lo..hi].iter().copied())
    }
}

/// Dense compartments-by-shifts matrix of integer offsets.
#[derive(Debug, Clone, PartialEq)]
pub struct ShiftMatrix {
    labels: Vec<String>,
    data: Array2<i64>,
}

impl ShiftMatrix {
    /// Build a shift matrix from row labels and a dense integer matrix.
    ///
    /// # Errors
    /// [`EventError::RowLabelCountMismatch`] if `labels.len() != data.nrows()`.
    pub fn new(labels: Vec<String>, data: Array2<i64>) -> EventResult<Self> {
        if labels.len() != data.nrows() {
            return Err(EventError::RowLabelCountMismatch {
                select_rows: data.nrows(),
                shift_rows: labels.len(),
            });
        }
        Ok(ShiftMatrix { labels, data })
    }

    /// An empty shift matrix with no compartments and no shift columns.
    pub fn empty() -> Self {
        ShiftMatrix { labels: Vec::new(), data: Array2::zeros((0, 0)) }
    }

    /// Number of shift columns.
    pub fn n_shifts(&self) -> usize {
        self.data.ncols()
    }

    /// Compartment labels, in row order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// `true` when the matrix has no compartments and no shift columns.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty() && self.data.is_empty()
    }

    /// The offset applied to compartment `row` under shift column `col`.
    pub fn offset(&self, row: usize, col: usize) -> i64 {
        self.data[(row, col)]
    }
}

/// Check that the row labels of `E` and `N` agree when both are non-empty.
pub(crate) fn validate_row_labels(e: &SelectMatrix, n: &ShiftMatrix) -> EventResult<()> {
    if e.is_empty() || n.is_empty() {
        return Ok(());
    }
    if e.labels().len() != n.labels().len() {
        return Err(EventError::RowLabelCountMismatch {
            select_rows: e.labels().len(),
            shift_rows: n.labels().len(),
        });
    }
    for (index, (sl, nl)) in e.labels().iter().zip(n.labels()).enumerate() {
        if sl != nl {
            return Err(EventError::RowLabelMismatch {
                index,
                select_label: sl.clone(),
                shift_label: nl.clone(),
            });
        }
    }
    Ok(())
}
