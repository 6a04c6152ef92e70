//! Adapter around the user distance callback.
//!
//! Purpose
//! -------
//! Normalize and police the user's distance output before it reaches the
//! acceptance test: coerce length-`n` vectors into `n x 1` matrices, reject
//! NaNs and negative entries, latch the number of summary statistics `S` on
//! the first call, and reject `S != 1` whenever adaptive tolerance selection
//! is enabled. Every violation is a fatal [`DistanceError`].
//!
//! Conventions
//! -----------
//! - The observed data is owned by the engine and passed through to the
//!   callback unchanged on every call.
//! - The expected row count is supplied by the caller: 1 for a
//!   global-parameter run, the replicate count for a per-node batch.
//! - `S` is fixed for the lifetime of the adapter (one fit), using a
//!   `OnceLock` so concurrent workers agree on the first observed width.
use crate::simulator::callbacks::{Distance, DistanceOutput};
use crate::smc::errors::{AbcResult, DistanceError};
use ndarray::Array2;
use std::sync::OnceLock;

/// Validating wrapper that fixes `S` on first use.
pub struct DistanceAdapter<D> {
    inner: D,
    adaptive: bool,
    width: OnceLock<usize>,
}

impl<D> DistanceAdapter<D> {
    /// Wrap a distance callback. `adaptive` enables the `S == 1` constraint.
    pub fn new(inner: D, adaptive: bool) -> Self {
        DistanceAdapter { inner, adaptive, width: OnceLock::new() }
    }

    /// The number of summary statistics, once the first call has fixed it.
    pub fn n_statistics(&self) -> Option<usize> {
        self.width.get().copied()
    }

    /// Evaluate the callback and validate its output.
    ///
    /// # Errors
    /// - [`DistanceError::Evaluation`] if the callback itself fails.
    /// - [`DistanceError::EmptyOutput`] / [`DistanceError::RowCountMismatch`]
    ///   on shape violations against `expected_rows`.
    /// - [`DistanceError::NonFiniteEntry`] / [`DistanceError::NegativeEntry`]
    ///   on invalid values.
    /// - [`DistanceError::AdaptiveRequiresSingleStatistic`] on the first call
    ///   under adaptive tolerances when `S != 1`.
    /// - [`DistanceError::WidthChanged`] if a later call changes `S`.
    pub fn measure<T, Data>(
        &self, trajectory: &T, generation: usize, data: &Data, expected_rows: usize,
    ) -> AbcResult<Array2<f64>>
    where
        D: Distance<T, Data>,
    {
        let output = self
            .inner
            .distance(trajectory, generation, data)
            .map_err(|e| DistanceError::Evaluation { message: e.to_string() })?;
        let matrix = match output {
            DistanceOutput::Vector(v) => {
                let n = v.len();
                v.into_shape((n, 1)).expect("a vector always reshapes to n x 1")
            }
            DistanceOutput::Matrix(m) => m,
        };

        if matrix.is_empty() {
            return Err(DistanceError::EmptyOutput.into());
        }
        if matrix.nrows() != expected_rows {
            return Err(DistanceError::RowCountMismatch {
                expected: expected_rows,
                actual: matrix.nrows(),
            }
            .into());
        }
        for ((row, col), &value) in matrix.indexed_iter() {
            if !value.is_finite() {
                return Err(DistanceError::NonFiniteEntry { row, col, value }.into());
            }
            if value < 0.0 {
                return Err(DistanceError::NegativeEntry { row, col, value }.into());
            }
        }

        let width = *self.width.get_or_init(|| matrix.ncols());
        if matrix.ncols() != width {
            return Err(
                DistanceError::WidthChanged { expected: width, actual: matrix.ncols() }.into()
            );
        }
        if self.adaptive && width != 1 {
            return Err(DistanceError::AdaptiveRequiresSingleStatistic { actual: width }.into());
        }
        Ok(matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smc::errors::AbcError;
    use ndarray::{array, Array1};

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Vector-to-matrix coercion and shape checks.
    // - Value validation (NaN, negative).
    // - Width latching, drift detection, and the adaptive S = 1 rule.
    //
    // They intentionally DO NOT cover:
    // - The acceptance comparison against tolerances; that lives in the fit
    //   loop.
    // -------------------------------------------------------------------------

    fn vector_distance(values: Vec<f64>) -> impl Distance<(), ()> {
        move |_t: &(), _g: usize, _data: &()| -> anyhow::Result<DistanceOutput> {
            Ok(DistanceOutput::Vector(Array1::from(values.clone())))
        }
    }

    #[test]
    // Purpose
    // -------
    // A length-n vector coerces to an n x 1 matrix and latches S = 1.
    //
    // Given
    // -----
    // - A callback returning a 3-vector, expected_rows = 3.
    //
    // Expect
    // ------
    // - A 3 x 1 matrix and `n_statistics() == Some(1)`.
    fn vector_output_coerces_to_single_column() {
        // Arrange
        let adapter = DistanceAdapter::new(vector_distance(vec![0.1, 0.3, 0.5]), false);

        // Act
        let matrix = adapter.measure(&(), 1, &(), 3).expect("valid output");

        // Assert
        assert_eq!(matrix.shape(), &[3, 1]);
        assert_eq!(adapter.n_statistics(), Some(1));
    }

    #[test]
    // Purpose
    // -------
    // NaN and negative entries are fatal with positional payloads.
    //
    // Given
    // -----
    // - Callbacks returning a NaN and a negative distance.
    //
    // Expect
    // ------
    // - `NonFiniteEntry` and `NegativeEntry` naming the offending cell.
    fn invalid_values_are_rejected() {
        // Arrange
        let nan = DistanceAdapter::new(vector_distance(vec![0.1, f64::NAN]), false);
        let negative = DistanceAdapter::new(vector_distance(vec![0.1, -0.2]), false);

        // Act / Assert
        assert!(matches!(
            nan.measure(&(), 1, &(), 2),
            Err(AbcError::Distance(DistanceError::NonFiniteEntry { row: 1, col: 0, .. }))
        ));
        assert!(matches!(
            negative.measure(&(), 1, &(), 2),
            Err(AbcError::Distance(DistanceError::NegativeEntry { row: 1, col: 0, .. }))
        ));
    }

    #[test]
    // Purpose
    // -------
    // The statistic width is fixed on first call and drift is fatal.
    //
    // Given
    // -----
    // - A callback that returns 2 columns on the first call and 3 afterwards.
    //
    // Expect
    // ------
    // - First call succeeds with S = 2; second call fails with
    //   `WidthChanged { expected: 2, actual: 3 }`.
    fn width_drift_is_fatal() {
        // Arrange
        let calls = std::sync::atomic::AtomicUsize::new(0);
        let drifting = move |_t: &(), _g: usize, _data: &()| -> anyhow::Result<DistanceOutput> {
            let call = calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let cols = if call == 0 { 2 } else { 3 };
            Ok(DistanceOutput::Matrix(Array2::zeros((1, cols))))
        };
        let adapter = DistanceAdapter::new(drifting, false);

        // Act / Assert
        assert!(adapter.measure(&(), 1, &(), 1).is_ok());
        assert!(matches!(
            adapter.measure(&(), 2, &(), 1),
            Err(AbcError::Distance(DistanceError::WidthChanged { expected: 2, actual: 3 }))
        ));
    }

    #[test]
    // Purpose
    // -------
    // Adaptive mode rejects multi-statistic output at the first call, and a
    // row-count mismatch is caught.
    //
    // Given
    // -----
    // - An adaptive adapter fed a 1 x 2 matrix, and a non-adaptive adapter
    //   expecting 2 rows but fed 1.
    //
    // Expect
    // ------
    // - `AdaptiveRequiresSingleStatistic { actual: 2 }` and
    //   `RowCountMismatch` respectively.
    fn adaptive_mode_and_row_counts_are_enforced() {
        // Arrange
        let wide = DistanceAdapter::new(
            |_t: &(), _g: usize, _data: &()| -> anyhow::Result<DistanceOutput> {
                Ok(array![[0.1, 0.2]].into())
            },
            true,
        );
        let short = DistanceAdapter::new(vector_distance(vec![0.1]), false);

        // Act / Assert
        assert!(matches!(
            wide.measure(&(), 1, &(), 1),
            Err(AbcError::Distance(DistanceError::AdaptiveRequiresSingleStatistic {
                actual: 2
            }))
        ));
        assert!(matches!(
            short.measure(&(), 1, &(), 2),
            Err(AbcError::Distance(DistanceError::RowCountMismatch { expected: 2, actual: 1 }))
        ));
    }
}
