//! Dense matrix and vector types.
//!
//! A [`Matrix`] is always a batch of row vectors: rows are samples, columns are
//! features. Storage is a single contiguous row-major buffer, so `m.row(i)` is a
//! plain slice and nothing is ever transposed implicitly.
//!
//! Matrices are never empty. Both dimensions are validated at construction, which
//! lets every kernel index `row[0]` (e.g. for a row max) without further checks.

use crate::{Error, Result};

/// A 1-D sequence of scalars (biases, per-sample losses, column sums).
pub type Vector = Vec<f64>;

#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    /// Row-major buffer with `rows * cols` entries.
    data: Vec<f64>,
}

impl Matrix {
    /// Allocate a zero-filled `rows x cols` matrix.
    pub fn with_shape(rows: usize, cols: usize) -> Result<Self> {
        check_dims(rows, cols)?;
        Ok(Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        })
    }

    /// Wrap per-row data, validating that it is non-empty and rectangular.
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self> {
        if rows.is_empty() {
            return Err(Error::InvalidData("matrix must have at least one row".to_owned()));
        }

        let cols = rows[0].as_ref().len();
        if cols == 0 {
            return Err(Error::InvalidData(
                "matrix must have at least one column".to_owned(),
            ));
        }

        let mut data = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != cols {
                return Err(Error::InvalidData(format!(
                    "row {i} has len {}, expected {cols}",
                    row.len()
                )));
            }
            data.extend_from_slice(row);
        }

        Ok(Self {
            rows: rows.len(),
            cols,
            data,
        })
    }

    /// Wrap a flat row-major buffer with shape `(rows, cols)`.
    pub fn from_flat(data: Vec<f64>, rows: usize, cols: usize) -> Result<Self> {
        check_dims(rows, cols)?;
        if data.len() != rows * cols {
            return Err(Error::InvalidData(format!(
                "buffer length {} does not match rows * cols ({rows} * {cols})",
                data.len()
            )));
        }
        Ok(Self { rows, cols, data })
    }

    /// Build a matrix entry by entry. Callers guarantee both dimensions are non-zero.
    pub(crate) fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> f64) -> Self {
        debug_assert!(rows > 0 && cols > 0);
        let mut data = Vec::with_capacity(rows * cols);
        for i in 0..rows {
            for j in 0..cols {
                data.push(f(i, j));
            }
        }
        Self { rows, cols, data }
    }

    /// Build a matrix row by row. `f` writes row `i` into the provided slice.
    pub(crate) fn from_row_fn(
        rows: usize,
        cols: usize,
        mut f: impl FnMut(usize, &mut [f64]),
    ) -> Self {
        debug_assert!(rows > 0 && cols > 0);
        let mut data = vec![0.0; rows * cols];
        for (i, out) in data.chunks_exact_mut(cols).enumerate() {
            f(i, out);
        }
        Self { rows, cols, data }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Entry at row `i`, column `j`.
    ///
    /// Panics if the index is out of bounds.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        assert!(
            i < self.rows && j < self.cols,
            "index ({i}, {j}) out of bounds for {}x{} matrix",
            self.rows,
            self.cols
        );
        self.data[i * self.cols + j]
    }

    /// Row `i` as a slice of length `cols`.
    ///
    /// Panics if `i >= rows`.
    #[inline]
    pub fn row(&self, i: usize) -> &[f64] {
        let start = i * self.cols;
        &self.data[start..start + self.cols]
    }

    #[inline]
    pub fn iter_rows(&self) -> std::slice::ChunksExact<'_, f64> {
        self.data.chunks_exact(self.cols)
    }

    /// The row-major buffer.
    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    #[inline]
    pub(crate) fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn into_flat(self) -> Vec<f64> {
        self.data
    }

    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.iter_rows().map(<[f64]>::to_vec).collect()
    }

    /// Apply `f` to every entry, returning a new matrix of the same shape.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Fail with `InvalidShape` unless `other` has the same shape.
    pub(crate) fn expect_same_shape(&self, other: &Matrix, what: &str) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(Error::InvalidShape(format!(
                "{what}: {}x{} does not match {}x{}",
                self.rows, self.cols, other.rows, other.cols
            )));
        }
        Ok(())
    }
}

fn check_dims(rows: usize, cols: usize) -> Result<()> {
    if rows == 0 || cols == 0 {
        return Err(Error::InvalidConfig(format!(
            "matrix dims must be > 0, got {rows}x{cols}"
        )));
    }
    rows.checked_mul(cols)
        .map(|_| ())
        .ok_or_else(|| Error::InvalidConfig(format!("matrix shape {rows}x{cols} overflows")))
}
