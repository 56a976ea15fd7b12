//! The numeric driver.
//!
//! [`Driver`] is the complete operation set the layers and the training loop need:
//! allocation, algebra, activation kernels, loss kernels and the fused
//! softmax + cross-entropy kernel. Every operation is pure: it borrows its inputs and
//! returns a freshly allocated result.
//!
//! Only the algebraic primitives are required methods. The kernels have provided
//! implementations built on the reference code in [`crate::activation`] and
//! [`crate::loss`], so a new backend only has to supply the primitives it accelerates.
//!
//! Backends:
//! - [`SimpleDriver`]: reference implementation (triple-loop GEMM)
//! - [`GemmDriver`]: blocked GEMM via `matrixmultiply` (feature `matrixmultiply`)
//!
//! A backend is picked by type when a layer or network is built, never at runtime.

use std::fmt;

use crate::loss::SoftmaxCrossEntropy;
use crate::matmul;
use crate::{Error, Matrix, Result, Vector, activation, loss};

pub trait Driver: Clone + fmt::Debug {
    /// Short backend name used in logs.
    fn name(&self) -> &'static str;

    /// `A * B`. Requires `a.cols() == b.rows()`.
    fn matmul(&self, a: &Matrix, b: &Matrix) -> Result<Matrix>;

    /// `A^T`.
    fn transpose(&self, a: &Matrix) -> Matrix;

    /// Broadcast-add `b` to every row of `a`. Requires `b.len() == a.cols()`.
    fn add_vector(&self, a: &Matrix, b: &[f64]) -> Result<Matrix>;

    /// Column sums of `a` (length `a.cols()`).
    fn sum_columns(&self, a: &Matrix) -> Vector;

    /// Zero vector of length `len`.
    fn vector(&self, len: usize) -> Result<Vector> {
        if len == 0 {
            return Err(Error::InvalidConfig("vector len must be > 0".to_owned()));
        }
        Ok(vec![0.0; len])
    }

    /// Validate and copy existing data into a vector.
    fn vector_from(&self, data: &[f64]) -> Result<Vector> {
        if data.is_empty() {
            return Err(Error::InvalidData("vector must not be empty".to_owned()));
        }
        Ok(data.to_vec())
    }

    /// Zero-filled `rows x cols` matrix.
    fn matrix(&self, rows: usize, cols: usize) -> Result<Matrix> {
        Matrix::with_shape(rows, cols)
    }

    /// Validate and copy existing row data into a matrix.
    fn matrix_from_rows<R: AsRef<[f64]>>(&self, rows: &[R]) -> Result<Matrix> {
        Matrix::from_rows(rows)
    }

    fn copy(&self, a: &Matrix) -> Matrix {
        a.clone()
    }

    /// One row per label with a single `1.0` at the label index.
    fn one_hot(&self, labels: &[usize], num_classes: usize) -> Result<Matrix> {
        if labels.is_empty() {
            return Err(Error::InvalidData("labels must not be empty".to_owned()));
        }
        if num_classes == 0 {
            return Err(Error::InvalidConfig("num_classes must be > 0".to_owned()));
        }
        if let Some(&label) = labels.iter().find(|&&l| l >= num_classes) {
            return Err(Error::InvalidData(format!(
                "label {label} is out of range for {num_classes} classes"
            )));
        }

        Ok(Matrix::from_row_fn(labels.len(), num_classes, |i, out| {
            out[labels[i]] = 1.0;
        }))
    }

    fn relu_forward(&self, x: &Matrix) -> Matrix {
        activation::relu(x)
    }

    fn relu_backward(&self, x: &Matrix, grad: &Matrix) -> Result<Matrix> {
        activation::relu_backward(x, grad)
    }

    fn softmax_forward(&self, x: &Matrix) -> Matrix {
        activation::softmax(x)
    }

    fn softmax_backward(&self, output: &Matrix, grad: &Matrix) -> Result<Matrix> {
        activation::softmax_backward(output, grad)
    }

    fn cross_entropy_forward(&self, labels: &[usize], predictions: &Matrix) -> Result<Vector> {
        loss::cross_entropy(labels, predictions)
    }

    fn cross_entropy_backward(&self, labels: &[usize], predictions: &Matrix) -> Result<Matrix> {
        loss::cross_entropy_backward(labels, predictions)
    }

    fn softmax_cross_entropy_forward(
        &self,
        labels: &[usize],
        logits: &Matrix,
    ) -> Result<SoftmaxCrossEntropy> {
        loss::softmax_cross_entropy(labels, logits)
    }

    fn softmax_cross_entropy_backward(&self, labels: &[usize], y_pred: &Matrix) -> Result<Matrix> {
        loss::softmax_cross_entropy_backward(labels, y_pred)
    }

    fn mean(&self, values: &[f64]) -> Result<f64> {
        loss::mean(values)
    }
}

/// Reference CPU driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimpleDriver;

impl Driver for SimpleDriver {
    fn name(&self) -> &'static str {
        "simple"
    }

    fn matmul(&self, a: &Matrix, b: &Matrix) -> Result<Matrix> {
        let mut c = matmul_output(a, b)?;
        let (m, k) = a.shape();
        let n = b.cols();
        matmul::gemm_naive(
            m,
            n,
            k,
            1.0,
            a.as_slice(),
            k,
            1,
            b.as_slice(),
            n,
            1,
            0.0,
            c.as_mut_slice(),
            n,
            1,
        );
        Ok(c)
    }

    fn transpose(&self, a: &Matrix) -> Matrix {
        transpose(a)
    }

    fn add_vector(&self, a: &Matrix, b: &[f64]) -> Result<Matrix> {
        add_vector(a, b)
    }

    fn sum_columns(&self, a: &Matrix) -> Vector {
        sum_columns(a)
    }
}

/// CPU driver whose `matmul` runs on the blocked `matrixmultiply` kernel.
///
/// Agrees with [`SimpleDriver`] up to floating-point summation order.
#[cfg(feature = "matrixmultiply")]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GemmDriver;

#[cfg(feature = "matrixmultiply")]
impl Driver for GemmDriver {
    fn name(&self) -> &'static str {
        "gemm"
    }

    fn matmul(&self, a: &Matrix, b: &Matrix) -> Result<Matrix> {
        let mut c = matmul_output(a, b)?;
        let (m, k) = a.shape();
        let n = b.cols();
        matmul::gemm_blocked(
            m,
            n,
            k,
            1.0,
            a.as_slice(),
            k,
            1,
            b.as_slice(),
            n,
            1,
            0.0,
            c.as_mut_slice(),
            n,
            1,
        );
        Ok(c)
    }

    fn transpose(&self, a: &Matrix) -> Matrix {
        transpose(a)
    }

    fn add_vector(&self, a: &Matrix, b: &[f64]) -> Result<Matrix> {
        add_vector(a, b)
    }

    fn sum_columns(&self, a: &Matrix) -> Vector {
        sum_columns(a)
    }
}

/// Validate `a * b` and allocate its zeroed output.
fn matmul_output(a: &Matrix, b: &Matrix) -> Result<Matrix> {
    if a.cols() != b.rows() {
        return Err(Error::InvalidShape(format!(
            "cannot multiply {}x{} by {}x{}",
            a.rows(),
            a.cols(),
            b.rows(),
            b.cols()
        )));
    }
    Matrix::with_shape(a.rows(), b.cols())
}

fn transpose(a: &Matrix) -> Matrix {
    Matrix::from_fn(a.cols(), a.rows(), |j, i| a.get(i, j))
}

fn add_vector(a: &Matrix, b: &[f64]) -> Result<Matrix> {
    if b.len() != a.cols() {
        return Err(Error::InvalidShape(format!(
            "cannot broadcast vector of len {} over {}x{} matrix",
            b.len(),
            a.rows(),
            a.cols()
        )));
    }
    Ok(Matrix::from_row_fn(a.rows(), a.cols(), |i, out| {
        for ((o, &x), &bias) in out.iter_mut().zip(a.row(i)).zip(b) {
            *o = x + bias;
        }
    }))
}

fn sum_columns(a: &Matrix) -> Vector {
    let mut sums = vec![0.0; a.cols()];
    for row in a.iter_rows() {
        for (s, &v) in sums.iter_mut().zip(row) {
            *s += v;
        }
    }
    sums
}
