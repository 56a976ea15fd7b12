//! Activation functions.
//!
//! A dense layer computes a pre-activation batch `z = x W + b` and then applies an
//! activation row by row: `y = activation(z)`. No activation mixes samples.
//!
//! During backprop each kernel turns `dL/dy` into `dL/dz`:
//! - ReLU masks the gradient by the sign of the forward input. Since `relu(x) > 0`
//!   exactly when `x > 0`, the cached forward *output* works as the mask too.
//! - Softmax multiplies each gradient row by the per-sample softmax Jacobian
//!   `J[j][k] = s[j] * (delta(j, k) - s[k])`. This is `O(classes^2)` per sample,
//!   which is why `loss::softmax_cross_entropy_backward` exists.

use crate::driver::Driver;
use crate::{Matrix, Result};

/// Lower clip bound for softmax outputs.
pub const SOFTMAX_MIN: f64 = 1e-7;
/// Upper clip bound for softmax outputs.
pub const SOFTMAX_MAX: f64 = 1.0 - 1e-7;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Activation attached to a dense layer.
///
/// The set is closed: a layer either has no activation (`Identity`) or one of the
/// two kernels the driver provides.
pub enum Activation {
    /// No activation: the layer returns its linear output (logits).
    #[default]
    Identity,
    ReLU,
    Softmax,
}

impl Activation {
    /// Apply the activation to a pre-activation batch.
    pub fn forward<D: Driver>(self, driver: &D, z: Matrix) -> Matrix {
        match self {
            Activation::Identity => z,
            Activation::ReLU => driver.relu_forward(&z),
            Activation::Softmax => driver.softmax_forward(&z),
        }
    }

    /// Turn `dL/d(output)` into `dL/d(pre-activation)`.
    ///
    /// `output` is the batch this activation returned from `forward`.
    pub fn backward<D: Driver>(
        self,
        driver: &D,
        output: &Matrix,
        grad: Matrix,
    ) -> Result<Matrix> {
        match self {
            Activation::Identity => {
                output.expect_same_shape(&grad, "activation output vs grad")?;
                Ok(grad)
            }
            Activation::ReLU => driver.relu_backward(output, &grad),
            Activation::Softmax => driver.softmax_backward(output, &grad),
        }
    }
}

/// Element-wise `max(x, 0)`.
pub fn relu(x: &Matrix) -> Matrix {
    x.map(|v| v.max(0.0))
}

/// ReLU gradient: `grad` where `x > 0`, else `0`.
pub fn relu_backward(x: &Matrix, grad: &Matrix) -> Result<Matrix> {
    x.expect_same_shape(grad, "relu input vs grad")?;

    let mask = x.as_slice();
    let g = grad.as_slice();
    let mut out = grad.clone();
    for (idx, v) in out.as_mut_slice().iter_mut().enumerate() {
        *v = if mask[idx] > 0.0 { g[idx] } else { 0.0 };
    }
    Ok(out)
}

/// Row-wise softmax, clipped to `[SOFTMAX_MIN, SOFTMAX_MAX]`.
///
/// The row max is subtracted before exponentiating, so the result is invariant to
/// adding a constant to a row and never overflows.
pub fn softmax(x: &Matrix) -> Matrix {
    Matrix::from_row_fn(x.rows(), x.cols(), |i, out| {
        let row = x.row(i);
        let mut max = row[0];
        for &v in row.iter().skip(1) {
            if v > max {
                max = v;
            }
        }

        let mut sum = 0.0_f64;
        for (o, &v) in out.iter_mut().zip(row) {
            *o = (v - max).exp();
            sum += *o;
        }

        let inv_sum = 1.0 / sum;
        for o in out.iter_mut() {
            *o = (*o * inv_sum).clamp(SOFTMAX_MIN, SOFTMAX_MAX);
        }
    })
}

/// Softmax gradient: per row, `J * grad_row` with the explicit Jacobian of that row.
pub fn softmax_backward(output: &Matrix, grad: &Matrix) -> Result<Matrix> {
    output.expect_same_shape(grad, "softmax output vs grad")?;

    let k = output.cols();
    let mut jacobian = vec![0.0_f64; k * k];

    Ok(Matrix::from_row_fn(output.rows(), k, |i, out| {
        let s = output.row(i);
        let g = grad.row(i);

        for j in 0..k {
            for c in 0..k {
                let delta = if j == c { 1.0 } else { 0.0 };
                jacobian[j * k + c] = s[j] * (delta - s[c]);
            }
        }

        for (j, o) in out.iter_mut().enumerate() {
            let jac_row = &jacobian[j * k..(j + 1) * k];
            *o = jac_row.iter().zip(g).map(|(d, gv)| d * gv).sum();
        }
    }))
}
