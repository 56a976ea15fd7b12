//! Loss functions.
//!
//! Categorical cross-entropy over a batch of probability rows, and the fused
//! softmax + cross-entropy kernel. Intended use:
//!
//! - run the network forward to get logits
//! - `softmax_cross_entropy` for per-sample losses and probabilities
//! - `softmax_cross_entropy_backward` for `dL/d(logits)`
//! - run the network backward
//!
//! Labels are class indices, one per batch row. Gradients are pre-divided by the batch
//! size, so they are gradients of the *mean* loss.

use crate::activation::softmax;
use crate::{Error, Matrix, Result, Vector};

/// Output of the fused softmax + cross-entropy forward pass.
#[derive(Debug, Clone, PartialEq)]
pub struct SoftmaxCrossEntropy {
    /// Per-sample losses (not averaged).
    pub losses: Vector,
    /// Softmax probabilities, one row per sample.
    pub y_pred: Matrix,
}

/// Per-sample cross-entropy: `-ln(predictions[i][labels[i]])`.
///
/// `predictions` must already be probabilities (e.g. softmax output).
pub fn cross_entropy(labels: &[usize], predictions: &Matrix) -> Result<Vector> {
    check_labels(labels, predictions)?;

    Ok(labels
        .iter()
        .zip(predictions.iter_rows())
        .map(|(&label, row)| -row[label].ln())
        .collect())
}

/// Gradient of the mean cross-entropy w.r.t. `predictions`.
///
/// Each row is zero except at the label: `-1 / p[label] / batch_size`.
pub fn cross_entropy_backward(labels: &[usize], predictions: &Matrix) -> Result<Matrix> {
    check_labels(labels, predictions)?;

    let inv_n = 1.0 / labels.len() as f64;
    Ok(Matrix::from_row_fn(
        predictions.rows(),
        predictions.cols(),
        |i, out| {
            let label = labels[i];
            out[label] = -1.0 / predictions.get(i, label) * inv_n;
        },
    ))
}

/// Fused forward pass: softmax over `logits`, then cross-entropy.
pub fn softmax_cross_entropy(labels: &[usize], logits: &Matrix) -> Result<SoftmaxCrossEntropy> {
    check_labels(labels, logits)?;

    let y_pred = softmax(logits);
    let losses = cross_entropy(labels, &y_pred)?;
    Ok(SoftmaxCrossEntropy { losses, y_pred })
}

/// Fused gradient of mean cross-entropy w.r.t. the softmax *input* (logits).
///
/// With one-hot targets `t`, `d(CE(softmax(z)))/dz = softmax(z) - t`. Labels are indices,
/// so this subtracts 1 at the label of each row and divides by the batch size. It equals
/// `softmax_backward(y_pred, cross_entropy_backward(labels, y_pred))` without building
/// any Jacobian.
pub fn softmax_cross_entropy_backward(labels: &[usize], y_pred: &Matrix) -> Result<Matrix> {
    check_labels(labels, y_pred)?;

    let inv_n = 1.0 / labels.len() as f64;
    Ok(Matrix::from_row_fn(y_pred.rows(), y_pred.cols(), |i, out| {
        out.copy_from_slice(y_pred.row(i));
        out[labels[i]] -= 1.0;
        for v in out.iter_mut() {
            *v *= inv_n;
        }
    }))
}

/// Arithmetic mean. An empty slice is an error rather than `NaN`.
pub fn mean(values: &[f64]) -> Result<f64> {
    if values.is_empty() {
        return Err(Error::InvalidData(
            "cannot take the mean of an empty vector".to_owned(),
        ));
    }
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

pub(crate) fn check_labels(labels: &[usize], batch: &Matrix) -> Result<()> {
    if labels.len() != batch.rows() {
        return Err(Error::InvalidShape(format!(
            "labels len {} does not match batch size {}",
            labels.len(),
            batch.rows()
        )));
    }
    if let Some((i, &label)) = labels
        .iter()
        .enumerate()
        .find(|&(_, &label)| label >= batch.cols())
    {
        return Err(Error::InvalidData(format!(
            "label {label} at index {i} is out of range for {} classes",
            batch.cols()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::softmax_backward;

    fn probs() -> Matrix {
        Matrix::from_rows(&[[0.1, 0.2, 0.7], [0.9, 0.05, 0.05]]).unwrap()
    }

    #[test]
    fn cross_entropy_picks_the_label_probability() {
        let losses = cross_entropy(&[2, 0], &probs()).unwrap();
        assert_eq!(losses, vec![-(0.7_f64).ln(), -(0.9_f64).ln()]);
    }

    #[test]
    fn cross_entropy_backward_is_sparse_and_batch_scaled() {
        let d = cross_entropy_backward(&[2, 0], &probs()).unwrap();
        assert_eq!(
            d.to_rows(),
            vec![
                vec![0.0, 0.0, -1.0 / 0.7 / 2.0],
                vec![-1.0 / 0.9 / 2.0, 0.0, 0.0],
            ]
        );
    }

    #[test]
    fn labels_are_validated() {
        assert!(matches!(
            cross_entropy(&[0], &probs()),
            Err(Error::InvalidShape(_))
        ));
        assert!(matches!(
            cross_entropy(&[0, 3], &probs()),
            Err(Error::InvalidData(_))
        ));
        assert!(softmax_cross_entropy_backward(&[5, 0], &probs()).is_err());
    }

    #[test]
    fn fused_backward_matches_composed_kernels() {
        let logits = Matrix::from_rows(&[[0.1, 0.2, 0.7], [0.9, 0.05, 0.05]]).unwrap();
        let labels = [2, 0];

        let fwd = softmax_cross_entropy(&labels, &logits).unwrap();
        let d_ce = cross_entropy_backward(&labels, &fwd.y_pred).unwrap();
        let composed = softmax_backward(&fwd.y_pred, &d_ce).unwrap();
        let fused = softmax_cross_entropy_backward(&labels, &fwd.y_pred).unwrap();

        for (a, b) in composed.as_slice().iter().zip(fused.as_slice()) {
            assert!((a - b).abs() < 1e-12, "composed={a} fused={b}");
        }
    }

    #[test]
    fn mean_of_empty_is_an_error() {
        assert!(mean(&[]).is_err());
        assert_eq!(mean(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap(), 3.5);
    }
}
