//! Metrics.
//!
//! Metrics are evaluation helpers; they do not participate in backprop.

use crate::{Error, Matrix, Result};

/// Index of the first maximum in `row`.
///
/// Returns `None` for an empty row or a row containing `NaN`.
pub fn argmax(row: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, &v) in row.iter().enumerate() {
        if v.is_nan() {
            return None;
        }
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((idx, v)),
        }
    }
    best.map(|(idx, _)| idx)
}

/// Fraction of rows whose argmax equals the label.
pub fn accuracy(predictions: &Matrix, labels: &[usize]) -> Result<f64> {
    if labels.len() != predictions.rows() {
        return Err(Error::InvalidShape(format!(
            "labels len {} does not match batch size {}",
            labels.len(),
            predictions.rows()
        )));
    }

    let correct = predictions
        .iter_rows()
        .zip(labels)
        .filter(|&(row, &label)| argmax(row) == Some(label))
        .count();
    Ok(correct as f64 / labels.len() as f64)
}
