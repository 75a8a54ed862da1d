//! Row-wise tensor helpers shared by losses and trainers.

use ndarray::{Array2, ArrayView2, Axis};

use crate::{MlErr, Result};

/// Applies the softmax function to every row of `logits`.
pub fn softmax(logits: ArrayView2<f32>) -> Array2<f32> {
    let mut out = logits.to_owned();

    for mut row in out.axis_iter_mut(Axis(0)) {
        let max = row.fold(f32::NEG_INFINITY, |acc, &x| acc.max(x));
        row.mapv_inplace(|x| (x - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|x| x / sum);
    }

    out
}

/// Applies the logarithm of the softmax function to every row of `logits`.
pub fn log_softmax(logits: ArrayView2<f32>) -> Array2<f32> {
    let mut out = logits.to_owned();

    for mut row in out.axis_iter_mut(Axis(0)) {
        let max = row.fold(f32::NEG_INFINITY, |acc, &x| acc.max(x));
        let log_sum = row.fold(0.0, |acc, &x| acc + (x - max).exp()).ln();
        row.mapv_inplace(|x| x - max - log_sum);
    }

    out
}

/// Encodes class ids as rows with a single 1.
///
/// # Arguments
/// * `labels` - The class ids.
/// * `num_classes` - The amount of columns of the encoding.
///
/// # Returns
/// A `labels.len() x num_classes` matrix or `ShapeMismatch` if a label is out of range.
pub fn one_hot(labels: &[usize], num_classes: usize) -> Result<Array2<f32>> {
    let mut out = Array2::zeros((labels.len(), num_classes));

    for (i, &label) in labels.iter().enumerate() {
        if label >= num_classes {
            return Err(MlErr::ShapeMismatch {
                what: "label",
                got: label,
                expected: num_classes,
            });
        }

        out[[i, label]] = 1.0;
    }

    Ok(out)
}

/// Returns the index of the largest value of every row.
pub fn argmax(x: ArrayView2<f32>) -> Vec<usize> {
    x.axis_iter(Axis(0))
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0, f32::NEG_INFINITY), |(best, max), (i, &v)| {
                    if v > max { (i, v) } else { (best, max) }
                })
                .0
        })
        .collect()
}
