use ndarray::{Array2, ArrayView2, Axis};

use super::LossFn;
use crate::arch::ops;

/// Softmax cross entropy over raw logits against one-hot (or soft) targets.
#[derive(Debug, Default, Clone, Copy)]
pub struct CrossEntropy;

impl CrossEntropy {
    /// Returns a new `CrossEntropy`.
    pub fn new() -> Self {
        Self
    }
}

impl LossFn for CrossEntropy {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> f32 {
        let n = y_pred.nrows();
        if n == 0 {
            return 0.0;
        }

        let log_probs = ops::log_softmax(y_pred);
        let total: f32 = (&log_probs * &y).sum_axis(Axis(1)).sum();
        -total / n as f32
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Array2<f32> {
        let n = y_pred.nrows().max(1);
        (ops::softmax(y_pred) - &y) / n as f32
    }
}
