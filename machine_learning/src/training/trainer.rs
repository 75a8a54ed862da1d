use ndarray::{Array2, ArrayView2};

use super::Network;
use crate::{Result, dataset::Batch, optimization::Optimizer};

/// A training algorithm driving a `Network`, one batch at a time.
pub trait Trainer {
    type Optimizer: Optimizer;

    fn network(&self) -> &Network<Self::Optimizer>;

    fn network_mut(&mut self) -> &mut Network<Self::Optimizer>;

    /// Computes the logits of `images`, without modifying any state.
    fn predict(&self, images: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.network().predict(images)
    }

    /// Makes a single optimization step over `batch`.
    ///
    /// # Returns
    /// The training loss of the step or an error, in which case neither the parameters nor the
    /// optimizer's state were modified.
    fn update(&mut self, batch: &Batch<'_>) -> Result<f32>;
}
