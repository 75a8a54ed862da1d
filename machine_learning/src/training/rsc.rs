use log::debug;
use ndarray::{Array1, Array2};

use super::{Network, Trainer, masking};
use crate::{
    MlErr, Result,
    arch::{
        loss::{CrossEntropy, LossFn},
        ops,
    },
    dataset::Batch,
    optimization::Optimizer,
};

/// The least amount of examples a batch needs for the per-batch percentile to be meaningful.
pub const MIN_BATCH_SIZE: usize = 2;

/// The masks computed by the challenging stage of an RSC update.
#[derive(Debug, Clone)]
pub struct Challenge {
    /// The untouched features of the batch (N x D).
    pub features: Array2<f32>,
    /// How much each example's true class probability dropped after muting (N).
    pub changes: Array1<f32>,
    /// The per-example channel mask (N x D).
    pub mask_f: Array2<f32>,
    /// The per-batch mask (N x 1).
    pub mask_b: Array2<f32>,
    /// The final mask applied to the features (N x D).
    pub mask: Array2<f32>,
    targets: Array2<f32>,
}

/// Representation Self-Challenging.
///
/// Every update first finds the feature channels the classifier relies on the most for the true
/// class of each example, mutes them, and then trains on the muted features of the examples
/// that suffered the largest confidence drop. The rest of the batch trains on its full features.
#[derive(Debug, Clone)]
pub struct RscTrainer<O: Optimizer> {
    network: Network<O>,
    loss_fn: CrossEntropy,
    drop_f: f32,
    drop_b: f32,
}

impl<O: Optimizer> RscTrainer<O> {
    /// Creates a new `RscTrainer`.
    ///
    /// # Arguments
    /// * `network` - The network to train.
    /// * `f_drop_factor` - The fraction of feature channels kept per example, in `(0, 1)`.
    /// * `b_drop_factor` - The fraction of the batch that gets its features back, in `(0, 1)`.
    ///
    /// # Returns
    /// A new `RscTrainer` or an error if a factor is out of range.
    pub fn new(network: Network<O>, f_drop_factor: f32, b_drop_factor: f32) -> Result<Self> {
        for (name, value) in [
            ("rsc_f_drop_factor", f_drop_factor),
            ("rsc_b_drop_factor", b_drop_factor),
        ] {
            if !(value > 0. && value < 1.) {
                return Err(MlErr::InvalidHyperparameter { name, value });
            }
        }

        Ok(Self {
            network,
            loss_fn: CrossEntropy::new(),
            drop_f: 100. * (1. - f_drop_factor),
            drop_b: 100. * (1. - b_drop_factor),
        })
    }

    /// The percentage of channels muted per example.
    pub fn drop_f(&self) -> f32 {
        self.drop_f
    }

    /// The percentage of examples kept challenged per batch.
    pub fn drop_b(&self) -> f32 {
        self.drop_b
    }

    /// Computes the masks of an update without modifying the parameters or the optimizer.
    ///
    /// # Returns
    /// The masks or an error if the batch is invalid, has less than `MIN_BATCH_SIZE` examples,
    /// or yields a non finite gradient.
    pub fn challenge(&mut self, batch: &Batch<'_>) -> Result<Challenge> {
        self.network.validate(batch)?;

        if batch.len() < MIN_BATCH_SIZE {
            return Err(MlErr::DegenerateBatch {
                got: batch.len(),
                min: MIN_BATCH_SIZE,
            });
        }

        let targets = ops::one_hot(batch.labels(), self.network.num_classes())?;
        let features = self.network.features(batch.images())?;
        let pred = self.network.classify(features.view())?;

        // d(sum(pred * targets)) / d(features)
        let grad = self.network.feature_grad(targets.clone())?;
        if grad.iter().any(|g| !g.is_finite()) {
            return Err(MlErr::NumericFailure {
                what: "feature gradient",
            });
        }

        let mask_f = masking::channel_mask(grad.view(), self.drop_f);
        let muted = &features * &mask_f;
        let pred_muted = self.network.classify(muted.view())?;

        let changes = masking::confidence_drop(pred.view(), pred_muted.view(), targets.view());
        let mask_b = masking::batch_mask(changes.view(), self.drop_b);
        let mask = masking::combine(mask_f.view(), mask_b.view());

        Ok(Challenge {
            features,
            changes,
            mask_f,
            mask_b,
            mask,
            targets,
        })
    }
}

impl<O: Optimizer> Trainer for RscTrainer<O> {
    type Optimizer = O;

    fn network(&self) -> &Network<O> {
        &self.network
    }

    fn network_mut(&mut self) -> &mut Network<O> {
        &mut self.network
    }

    fn update(&mut self, batch: &Batch<'_>) -> Result<f32> {
        let Challenge {
            features,
            mask,
            mask_b,
            targets,
            ..
        } = self.challenge(batch)?;

        let masked = &features * &mask;
        let logits = self.network.classify(masked.view())?;

        let loss = self.loss_fn.loss(logits.view(), targets.view());
        if !loss.is_finite() {
            return Err(MlErr::NumericFailure { what: "loss" });
        }

        let d = self.loss_fn.loss_prime(logits.view(), targets.view());
        self.network.backward(d, Some(mask.view()))?;
        self.network.step()?;

        let challenged = mask_b.iter().filter(|&&b| b == 0.).count();
        let muted = mask.iter().filter(|&&m| m == 0.).count();
        debug!(
            loss = loss,
            batch_size = batch.len(),
            challenged = challenged,
            muted = muted;
            "rsc update"
        );

        Ok(loss)
    }
}
