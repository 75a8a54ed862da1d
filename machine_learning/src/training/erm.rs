use log::debug;

use super::{Network, Trainer};
use crate::{
    MlErr, Result,
    arch::{
        loss::{CrossEntropy, LossFn},
        ops,
    },
    dataset::Batch,
    optimization::Optimizer,
};

/// Empirical risk minimization: plain cross entropy training over the pooled domains.
#[derive(Debug, Clone)]
pub struct ErmTrainer<O: Optimizer> {
    network: Network<O>,
    loss_fn: CrossEntropy,
}

impl<O: Optimizer> ErmTrainer<O> {
    pub fn new(network: Network<O>) -> Self {
        Self {
            network,
            loss_fn: CrossEntropy::new(),
        }
    }
}

impl<O: Optimizer> Trainer for ErmTrainer<O> {
    type Optimizer = O;

    fn network(&self) -> &Network<O> {
        &self.network
    }

    fn network_mut(&mut self) -> &mut Network<O> {
        &mut self.network
    }

    fn update(&mut self, batch: &Batch<'_>) -> Result<f32> {
        self.network.validate(batch)?;

        let y = ops::one_hot(batch.labels(), self.network.num_classes())?;
        let features = self.network.features(batch.images())?;
        let logits = self.network.classify(features.view())?;

        let loss = self.loss_fn.loss(logits.view(), y.view());
        if !loss.is_finite() {
            return Err(MlErr::NumericFailure { what: "loss" });
        }

        let d = self.loss_fn.loss_prime(logits.view(), y.view());
        self.network.backward(d, None)?;
        self.network.step()?;

        debug!(loss = loss, batch_size = batch.len(); "erm update");
        Ok(loss)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::{arch::builder, optimization::GradientDescent};

    fn trainer() -> ErmTrainer<GradientDescent> {
        let featurizer = builder::featurizer(2, &[], 4);
        let classifier = builder::classifier(4, 2, false);
        let params = (0..featurizer.size() + classifier.size())
            .map(|i| ((i * 7) % 11) as f32 * 0.05 - 0.2)
            .collect();
        let network =
            Network::new(featurizer, classifier, params, GradientDescent::new(0.5)).unwrap();

        ErmTrainer::new(network)
    }

    #[test]
    fn a_single_example_is_enough() {
        let mut trainer = trainer();
        let images = array![[1., -1.]];

        let loss = trainer.update(&Batch::new(images.view(), &[1])).unwrap();

        assert!(loss.is_finite() && loss > 0.);
    }

    #[test]
    fn repeated_updates_reduce_the_loss() {
        let mut trainer = trainer();
        let images = array![[1., 0.], [0., 1.], [0.9, 0.1], [0.2, 0.8]];
        let labels = [0, 1, 0, 1];
        let batch = Batch::new(images.view(), &labels);

        let first = trainer.update(&batch).unwrap();
        let mut last = first;
        for _ in 0..50 {
            last = trainer.update(&batch).unwrap();
        }

        assert!(last < first, "{last} >= {first}");
    }

    #[test]
    fn failed_updates_leave_the_state_untouched() {
        let mut trainer = trainer();
        let before = trainer.network().params().to_vec();
        let images = array![[1., 0.], [0., 1.]];

        let err = trainer
            .update(&Batch::new(images.view(), &[0, 5]))
            .unwrap_err();

        assert!(matches!(err, MlErr::ShapeMismatch { what: "label", .. }));
        assert_eq!(trainer.network().params(), before);
    }

    #[test]
    fn predict_is_pure() {
        let trainer = trainer();
        let images = array![[0.3, 0.7], [-1., 2.]];

        let a = trainer.predict(images.view()).unwrap();
        let b = trainer.predict(images.view()).unwrap();

        assert_eq!(a, b);
        assert_eq!(a.dim(), (2, 2));
    }
}
