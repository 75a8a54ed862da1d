use ndarray::{Array2, ArrayView2};

use crate::{
    MlErr, Result,
    arch::Sequential,
    dataset::Batch,
    optimization::Optimizer,
};

/// A featurizer followed by a classifier, both viewing one contiguous parameter buffer
/// (featurizer first), together with its gradient buffer and its optimizer.
#[derive(Debug, Clone)]
pub struct Network<O: Optimizer> {
    featurizer: Sequential,
    classifier: Sequential,
    num_classes: usize,
    params: Vec<f32>,
    grad: Vec<f32>,
    optimizer: O,
}

impl<O: Optimizer> Network<O> {
    /// Creates a new `Network`.
    ///
    /// # Arguments
    /// * `featurizer` - Maps images to features.
    /// * `classifier` - Maps features to logits, its output width is the amount of classes.
    /// * `params` - The parameters of both models, featurizer first.
    /// * `optimizer` - The optimizer that updates `params`.
    ///
    /// # Returns
    /// A new `Network` or an error if the models don't fit together or with `params`.
    pub fn new(
        featurizer: Sequential,
        classifier: Sequential,
        params: Vec<f32>,
        optimizer: O,
    ) -> Result<Self> {
        if featurizer.output_dim() != classifier.input_dim() {
            return Err(MlErr::ShapeMismatch {
                what: "classifier input",
                got: classifier.input_dim(),
                expected: featurizer.output_dim(),
            });
        }

        let size = featurizer.size() + classifier.size();
        if params.len() != size {
            return Err(MlErr::SizeMismatch {
                what: "network parameters",
                got: params.len(),
                expected: size,
            });
        }

        Ok(Self {
            num_classes: classifier.output_dim(),
            featurizer,
            classifier,
            grad: vec![0.; size],
            params,
            optimizer,
        })
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn input_dim(&self) -> usize {
        self.featurizer.input_dim()
    }

    pub fn feature_dim(&self) -> usize {
        self.featurizer.output_dim()
    }

    pub fn params(&self) -> &[f32] {
        &self.params
    }

    pub fn optimizer(&self) -> &O {
        &self.optimizer
    }

    pub fn optimizer_mut(&mut self) -> &mut O {
        &mut self.optimizer
    }

    /// Replaces the parameters and the optimizer, e.g. when resuming from a checkpoint.
    ///
    /// # Returns
    /// An error if `params` doesn't have the size of the network, in which case nothing changes.
    pub fn restore(&mut self, params: Vec<f32>, optimizer: O) -> Result<()> {
        if params.len() != self.params.len() {
            return Err(MlErr::SizeMismatch {
                what: "restored parameters",
                got: params.len(),
                expected: self.params.len(),
            });
        }

        self.params = params;
        self.optimizer = optimizer;
        Ok(())
    }

    /// Computes the logits of a batch of images without touching any state.
    pub fn predict(&self, images: ArrayView2<f32>) -> Result<Array2<f32>> {
        let (fp, cp) = self.params.split_at(self.featurizer.size());
        let features = self.featurizer.infer(fp, images)?;
        self.classifier.infer(cp, features.view())
    }

    /// Checks that a batch can be fed to this network.
    pub fn validate(&self, batch: &Batch<'_>) -> Result<()> {
        if batch.is_empty() {
            return Err(MlErr::EmptyBatch);
        }

        let images = batch.images();

        if batch.labels().len() != images.nrows() {
            return Err(MlErr::ShapeMismatch {
                what: "labels",
                got: batch.labels().len(),
                expected: images.nrows(),
            });
        }

        if images.ncols() != self.input_dim() {
            return Err(MlErr::ShapeMismatch {
                what: "image width",
                got: images.ncols(),
                expected: self.input_dim(),
            });
        }

        if let Some(&label) = batch.labels().iter().find(|&&l| l >= self.num_classes) {
            return Err(MlErr::ShapeMismatch {
                what: "label",
                got: label,
                expected: self.num_classes,
            });
        }

        Ok(())
    }

    /// Runs the featurizer, keeping what `backward` needs.
    pub(crate) fn features(&mut self, images: ArrayView2<f32>) -> Result<Array2<f32>> {
        let (fp, _) = self.params.split_at(self.featurizer.size());
        self.featurizer.forward(fp, images)
    }

    /// Runs the classifier, keeping what `backward` needs.
    pub(crate) fn classify(&mut self, features: ArrayView2<f32>) -> Result<Array2<f32>> {
        let (_, cp) = self.params.split_at(self.featurizer.size());
        self.classifier.forward(cp, features)
    }

    /// Computes the gradient of `sum(logits * upstream)` with respect to the features of the
    /// last `classify`, leaving the network's gradient untouched.
    pub(crate) fn feature_grad(&self, upstream: Array2<f32>) -> Result<Array2<f32>> {
        let (_, cp) = self.params.split_at(self.featurizer.size());
        let mut scratch = vec![0.; self.classifier.size()];
        self.classifier.backward(cp, &mut scratch, upstream)
    }

    /// Backpropagates `d_logits` through the classifier and the featurizer, overwriting the
    /// network's gradient.
    ///
    /// # Arguments
    /// * `d_logits` - The gradient of the loss with respect to the logits.
    /// * `feature_mask` - A mask that was applied to the features before classifying them.
    pub(crate) fn backward(
        &mut self,
        d_logits: Array2<f32>,
        feature_mask: Option<ArrayView2<f32>>,
    ) -> Result<()> {
        self.grad.fill(0.);

        let at = self.featurizer.size();
        let (fp, cp) = self.params.split_at(at);
        let (fg, cg) = self.grad.split_at_mut(at);

        let mut d = self.classifier.backward(cp, cg, d_logits)?;
        if let Some(mask) = feature_mask {
            d *= &mask;
        }

        self.featurizer.backward(fp, fg, d)?;

        if self.grad.iter().any(|g| !g.is_finite()) {
            return Err(MlErr::NumericFailure { what: "gradient" });
        }

        Ok(())
    }

    /// Lets the optimizer apply the last computed gradient.
    pub(crate) fn step(&mut self) -> Result<()> {
        self.optimizer.update_params(&self.grad, &mut self.params)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::{arch::builder, optimization::GradientDescent};

    fn network() -> Network<GradientDescent> {
        let featurizer = builder::featurizer(2, &[], 3);
        let classifier = builder::classifier(3, 2, false);
        let params = (0..featurizer.size() + classifier.size())
            .map(|i| (i % 5) as f32 * 0.1 - 0.2)
            .collect();

        Network::new(featurizer, classifier, params, GradientDescent::new(0.1)).unwrap()
    }

    #[test]
    fn models_must_fit_together() {
        let featurizer = builder::featurizer(2, &[], 3);
        let classifier = builder::classifier(4, 2, false);
        let size = featurizer.size() + classifier.size();

        let err = Network::new(featurizer, classifier, vec![0.; size], GradientDescent::new(0.1))
            .unwrap_err();

        assert!(matches!(err, MlErr::ShapeMismatch { what: "classifier input", .. }));
    }

    #[test]
    fn params_must_match_the_models() {
        let featurizer = builder::featurizer(2, &[], 3);
        let classifier = builder::classifier(3, 2, false);

        let err = Network::new(featurizer, classifier, vec![0.; 3], GradientDescent::new(0.1))
            .unwrap_err();

        assert_eq!(
            err,
            MlErr::SizeMismatch {
                what: "network parameters",
                got: 3,
                expected: 9 + 8
            }
        );
    }

    #[test]
    fn validate_rejects_bad_batches() {
        let net = network();
        let images = array![[0., 1.], [1., 0.]];
        let wide = array![[0., 1., 2.]];

        assert_eq!(
            net.validate(&Batch::new(images.slice(ndarray::s![0..0, ..]), &[])),
            Err(MlErr::EmptyBatch)
        );
        assert_eq!(
            net.validate(&Batch::new(images.view(), &[0])),
            Err(MlErr::ShapeMismatch {
                what: "labels",
                got: 1,
                expected: 2
            })
        );
        assert_eq!(
            net.validate(&Batch::new(wide.view(), &[0])),
            Err(MlErr::ShapeMismatch {
                what: "image width",
                got: 3,
                expected: 2
            })
        );
        assert_eq!(
            net.validate(&Batch::new(images.view(), &[0, 2])),
            Err(MlErr::ShapeMismatch {
                what: "label",
                got: 2,
                expected: 2
            })
        );
        assert!(net.validate(&Batch::new(images.view(), &[0, 1])).is_ok());
    }

    #[test]
    fn restore_checks_the_size() {
        let mut net = network();
        let before = net.params().to_vec();

        let err = net.restore(vec![0.; 2], GradientDescent::new(1.)).unwrap_err();

        assert!(matches!(err, MlErr::SizeMismatch { .. }));
        assert_eq!(net.params(), before);
        assert_eq!(net.optimizer().learning_rate(), 0.1);
    }

    #[test]
    fn predict_matches_the_training_forward() {
        let mut net = network();
        let images = array![[0.5, -1.], [2., 0.3]];

        let predicted = net.predict(images.view()).unwrap();
        let features = net.features(images.view()).unwrap();
        let logits = net.classify(features.view()).unwrap();

        assert_eq!(predicted, logits);
    }
}
