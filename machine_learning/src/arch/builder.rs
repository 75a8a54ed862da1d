use std::{cell::RefCell, rc::Rc};

use rand::Rng;

use super::{Sequential, activations::ActFn, layers::Layer};
use crate::{
    Result,
    initialization::{ConstParamGen, ParamGen, RandParamGen},
};

/// How the weights of every dense layer are drawn, biases always start at zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WeightInit {
    /// Normal with standard deviation `sqrt(2 / fan_in)`.
    #[default]
    Kaiming,
    /// Uniform over `[-r, r)` with `r = sqrt(6 / (fan_in + fan_out))`.
    XavierUniform,
    /// Normal with standard deviation `sqrt(1 / fan_in)`.
    Lecun,
}

/// Builds a featurizer with a ReLU after every layer.
pub fn featurizer(input_dim: usize, hidden: &[usize], feature_dim: usize) -> Sequential {
    featurizer_with(input_dim, hidden, feature_dim, ActFn::relu())
}

/// Builds a featurizer: a stack of dense layers going from `input_dim` through every width in
/// `hidden` to `feature_dim`, with `act_fn` after every layer.
pub fn featurizer_with(
    input_dim: usize,
    hidden: &[usize],
    feature_dim: usize,
    act_fn: ActFn,
) -> Sequential {
    let dims: Vec<_> = std::iter::once(input_dim)
        .chain(hidden.iter().copied())
        .chain(std::iter::once(feature_dim))
        .collect();

    Sequential::new(
        dims.windows(2)
            .map(|w| Layer::dense((w[0], w[1]), Some(act_fn))),
    )
}

/// Builds the classifier head that maps features to logits.
///
/// # Arguments
/// * `feature_dim` - The width of the features.
/// * `num_classes` - The amount of classes, i.e. the width of the logits.
/// * `nonlinear` - Whether to use a three layer perceptron (`D -> D/2 -> D/4 -> classes`)
///   instead of a single linear layer.
pub fn classifier(feature_dim: usize, num_classes: usize, nonlinear: bool) -> Sequential {
    if !nonlinear {
        return Sequential::new([Layer::dense((feature_dim, num_classes), None)]);
    }

    let half = (feature_dim / 2).max(1);
    let quarter = (feature_dim / 4).max(1);

    Sequential::new([
        Layer::dense((feature_dim, half), Some(ActFn::relu())),
        Layer::dense((half, quarter), Some(ActFn::relu())),
        Layer::dense((quarter, num_classes), None),
    ])
}

/// Generates the initial parameters for the given models with Kaiming initialized weights.
pub fn init_params<R: Rng>(models: &[&Sequential], rng: R) -> Result<Vec<f32>> {
    init_params_with(models, WeightInit::Kaiming, rng)
}

/// Generates the initial parameters for the given models, concatenated in order.
///
/// Every dense layer gets `fan_in * fan_out` weights drawn as `init` says, followed by
/// `fan_out` zeroed biases, matching the layout the layers read their parameters in.
///
/// # Arguments
/// * `models` - The models to initialize, their parameters are laid out one after the other.
/// * `init` - How to draw the weights.
/// * `rng` - The random number generator to draw the weights with.
///
/// # Returns
/// The parameters or an error if a distribution couldn't be built.
pub fn init_params_with<R: Rng>(
    models: &[&Sequential],
    init: WeightInit,
    rng: R,
) -> Result<Vec<f32>> {
    let rng = Rc::new(RefCell::new(rng));
    let size = models.iter().map(|model| model.size()).sum();
    let mut params = Vec::with_capacity(size);

    for layer in models.iter().flat_map(|model| model.layers()) {
        let (fan_in, fan_out) = layer.dim();
        let n = fan_in * fan_out;

        let weights = match init {
            WeightInit::Kaiming => RandParamGen::kaiming(rng.clone(), n, fan_in)?.sample_exact(n),
            WeightInit::XavierUniform => {
                RandParamGen::xavier_uniform(rng.clone(), n, fan_in, fan_out)?.sample_exact(n)
            }
            WeightInit::Lecun => RandParamGen::lecun(rng.clone(), n, fan_in)?.sample_exact(n),
        }?;

        params.extend(weights);
        params.extend(ConstParamGen::zeros(fan_out).sample_exact(fan_out)?);
    }

    Ok(params)
}
