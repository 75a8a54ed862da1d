use std::num::NonZeroUsize;

use machine_learning::{
    arch::{
        activations::ActFn,
        builder::{self, WeightInit},
    },
    optimization::Adam,
    training::{ErmTrainer, Network, RscTrainer, Trainer},
};
use rand::{SeedableRng, rngs::StdRng};

use crate::{
    configs::{ActFnConfig, AlgorithmConfig, ExperimentConfig, ParamGenConfig},
    error::Result,
};

/// A trainer of either algorithm, optimized with Adam.
pub type BoxedTrainer = Box<dyn Trainer<Optimizer = Adam>>;

/// Builds the network and the trainer an `ExperimentConfig` describes.
pub struct TrainerBuilder<'a> {
    config: &'a ExperimentConfig,
}

impl<'a> TrainerBuilder<'a> {
    pub fn new(config: &'a ExperimentConfig) -> Self {
        Self { config }
    }

    /// Builds a freshly initialized network.
    ///
    /// # Arguments
    /// * `input_dim` - The width of the images.
    /// * `num_classes` - The amount of classes.
    /// * `seed` - The seed for the parameters' initialization.
    pub fn build_network(
        &self,
        input_dim: NonZeroUsize,
        num_classes: usize,
        seed: u64,
    ) -> Result<Network<Adam>> {
        let hparams = &self.config.hparams;
        let model = &self.config.model;

        let featurizer = builder::featurizer_with(
            input_dim.get(),
            &model.featurizer_hidden,
            model.feature_dim,
            act_fn(model.act_fn),
        );
        let classifier =
            builder::classifier(model.feature_dim, num_classes, hparams.nonlinear_classifier);

        let params = builder::init_params_with(
            &[&featurizer, &classifier],
            weight_init(model.init),
            StdRng::seed_from_u64(seed),
        )?;
        let optimizer =
            Adam::with_defaults(params.len(), hparams.learning_rate, hparams.weight_decay);

        Ok(Network::new(featurizer, classifier, params, optimizer)?)
    }

    /// Builds the configured trainer around a freshly initialized network.
    pub fn build(
        &self,
        input_dim: NonZeroUsize,
        num_classes: usize,
        seed: u64,
    ) -> Result<BoxedTrainer> {
        let network = self.build_network(input_dim, num_classes, seed)?;
        let hparams = &self.config.hparams;

        let trainer: BoxedTrainer = match self.config.algorithm {
            AlgorithmConfig::Erm => Box::new(ErmTrainer::new(network)),
            AlgorithmConfig::Rsc => Box::new(RscTrainer::new(
                network,
                hparams.rsc_f_drop_factor,
                hparams.rsc_b_drop_factor,
            )?),
        };

        Ok(trainer)
    }
}

fn act_fn(config: ActFnConfig) -> ActFn {
    match config {
        ActFnConfig::Relu => ActFn::relu(),
        ActFnConfig::Sigmoid { amp } => ActFn::sigmoid(amp),
    }
}

fn weight_init(config: ParamGenConfig) -> WeightInit {
    match config {
        ParamGenConfig::Kaiming => WeightInit::Kaiming,
        ParamGenConfig::XavierUniform => WeightInit::XavierUniform,
        ParamGenConfig::Lecun => WeightInit::Lecun,
    }
}
