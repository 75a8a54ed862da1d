use std::{
    fs,
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// The training algorithm to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmConfig {
    Erm,
    Rsc,
}

/// The hyperparameters shared by every algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hyperparameters {
    pub learning_rate: f32,
    pub weight_decay: f32,
    /// The fraction of feature channels RSC keeps per example, so `0.33` mutes the top 67%
    /// of the gradient's channels. Use `0.67` to mute the top third.
    pub rsc_f_drop_factor: f32,
    /// The fraction of the batch RSC gives its features back to, so `0.33` leaves 67% of the
    /// examples muted. Use `0.67` to restore two thirds of them.
    pub rsc_b_drop_factor: f32,
    pub nonlinear_classifier: bool,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            learning_rate: 0.001,
            weight_decay: 0.,
            rsc_f_drop_factor: 1. / 3.,
            rsc_b_drop_factor: 1. / 3.,
            nonlinear_classifier: false,
        }
    }
}

/// The activation after every featurizer layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActFnConfig {
    #[default]
    Relu,
    Sigmoid {
        amp: f32,
    },
}

/// How the weights of every layer are drawn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamGenConfig {
    #[default]
    Kaiming,
    XavierUniform,
    Lecun,
}

/// The shape of the featurizer, the classifier head follows from `feature_dim`, the amount of
/// classes and `Hyperparameters::nonlinear_classifier`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub featurizer_hidden: Vec<usize>,
    pub feature_dim: usize,
    #[serde(default)]
    pub act_fn: ActFnConfig,
    #[serde(default)]
    pub init: ParamGenConfig,
}

/// Where the labeled images of every domain come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetConfig {
    /// Gaussian class clusters shared by every domain, each domain shifting and rescaling them.
    Synthetic {
        num_classes: usize,
        input_dim: usize,
        samples_per_domain: usize,
        domains: Vec<String>,
        #[serde(default = "default_domain_shift")]
        domain_shift: f32,
    },
    /// A JSON file mapping every domain name to its `images` and `labels`.
    Local { path: PathBuf },
}

fn default_domain_shift() -> f32 {
    1.
}

/// Decays the learning rate by `gamma` every `step_size` epochs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub step_size: usize,
    pub gamma: f32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            step_size: 5,
            gamma: 0.1,
        }
    }
}

fn default_eval_every() -> NonZeroUsize {
    NonZeroUsize::new(10).unwrap_or(NonZeroUsize::MIN)
}

/// The whole description of a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub algorithm: AlgorithmConfig,
    #[serde(default)]
    pub hparams: Hyperparameters,
    pub model: ModelConfig,
    pub dataset: DatasetConfig,
    pub train_domains: Vec<String>,
    pub test_domain: String,
    pub batch_size: NonZeroUsize,
    /// The total amount of updates, turned into epochs once the training set size is known.
    pub iterations: usize,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Evaluate on the held-out domain every this many epochs.
    #[serde(default = "default_eval_every")]
    pub eval_every: NonZeroUsize,
    pub output_dir: PathBuf,
    #[serde(default)]
    pub resume_from: Option<PathBuf>,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl ExperimentConfig {
    /// Reads and validates a configuration file.
    ///
    /// # Arguments
    /// * `path` - The path to a JSON configuration.
    ///
    /// # Returns
    /// The configuration or an error if it can't be read, parsed or is invalid.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }
}
