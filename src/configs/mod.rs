mod experiment;
mod validation;

pub use experiment::{
    ActFnConfig, AlgorithmConfig, DatasetConfig, ExperimentConfig, Hyperparameters, ModelConfig,
    ParamGenConfig, SchedulerConfig,
};
