use serde::{Deserialize, Serialize};

use crate::{MlErr, Result};

/// Decays the learning rate by `gamma` every `step_size` epochs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepLr {
    step_size: usize,
    gamma: f32,
}

impl StepLr {
    /// Creates a new `StepLr`.
    ///
    /// # Returns
    /// An error if `step_size` is 0 or `gamma` is not in `(0, 1]`.
    pub fn new(step_size: usize, gamma: f32) -> Result<Self> {
        if step_size == 0 {
            return Err(MlErr::InvalidHyperparameter {
                name: "step_size",
                value: 0.,
            });
        }

        if !(gamma > 0. && gamma <= 1.) {
            return Err(MlErr::InvalidHyperparameter {
                name: "gamma",
                value: gamma,
            });
        }

        Ok(Self { step_size, gamma })
    }

    /// Returns the learning rate to use during `epoch` (0 based).
    pub fn learning_rate(&self, base: f32, epoch: usize) -> f32 {
        let decays = (epoch / self.step_size) as i32;
        base * self.gamma.powi(decays)
    }
}
