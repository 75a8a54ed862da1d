use serde::{Deserialize, Serialize};

use super::Optimizer;
use crate::{MlErr, Result};

/// Adam with L2 weight decay (the decay term is added to the gradient before the moment
/// estimates are updated).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adam {
    learning_rate: f32,
    beta1: f32,
    beta2: f32,
    beta1_t: f32,
    beta2_t: f32,
    v: Box<[f32]>,
    s: Box<[f32]>,
    epsilon: f32,
    weight_decay: f32,
}

impl Adam {
    pub const BETA1: f32 = 0.9;
    pub const BETA2: f32 = 0.999;
    pub const EPSILON: f32 = 1e-8;

    /// Creates a new `Adam` optimizer.
    ///
    /// # Arguments
    /// * `len` - The amount of parameters this instance should hold.
    /// * `learning_rate` - The small coefficient that modulates the amount of training per update.
    /// * `beta1`, `beta2`, `epsilon` - Hyperparameters to the optimization algorithm.
    /// * `weight_decay` - The L2 penalty coefficient.
    ///
    /// # Returns
    /// A new `Adam` instance.
    pub fn new(
        len: usize,
        learning_rate: f32,
        beta1: f32,
        beta2: f32,
        epsilon: f32,
        weight_decay: f32,
    ) -> Self {
        Self {
            learning_rate,
            beta1,
            beta2,
            beta1_t: 1.,
            beta2_t: 1.,
            v: vec![0.; len].into_boxed_slice(),
            s: vec![0.; len].into_boxed_slice(),
            epsilon,
            weight_decay,
        }
    }

    /// Creates a new `Adam` optimizer with the usual betas and epsilon.
    pub fn with_defaults(len: usize, learning_rate: f32, weight_decay: f32) -> Self {
        Self::new(
            len,
            learning_rate,
            Self::BETA1,
            Self::BETA2,
            Self::EPSILON,
            weight_decay,
        )
    }

    /// Returns the amount of parameters this instance holds state for.
    pub fn len(&self) -> usize {
        self.v.len()
    }

    pub fn is_empty(&self) -> bool {
        self.v.is_empty()
    }
}

impl Optimizer for Adam {
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()> {
        if grad.len() != params.len() {
            return Err(MlErr::SizeMismatch {
                what: "gradient",
                got: grad.len(),
                expected: params.len(),
            });
        }

        if self.v.len() != params.len() {
            return Err(MlErr::SizeMismatch {
                what: "optimizer state",
                got: self.v.len(),
                expected: params.len(),
            });
        }

        let Self {
            learning_rate: lr,
            beta1: b1,
            beta2: b2,
            epsilon: eps,
            weight_decay: wd,
            ..
        } = *self;

        self.beta1_t *= b1;
        self.beta2_t *= b2;

        let bc1 = 1. - self.beta1_t;
        let bc2 = 1. - self.beta2_t;
        let step_size = lr * (bc2.sqrt() / bc1);

        params
            .iter_mut()
            .zip(grad)
            .zip(self.v.iter_mut())
            .zip(self.s.iter_mut())
            .for_each(|(((p, g), v), s)| {
                let g = g + wd * *p;
                *v = b1 * *v + (1. - b1) * g;
                *s = b2 * *s + (1. - b2) * g.powi(2);
                *p -= step_size * *v / (s.sqrt() + eps);
            });

        Ok(())
    }

    fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, learning_rate: f32) {
        self.learning_rate = learning_rate;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_step_moves_by_learning_rate() {
        let mut adam = Adam::with_defaults(2, 0.1, 0.);
        let mut params = [1., 1.];

        adam.update_params(&[3., -0.5], &mut params).unwrap();

        // The bias corrected first step is lr * sign(g).
        assert!((params[0] - 0.9).abs() < 1e-4);
        assert!((params[1] - 1.1).abs() < 1e-4);
    }

    #[test]
    fn weight_decay_pulls_towards_zero() {
        let mut adam = Adam::with_defaults(1, 0.1, 1.);
        let mut params = [2.];

        adam.update_params(&[0.], &mut params).unwrap();

        assert!(params[0] < 2.);
    }

    #[test]
    fn state_mismatch_leaves_everything_untouched() {
        let mut adam = Adam::with_defaults(3, 0.1, 0.);
        let before = adam.clone();
        let mut params = [1., 1.];

        let err = adam.update_params(&[1., 1.], &mut params).unwrap_err();

        assert!(matches!(err, MlErr::SizeMismatch { what: "optimizer state", .. }));
        assert_eq!(adam, before);
        assert_eq!(params, [1., 1.]);
    }

    #[test]
    fn learning_rate_can_be_overridden() {
        let mut adam = Adam::with_defaults(1, 0.1, 0.);

        adam.set_learning_rate(0.01);

        assert_eq!(adam.learning_rate(), 0.01);
    }

    #[test]
    fn serialized_state_continues_the_same_trajectory() {
        let mut adam = Adam::with_defaults(2, 0.05, 0.01);
        let mut params = [0.5, -0.5];
        adam.update_params(&[1., 2.], &mut params).unwrap();

        let json = serde_json::to_string(&adam).unwrap();
        let mut restored: Adam = serde_json::from_str(&json).unwrap();
        let mut restored_params = params;

        adam.update_params(&[-0.3, 0.7], &mut params).unwrap();
        restored
            .update_params(&[-0.3, 0.7], &mut restored_params)
            .unwrap();

        for (a, b) in params.iter().zip(&restored_params) {
            assert!((a - b).abs() < 1e-6);
        }
    }
}
