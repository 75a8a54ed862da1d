use std::{cell::RefCell, rc::Rc};

use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};

use super::ParamGen;
use crate::Result;

/// A parameter generator that follows a certain probabilistic distribution.
pub struct RandParamGen<R: Rng, D: Distribution<f32>> {
    rng: Rc<RefCell<R>>,
    distribution: D,
    left: usize,
}

impl<R: Rng, D: Distribution<f32>> RandParamGen<R, D> {
    /// Creates a new `RandParamGen` parameter generator.
    ///
    /// # Arguments
    /// * `rng` - A random number generator, shared between the generators of a model.
    /// * `distribution` - The distribution to sample the random numbers from.
    /// * `limit` - The maximum amount of numbers to generate.
    pub fn new(rng: Rc<RefCell<R>>, distribution: D, limit: usize) -> Self {
        Self {
            rng,
            distribution,
            left: limit,
        }
    }
}

impl<R: Rng> RandParamGen<R, Uniform<f32>> {
    /// Creates a new `RandParamGen` with a uniform distribution over `[low, high)`.
    ///
    /// # Returns
    /// An error if the range is invalid (low >= high).
    pub fn uniform(rng: Rc<RefCell<R>>, limit: usize, low: f32, high: f32) -> Result<Self> {
        Ok(Self::new(rng, Uniform::new(low, high)?, limit))
    }

    /// Creates a new `RandParamGen` using Xavier uniform initialization.
    ///
    /// # Arguments
    /// * `rng` - A random number generator.
    /// * `limit` - The maximum amount of numbers to generate.
    /// * `fan_in` - The number of input units in the weight tensor.
    /// * `fan_out` - The number of output units in the weight tensor.
    pub fn xavier_uniform(
        rng: Rc<RefCell<R>>,
        limit: usize,
        fan_in: usize,
        fan_out: usize,
    ) -> Result<Self> {
        let range = (6. / (fan_in + fan_out) as f32).sqrt();
        Self::uniform(rng, limit, -range, range)
    }
}

impl<R: Rng> RandParamGen<R, Normal<f32>> {
    /// Creates a new `RandParamGen` with a normal distribution.
    ///
    /// # Returns
    /// An error if `std_dev` is not finite (Nan or infinite).
    pub fn normal(rng: Rc<RefCell<R>>, limit: usize, mean: f32, std_dev: f32) -> Result<Self> {
        Ok(Self::new(rng, Normal::new(mean, std_dev)?, limit))
    }

    /// Creates a new `RandParamGen` using Kaiming normal initialization.
    ///
    /// # Arguments
    /// * `rng` - A random number generator.
    /// * `limit` - The maximum amount of numbers to generate.
    /// * `fan_in` - The number of input units in the weight tensor.
    pub fn kaiming(rng: Rc<RefCell<R>>, limit: usize, fan_in: usize) -> Result<Self> {
        let std_dev = (2. / fan_in.max(1) as f32).sqrt();
        Self::normal(rng, limit, 0., std_dev)
    }

    /// Creates a new `RandParamGen` using LeCun normal initialization.
    pub fn lecun(rng: Rc<RefCell<R>>, limit: usize, fan_in: usize) -> Result<Self> {
        let std_dev = (1. / fan_in.max(1) as f32).sqrt();
        Self::normal(rng, limit, 0., std_dev)
    }
}

impl<R: Rng, D: Distribution<f32>> ParamGen for RandParamGen<R, D> {
    fn sample(&mut self, n: usize) -> Option<Vec<f32>> {
        let count = n.min(self.left);
        if count == 0 {
            return None;
        }

        self.left -= count;

        let mut rng = self.rng.borrow_mut();
        Some((&self.distribution).sample_iter(&mut *rng).take(count).collect())
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn seeded_rng() -> Rc<RefCell<StdRng>> {
        Rc::new(RefCell::new(StdRng::seed_from_u64(42)))
    }

    #[test]
    fn the_last_sample_is_cut_short() {
        let mut param_gen = RandParamGen::normal(seeded_rng(), 10, 0., 1.).unwrap();

        assert_eq!(param_gen.sample(7).unwrap().len(), 7);
        assert_eq!(param_gen.sample(7).unwrap().len(), 3);
        assert!(param_gen.sample(1).is_none());
    }

    #[test]
    fn same_seed_same_sample() {
        let mut a = RandParamGen::kaiming(seeded_rng(), 16, 4).unwrap();
        let mut b = RandParamGen::kaiming(seeded_rng(), 16, 4).unwrap();

        assert_eq!(a.sample(16), b.sample(16));
    }

    #[test]
    fn xavier_uniform_stays_in_range() {
        let mut param_gen = RandParamGen::xavier_uniform(seeded_rng(), 100, 2, 4).unwrap();
        let range = 1f32;

        assert!(param_gen
            .sample(100)
            .unwrap()
            .iter()
            .all(|p| (-range..range).contains(p)));
    }

    #[test]
    fn lecun_is_narrower_than_kaiming() {
        let n = 4000;
        let spread = |params: Vec<f32>| params.iter().map(|p| p * p).sum::<f32>() / n as f32;

        let lecun = RandParamGen::lecun(seeded_rng(), n, 8).unwrap().sample(n).unwrap();
        let kaiming = RandParamGen::kaiming(seeded_rng(), n, 8).unwrap().sample(n).unwrap();

        // variances of 1/8 and 2/8
        assert!((spread(lecun) - 0.125).abs() < 0.02);
        assert!((spread(kaiming) - 0.25).abs() < 0.04);
    }

    #[test]
    fn invalid_std_dev_fails() {
        assert!(RandParamGen::normal(seeded_rng(), 1, 0., f32::NAN).is_err());
    }
}
