use crate::{MlErr, Result};

/// Yields the initial values of a model's parameters, in layout order.
pub trait ParamGen {
    /// Draws up to `n` values.
    ///
    /// # Returns
    /// `None` once the generator has nothing left to give, otherwise between 1 and `n` values.
    fn sample(&mut self, n: usize) -> Option<Vec<f32>>;

    /// Draws exactly `n` values.
    ///
    /// # Returns
    /// The values or a `ParamGen` error if the generator runs dry first.
    fn sample_exact(&mut self, n: usize) -> Result<Vec<f32>> {
        let values = self.sample(n).unwrap_or_default();

        if values.len() != n {
            return Err(MlErr::ParamGen(format!(
                "expected {n} values, generated {}",
                values.len()
            )));
        }

        Ok(values)
    }
}
