use crate::Result;

/// Defines the strategy for updating model parameters based on calculated gradients.
pub trait Optimizer {
    /// Updates the provided slice of parameters using the gradient.
    ///
    /// # Arguments
    /// * `grad` - A reference to the model's gradient.
    /// * `params` - The parameters to update.
    ///
    /// # Returns
    /// An error if there's a mismatch in the sizes of `grad` and `params`, in which case
    /// neither the parameters nor the optimizer's state are modified.
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()>;

    /// Returns the current learning rate.
    fn learning_rate(&self) -> f32;

    /// Overrides the learning rate used by the following updates.
    fn set_learning_rate(&mut self, learning_rate: f32);
}
