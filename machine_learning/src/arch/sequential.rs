use std::mem;

use ndarray::{Array2, ArrayView2};

use super::layers::Layer;
use crate::{MlErr, Result};

/// A sequential model: information flows forward when computing an output and backward when
/// computing the *deltas* of its layers.
///
/// The model views a single contiguous parameter slice, each layer taking the next
/// `layer.size()` values.
#[derive(Debug, Clone)]
pub struct Sequential {
    layers: Vec<Layer>,
}

impl Sequential {
    /// Creates a new `Sequential`.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of.
    ///
    /// # Returns
    /// A new `Sequential` instance.
    pub fn new<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Layer>,
    {
        Self {
            layers: layers.into_iter().collect(),
        }
    }

    /// Returns the amount of parameters in the model.
    pub fn size(&self) -> usize {
        self.layers.iter().map(|layer| layer.size()).sum()
    }

    /// Returns the width of the rows this model consumes, 0 if it has no layers.
    pub fn input_dim(&self) -> usize {
        self.layers.first().map_or(0, |layer| layer.dim().0)
    }

    /// Returns the width of the rows this model produces, 0 if it has no layers.
    pub fn output_dim(&self) -> usize {
        self.layers.last().map_or(0, |layer| layer.dim().1)
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Makes a forward pass through the network, keeping each layer's metadata for a
    /// later `backward`.
    ///
    /// # Arguments
    /// * `params` - The model's parameters.
    /// * `x` - The input data.
    ///
    /// # Returns
    /// The prediction for the given input or an error if occurred.
    pub fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.check_len("model parameters", params.len())?;

        let mut rest = params;
        let mut x = x.to_owned();

        for layer in self.layers.iter_mut() {
            let (head, tail) = rest.split_at(layer.size());
            x = layer.forward(head, x.view())?;
            rest = tail;
        }

        Ok(x)
    }

    /// Makes a forward pass through the network without touching any layer's metadata.
    pub fn infer(&self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.check_len("model parameters", params.len())?;

        let mut rest = params;
        let mut x = x.to_owned();

        for layer in self.layers.iter() {
            let (head, tail) = rest.split_at(layer.size());
            x = layer.infer(head, x.view())?;
            rest = tail;
        }

        Ok(x)
    }

    /// Backpropagates `d` from the last layer to the first one.
    ///
    /// # Arguments
    /// * `params` - The model's parameters, the same ones used in the last `forward`.
    /// * `grad` - The model's gradient buffer, the layers' gradients get accumulated onto it.
    /// * `d` - The gradient of the loss with respect to the model's output.
    ///
    /// # Returns
    /// The gradient of the loss with respect to the model's input.
    pub fn backward(
        &self,
        params: &[f32],
        grad: &mut [f32],
        mut d: Array2<f32>,
    ) -> Result<Array2<f32>> {
        self.check_len("model parameters", params.len())?;
        self.check_len("model gradient", grad.len())?;

        let mut params_rest = params;
        let mut grad_rest = grad;

        for layer in self.layers.iter().rev() {
            let at = params_rest.len() - layer.size();
            let (p_head, p_tail) = params_rest.split_at(at);
            let (g_head, g_tail) = mem::take(&mut grad_rest).split_at_mut(at);

            d = layer.backward(p_tail, g_tail, d)?;

            params_rest = p_head;
            grad_rest = g_head;
        }

        Ok(d)
    }

    fn check_len(&self, what: &'static str, got: usize) -> Result<()> {
        let expected = self.size();

        if got != expected {
            return Err(MlErr::SizeMismatch {
                what,
                got,
                expected,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::arch::activations::ActFn;

    fn model() -> Sequential {
        Sequential::new([
            Layer::dense((2, 3), Some(ActFn::sigmoid(1.))),
            Layer::dense((3, 1), None),
        ])
    }

    fn params(n: usize) -> Vec<f32> {
        (0..n).map(|i| ((i * 7 % 5) as f32 - 2.) * 0.3).collect()
    }

    #[test]
    fn dims_and_size() {
        let model = model();

        assert_eq!(model.size(), 9 + 4);
        assert_eq!(model.input_dim(), 2);
        assert_eq!(model.output_dim(), 1);
    }

    #[test]
    fn forward_and_infer_agree() {
        let mut model = model();
        let params = params(model.size());
        let x = array![[0.5, -1.], [1., 2.]];

        let y = model.forward(&params, x.view()).unwrap();

        assert_eq!(y.dim(), (2, 1));
        assert_eq!(model.infer(&params, x.view()).unwrap(), y);
    }

    #[test]
    fn backward_matches_finite_differences() {
        let mut model = model();
        let params = params(model.size());
        let x = array![[0.5, -1.], [1., 2.]];

        model.forward(&params, x.view()).unwrap();
        let mut grad = vec![0.; model.size()];
        let dx = model
            .backward(&params, &mut grad, Array2::ones((2, 1)))
            .unwrap();

        let eps = 1e-3;
        let loss = |p: &[f32], x: ArrayView2<f32>| model.infer(p, x).unwrap().sum();

        for i in 0..params.len() {
            let mut plus = params.clone();
            let mut minus = params.clone();
            plus[i] += eps;
            minus[i] -= eps;

            let numeric = (loss(&plus, x.view()) - loss(&minus, x.view())) / (2. * eps);
            assert!((numeric - grad[i]).abs() < 1e-3, "param {i}");
        }

        for ((r, c), &analytic) in dx.indexed_iter() {
            let mut plus = x.clone();
            let mut minus = x.clone();
            plus[[r, c]] += eps;
            minus[[r, c]] -= eps;

            let numeric = (loss(&params, plus.view()) - loss(&params, minus.view())) / (2. * eps);
            assert!((numeric - analytic).abs() < 1e-3, "input ({r}, {c})");
        }
    }

    #[test]
    fn wrong_amount_of_params_fails() {
        let model = model();
        let x = array![[0.5, -1.]];

        let err = model.infer(&[0.; 3], x.view()).unwrap_err();

        assert_eq!(
            err,
            MlErr::SizeMismatch {
                what: "model parameters",
                got: 3,
                expected: 13
            }
        );
    }
}
