use super::{Relu, Sigmoid};

/// An element-wise activation function applied at the end of a layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActFn {
    Sigmoid(Sigmoid),
    Relu(Relu),
}

impl ActFn {
    pub fn sigmoid(amp: f32) -> Self {
        Self::Sigmoid(Sigmoid::new(amp))
    }

    pub fn relu() -> Self {
        Self::Relu(Relu)
    }

    pub fn f(&self, x: f32) -> f32 {
        match self {
            Self::Sigmoid(a) => a.f(x),
            Self::Relu(a) => a.f(x),
        }
    }

    pub fn df(&self, x: f32) -> f32 {
        match self {
            Self::Sigmoid(a) => a.df(x),
            Self::Relu(a) => a.df(x),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relu_dispatches_to_the_rectifier() {
        let act_fn = ActFn::relu();

        assert_eq!(act_fn, ActFn::Relu(Relu));
        assert_eq!(act_fn.f(-1.), 0.);
        assert_eq!(act_fn.f(2.), 2.);
        assert_eq!(act_fn.df(-1.), 0.);
        assert_eq!(act_fn.df(2.), 1.);
    }

    #[test]
    fn sigmoid_dispatches_with_its_amplitude() {
        let act_fn = ActFn::sigmoid(2.);

        assert_eq!(act_fn, ActFn::Sigmoid(Sigmoid::new(2.)));
        assert_eq!(act_fn.f(0.), 1.);
        assert_eq!(act_fn.df(0.), 0.5);
    }
}
