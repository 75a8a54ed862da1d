/// Logistic function scaled by `amp`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Sigmoid {
    amp: f32,
}

impl Sigmoid {
    pub fn new(amp: f32) -> Self {
        Self { amp }
    }

    pub fn f(&self, z: f32) -> f32 {
        self.amp / (1. + (-z).exp())
    }

    pub fn df(&self, z: f32) -> f32 {
        let amp = self.amp;

        (amp * (-z).exp()) / ((-z).exp() + 1.).powi(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivative_peaks_at_zero() {
        let sigmoid = Sigmoid::new(1.);

        assert_eq!(sigmoid.f(0.), 0.5);
        assert_eq!(sigmoid.df(0.), 0.25);
        assert!(sigmoid.df(3.) < sigmoid.df(0.));
    }
}
