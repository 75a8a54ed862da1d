use super::ParamGen;

/// Repeats a single value a fixed amount of times, e.g. for biases.
pub struct ConstParamGen {
    value: f32,
    left: usize,
}

impl ConstParamGen {
    /// Creates a generator yielding `value` at most `limit` times.
    pub fn new(value: f32, limit: usize) -> Self {
        Self { value, left: limit }
    }

    /// Creates a generator yielding `limit` zeros.
    pub fn zeros(limit: usize) -> Self {
        Self::new(0., limit)
    }
}

impl ParamGen for ConstParamGen {
    fn sample(&mut self, n: usize) -> Option<Vec<f32>> {
        let count = n.min(self.left);
        if count == 0 {
            return None;
        }

        self.left -= count;
        Some(vec![self.value; count])
    }
}
