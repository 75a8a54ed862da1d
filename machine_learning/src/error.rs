use std::{
    error::Error,
    fmt::{self, Display},
};

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug, Clone, PartialEq)]
pub enum MlErr {
    /// The batch given to an update has no examples.
    EmptyBatch,
    /// The shape of some input doesn't agree with the model (e.g. a label outside
    /// `[0, num_classes)` or an image row of the wrong width).
    ShapeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    /// The batch is too small for the statistics the update needs.
    DegenerateBatch {
        got: usize,
        min: usize,
    },
    /// A loss or a gradient is not a finite number.
    NumericFailure {
        what: &'static str,
    },
    /// Two internal buffers (parameters, gradients, optimizer state) have different lengths.
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    BackwardBeforeForward,
    InvalidHyperparameter {
        name: &'static str,
        value: f32,
    },
    ParamGen(String),
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::EmptyBatch => write!(f, "the batch has no examples"),
            MlErr::ShapeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "shape mismatch for {what}: got {got}, expected {expected}"
            ),
            MlErr::DegenerateBatch { got, min } => write!(
                f,
                "degenerate batch: got {got} example(s), at least {min} are required"
            ),
            MlErr::NumericFailure { what } => write!(f, "non finite values found in {what}"),
            MlErr::SizeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "There's a size mismatch in {what}, got {got} and expected {expected}"
            ),
            MlErr::BackwardBeforeForward => {
                write!(f, "tried to make a backward pass before a forward pass")
            }
            MlErr::InvalidHyperparameter { name, value } => {
                write!(f, "invalid value for hyperparameter {name}: {value}")
            }
            MlErr::ParamGen(msg) => write!(f, "failed to generate parameters: {msg}"),
        }
    }
}

impl Error for MlErr {}
