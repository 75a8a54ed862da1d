pub mod activations;
pub mod builder;
pub mod layers;
pub mod loss;
pub mod ops;
mod sequential;

pub use sequential::Sequential;
