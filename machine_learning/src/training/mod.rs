mod erm;
pub mod masking;
mod network;
mod rsc;
mod trainer;

pub use erm::ErmTrainer;
pub use network::Network;
pub use rsc::{Challenge, MIN_BATCH_SIZE, RscTrainer};
pub use trainer::Trainer;
