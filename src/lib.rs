pub mod builder;
pub mod checkpoint;
pub mod configs;
pub mod data;
pub mod error;
pub mod evaluation;
pub mod session;

pub use error::SessionErr;
pub use session::{Session, Summary};
