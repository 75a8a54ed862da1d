use std::{fmt, io};

use machine_learning::MlErr;

/// All errors that can occur while running a training session.
#[derive(Debug)]
pub enum SessionErr {
    /// Invalid configuration, caught before training starts.
    InvalidConfig(String),
    /// The dataset couldn't be built from its source (ragged rows, unknown domain, ...).
    InvalidDataset(String),
    /// Reading or writing a file failed.
    Io(io::Error),
    /// A configuration, dataset or checkpoint file isn't valid JSON for its type.
    Json(serde_json::Error),
    /// The training core rejected an operation.
    Ml(MlErr),
}

impl fmt::Display for SessionErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::InvalidDataset(msg) => write!(f, "invalid dataset: {msg}"),
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::Json(e) => write!(f, "json error: {e}"),
            Self::Ml(e) => write!(f, "training error: {e}"),
        }
    }
}

impl std::error::Error for SessionErr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::Ml(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for SessionErr {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for SessionErr {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

impl From<MlErr> for SessionErr {
    fn from(e: MlErr) -> Self {
        Self::Ml(e)
    }
}

pub type Result<T> = std::result::Result<T, SessionErr>;
