use rand_distr::{NormalError, uniform::Error as UniformError};

use crate::MlErr;

impl From<NormalError> for MlErr {
    fn from(value: NormalError) -> Self {
        Self::ParamGen(value.to_string())
    }
}

impl From<UniformError> for MlErr {
    fn from(value: UniformError) -> Self {
        Self::ParamGen(value.to_string())
    }
}
