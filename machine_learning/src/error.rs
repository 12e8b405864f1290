use std::{
    error::Error,
    fmt::{self, Display},
};

use codec::CodecErr;

use crate::NormalizerKind;

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug)]
pub enum MlErr {
    ShapeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    NormalizerNotFit {
        which: NormalizerKind,
    },
    NumericDivergence {
        what: &'static str,
    },
    EmptyDataset,
    InvalidLayout(String),
    Codec(CodecErr),
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::ShapeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "There's a shape mismatch in {what}, got {got} and expected {expected}"
            ),
            MlErr::NormalizerNotFit { which } => {
                write!(f, "The {which} normalizer was used before being fit")
            }
            MlErr::NumericDivergence { what } => {
                write!(f, "Found a non finite value in {what}, the model state is corrupted")
            }
            MlErr::EmptyDataset => write!(f, "Tried to fit or train on an empty dataset"),
            MlErr::InvalidLayout(detail) => write!(f, "Invalid model layout: {detail}"),
            MlErr::Codec(e) => write!(f, "Checkpoint codec error: {e}"),
        }
    }
}

impl Error for MlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MlErr::Codec(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CodecErr> for MlErr {
    fn from(value: CodecErr) -> Self {
        Self::Codec(value)
    }
}

impl From<std::io::Error> for MlErr {
    fn from(value: std::io::Error) -> Self {
        Self::Codec(CodecErr::from(value))
    }
}
