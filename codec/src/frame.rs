use std::fmt;

use crate::{CodecErr, Header};

/// The kind of payload carried by a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Json,
    Floats,
}

impl Kind {
    pub(crate) fn header(self) -> Header {
        match self {
            Kind::Json => 1,
            Kind::Floats => 2,
        }
    }
}

impl TryFrom<Header> for Kind {
    type Error = CodecErr;

    fn try_from(value: Header) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Kind::Json),
            2 => Ok(Kind::Floats),
            other => Err(CodecErr::UnknownKind(other)),
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Json => write!(f, "json"),
            Kind::Floats => write!(f, "floats"),
        }
    }
}
