use std::{error::Error, fmt, io};

use crate::Kind;

/// The result type used across the codec crate.
pub type Result<T> = std::result::Result<T, CodecErr>;

/// Failures while writing or reading frames.
#[derive(Debug)]
pub enum CodecErr {
    Io(io::Error),
    Json(serde_json::Error),
    Truncated,
    UnknownKind(u32),
    UnexpectedKind { got: Kind, expected: Kind },
    Misaligned { len: usize },
}

impl fmt::Display for CodecErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecErr::Io(e) => write!(f, "io error: {e}"),
            CodecErr::Json(e) => write!(f, "invalid json frame: {e}"),
            CodecErr::Truncated => write!(f, "the stream ended in the middle of a frame"),
            CodecErr::UnknownKind(kind) => write!(f, "received an invalid kind header {kind}"),
            CodecErr::UnexpectedKind { got, expected } => {
                write!(f, "expected a {expected} frame, got a {got} frame")
            }
            CodecErr::Misaligned { len } => {
                write!(f, "a float frame of {len} bytes is not a multiple of 4")
            }
        }
    }
}

impl Error for CodecErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CodecErr::Io(e) => Some(e),
            CodecErr::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for CodecErr {
    fn from(value: io::Error) -> Self {
        match value.kind() {
            io::ErrorKind::UnexpectedEof => Self::Truncated,
            _ => Self::Io(value),
        }
    }
}

impl From<serde_json::Error> for CodecErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}
