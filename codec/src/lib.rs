//! Length-prefixed binary framing for the files written by the training system.
//!
//! Every frame is laid out as `[len: u64 BE][kind: u32 BE][payload]`, where `len` counts the
//! kind header plus the payload. Structured metadata travels as JSON frames, bulk numeric
//! data as raw `f32` frames so that large parameter vectors are never routed through a text
//! encoding.

mod error;
mod frame;
mod reader;
mod writer;

pub use error::{CodecErr, Result};
pub use frame::Kind;
pub use reader::FrameReader;
pub use writer::FrameWriter;

type LenType = u64;
const LEN_TYPE_SIZE: usize = size_of::<LenType>();

type Header = u32;
const HEADER_SIZE: usize = size_of::<Header>();
