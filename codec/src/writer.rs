//! The implementation of the writing end of the framing.

use std::io::Write;

use serde::Serialize;

use crate::{HEADER_SIZE, Kind, LEN_TYPE_SIZE, LenType, Result};

/// The writing end handle of a framed stream.
pub struct FrameWriter<W: Write> {
    tx: W,
    buf: Vec<u8>,
}

impl<W: Write> FrameWriter<W> {
    /// Creates a new `FrameWriter` instance.
    ///
    /// # Arguments
    /// * `tx` - The underlying writer.
    pub fn new(tx: W) -> Self {
        Self {
            tx,
            buf: Vec::new(),
        }
    }

    /// Writes `value` as a JSON frame.
    ///
    /// # Arguments
    /// * `value` - A serializable object.
    pub fn write_json<T: Serialize>(&mut self, value: &T) -> Result<()> {
        let Self { tx, buf } = self;

        buf.clear();
        buf.resize(LEN_TYPE_SIZE + HEADER_SIZE, 0);
        serde_json::to_writer(&mut *buf, value)?;

        let len = buf.len() - LEN_TYPE_SIZE;
        buf[..LEN_TYPE_SIZE].copy_from_slice(&(len as LenType).to_be_bytes());
        buf[LEN_TYPE_SIZE..LEN_TYPE_SIZE + HEADER_SIZE]
            .copy_from_slice(&Kind::Json.header().to_be_bytes());

        tx.write_all(buf)?;
        Ok(())
    }

    /// Writes `nums` as a raw float frame, without copying the numbers.
    ///
    /// # Arguments
    /// * `nums` - The numbers to write.
    pub fn write_floats(&mut self, nums: &[f32]) -> Result<()> {
        let data: &[u8] = bytemuck::cast_slice(nums);
        let len = HEADER_SIZE + data.len();

        self.tx.write_all(&(len as LenType).to_be_bytes())?;
        self.tx.write_all(&Kind::Floats.header().to_be_bytes())?;
        self.tx.write_all(data)?;
        Ok(())
    }

    /// Flushes the stream and gives back the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        self.tx.flush()?;
        Ok(self.tx)
    }
}
