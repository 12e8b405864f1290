//! The implementation of the reading end of the framing.

use std::io::Read;

use serde::de::DeserializeOwned;

use crate::{CodecErr, HEADER_SIZE, Header, Kind, LEN_TYPE_SIZE, LenType, Result};

/// The reading end handle of a framed stream.
pub struct FrameReader<R: Read> {
    rx: R,
    buf: Vec<u8>,
}

impl<R: Read> FrameReader<R> {
    /// Creates a new `FrameReader` instance.
    ///
    /// # Arguments
    /// * `rx` - The underlying reader.
    pub fn new(rx: R) -> Self {
        Self {
            rx,
            buf: Vec::new(),
        }
    }

    /// Reads the next frame, which must be a JSON frame, and deserializes it.
    ///
    /// # Returns
    /// The decoded value or an error if the frame is not JSON or is not a valid `T`.
    pub fn read_json<T: DeserializeOwned>(&mut self) -> Result<T> {
        let len = self.read_header(Kind::Json)?;
        self.read_payload(len)?;
        Ok(serde_json::from_slice(&self.buf)?)
    }

    /// Reads the next frame, which must be a float frame.
    ///
    /// # Returns
    /// The numbers carried by the frame.
    pub fn read_floats(&mut self) -> Result<Vec<f32>> {
        let len = self.read_header(Kind::Floats)?;
        if len % size_of::<f32>() != 0 {
            return Err(CodecErr::Misaligned { len });
        }

        self.read_payload(len)?;
        let nums = self
            .buf
            .chunks_exact(size_of::<f32>())
            .map(bytemuck::pod_read_unaligned)
            .collect();

        Ok(nums)
    }

    /// Reads the next `len` bytes into the internal buffer.
    ///
    /// The buffer only grows with the bytes actually read, a corrupted length prefix can't make
    /// it allocate more than the stream holds.
    ///
    /// # Returns
    /// A `Truncated` error if the stream ends before `len` bytes.
    fn read_payload(&mut self, len: usize) -> Result<()> {
        self.buf.clear();
        let got = (&mut self.rx).take(len as u64).read_to_end(&mut self.buf)?;

        if got < len {
            return Err(CodecErr::Truncated);
        }

        Ok(())
    }

    /// Reads the length prefix and kind header of the next frame.
    ///
    /// # Returns
    /// The payload length in bytes.
    fn read_header(&mut self, expected: Kind) -> Result<usize> {
        let mut len_buf = [0; LEN_TYPE_SIZE];
        self.rx.read_exact(&mut len_buf)?;
        let len = LenType::from_be_bytes(len_buf) as usize;

        if len < HEADER_SIZE {
            return Err(CodecErr::Truncated);
        }

        let mut kind_buf = [0; HEADER_SIZE];
        self.rx.read_exact(&mut kind_buf)?;
        let got = Kind::try_from(Header::from_be_bytes(kind_buf))?;

        if got != expected {
            return Err(CodecErr::UnexpectedKind { got, expected });
        }

        Ok(len - HEADER_SIZE)
    }
}
