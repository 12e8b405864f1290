//! A persisted snapshot of a model: its layout, its parameters, the normalizers it was trained
//! with and where it came from.
//!
//! On disk a checkpoint is a JSON header frame followed by a float frame holding the parameters.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use codec::{FrameReader, FrameWriter};
use serde::{Deserialize, Serialize};

use crate::{MlErr, Normalizers, Result, arch::ModelSpec};

const VERSION: u32 = 1;

/// Where a checkpoint came from: the epoch it was validated at and its validation score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub epoch: usize,
    pub improvement: f64,
}

impl Provenance {
    /// Returns a stable identifier of the model this provenance belongs to.
    pub fn tag(&self) -> String {
        format!("e{}_imp{:.2}", self.epoch, self.improvement)
    }
}

#[derive(Serialize, Deserialize)]
struct Header {
    version: u32,
    spec: ModelSpec,
    normalizers: Normalizers,
    provenance: Option<Provenance>,
    params_len: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    spec: ModelSpec,
    params: Vec<f32>,
    normalizers: Normalizers,
    provenance: Option<Provenance>,
}

impl Checkpoint {
    /// Creates a new `Checkpoint`.
    ///
    /// # Arguments
    /// * `spec` - The layout of the model.
    /// * `params` - The model's flat parameters.
    /// * `normalizers` - The normalizers the model was trained with.
    /// * `provenance` - Where the checkpoint comes from, if known.
    ///
    /// # Returns
    /// An error if the layout is invalid or does not match the amount of parameters.
    pub fn new(
        spec: ModelSpec,
        params: Vec<f32>,
        normalizers: Normalizers,
        provenance: Option<Provenance>,
    ) -> Result<Self> {
        spec.validate()?;

        if params.len() != spec.size() {
            return Err(MlErr::ShapeMismatch {
                what: "checkpoint parameters",
                got: params.len(),
                expected: spec.size(),
            });
        }

        Ok(Self {
            spec,
            params,
            normalizers,
            provenance,
        })
    }

    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    pub fn params(&self) -> &[f32] {
        &self.params
    }

    pub fn normalizers(&self) -> &Normalizers {
        &self.normalizers
    }

    pub fn provenance(&self) -> Option<Provenance> {
        self.provenance
    }

    /// Returns the same checkpoint tagged with `provenance`.
    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = Some(provenance);
        self
    }

    /// Consumes the checkpoint returning its parts.
    pub fn into_parts(self) -> (ModelSpec, Vec<f32>, Normalizers, Option<Provenance>) {
        (self.spec, self.params, self.normalizers, self.provenance)
    }

    /// Writes the checkpoint into `tx`.
    ///
    /// # Returns
    /// The writer, once flushed.
    pub fn write_to<W: Write>(&self, tx: W) -> Result<W> {
        let header = Header {
            version: VERSION,
            spec: self.spec.clone(),
            normalizers: self.normalizers.clone(),
            provenance: self.provenance,
            params_len: self.params.len(),
        };

        let mut writer = FrameWriter::new(tx);
        writer.write_json(&header)?;
        writer.write_floats(&self.params)?;
        Ok(writer.finish()?)
    }

    /// Reads a checkpoint written by `write_to`.
    pub fn read_from<R: Read>(rx: R) -> Result<Self> {
        let mut reader = FrameReader::new(rx);
        let header: Header = reader.read_json()?;

        if header.version != VERSION {
            return Err(MlErr::InvalidLayout(format!(
                "unsupported checkpoint version {}",
                header.version
            )));
        }

        let params = reader.read_floats()?;
        if params.len() != header.params_len {
            return Err(MlErr::ShapeMismatch {
                what: "checkpoint parameters",
                got: params.len(),
                expected: header.params_len,
            });
        }

        Self::new(header.spec, params, header.normalizers, header.provenance)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.write_to(Vec::new())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::read_from(bytes)
    }

    /// Saves the checkpoint to `path`, overwriting it if it exists.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        self.write_to(BufWriter::new(file))?;
        Ok(())
    }

    /// Loads a checkpoint saved with `save`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::read_from(BufReader::new(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::ActFnSpec;

    fn spec() -> ModelSpec {
        ModelSpec::feed_forward(3, &[4], 1, ActFnSpec::LeakyRelu { slope: 0.01 }, 0.)
    }

    #[test]
    fn tag_carries_epoch_and_score() {
        let provenance = Provenance {
            epoch: 150,
            improvement: 37.456,
        };

        assert_eq!(provenance.tag(), "e150_imp37.46");
    }

    #[test]
    fn damaged_length_prefix_is_an_error() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(1u64 << 62).to_be_bytes());
        bytes.extend_from_slice(&1u32.to_be_bytes());
        bytes.extend_from_slice(b"{}");

        assert!(matches!(
            Checkpoint::from_bytes(&bytes),
            Err(MlErr::Codec(codec::CodecErr::Truncated))
        ));
    }

    #[test]
    fn params_must_match_layout() {
        let res = Checkpoint::new(spec(), vec![0.; 3], Normalizers::new(), None);
        assert!(matches!(res, Err(MlErr::ShapeMismatch { got: 3, expected: 21, .. })));
    }

    #[test]
    fn bytes_round_trip() {
        let params = (0..21).map(|i| i as f32 * 0.1).collect();
        let provenance = Some(Provenance {
            epoch: 3,
            improvement: 12.5,
        });

        let ckpt = Checkpoint::new(spec(), params, Normalizers::new(), provenance).unwrap();
        let bytes = ckpt.to_bytes().unwrap();

        assert_eq!(Checkpoint::from_bytes(&bytes).unwrap(), ckpt);
    }

    #[test]
    fn truncated_file_is_an_error() {
        let ckpt = Checkpoint::new(spec(), vec![1.; 21], Normalizers::new(), None).unwrap();
        let mut bytes = ckpt.to_bytes().unwrap();
        bytes.truncate(bytes.len() - 4);

        assert!(matches!(
            Checkpoint::from_bytes(&bytes),
            Err(MlErr::Codec(codec::CodecErr::Truncated))
        ));
    }
}
