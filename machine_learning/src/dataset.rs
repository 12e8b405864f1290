use std::io::{Read, Write};

use codec::{FrameReader, FrameWriter};
use serde::{Deserialize, Serialize};

use crate::{MlErr, Result};

/// The fixed dimensions of the samples of a physical configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleShape {
    pub sensors: usize,
    pub correctors: usize,
}

impl SampleShape {
    /// The width of a model input row: two readings per sensor plus the initial correctors.
    pub fn input_size(&self) -> usize {
        2 * self.sensors + self.correctors
    }

    /// The width of a model output row.
    pub fn output_size(&self) -> usize {
        self.correctors
    }

    fn flat_len(&self) -> usize {
        2 * self.sensors + 2 * self.correctors
    }
}

/// A single supervised example, immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSample {
    trajectory: Vec<[f32; 2]>,
    initial_correctors: Vec<f32>,
    target_correctors: Vec<f32>,
}

impl TrainingSample {
    /// Creates a new `TrainingSample`.
    ///
    /// # Arguments
    /// * `trajectory` - The `(x, y)` reading of every sensor.
    /// * `initial_correctors` - The corrector settings the readings were taken with.
    /// * `target_correctors` - The corrector settings the model should predict.
    ///
    /// # Returns
    /// A `ShapeMismatch` error if both corrector vectors differ in length.
    pub fn new(
        trajectory: Vec<[f32; 2]>,
        initial_correctors: Vec<f32>,
        target_correctors: Vec<f32>,
    ) -> Result<Self> {
        if initial_correctors.len() != target_correctors.len() {
            return Err(MlErr::ShapeMismatch {
                what: "sample target correctors",
                got: target_correctors.len(),
                expected: initial_correctors.len(),
            });
        }

        Ok(Self {
            trajectory,
            initial_correctors,
            target_correctors,
        })
    }

    pub fn trajectory(&self) -> &[[f32; 2]] {
        &self.trajectory
    }

    pub fn initial_correctors(&self) -> &[f32] {
        &self.initial_correctors
    }

    pub fn target_correctors(&self) -> &[f32] {
        &self.target_correctors
    }

    pub fn shape(&self) -> SampleShape {
        SampleShape {
            sensors: self.trajectory.len(),
            correctors: self.initial_correctors.len(),
        }
    }
}

/// An append-only sequence of samples sharing a single shape.
#[derive(Debug, Clone)]
pub struct TrainingSet {
    shape: SampleShape,
    samples: Vec<TrainingSample>,
}

impl TrainingSet {
    /// Creates a new `TrainingSet`.
    ///
    /// # Returns
    /// An `EmptyDataset` error if there are no samples, or a `ShapeMismatch` if they disagree on
    /// their shape.
    pub fn new(samples: Vec<TrainingSample>) -> Result<Self> {
        let shape = samples.first().ok_or(MlErr::EmptyDataset)?.shape();
        check_shapes(shape, &samples)?;

        Ok(Self { shape, samples })
    }

    /// Appends `samples` at the end of the set. Nothing is appended if any sample has the wrong shape.
    ///
    /// # Returns
    /// The amount of samples appended.
    pub fn extend(&mut self, samples: Vec<TrainingSample>) -> Result<usize> {
        check_shapes(self.shape, &samples)?;

        let n = samples.len();
        self.samples.extend(samples);
        Ok(n)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[TrainingSample] {
        &self.samples
    }

    pub fn shape(&self) -> SampleShape {
        self.shape
    }
}

fn check_shapes(shape: SampleShape, samples: &[TrainingSample]) -> Result<()> {
    for sample in samples {
        let got = sample.shape();

        if got.sensors != shape.sensors {
            return Err(MlErr::ShapeMismatch {
                what: "sample trajectory",
                got: got.sensors,
                expected: shape.sensors,
            });
        }

        if got.correctors != shape.correctors {
            return Err(MlErr::ShapeMismatch {
                what: "sample correctors",
                got: got.correctors,
                expected: shape.correctors,
            });
        }
    }

    Ok(())
}

#[derive(Serialize, Deserialize)]
struct SamplesHeader {
    count: usize,
    shape: Option<SampleShape>,
}

/// Encodes `samples` as a JSON header frame followed by a single float frame.
///
/// # Arguments
/// * `samples` - Samples that all share the same shape.
/// * `tx` - Where to write the frames.
///
/// # Returns
/// The writer, once flushed.
pub fn write_samples<W: Write>(samples: &[TrainingSample], tx: W) -> Result<W> {
    let shape = samples.first().map(TrainingSample::shape);
    if let Some(shape) = shape {
        check_shapes(shape, samples)?;
    }

    let mut nums = Vec::with_capacity(samples.len() * shape.map_or(0, |s| s.flat_len()));
    for sample in samples {
        nums.extend_from_slice(sample.trajectory.as_flattened());
        nums.extend_from_slice(&sample.initial_correctors);
        nums.extend_from_slice(&sample.target_correctors);
    }

    let header = SamplesHeader {
        count: samples.len(),
        shape,
    };

    let mut writer = FrameWriter::new(tx);
    writer.write_json(&header)?;
    writer.write_floats(&nums)?;
    Ok(writer.finish()?)
}

/// Decodes the samples written by `write_samples`.
pub fn read_samples<R: Read>(rx: R) -> Result<Vec<TrainingSample>> {
    let mut reader = FrameReader::new(rx);
    let header: SamplesHeader = reader.read_json()?;
    let nums = reader.read_floats()?;

    let Some(shape) = header.shape else {
        return match nums.len() {
            0 if header.count == 0 => Ok(Vec::new()),
            got => Err(MlErr::ShapeMismatch {
                what: "encoded samples",
                got,
                expected: 0,
            }),
        };
    };

    let expected = header.count * shape.flat_len();
    if nums.len() != expected {
        return Err(MlErr::ShapeMismatch {
            what: "encoded samples",
            got: nums.len(),
            expected,
        });
    }

    let s = 2 * shape.sensors;
    let c = shape.correctors;
    let samples = nums
        .chunks_exact(shape.flat_len())
        .map(|chunk| TrainingSample {
            trajectory: chunk[..s].chunks_exact(2).map(|p| [p[0], p[1]]).collect(),
            initial_correctors: chunk[s..s + c].to_vec(),
            target_correctors: chunk[s + c..].to_vec(),
        })
        .collect();

    Ok(samples)
}
