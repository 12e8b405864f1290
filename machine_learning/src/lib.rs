pub mod arch;
pub mod checkpoint;
pub mod dataset;
pub mod error;
pub mod initialization;
pub mod normalization;
pub mod optimization;
pub mod predictor;
pub mod training;

pub use checkpoint::{Checkpoint, Provenance};
pub use dataset::{SampleShape, TrainingSample, TrainingSet};
pub use error::{MlErr, Result};
pub use normalization::{Normalizer, NormalizerKind, Normalizers};
pub use predictor::Predictor;
