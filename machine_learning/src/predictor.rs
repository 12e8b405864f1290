use ndarray::Array2;

use crate::{
    Checkpoint, MlErr, NormalizerKind, Normalizers, Result,
    arch::{Mode, Model, Sequential},
};

/// Maps a machine state to corrector settings using a trained checkpoint.
///
/// Every predictor owns its own copy of the model, so predictors built from the same checkpoint
/// never share mutable state.
#[derive(Debug, Clone)]
pub struct Predictor {
    model: Sequential,
    params: Vec<f32>,
    normalizers: Normalizers,
    sensors: usize,
    correctors: usize,
}

impl Predictor {
    /// Creates a new `Predictor`.
    ///
    /// # Arguments
    /// * `checkpoint` - A checkpoint whose normalizers were fit.
    ///
    /// # Returns
    /// An error if the normalizers are not fit or do not agree with the model's layout.
    pub fn new(checkpoint: Checkpoint) -> Result<Self> {
        let (spec, params, normalizers, _) = checkpoint.into_parts();

        let correctors = spec.output_size();
        let readings = spec.input_size().checked_sub(correctors).unwrap_or_default();
        if readings % 2 != 0 || readings == 0 {
            return Err(MlErr::InvalidLayout(format!(
                "input size {} cannot hold two readings per sensor and {correctors} correctors",
                spec.input_size()
            )));
        }

        let expected = [
            (normalizers.trajectory(), 2),
            (normalizers.corrector(), correctors),
            (normalizers.initial_corrector(), correctors),
        ];

        for (normalizer, features) in expected {
            if !normalizer.is_fit() {
                return Err(MlErr::NormalizerNotFit {
                    which: normalizer.kind(),
                });
            }

            if normalizer.features() != features {
                return Err(MlErr::ShapeMismatch {
                    what: match normalizer.kind() {
                        NormalizerKind::Trajectory => "trajectory normalizer",
                        NormalizerKind::Corrector => "corrector normalizer",
                        NormalizerKind::InitialCorrector => "initial corrector normalizer",
                    },
                    got: normalizer.features(),
                    expected: features,
                });
            }
        }

        // A predictor has no random state: the model only ever runs in eval mode.
        let mut model = Sequential::from_spec(&spec, 0)?;
        model.set_mode(Mode::Eval);

        Ok(Self {
            model,
            params,
            normalizers,
            sensors: readings / 2,
            correctors,
        })
    }

    /// Decodes a checkpoint from its serialized form and builds a predictor from it.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::new(Checkpoint::from_bytes(bytes)?)
    }

    /// The amount of sensors the model was trained with.
    pub fn sensors(&self) -> usize {
        self.sensors
    }

    /// The amount of correctors the model was trained with.
    pub fn correctors(&self) -> usize {
        self.correctors
    }

    /// Predicts the corrector settings for a machine state.
    ///
    /// # Arguments
    /// * `trajectory` - The `(x, y)` reading of every sensor.
    /// * `initial_correctors` - The current corrector settings.
    ///
    /// # Returns
    /// The predicted setting of every corrector, or an error if the inputs do not match the
    /// trained dimensions or the prediction is not finite.
    pub fn predict(&mut self, trajectory: &[[f32; 2]], initial_correctors: &[f32]) -> Result<Vec<f32>> {
        if trajectory.len() != self.sensors {
            return Err(MlErr::ShapeMismatch {
                what: "predictor trajectory",
                got: trajectory.len(),
                expected: self.sensors,
            });
        }

        if initial_correctors.len() != self.correctors {
            return Err(MlErr::ShapeMismatch {
                what: "predictor initial correctors",
                got: initial_correctors.len(),
                expected: self.correctors,
            });
        }

        let row = self.normalizers.input(trajectory, initial_correctors)?;
        let x = Array2::from_shape_vec((1, row.len()), row)
            .map_err(|e| MlErr::InvalidLayout(e.to_string()))?;

        let y = self.model.forward(&self.params, x.view())?;
        let correction = self.normalizers.correction(y.view())?;

        if correction.iter().any(|v| !v.is_finite()) {
            return Err(MlErr::NumericDivergence { what: "prediction" });
        }

        Ok(correction.iter().copied().collect())
    }
}
