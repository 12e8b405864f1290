//! Standard scaling of the model's inputs and targets.

use std::fmt::{self, Display};

use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::{MlErr, Result, TrainingSample};

/// Which quantity a normalizer scales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizerKind {
    Trajectory,
    Corrector,
    InitialCorrector,
}

impl Display for NormalizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NormalizerKind::Trajectory => "trajectory",
            NormalizerKind::Corrector => "corrector",
            NormalizerKind::InitialCorrector => "initial corrector",
        };

        write!(f, "{name}")
    }
}

/// A per-column standard scaler: `(x - mean) / scale`.
///
/// Fitting is the only mutating operation, transforming is pure. Columns with zero deviation
/// get a scale of `1` so they are only centered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Normalizer {
    kind: NormalizerKind,
    mean: Vec<f32>,
    scale: Vec<f32>,
}

impl Normalizer {
    /// Creates a new unfitted `Normalizer`.
    pub fn new(kind: NormalizerKind) -> Self {
        Self {
            kind,
            mean: Vec::new(),
            scale: Vec::new(),
        }
    }

    pub fn kind(&self) -> NormalizerKind {
        self.kind
    }

    pub fn is_fit(&self) -> bool {
        !self.mean.is_empty()
    }

    /// Returns the amount of columns this normalizer was fit on, `0` if it was never fit.
    pub fn features(&self) -> usize {
        self.mean.len()
    }

    /// Fits the normalizer to the columns of `x`, replacing any previous fit.
    ///
    /// # Arguments
    /// * `x` - The rows to compute the statistics from.
    ///
    /// # Returns
    /// An error if `x` has no rows or columns, or if the statistics are not finite.
    pub fn fit(&mut self, x: ArrayView2<f32>) -> Result<()> {
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(MlErr::EmptyDataset);
        }

        let x = x.mapv(f64::from);
        let mean = x.mean_axis(Axis(0)).ok_or(MlErr::EmptyDataset)?;
        let std = x.std_axis(Axis(0), 0.);

        if mean.iter().chain(std.iter()).any(|v| !v.is_finite()) {
            return Err(MlErr::NumericDivergence {
                what: "normalizer statistics",
            });
        }

        self.mean = mean.iter().map(|&m| m as f32).collect();
        self.scale = std
            .iter()
            .map(|&s| if s == 0. { 1. } else { s as f32 })
            .collect();

        Ok(())
    }

    /// Scales every row of `x`.
    pub fn transform(&self, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let (mean, scale) = self.stats(x.ncols())?;
        Ok((&x - &mean) / &scale)
    }

    /// Undoes `transform` on every row of `x`.
    pub fn inverse_transform(&self, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let (mean, scale) = self.stats(x.ncols())?;
        Ok(&x * &scale + &mean)
    }

    fn stats(&self, ncols: usize) -> Result<(Array1<f32>, Array1<f32>)> {
        if !self.is_fit() {
            return Err(MlErr::NormalizerNotFit { which: self.kind });
        }

        if ncols != self.features() {
            return Err(MlErr::ShapeMismatch {
                what: "normalizer columns",
                got: ncols,
                expected: self.features(),
            });
        }

        Ok((
            Array1::from(self.mean.clone()),
            Array1::from(self.scale.clone()),
        ))
    }
}

/// The three normalizers a model is trained with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Normalizers {
    trajectory: Normalizer,
    corrector: Normalizer,
    initial_corrector: Normalizer,
}

impl Default for Normalizers {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizers {
    /// Creates a new set of unfitted normalizers.
    pub fn new() -> Self {
        Self {
            trajectory: Normalizer::new(NormalizerKind::Trajectory),
            corrector: Normalizer::new(NormalizerKind::Corrector),
            initial_corrector: Normalizer::new(NormalizerKind::InitialCorrector),
        }
    }

    pub fn trajectory(&self) -> &Normalizer {
        &self.trajectory
    }

    pub fn corrector(&self) -> &Normalizer {
        &self.corrector
    }

    pub fn initial_corrector(&self) -> &Normalizer {
        &self.initial_corrector
    }

    /// Fits all three normalizers on the full set of samples.
    ///
    /// The trajectory normalizer sees every `(x, y)` reading as a row, the corrector normalizer
    /// the target correctors and the initial corrector normalizer the initial correctors.
    ///
    /// # Arguments
    /// * `samples` - Samples that all share the same shape.
    pub fn fit(&mut self, samples: &[TrainingSample]) -> Result<()> {
        let first = samples.first().ok_or(MlErr::EmptyDataset)?;
        let shape = first.shape();

        let readings: Vec<f32> = samples
            .iter()
            .flat_map(|s| s.trajectory().as_flattened())
            .copied()
            .collect();
        let initial: Vec<f32> = samples
            .iter()
            .flat_map(|s| s.initial_correctors())
            .copied()
            .collect();
        let target: Vec<f32> = samples
            .iter()
            .flat_map(|s| s.target_correctors())
            .copied()
            .collect();

        let n = samples.len();
        let readings = to_rows(readings, n * shape.sensors, 2)?;
        let initial = to_rows(initial, n, shape.correctors)?;
        let target = to_rows(target, n, shape.correctors)?;

        let mut fitted = Self::new();
        fitted.trajectory.fit(readings.view())?;
        fitted.initial_corrector.fit(initial.view())?;
        fitted.corrector.fit(target.view())?;
        *self = fitted;

        Ok(())
    }

    /// Builds a normalized model input row: the scaled readings followed by the scaled initial
    /// correctors.
    pub fn input(&self, trajectory: &[[f32; 2]], initial_correctors: &[f32]) -> Result<Vec<f32>> {
        let readings = to_rows(trajectory.as_flattened().to_vec(), trajectory.len(), 2)?;
        let initial = to_rows(initial_correctors.to_vec(), 1, initial_correctors.len())?;

        let readings = self.trajectory.transform(readings.view())?;
        let initial = self.initial_corrector.transform(initial.view())?;

        let mut row = Vec::with_capacity(readings.len() + initial.len());
        row.extend(readings.iter());
        row.extend(initial.iter());
        Ok(row)
    }

    /// Builds a normalized model target row.
    pub fn target(&self, target_correctors: &[f32]) -> Result<Vec<f32>> {
        let target = to_rows(target_correctors.to_vec(), 1, target_correctors.len())?;
        Ok(self.corrector.transform(target.view())?.iter().copied().collect())
    }

    /// Maps model outputs back to corrector settings.
    pub fn correction(&self, output: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.corrector.inverse_transform(output)
    }

    /// Builds the normalized `(inputs, targets)` matrices of a batch of samples.
    pub fn batch<'a, I>(&self, samples: I) -> Result<(Array2<f32>, Array2<f32>)>
    where
        I: ExactSizeIterator<Item = &'a TrainingSample>,
    {
        let n = samples.len();
        let mut x = Vec::new();
        let mut y = Vec::new();

        for sample in samples {
            x.extend(self.input(sample.trajectory(), sample.initial_correctors())?);
            y.extend(self.target(sample.target_correctors())?);
        }

        let x_cols = if n == 0 { 0 } else { x.len() / n };
        let y_cols = if n == 0 { 0 } else { y.len() / n };
        Ok((to_rows(x, n, x_cols)?, to_rows(y, n, y_cols)?))
    }
}

fn to_rows(values: Vec<f32>, rows: usize, cols: usize) -> Result<Array2<f32>> {
    let got = values.len();
    Array2::from_shape_vec((rows, cols), values).map_err(|_| MlErr::ShapeMismatch {
        what: "normalizer rows",
        got,
        expected: rows * cols,
    })
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn fit_uses_population_std() {
        let mut normalizer = Normalizer::new(NormalizerKind::Corrector);
        normalizer.fit(array![[1., 5.], [3., 5.]].view()).unwrap();

        let x = normalizer.transform(array![[1., 5.], [3., 7.]].view()).unwrap();
        assert_eq!(x, array![[-1., 0.], [1., 2.]]);
    }

    #[test]
    fn round_trip() {
        let mut normalizer = Normalizer::new(NormalizerKind::Trajectory);
        let x = array![[0.3, -1.2], [2.5, 0.7], [-0.9, 4.1]];
        normalizer.fit(x.view()).unwrap();

        let z = normalizer.transform(x.view()).unwrap();
        let back = normalizer.inverse_transform(z.view()).unwrap();

        for (a, b) in back.iter().zip(x.iter()) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn transform_before_fit() {
        let normalizer = Normalizer::new(NormalizerKind::InitialCorrector);
        let res = normalizer.transform(array![[1.]].view());

        assert!(matches!(
            res,
            Err(MlErr::NormalizerNotFit {
                which: NormalizerKind::InitialCorrector
            })
        ));
    }

    #[test]
    fn column_mismatch() {
        let mut normalizer = Normalizer::new(NormalizerKind::Corrector);
        normalizer.fit(array![[1., 2.]].view()).unwrap();

        let res = normalizer.transform(array![[1., 2., 3.]].view());
        assert!(matches!(res, Err(MlErr::ShapeMismatch { got: 3, expected: 2, .. })));
    }

    #[test]
    fn fit_on_empty_set() {
        assert!(matches!(Normalizers::new().fit(&[]), Err(MlErr::EmptyDataset)));
    }

    #[test]
    fn input_layout() {
        let samples = [
            TrainingSample::new(vec![[0., 10.], [2., 30.]], vec![1.], vec![4.]).unwrap(),
            TrainingSample::new(vec![[0., 10.], [2., 30.]], vec![3.], vec![6.]).unwrap(),
        ];

        let mut normalizers = Normalizers::new();
        normalizers.fit(&samples).unwrap();

        let row = normalizers.input(&[[1., 20.], [1., 20.]], &[2.]).unwrap();
        assert_eq!(row, [0., 0., 0., 0., 0.]);
        assert_eq!(normalizers.target(&[6.]).unwrap(), [1.]);
    }
}
