//! What a worker does with each scenario of its range.

use machine_learning::{Predictor, TrainingSample};

use crate::{Correctors, Scenario, ScenarioErr, ScenarioId, ScenarioOracle};

/// A unit of work run once per scenario.
pub trait ScenarioTask: Send + Sync {
    type Output: Send + 'static;

    /// Processes scenario `id`.
    ///
    /// # Arguments
    /// * `predictor` - The worker's own predictor.
    /// * `oracle` - Where to load and simulate the scenario.
    /// * `id` - The scenario to process.
    fn run<O>(
        &self,
        predictor: &mut Predictor,
        oracle: &O,
        id: ScenarioId,
    ) -> Result<Self::Output, ScenarioErr>
    where
        O: ScenarioOracle + ?Sized;
}

/// Synthesizes a training sample from the state reached by applying the model's correction.
#[derive(Debug, Clone, Copy, Default)]
pub struct Augment;

impl ScenarioTask for Augment {
    type Output = TrainingSample;

    fn run<O>(
        &self,
        predictor: &mut Predictor,
        oracle: &O,
        id: ScenarioId,
    ) -> Result<TrainingSample, ScenarioErr>
    where
        O: ScenarioOracle + ?Sized,
    {
        let scenario = oracle.load(id)?;
        let predicted = predict(predictor, &scenario)?;
        let reached = oracle.simulate(&scenario, &predicted)?;

        TrainingSample::new(
            reached.readings,
            predicted.concat(),
            scenario.post.correctors.concat(),
        )
        .map_err(|source| ScenarioErr::Model { id, source })
    }
}

/// The scores of the model on a single scenario, as percentages of the baseline RMS removed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScenarioMetrics {
    pub id: ScenarioId,
    /// Orbit RMS reduction reached by the model.
    pub rms_improvement: f64,
    /// Orbit RMS reduction reached by the reference correction.
    pub expected_rms_improvement: f64,
    /// Sensor reading RMS reduction reached by the model.
    pub loss_improvement: f64,
    /// Sensor reading RMS reduction reached by the reference correction.
    pub expected_loss_improvement: f64,
}

/// Scores the model's correction against the scenario's baseline and reference correction.
#[derive(Debug, Clone, Copy, Default)]
pub struct Evaluate;

impl ScenarioTask for Evaluate {
    type Output = ScenarioMetrics;

    fn run<O>(
        &self,
        predictor: &mut Predictor,
        oracle: &O,
        id: ScenarioId,
    ) -> Result<ScenarioMetrics, ScenarioErr>
    where
        O: ScenarioOracle + ?Sized,
    {
        let scenario = oracle.load(id)?;

        let initial_rms = scenario.pre.orbit_rms();
        let initial_loss = scenario.pre.reading_rms();
        if initial_rms == 0. || initial_loss == 0. {
            return Err(ScenarioErr::Degenerate {
                id,
                reason: "baseline RMS is zero".into(),
            });
        }

        let predicted = predict(predictor, &scenario)?;
        let reached = oracle.simulate(&scenario, &predicted)?;
        let expected = oracle.simulate(&scenario, &scenario.post.correctors)?;

        let metrics = ScenarioMetrics {
            id,
            rms_improvement: improvement(initial_rms, reached.orbit_rms()),
            expected_rms_improvement: improvement(initial_rms, expected.orbit_rms()),
            loss_improvement: improvement(initial_loss, reached.reading_rms()),
            expected_loss_improvement: improvement(initial_loss, expected.reading_rms()),
        };

        let values = [
            metrics.rms_improvement,
            metrics.expected_rms_improvement,
            metrics.loss_improvement,
            metrics.expected_loss_improvement,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ScenarioErr::Degenerate {
                id,
                reason: "improvement is not finite".into(),
            });
        }

        Ok(metrics)
    }
}

fn improvement(initial: f64, new: f64) -> f64 {
    (initial - new) / initial * 100.
}

/// Runs the predictor on the scenario's pre state.
fn predict(predictor: &mut Predictor, scenario: &Scenario) -> Result<Correctors, ScenarioErr> {
    let id = scenario.id;
    let pre = &scenario.pre;

    let values = predictor
        .predict(&pre.readings, &pre.correctors.concat())
        .map_err(|source| ScenarioErr::Model { id, source })?;

    Correctors::split(&values, pre.correctors.x.len()).ok_or_else(|| ScenarioErr::Malformed {
        id,
        reason: format!(
            "{} predicted correctors cannot hold {} x family correctors",
            values.len(),
            pre.correctors.x.len()
        ),
    })
}
