//! Scoring a checkpoint on a fixed range of validation scenarios.

use std::sync::Arc;

use log::info;
use machine_learning::{Checkpoint, Predictor};
use worker::{
    Evaluate, Progress, ScenarioFailure, ScenarioMetrics, ScenarioOracle, ScenarioRange,
    SimulationWorker, WorkerPool,
};

use crate::{OrchestratorError, Result};

/// The aggregated scores of a validation pass, as mean percentages over every scenario that
/// could be evaluated.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub scenarios: Vec<ScenarioMetrics>,
    pub failures: Vec<ScenarioFailure>,
    pub rms_improvement: f64,
    pub expected_rms_improvement: f64,
    pub loss_improvement: f64,
    pub expected_loss_improvement: f64,
}

impl ValidationReport {
    /// Aggregates per scenario metrics.
    ///
    /// # Returns
    /// A `NoSuccessfulScenarios` error if `scenarios` is empty, the means would be undefined.
    pub fn new(scenarios: Vec<ScenarioMetrics>, failures: Vec<ScenarioFailure>) -> Result<Self> {
        if scenarios.is_empty() {
            return Err(OrchestratorError::NoSuccessfulScenarios {
                stage: "validation",
            });
        }

        let mean = |f: fn(&ScenarioMetrics) -> f64| {
            scenarios.iter().map(f).sum::<f64>() / scenarios.len() as f64
        };

        Ok(Self {
            rms_improvement: mean(|m| m.rms_improvement),
            expected_rms_improvement: mean(|m| m.expected_rms_improvement),
            loss_improvement: mean(|m| m.loss_improvement),
            expected_loss_improvement: mean(|m| m.expected_loss_improvement),
            scenarios,
            failures,
        })
    }

    /// The value checkpoints are ranked by: the mean reduction of the sensor reading RMS.
    pub fn score(&self) -> f64 {
        self.loss_improvement
    }
}

/// Runs validation passes over a fixed scenario range, either on the calling thread or on a
/// worker pool.
pub struct Validator<O: ?Sized> {
    range: ScenarioRange,
    oracle: Arc<O>,
    pool: Option<Arc<WorkerPool>>,
}

impl<O: ScenarioOracle + ?Sized + 'static> Validator<O> {
    /// Creates a new `Validator` that evaluates every scenario on the calling thread.
    pub fn sequential(range: ScenarioRange, oracle: Arc<O>) -> Self {
        Self {
            range,
            oracle,
            pool: None,
        }
    }

    /// Creates a new `Validator` that splits the range among the workers of `pool`.
    pub fn parallel(range: ScenarioRange, oracle: Arc<O>, pool: Arc<WorkerPool>) -> Self {
        Self {
            range,
            oracle,
            pool: Some(pool),
        }
    }

    /// Scores `checkpoint` on the validation range.
    ///
    /// Scenarios that cannot be evaluated are excluded from the aggregates.
    pub fn run(&self, checkpoint: &Checkpoint) -> Result<ValidationReport> {
        let (scenarios, failures) = match &self.pool {
            None => {
                let predictor = Predictor::new(checkpoint.clone())?;
                let mut worker = SimulationWorker::new(0, predictor, Progress::new());
                let report = worker.run(self.range, &*self.oracle, &Evaluate)?;
                (report.outputs, report.failures)
            }
            Some(pool) => {
                let bytes = checkpoint.to_bytes()?;
                let output = pool.run(
                    self.range,
                    bytes.into(),
                    Arc::clone(&self.oracle),
                    Arc::new(Evaluate),
                )?;
                (output.outputs, output.failures)
            }
        };

        let report = ValidationReport::new(scenarios, failures)?;
        info!(
            scenarios = report.scenarios.len(),
            skipped = report.failures.len();
            "validation: rms improvement {:.2}% (expected {:.2}%), loss improvement {:.2}% (expected {:.2}%)",
            report.rms_improvement,
            report.expected_rms_improvement,
            report.loss_improvement,
            report.expected_loss_improvement
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use machine_learning::{
        Normalizers, TrainingSample,
        arch::{ActFnSpec, ModelSpec},
        initialization,
    };
    use rand::{SeedableRng, rngs::StdRng};
    use worker::{FailureKind, SyntheticOracle};

    use super::*;

    fn metrics(id: u64, loss_improvement: f64) -> ScenarioMetrics {
        ScenarioMetrics {
            id,
            rms_improvement: 2. * loss_improvement,
            expected_rms_improvement: 100.,
            loss_improvement,
            expected_loss_improvement: 90.,
        }
    }

    #[test]
    fn report_means() {
        let report = ValidationReport::new(vec![metrics(0, 10.), metrics(1, 30.)], vec![]).unwrap();

        assert_eq!(report.loss_improvement, 20.);
        assert_eq!(report.rms_improvement, 40.);
        assert_eq!(report.expected_loss_improvement, 90.);
        assert_eq!(report.score(), 20.);
    }

    #[test]
    fn empty_report_is_an_error() {
        assert!(matches!(
            ValidationReport::new(vec![], vec![]),
            Err(OrchestratorError::NoSuccessfulScenarios {
                stage: "validation"
            })
        ));
    }

    fn checkpoint(oracle: &SyntheticOracle) -> Checkpoint {
        let samples: Vec<_> = (0..8)
            .map(|id| {
                let scenario = oracle.load(id).unwrap();
                TrainingSample::new(
                    scenario.pre.readings,
                    scenario.pre.correctors.concat(),
                    scenario.post.correctors.concat(),
                )
                .unwrap()
            })
            .collect();

        let mut normalizers = Normalizers::new();
        normalizers.fit(&samples).unwrap();

        let spec = ModelSpec::feed_forward(2 * 3 + 2, &[4], 2, ActFnSpec::LeakyRelu { slope: 0.01 }, 0.);
        let params = initialization::initialize(&spec, &mut StdRng::seed_from_u64(7)).unwrap();
        Checkpoint::new(spec, params, normalizers, None).unwrap()
    }

    #[test]
    fn unavailable_scenarios_are_excluded() {
        let oracle = Arc::new(SyntheticOracle::new(3, 1, 1, 0.1, 5).with_unavailable([101, 103]));
        let checkpoint = checkpoint(&oracle);
        let range = ScenarioRange::new(100, 105).unwrap();

        let report = Validator::sequential(range, oracle).run(&checkpoint).unwrap();

        assert_eq!(report.scenarios.len(), 4);
        assert_eq!(report.failures.len(), 2);
        assert!(report.failures.iter().all(|f| f.kind == FailureKind::Unavailable));
        assert!(report.score().is_finite());
    }

    #[test]
    fn every_scenario_unavailable_is_an_error() {
        let oracle = Arc::new(SyntheticOracle::new(3, 1, 1, 0.1, 5).with_unavailable(100..=102));
        let checkpoint = checkpoint(&oracle);
        let range = ScenarioRange::new(100, 102).unwrap();

        let res = Validator::sequential(range, oracle).run(&checkpoint);
        assert!(matches!(
            res,
            Err(OrchestratorError::NoSuccessfulScenarios { .. })
        ));
    }
}
