use std::{num::NonZeroUsize, sync::Arc};

use machine_learning::{
    Checkpoint, Normalizers, Predictor, TrainingSample,
    arch::{ActFnSpec, ModelSpec},
    initialization,
};
use rand::{SeedableRng, rngs::StdRng};
use worker::{
    Augment, Evaluate, FailureKind, PoolConfig, PoolErr, Progress, ScenarioErr, ScenarioOracle,
    ScenarioRange, SimulationWorker, SyntheticOracle, WorkerPool,
};

const SENSORS: usize = 3;
const CORRECTORS_X: usize = 2;
const CORRECTORS_Y: usize = 1;

fn oracle() -> SyntheticOracle {
    SyntheticOracle::new(SENSORS, CORRECTORS_X, CORRECTORS_Y, 0.01, 21)
}

fn checkpoint(oracle: &SyntheticOracle) -> Checkpoint {
    let correctors = CORRECTORS_X + CORRECTORS_Y;
    let spec = ModelSpec::feed_forward(
        2 * SENSORS + correctors,
        &[16],
        correctors,
        ActFnSpec::LeakyRelu { slope: 0.01 },
        0.,
    );
    let params = initialization::initialize(&spec, &mut StdRng::seed_from_u64(1)).unwrap();

    let samples: Vec<_> = (100..110)
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

    Checkpoint::new(spec, params, normalizers, None).unwrap()
}

fn pool(workers: usize) -> WorkerPool {
    WorkerPool::new(PoolConfig::new(NonZeroUsize::new(workers).unwrap())).unwrap()
}

#[test]
fn augmentation_skips_unavailable_scenarios() {
    let oracle = oracle().with_unavailable([4, 11]);
    let bytes: Arc<[u8]> = checkpoint(&oracle).to_bytes().unwrap().into();
    let range = ScenarioRange::new(0, 19).unwrap();

    let output = pool(3)
        .run(range, bytes, Arc::new(oracle), Arc::new(Augment))
        .unwrap();

    assert_eq!(output.outputs.len(), 18);
    assert_eq!(output.progress.completed, 20);
    assert_eq!(output.progress.successful, 18);

    let mut failed: Vec<_> = output.failures.iter().map(|f| f.id).collect();
    failed.sort();
    assert_eq!(failed, [4, 11]);
    assert!(output.failures.iter().all(|f| f.kind == FailureKind::Unavailable));

    for sample in &output.outputs {
        assert_eq!(sample.trajectory().len(), SENSORS);
        assert_eq!(sample.initial_correctors().len(), CORRECTORS_X + CORRECTORS_Y);
    }
}

#[test]
fn parallel_and_sequential_evaluation_agree() {
    let oracle = oracle();
    let ckpt = checkpoint(&oracle);
    let bytes: Arc<[u8]> = ckpt.to_bytes().unwrap().into();
    let range = ScenarioRange::new(50, 62).unwrap();

    let mut sequential = SimulationWorker::new(0, Predictor::new(ckpt).unwrap(), Progress::new());
    let expected = sequential.run(range, &oracle, &Evaluate).unwrap();

    let output = pool(4)
        .run(range, bytes, Arc::new(oracle), Arc::new(Evaluate))
        .unwrap();

    assert_eq!(output.outputs, expected.outputs);
    assert!(output.failures.is_empty());
}

#[test]
fn more_workers_than_scenarios() {
    let oracle = oracle();
    let bytes: Arc<[u8]> = checkpoint(&oracle).to_bytes().unwrap().into();
    let range = ScenarioRange::new(7, 8).unwrap();

    let output = pool(8)
        .run(range, bytes, Arc::new(oracle), Arc::new(Evaluate))
        .unwrap();

    let ids: Vec<_> = output.outputs.iter().map(|m| m.id).collect();
    assert_eq!(ids, [7, 8]);
}

#[test]
fn shape_mismatch_aborts_the_run() {
    let trained_on = oracle();
    let bytes: Arc<[u8]> = checkpoint(&trained_on).to_bytes().unwrap().into();
    let other = SyntheticOracle::new(SENSORS + 1, CORRECTORS_X, CORRECTORS_Y, 0.01, 21);
    let range = ScenarioRange::new(0, 5).unwrap();

    let res = pool(2).run(range, bytes, Arc::new(other), Arc::new(Augment));

    assert!(matches!(
        res,
        Err(PoolErr::Scenario(ScenarioErr::Model { .. }))
    ));
}

#[test]
fn corrupt_checkpoint_is_reported() {
    let bytes: Arc<[u8]> = vec![0u8; 5].into();
    let range = ScenarioRange::new(0, 3).unwrap();

    let res = pool(2).run(range, bytes, Arc::new(oracle()), Arc::new(Evaluate));

    assert!(matches!(res, Err(PoolErr::Checkpoint(_))));
}
