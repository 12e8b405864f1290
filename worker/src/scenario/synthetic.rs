use std::{collections::HashSet, sync::Arc};

use rand::{Rng, SeedableRng, rngs::StdRng};
use rand_distr::StandardNormal;

use super::{Correctors, LinearResponse, MachineState, Scenario, ScenarioId, ScenarioOracle};
use crate::ScenarioErr;

/// Generates deterministic scenarios from their id under a random linear response.
///
/// Every scenario is built backwards from its reference post state: a residual orbit `r` at the
/// target correctors `t`, so the pre state at correctors `c` has orbit `R (c - t) + r`. Sensor
/// offsets and residuals are scaled by `noise`, with no noise the ideal correction is a linear
/// function of the readings.
#[derive(Debug, Clone)]
pub struct SyntheticOracle {
    response: Arc<LinearResponse>,
    noise: f32,
    seed: u64,
    unavailable: HashSet<ScenarioId>,
}

impl SyntheticOracle {
    /// Creates a new `SyntheticOracle`.
    ///
    /// # Arguments
    /// * `sensors` - The amount of sensors.
    /// * `correctors_x` - The amount of correctors in the x family.
    /// * `correctors_y` - The amount of correctors in the y family.
    /// * `noise` - The scale of the sensor offsets and residual orbit.
    /// * `seed` - The seed the response and every scenario derive from.
    pub fn new(
        sensors: usize,
        correctors_x: usize,
        correctors_y: usize,
        noise: f32,
        seed: u64,
    ) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut matrix = |ncols: usize| -> Vec<Vec<f32>> {
            (0..sensors)
                .map(|_| (0..ncols).map(|_| rng.random_range(-1.0..1.0)).collect())
                .collect()
        };

        let x = matrix(correctors_x);
        let y = matrix(correctors_y);

        Self {
            response: Arc::new(LinearResponse { x, y }),
            noise,
            seed,
            unavailable: HashSet::new(),
        }
    }

    /// Makes the oracle report the given scenarios as unavailable.
    pub fn with_unavailable<I>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = ScenarioId>,
    {
        self.unavailable.extend(ids);
        self
    }

    fn scenario_rng(&self, id: ScenarioId) -> StdRng {
        StdRng::seed_from_u64(self.seed ^ id.wrapping_mul(0x9E37_79B9_7F4A_7C15))
    }
}

impl ScenarioOracle for SyntheticOracle {
    fn load(&self, id: ScenarioId) -> Result<Scenario, ScenarioErr> {
        if self.unavailable.contains(&id) {
            return Err(ScenarioErr::Unavailable {
                id,
                reason: "scenario was not generated".into(),
            });
        }

        let mut rng = self.scenario_rng(id);
        let sensors = self.response.sensors();
        let (nx, ny) = (self.response.correctors_x(), self.response.correctors_y());

        let correctors = |rng: &mut StdRng| Correctors {
            x: (0..nx).map(|_| rng.random_range(-1.0..1.0)).collect(),
            y: (0..ny).map(|_| rng.random_range(-1.0..1.0)).collect(),
        };
        let target = correctors(&mut rng);
        let initial = correctors(&mut rng);

        let noise = self.noise;
        let points = |rng: &mut StdRng| -> Vec<[f32; 2]> {
            (0..sensors)
                .map(|_| {
                    let x: f32 = rng.sample(StandardNormal);
                    let y: f32 = rng.sample(StandardNormal);
                    [noise * x, noise * y]
                })
                .collect()
        };
        let residual = points(&mut rng);
        let offsets = points(&mut rng);

        let readings = residual
            .iter()
            .zip(&offsets)
            .map(|(r, o)| [r[0] + o[0], r[1] + o[1]])
            .collect();

        let post = MachineState {
            readings,
            orbit: residual,
            correctors: target,
        };

        let pre = self
            .response
            .apply(&post, &initial)
            .map_err(|reason| ScenarioErr::Malformed { id, reason })?;

        Ok(Scenario {
            id,
            pre,
            post,
            response: Arc::clone(&self.response),
        })
    }
}
