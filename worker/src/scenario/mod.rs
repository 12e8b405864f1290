//! The physics collaborator: scenarios, machine states and the oracles that produce them.

mod file;
mod response;
mod synthetic;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ScenarioErr;

pub use file::FileOracle;
pub use response::LinearResponse;
pub use synthetic::SyntheticOracle;

pub type ScenarioId = u64;

/// The settings of both corrector families.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correctors {
    pub x: Vec<f32>,
    pub y: Vec<f32>,
}

impl Correctors {
    pub fn len(&self) -> usize {
        self.x.len() + self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The x family followed by the y family, the layout the model works with.
    pub fn concat(&self) -> Vec<f32> {
        let mut values = Vec::with_capacity(self.len());
        values.extend_from_slice(&self.x);
        values.extend_from_slice(&self.y);
        values
    }

    /// Undoes `concat`, the first `nx` values belong to the x family.
    pub fn split(values: &[f32], nx: usize) -> Option<Self> {
        if nx > values.len() {
            return None;
        }

        let (x, y) = values.split_at(nx);
        Some(Self {
            x: x.to_vec(),
            y: y.to_vec(),
        })
    }
}

/// A snapshot of the machine: what the sensors read, the actual beam orbit at each sensor and
/// the corrector settings that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineState {
    pub readings: Vec<[f32; 2]>,
    pub orbit: Vec<[f32; 2]>,
    pub correctors: Correctors,
}

impl MachineState {
    /// The RMS of all sensor readings.
    pub fn reading_rms(&self) -> f64 {
        rms(self.readings.as_flattened())
    }

    /// The RMS of the orbit at all sensors.
    pub fn orbit_rms(&self) -> f64 {
        rms(self.orbit.as_flattened())
    }
}

/// A fixed lattice configuration with a known pre and reference post correction state.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub id: ScenarioId,
    pub pre: MachineState,
    pub post: MachineState,
    pub response: Arc<LinearResponse>,
}

/// Produces scenarios and simulates corrector changes on them.
///
/// Implementations are read-only and get called concurrently from every worker.
pub trait ScenarioOracle: Send + Sync {
    /// Loads the scenario identified by `id`.
    ///
    /// # Returns
    /// An `Unavailable` error if the scenario cannot be produced or `Malformed` if its data is
    /// inconsistent.
    fn load(&self, id: ScenarioId) -> Result<Scenario, ScenarioErr>;

    /// Simulates the scenario's pre state with its correctors set to `correctors`.
    fn simulate(
        &self,
        scenario: &Scenario,
        correctors: &Correctors,
    ) -> Result<MachineState, ScenarioErr> {
        scenario
            .response
            .apply(&scenario.pre, correctors)
            .map_err(|reason| ScenarioErr::Malformed {
                id: scenario.id,
                reason,
            })
    }
}

impl<O: ScenarioOracle + ?Sized> ScenarioOracle for Arc<O> {
    fn load(&self, id: ScenarioId) -> Result<Scenario, ScenarioErr> {
        (**self).load(id)
    }

    fn simulate(
        &self,
        scenario: &Scenario,
        correctors: &Correctors,
    ) -> Result<MachineState, ScenarioErr> {
        (**self).simulate(scenario, correctors)
    }
}

/// Root mean square of `values`, `0` when empty.
pub fn rms(values: &[f32]) -> f64 {
    if values.is_empty() {
        return 0.;
    }

    let sum: f64 = values.iter().map(|&v| f64::from(v).powi(2)).sum();
    (sum / values.len() as f64).sqrt()
}

/// Checks that both states of a scenario agree on their dimensions with its response.
fn check_scenario(scenario: &Scenario) -> Result<(), ScenarioErr> {
    let malformed = |reason: String| ScenarioErr::Malformed {
        id: scenario.id,
        reason,
    };

    for (name, state) in [("pre", &scenario.pre), ("post", &scenario.post)] {
        scenario
            .response
            .check_state(state)
            .map_err(|e| malformed(format!("{name} state: {e}")))?;
    }

    Ok(())
}
