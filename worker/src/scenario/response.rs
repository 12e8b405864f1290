use serde::{Deserialize, Serialize};

use super::{Correctors, MachineState};

/// A linear orbit response: how much the orbit at each sensor moves per unit change of each
/// corrector.
///
/// `x[s][c]` is the horizontal orbit change at sensor `s` per unit of x family corrector `c`,
/// likewise `y` for the vertical plane and the y family. Sensor offsets are carried over from
/// the state the correctors are applied to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearResponse {
    pub x: Vec<Vec<f32>>,
    pub y: Vec<Vec<f32>>,
}

impl LinearResponse {
    pub fn sensors(&self) -> usize {
        self.x.len()
    }

    pub fn correctors_x(&self) -> usize {
        self.x.first().map_or(0, Vec::len)
    }

    pub fn correctors_y(&self) -> usize {
        self.y.first().map_or(0, Vec::len)
    }

    /// Checks that the matrices are rectangular and share the amount of sensors.
    pub fn validate(&self) -> Result<(), String> {
        if self.y.len() != self.sensors() {
            return Err(format!(
                "response planes disagree on sensors: {} and {}",
                self.x.len(),
                self.y.len()
            ));
        }

        let (nx, ny) = (self.correctors_x(), self.correctors_y());
        if is_ragged(&self.x, nx) || is_ragged(&self.y, ny) {
            return Err("response matrix rows differ in length".into());
        }

        Ok(())
    }

    /// Checks that `state` has the dimensions of this response.
    pub fn check_state(&self, state: &MachineState) -> Result<(), String> {
        self.validate()?;

        let sensors = self.sensors();
        if state.readings.len() != sensors || state.orbit.len() != sensors {
            return Err(format!(
                "expected {sensors} sensors, got {} readings and {} orbit points",
                state.readings.len(),
                state.orbit.len()
            ));
        }

        self.check_correctors(&state.correctors)
    }

    /// Computes the state reached from `from` by changing its correctors to `correctors`.
    pub fn apply(
        &self,
        from: &MachineState,
        correctors: &Correctors,
    ) -> Result<MachineState, String> {
        self.check_state(from)?;
        self.check_correctors(correctors)?;

        let dx: Vec<f32> = delta(&correctors.x, &from.correctors.x);
        let dy: Vec<f32> = delta(&correctors.y, &from.correctors.y);

        let mut orbit = from.orbit.clone();
        let mut readings = from.readings.clone();

        for (s, (point, reading)) in orbit.iter_mut().zip(&mut readings).enumerate() {
            let shift = [dot(&self.x[s], &dx), dot(&self.y[s], &dy)];

            for plane in 0..2 {
                point[plane] += shift[plane];
                reading[plane] += shift[plane];
            }
        }

        Ok(MachineState {
            readings,
            orbit,
            correctors: correctors.clone(),
        })
    }

    fn check_correctors(&self, correctors: &Correctors) -> Result<(), String> {
        let (nx, ny) = (self.correctors_x(), self.correctors_y());

        if correctors.x.len() != nx || correctors.y.len() != ny {
            return Err(format!(
                "expected ({nx}, {ny}) correctors, got ({}, {})",
                correctors.x.len(),
                correctors.y.len()
            ));
        }

        Ok(())
    }
}

fn is_ragged(matrix: &[Vec<f32>], ncols: usize) -> bool {
    matrix.iter().any(|row| row.len() != ncols)
}

fn delta(to: &[f32], from: &[f32]) -> Vec<f32> {
    to.iter().zip(from).map(|(t, f)| t - f).collect()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(a, b)| a * b).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response() -> LinearResponse {
        LinearResponse {
            x: vec![vec![1.], vec![2.]],
            y: vec![vec![0.5, 0.], vec![0., -1.]],
        }
    }

    fn state() -> MachineState {
        MachineState {
            readings: vec![[1.5, 0.], [0., 0.25]],
            orbit: vec![[1., 0.], [0., 0.]],
            correctors: Correctors {
                x: vec![0.],
                y: vec![0., 0.],
            },
        }
    }

    #[test]
    fn apply_is_linear_and_keeps_offsets() {
        let correctors = Correctors {
            x: vec![-1.],
            y: vec![2., 1.],
        };

        let next = response().apply(&state(), &correctors).unwrap();

        assert_eq!(next.orbit, [[0., 1.], [-2., -1.]]);
        assert_eq!(next.readings, [[0.5, 1.], [-2., -0.75]]);
        assert_eq!(next.correctors, correctors);
    }

    #[test]
    fn wrong_corrector_count() {
        let correctors = Correctors {
            x: vec![0., 0.],
            y: vec![0., 0.],
        };

        assert!(response().apply(&state(), &correctors).is_err());
    }

    #[test]
    fn ragged_matrix_is_invalid() {
        let response = LinearResponse {
            x: vec![vec![1.], vec![1., 2.]],
            y: vec![vec![], vec![]],
        };

        assert!(response.validate().is_err());
    }
}
