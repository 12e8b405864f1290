use std::{
    fs, io,
    path::PathBuf,
    sync::Arc,
};

use serde::Deserialize;

use super::{LinearResponse, MachineState, Scenario, ScenarioId, ScenarioOracle, check_scenario};
use crate::ScenarioErr;

#[derive(Deserialize)]
struct ScenarioDocument {
    response: LinearResponse,
    pre: MachineState,
    post: MachineState,
}

/// Reads scenarios from a directory holding one `seed{id}.json` document per scenario.
#[derive(Debug, Clone)]
pub struct FileOracle {
    dir: PathBuf,
}

impl FileOracle {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    /// The path of the document of scenario `id`.
    pub fn path(&self, id: ScenarioId) -> PathBuf {
        self.dir.join(format!("seed{id}.json"))
    }
}

impl ScenarioOracle for FileOracle {
    fn load(&self, id: ScenarioId) -> Result<Scenario, ScenarioErr> {
        let path = self.path(id);

        let raw = fs::read(&path).map_err(|e| ScenarioErr::Unavailable {
            id,
            reason: match e.kind() {
                io::ErrorKind::NotFound => format!("{} not found", path.display()),
                _ => format!("could not read {}: {e}", path.display()),
            },
        })?;

        let doc: ScenarioDocument =
            serde_json::from_slice(&raw).map_err(|e| ScenarioErr::Unavailable {
                id,
                reason: format!("could not parse {}: {e}", path.display()),
            })?;

        let scenario = Scenario {
            id,
            pre: doc.pre,
            post: doc.post,
            response: Arc::new(doc.response),
        };

        check_scenario(&scenario)?;
        Ok(scenario)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::FailureKind;

    fn document(post_sensors: usize) -> serde_json::Value {
        json!({
            "response": { "x": [[1.0], [0.5]], "y": [[0.0], [2.0]] },
            "pre": {
                "readings": [[1.0, 0.0], [0.5, 2.0]],
                "orbit": [[1.0, 0.0], [0.5, 2.0]],
                "correctors": { "x": [1.0], "y": [1.0] }
            },
            "post": {
                "readings": vec![[0.0, 0.0]; post_sensors],
                "orbit": vec![[0.0, 0.0]; post_sensors],
                "correctors": { "x": [0.0], "y": [0.0] }
            }
        })
    }

    #[test]
    fn loads_and_simulates() {
        let dir = tempfile::tempdir().unwrap();
        let oracle = FileOracle::new(dir.path());
        fs::write(oracle.path(3), document(2).to_string()).unwrap();

        let scenario = oracle.load(3).unwrap();
        let corrected = oracle.simulate(&scenario, &scenario.post.correctors).unwrap();

        assert_eq!(corrected.orbit, [[0., 0.], [0., 0.]]);
    }

    #[test]
    fn missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileOracle::new(dir.path()).load(1).unwrap_err();

        assert_eq!(err.kind(), FailureKind::Unavailable);
        assert!(!err.is_fatal());
    }

    #[test]
    fn inconsistent_document_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let oracle = FileOracle::new(dir.path());
        fs::write(oracle.path(0), document(3).to_string()).unwrap();

        let err = oracle.load(0).unwrap_err();
        assert_eq!(err.kind(), FailureKind::Malformed);
        assert!(err.is_fatal());
    }
}
