use std::{fs, path::PathBuf};

use log::info;
use machine_learning::{Checkpoint, Provenance};

use crate::Result;

/// A checkpoint persisted as the best one so far.
#[derive(Debug)]
pub struct SavedCheckpoint {
    pub checkpoint: Checkpoint,
    pub path: PathBuf,
    pub score: f64,
}

/// Keeps the best checkpoint seen so far, persisting every new best to disk.
///
/// Scores only ever increase, a candidate must be strictly better than the current best. The
/// initial best score is `0`, so a model has to beat the uncorrected baseline to be kept.
#[derive(Debug)]
pub struct BestCheckpoint {
    dir: PathBuf,
    score: f64,
    best: Option<SavedCheckpoint>,
}

impl BestCheckpoint {
    /// Creates a new `BestCheckpoint` saving into `dir`, creating it if needed.
    pub fn new<P: Into<PathBuf>>(dir: P) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        Ok(Self {
            dir,
            score: 0.,
            best: None,
        })
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn best(&self) -> Option<&SavedCheckpoint> {
        self.best.as_ref()
    }

    /// Offers `checkpoint`, validated at epoch number `epoch` with `score`.
    ///
    /// # Returns
    /// Whether the checkpoint became the new best, in which case it was saved tagged with its
    /// provenance.
    pub fn consider(&mut self, checkpoint: Checkpoint, epoch: usize, score: f64) -> Result<bool> {
        if !(score > self.score) {
            return Ok(false);
        }

        let provenance = Provenance {
            epoch,
            improvement: score,
        };
        let checkpoint = checkpoint.with_provenance(provenance);
        let path = self
            .dir
            .join(format!("best_epoch_{epoch}_improvement_{score:.2}pct.ckpt"));

        checkpoint.save(&path)?;
        info!(
            epoch = epoch,
            score = score,
            previous = self.score;
            "new best checkpoint saved to {}",
            path.display()
        );

        self.score = score;
        self.best = Some(SavedCheckpoint {
            checkpoint,
            path,
            score,
        });

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use machine_learning::{
        Normalizers,
        arch::{ActFnSpec, ModelSpec},
    };

    use super::*;

    fn checkpoint(value: f32) -> Checkpoint {
        let spec = ModelSpec::feed_forward(2, &[], 1, ActFnSpec::LeakyRelu { slope: 0.01 }, 0.);
        Checkpoint::new(spec, vec![value; 3], Normalizers::new(), None).unwrap()
    }

    #[test]
    fn non_positive_scores_are_never_kept() {
        let dir = tempfile::tempdir().unwrap();
        let mut gate = BestCheckpoint::new(dir.path()).unwrap();

        assert!(!gate.consider(checkpoint(1.), 50, 0.).unwrap());
        assert!(!gate.consider(checkpoint(1.), 100, -12.).unwrap());
        assert!(gate.best().is_none());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn only_strict_improvements_replace_the_best() {
        let dir = tempfile::tempdir().unwrap();
        let mut gate = BestCheckpoint::new(dir.path()).unwrap();

        assert!(gate.consider(checkpoint(1.), 50, 20.).unwrap());
        assert!(!gate.consider(checkpoint(2.), 100, 20.).unwrap());
        assert!(!gate.consider(checkpoint(3.), 150, 10.).unwrap());
        assert!(gate.consider(checkpoint(4.), 200, 35.5).unwrap());

        let best = gate.best().unwrap();
        assert_eq!(best.score, 35.5);
        assert_eq!(best.checkpoint.params(), [4.; 3]);
        assert!(best.path.ends_with("best_epoch_200_improvement_35.50pct.ckpt"));
    }

    #[test]
    fn saved_checkpoint_carries_its_provenance() {
        let dir = tempfile::tempdir().unwrap();
        let mut gate = BestCheckpoint::new(dir.path()).unwrap();
        gate.consider(checkpoint(1.), 50, 12.5).unwrap();

        let path = &gate.best().unwrap().path;
        let loaded = Checkpoint::load(path).unwrap();

        assert_eq!(
            loaded.provenance(),
            Some(Provenance {
                epoch: 50,
                improvement: 12.5
            })
        );
        assert_eq!(&loaded, &gate.best().unwrap().checkpoint);
    }

    #[test]
    fn file_name_and_tag_agree_on_the_score() {
        let dir = tempfile::tempdir().unwrap();
        let mut gate = BestCheckpoint::new(dir.path()).unwrap();
        gate.consider(checkpoint(1.), 50, 12.345).unwrap();

        let best = gate.best().unwrap();
        let tag = best.checkpoint.provenance().unwrap().tag();
        let pct = tag.strip_prefix("e50_imp").unwrap();

        assert!(best.path.ends_with(format!("best_epoch_50_improvement_{pct}pct.ckpt")));
    }
}
