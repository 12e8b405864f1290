use std::num::NonZeroUsize;

/// What to do at the end of an epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AugmentDecision {
    /// The epoch is not an augmentation boundary.
    NotBoundary,
    /// A boundary, but no better model was found since the last augmentation.
    Skip,
    Augment,
}

/// Decides when the training set may grow with samples synthesized by the best model.
///
/// Augmentation is gated on improvement: a boundary only augments if a new best checkpoint was
/// recorded since the previous augmentation, so a model that stopped improving never trains on
/// its own output again.
#[derive(Debug)]
pub struct AugmentationScheduler {
    interval: NonZeroUsize,
    improved: bool,
    augmentations: usize,
}

impl AugmentationScheduler {
    /// Creates a new `AugmentationScheduler`.
    ///
    /// # Arguments
    /// * `interval` - The amount of epochs between two augmentation boundaries.
    pub fn new(interval: NonZeroUsize) -> Self {
        Self {
            interval,
            improved: false,
            augmentations: 0,
        }
    }

    /// Records that a new best checkpoint was found.
    pub fn mark_improved(&mut self) {
        self.improved = true;
    }

    pub fn improved(&self) -> bool {
        self.improved
    }

    /// The amount of augmentations completed so far.
    pub fn augmentations(&self) -> usize {
        self.augmentations
    }

    /// Decides what to do after epoch number `epoch`, counting from 1.
    ///
    /// # Arguments
    /// * `epoch` - The number of the epoch that just finished.
    /// * `has_best` - Whether a best checkpoint exists.
    pub fn decide(&self, epoch: usize, has_best: bool) -> AugmentDecision {
        if epoch % self.interval != 0 {
            return AugmentDecision::NotBoundary;
        }

        if self.improved && has_best {
            AugmentDecision::Augment
        } else {
            AugmentDecision::Skip
        }
    }

    /// Records a finished augmentation, clearing the improvement flag.
    pub fn complete(&mut self) {
        self.improved = false;
        self.augmentations += 1;
    }
}
