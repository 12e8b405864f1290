use std::{
    fmt::{self, Display},
    num::NonZeroUsize,
    ops::RangeInclusive,
};

use serde::{Deserialize, Serialize};

use crate::ScenarioId;

/// An inclusive, non empty range of scenario ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawRange")]
pub struct ScenarioRange {
    start: ScenarioId,
    end: ScenarioId,
}

#[derive(Deserialize)]
struct RawRange {
    start: ScenarioId,
    end: ScenarioId,
}

impl TryFrom<RawRange> for ScenarioRange {
    type Error = String;

    fn try_from(raw: RawRange) -> Result<Self, Self::Error> {
        Self::new(raw.start, raw.end)
            .ok_or_else(|| format!("empty scenario range {}..={}", raw.start, raw.end))
    }
}

impl ScenarioRange {
    /// Creates the range `start..=end`.
    ///
    /// # Returns
    /// `None` if `start > end`.
    pub fn new(start: ScenarioId, end: ScenarioId) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    pub fn start(&self) -> ScenarioId {
        self.start
    }

    pub fn end(&self) -> ScenarioId {
        self.end
    }

    /// The amount of ids in the range, saturating at `u64::MAX` for the full id space.
    pub fn len(&self) -> u64 {
        (self.end - self.start).saturating_add(1)
    }

    pub fn ids(&self) -> RangeInclusive<ScenarioId> {
        self.start..=self.end
    }

    pub fn contains(&self, id: ScenarioId) -> bool {
        self.ids().contains(&id)
    }

    /// Splits the range into contiguous sub ranges, one per worker.
    ///
    /// The amount of workers is clamped to the amount of ids. Every sub range gets `len / workers`
    /// ids and the last one absorbs the remainder.
    ///
    /// # Arguments
    /// * `workers` - The maximum amount of sub ranges.
    ///
    /// # Returns
    /// Pairwise disjoint sub ranges, in order, whose union is exactly this range.
    pub fn partition(&self, workers: NonZeroUsize) -> Vec<ScenarioRange> {
        let len = self.len();
        let n = (workers.get() as u64).min(len);
        let size = len / n;

        (0..n)
            .map(|i| {
                let start = self.start + i * size;
                let end = if i == n - 1 {
                    self.end
                } else {
                    start + size - 1
                };

                Self { start, end }
            })
            .collect()
    }
}

impl Display for ScenarioRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workers(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn last_sub_range_absorbs_remainder() {
        let range = ScenarioRange::new(10, 19).unwrap();
        let parts = range.partition(workers(3));

        assert_eq!(
            parts,
            [
                ScenarioRange::new(10, 12).unwrap(),
                ScenarioRange::new(13, 15).unwrap(),
                ScenarioRange::new(16, 19).unwrap(),
            ]
        );
    }

    #[test]
    fn full_id_space_partitions_without_overflow() {
        let range = ScenarioRange::new(0, u64::MAX).unwrap();
        assert_eq!(range.len(), u64::MAX);

        let parts = range.partition(workers(4));
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0].start(), 0);
        assert_eq!(parts[3].end(), u64::MAX);
        for pair in parts.windows(2) {
            assert_eq!(pair[0].end() + 1, pair[1].start());
        }
    }

    #[test]
    fn workers_are_clamped_to_range() {
        let range = ScenarioRange::new(5, 6).unwrap();
        assert_eq!(range.partition(workers(8)).len(), 2);
    }

    #[test]
    fn partition_covers_range_exactly() {
        for start in [0, 3, 1000] {
            for len in 1..40 {
                let range = ScenarioRange::new(start, start + len - 1).unwrap();

                for w in 1..12 {
                    let parts = range.partition(workers(w));
                    assert_eq!(parts.len() as u64, (w as u64).min(len));
                    assert_eq!(parts[0].start(), range.start());
                    assert_eq!(parts[parts.len() - 1].end(), range.end());

                    for pair in parts.windows(2) {
                        assert_eq!(pair[0].end() + 1, pair[1].start());
                    }

                    let total: u64 = parts.iter().map(ScenarioRange::len).sum();
                    assert_eq!(total, len);
                }
            }
        }
    }

    #[test]
    fn empty_range_is_rejected() {
        assert!(ScenarioRange::new(4, 3).is_none());
        assert!(serde_json::from_str::<ScenarioRange>(r#"{"start": 4, "end": 3}"#).is_err());

        let range: ScenarioRange = serde_json::from_str(r#"{"start": 0, "end": 9}"#).unwrap();
        assert_eq!(range.len(), 10);
    }
}
