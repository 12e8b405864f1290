//! An on-disk store of augmented samples keyed by the scenario range they were synthesized from
//! and the model that synthesized them.

use std::{
    fmt::{self, Display},
    fs::{self, File},
    io::{BufReader, BufWriter, ErrorKind},
    path::PathBuf,
    process,
};

use log::{info, warn};
use machine_learning::{
    Provenance, TrainingSample,
    dataset::{read_samples, write_samples},
};
use worker::ScenarioRange;

use crate::Result;

/// The identity of the model a cache entry was produced with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ModelTag {
    Provenance(Provenance),
    /// A model with no known provenance.
    Current,
}

impl From<Option<Provenance>> for ModelTag {
    fn from(provenance: Option<Provenance>) -> Self {
        provenance.map_or(Self::Current, Self::Provenance)
    }
}

impl Display for ModelTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provenance(provenance) => write!(f, "{}", provenance.tag()),
            Self::Current => write!(f, "current"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheKey {
    pub range: ScenarioRange,
    pub tag: ModelTag,
}

impl CacheKey {
    pub fn new(range: ScenarioRange, tag: ModelTag) -> Self {
        Self { range, tag }
    }

    fn file_name(&self) -> String {
        format!(
            "augmented_{}_{}_model_{}.bin",
            self.range.start(),
            self.range.end(),
            self.tag
        )
    }
}

/// Entries are written once and never invalidated. A hit is trusted without checking the model
/// that produced it.
#[derive(Debug, Clone)]
pub struct DatasetCache {
    dir: PathBuf,
}

impl DatasetCache {
    /// Creates a new `DatasetCache` rooted at `dir`, creating it if needed.
    pub fn new<P: Into<PathBuf>>(dir: P) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// The file the entry for `key` lives in.
    pub fn path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// Looks up the samples stored under `key`.
    ///
    /// # Returns
    /// `None` on a miss. An entry that cannot be decoded is logged and treated as a miss.
    pub fn get(&self, key: &CacheKey) -> Result<Option<Vec<TrainingSample>>> {
        let path = self.path(key);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match read_samples(BufReader::new(file)) {
            Ok(samples) => Ok(Some(samples)),
            Err(e) => {
                warn!(path = path.display().to_string(); "ignoring unreadable cache entry: {e}");
                Ok(None)
            }
        }
    }

    /// Stores `samples` under `key`.
    ///
    /// The entry is written to a temporary file in the cache directory and then renamed, so a
    /// reader never sees a partial entry.
    pub fn put(&self, key: &CacheKey, samples: &[TrainingSample]) -> Result<()> {
        let path = self.path(key);
        let tmp = self
            .dir
            .join(format!(".{}.{}.tmp", key.file_name(), process::id()));

        let write = || -> Result<()> {
            let file = File::create(&tmp)?;
            let tx = write_samples(samples, BufWriter::new(file))?;
            tx.into_inner()
                .map_err(|e| e.into_error())?
                .sync_all()?;
            fs::rename(&tmp, &path)?;
            Ok(())
        };

        write().inspect_err(|_| {
            let _ = fs::remove_file(&tmp);
        })
    }

    /// Returns the samples stored under `key`, computing and storing them on a miss.
    ///
    /// # Arguments
    /// * `key` - The range and model the samples belong to.
    /// * `compute` - Produces the samples on a miss.
    pub fn get_or_compute<F>(&self, key: &CacheKey, compute: F) -> Result<Vec<TrainingSample>>
    where
        F: FnOnce() -> Result<Vec<TrainingSample>>,
    {
        if let Some(samples) = self.get(key)? {
            info!(
                range = key.range.to_string(),
                tag = key.tag.to_string(),
                samples = samples.len();
                "augmentation cache hit"
            );
            return Ok(samples);
        }

        info!(range = key.range.to_string(), tag = key.tag.to_string(); "augmentation cache miss");
        let samples = compute()?;
        self.put(key, &samples)?;
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    fn key() -> CacheKey {
        CacheKey::new(
            ScenarioRange::new(0, 99).unwrap(),
            ModelTag::Provenance(Provenance {
                epoch: 50,
                improvement: 12.5,
            }),
        )
    }

    fn samples() -> Vec<TrainingSample> {
        (0..3)
            .map(|i| {
                let v = i as f32;
                TrainingSample::new(vec![[v, -v], [0.5, v]], vec![v], vec![-v]).unwrap()
            })
            .collect()
    }

    #[test]
    fn file_name_carries_range_and_tag() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DatasetCache::new(dir.path()).unwrap();
        let path = cache.path(&key());
        assert!(path.ends_with("augmented_0_99_model_e50_imp12.50.bin"));

        let current = CacheKey::new(ScenarioRange::new(3, 4).unwrap(), ModelTag::from(None));
        assert!(cache.path(&current).ends_with("augmented_3_4_model_current.bin"));
    }

    #[test]
    fn compute_runs_only_on_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DatasetCache::new(dir.path()).unwrap();
        let calls = Cell::new(0);

        let compute = || {
            calls.set(calls.get() + 1);
            Ok(samples())
        };

        let first = cache.get_or_compute(&key(), compute).unwrap();
        let second = cache
            .get_or_compute(&key(), || panic!("cache hit expected"))
            .unwrap();

        assert_eq!(calls.get(), 1);
        assert_eq!(first, second);
        assert_eq!(first, samples());
    }

    #[test]
    fn absent_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DatasetCache::new(dir.path()).unwrap();

        assert!(cache.get(&key()).unwrap().is_none());
    }

    #[test]
    fn corrupt_entry_is_recomputed() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DatasetCache::new(dir.path()).unwrap();
        fs::write(cache.path(&key()), b"not a sample file").unwrap();

        assert!(cache.get(&key()).unwrap().is_none());

        let got = cache.get_or_compute(&key(), || Ok(samples())).unwrap();
        assert_eq!(got, samples());
        assert_eq!(cache.get(&key()).unwrap(), Some(samples()));
    }

    #[test]
    fn entry_with_damaged_length_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DatasetCache::new(dir.path()).unwrap();

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(1u64 << 62).to_be_bytes());
        bytes.extend_from_slice(&1u32.to_be_bytes());
        bytes.extend_from_slice(b"{}");
        fs::write(cache.path(&key()), bytes).unwrap();

        assert!(cache.get(&key()).unwrap().is_none());
    }

    #[test]
    fn no_temporary_files_are_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DatasetCache::new(dir.path()).unwrap();
        cache.put(&key(), &samples()).unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();

        assert_eq!(names.len(), 1);
        assert_eq!(names[0], "augmented_0_99_model_e50_imp12.50.bin");
    }
}
