use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::dm::plan::DmTrialDescriptor;
use crate::error::{DdtrError, Result};
use crate::units::{Dm, Seconds};

/// Shape of a `DmTrials` object: one time series per DM trial
///
/// Every trial covers the same stretch of time. A trial with downsampling
/// factor `n` holds `fundamental_sample_count / n` samples spaced
/// `n × fundamental_sampling_interval` apart.
///
/// Equality is decided by an order-sensitive hash of the sampling interval
/// and every (DM, downsampling factor) pair. Two equal metadata objects
/// describe trial sets that can be combined element by element.
#[derive(Debug, Clone)]
pub struct DmTrialsMetadata {
    fundamental_sampling_interval: Seconds,
    fundamental_sample_count: usize,
    trials: Vec<DmTrialDescriptor>,
    hash: u64,
}

impl DmTrialsMetadata {
    pub fn new(fundamental_sampling_interval: Seconds, fundamental_sample_count: usize) -> Self {
        let mut metadata = Self {
            fundamental_sampling_interval,
            fundamental_sample_count,
            trials: Vec::new(),
            hash: 0,
        };
        metadata.rehash();
        metadata
    }

    /// Append a trial; the downsampling factor must divide the sample count
    pub fn push(&mut self, dm: Dm, downsampling_factor: usize) -> Result<()> {
        if downsampling_factor == 0 || self.fundamental_sample_count % downsampling_factor != 0 {
            return Err(DdtrError::DownsamplingMismatch {
                factor: downsampling_factor,
                samples: self.fundamental_sample_count,
            });
        }
        self.trials
            .push(DmTrialDescriptor::new(dm, downsampling_factor));
        self.rehash();
        Ok(())
    }

    fn rehash(&mut self) {
        let mut hasher = DefaultHasher::new();
        self.fundamental_sampling_interval
            .as_secs()
            .to_bits()
            .hash(&mut hasher);
        for trial in &self.trials {
            trial.dm().as_pc_cm3().to_bits().hash(&mut hasher);
            trial.downsampling_factor().hash(&mut hasher);
        }
        self.hash = hasher.finish();
    }

    pub fn fundamental_sampling_interval(&self) -> Seconds {
        self.fundamental_sampling_interval
    }

    pub fn fundamental_sample_count(&self) -> usize {
        self.fundamental_sample_count
    }

    /// Number of trials
    pub fn size(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&DmTrialDescriptor> {
        self.trials.get(index)
    }

    pub fn descriptors(&self) -> &[DmTrialDescriptor] {
        &self.trials
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DmTrialDescriptor> {
        self.trials.iter()
    }

    /// Time spanned by every trial
    pub fn duration(&self) -> Seconds {
        self.fundamental_sampling_interval * self.fundamental_sample_count as f64
    }

    /// Samples held by trial `index`
    pub fn number_of_samples(&self, index: usize) -> usize {
        self.fundamental_sample_count / self.trials[index].downsampling_factor()
    }

    /// Sampling interval of trial `index`
    pub fn sampling_interval(&self, index: usize) -> Seconds {
        self.fundamental_sampling_interval * self.trials[index].downsampling_factor() as f64
    }

    /// Samples across all trials
    pub fn total_data_size(&self) -> usize {
        self.trials
            .iter()
            .map(|t| self.fundamental_sample_count / t.downsampling_factor())
            .sum()
    }

    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub fn is_compatible(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl PartialEq for DmTrialsMetadata {
    fn eq(&self, other: &Self) -> bool {
        self.is_compatible(other)
    }
}

impl Eq for DmTrialsMetadata {}

impl<'a> IntoIterator for &'a DmTrialsMetadata {
    type Item = &'a DmTrialDescriptor;
    type IntoIter = std::slice::Iter<'a, DmTrialDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.trials.iter()
    }
}
