use std::sync::{Arc, Mutex};

use crate::dm::metadata::DmTrialsMetadata;
use crate::dm::plan::DmTrialDescriptor;
use crate::units::{Dm, Seconds};

/// Dedispersed output of one pass: one time series per DM trial
///
/// All series live in one contiguous buffer; trial `i` occupies
/// `offsets[i]..offsets[i + 1]`. Trials refer back to their descriptor by
/// index into the shared metadata.
#[derive(Debug, Clone)]
pub struct DmTrials {
    metadata: Arc<DmTrialsMetadata>,
    data: Vec<f32>,
    offsets: Vec<usize>,
    start_time: Seconds,
}

impl DmTrials {
    /// Zero-filled trials shaped by `metadata`
    pub fn new(metadata: Arc<DmTrialsMetadata>, start_time: Seconds) -> Self {
        let mut offsets = Vec::with_capacity(metadata.size() + 1);
        let mut offset = 0;
        offsets.push(0);
        for index in 0..metadata.size() {
            offset += metadata.number_of_samples(index);
            offsets.push(offset);
        }
        Self {
            data: vec![0.0; metadata.total_data_size()],
            metadata,
            offsets,
            start_time,
        }
    }

    pub fn metadata(&self) -> &Arc<DmTrialsMetadata> {
        &self.metadata
    }

    /// Number of trials
    pub fn size(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Time of the first sample of every trial
    pub fn start_time(&self) -> Seconds {
        self.start_time
    }

    pub fn set_start_time(&mut self, start_time: Seconds) {
        self.start_time = start_time;
    }

    /// Time just past the last sample
    pub fn end_time(&self) -> Seconds {
        self.start_time + self.metadata.duration()
    }

    pub fn get(&self, index: usize) -> Option<DmTrial<'_>> {
        if index >= self.size() {
            return None;
        }
        Some(DmTrial {
            metadata: &self.metadata,
            index,
            data: &self.data[self.offsets[index]..self.offsets[index + 1]],
        })
    }

    pub fn get_mut(&mut self, index: usize) -> Option<DmTrialMut<'_>> {
        if index >= self.size() {
            return None;
        }
        let range = self.offsets[index]..self.offsets[index + 1];
        Some(DmTrialMut {
            metadata: &self.metadata,
            index,
            data: &mut self.data[range],
        })
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = DmTrial<'_>> {
        self.offsets.windows(2).enumerate().map(|(index, w)| DmTrial {
            metadata: &self.metadata,
            index,
            data: &self.data[w[0]..w[1]],
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = DmTrialMut<'_>> {
        let metadata: &DmTrialsMetadata = &self.metadata;
        let mut rest: &mut [f32] = &mut self.data;
        self.offsets
            .windows(2)
            .enumerate()
            .map(move |(index, w)| {
                let (head, tail) = std::mem::take(&mut rest).split_at_mut(w[1] - w[0]);
                rest = tail;
                DmTrialMut {
                    metadata,
                    index,
                    data: head,
                }
            })
    }

    /// The whole backing buffer
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }

    pub fn is_compatible(&self, other: &DmTrials) -> bool {
        self.metadata.is_compatible(&other.metadata)
    }
}

/// Read-only view of one trial
#[derive(Debug, Clone, Copy)]
pub struct DmTrial<'a> {
    metadata: &'a DmTrialsMetadata,
    index: usize,
    data: &'a [f32],
}

impl<'a> DmTrial<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn descriptor(&self) -> &'a DmTrialDescriptor {
        &self.metadata.descriptors()[self.index]
    }

    pub fn dm(&self) -> Dm {
        self.descriptor().dm()
    }

    pub fn downsampling_factor(&self) -> usize {
        self.descriptor().downsampling_factor()
    }

    pub fn sampling_interval(&self) -> Seconds {
        self.metadata.sampling_interval(self.index)
    }

    pub fn data(&self) -> &'a [f32] {
        self.data
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Mutable view of one trial
#[derive(Debug)]
pub struct DmTrialMut<'a> {
    metadata: &'a DmTrialsMetadata,
    index: usize,
    data: &'a mut [f32],
}

impl DmTrialMut<'_> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn dm(&self) -> Dm {
        self.metadata.descriptors()[self.index].dm()
    }

    pub fn sampling_interval(&self) -> Seconds {
        self.metadata.sampling_interval(self.index)
    }

    pub fn data(&self) -> &[f32] {
        &*self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut *self.data
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Hand-over point for trial buffers between a dedispersion pass and the
/// stage consuming its output
///
/// `swap` deposits one generation and returns the previous one, so the
/// filled buffer can be searched while the next pass writes into the
/// recycled one.
#[derive(Debug, Default)]
pub struct DmTrialsExchange {
    slot: Mutex<Option<DmTrials>>,
}

impl DmTrialsExchange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn swap(&self, trials: DmTrials) -> Option<DmTrials> {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        slot.replace(trials)
    }

    pub fn take(&self) -> Option<DmTrials> {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        slot.take()
    }
}
