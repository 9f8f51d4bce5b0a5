use std::sync::Arc;

use crate::data::{Sample, TimeFrequency};
use crate::sps::candidate::SpCandidate;
use crate::sps::window::CandidateWindows;
use crate::units::{Dm, Seconds};

/// Single-pulse candidates of one search pass, ordered by start time
///
/// Holds the raw blocks the pass was dedispersed from so that the data
/// around each candidate can be cut out with [`data_iter`](Self::data_iter).
#[derive(Debug, Clone)]
pub struct SpCcl<T> {
    candidates: Vec<SpCandidate>,
    dm_range: Option<(Dm, Dm)>,
    blocks: Vec<Arc<TimeFrequency<T>>>,
}

impl<T> Default for SpCcl<T> {
    fn default() -> Self {
        Self {
            candidates: Vec::new(),
            dm_range: None,
            blocks: Vec::new(),
        }
    }
}

impl<T: Sample> SpCcl<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blocks(blocks: Vec<Arc<TimeFrequency<T>>>) -> Self {
        Self {
            blocks,
            ..Self::default()
        }
    }

    /// Insert after every candidate starting at or before `candidate`
    pub fn push_back(&mut self, candidate: SpCandidate) {
        let at = self
            .candidates
            .partition_point(|c| c.tstart() <= candidate.tstart());
        self.note_dm(candidate.dm());
        self.candidates.insert(at, candidate);
    }

    pub fn emplace(&mut self, dm: Dm, tstart: Seconds, width: Seconds, sigma: f32, ident: usize) {
        self.push_back(SpCandidate::new(dm, tstart, width, sigma, ident));
    }

    /// Append a candidate expected to start no earlier than the last one
    pub fn emplace_back(&mut self, candidate: SpCandidate) {
        if let Some(last) = self.candidates.last()
            && last.tstart() > candidate.tstart()
        {
            log::warn!(
                "Candidate {} at {} appended after {}; inserting in order",
                candidate.ident(),
                candidate.tstart(),
                last.tstart()
            );
            self.push_back(candidate);
            return;
        }
        self.note_dm(candidate.dm());
        self.candidates.push(candidate);
    }

    fn note_dm(&mut self, dm: Dm) {
        self.dm_range = Some(match self.dm_range {
            Some((low, high)) => (
                if dm < low { dm } else { low },
                if dm > high { dm } else { high },
            ),
            None => (dm, dm),
        });
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&SpCandidate> {
        self.candidates.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SpCandidate> {
        self.candidates.iter()
    }

    pub fn candidates(&self) -> &[SpCandidate] {
        &self.candidates
    }

    /// Lowest and highest DM among the candidates
    pub fn dm_range(&self) -> Option<(Dm, Dm)> {
        self.dm_range
    }

    pub fn remove_if(&mut self, mut predicate: impl FnMut(&SpCandidate) -> bool) {
        self.candidates.retain(|c| !predicate(c));
        self.dm_range = None;
        for i in 0..self.candidates.len() {
            let dm = self.candidates[i].dm();
            self.note_dm(dm);
        }
    }

    /// Drop the candidates; the attached blocks stay
    pub fn clear(&mut self) {
        self.candidates.clear();
        self.dm_range = None;
    }

    pub fn blocks(&self) -> &[Arc<TimeFrequency<T>>] {
        &self.blocks
    }

    pub fn attach_blocks(&mut self, blocks: Vec<Arc<TimeFrequency<T>>>) {
        self.blocks = blocks;
    }

    /// Time/frequency data around the candidates, one merged window per
    /// group of overlapping candidates
    pub fn data_iter(&self, before: Seconds, after: Seconds) -> CandidateWindows<'_, T> {
        CandidateWindows::new(self, before, after)
    }
}

impl<'a, T> IntoIterator for &'a SpCcl<T> {
    type Item = &'a SpCandidate;
    type IntoIter = std::slice::Iter<'a, SpCandidate>;

    fn into_iter(self) -> Self::IntoIter {
        self.candidates.iter()
    }
}
