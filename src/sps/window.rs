//! Cutting the raw data around candidates out of the retained blocks
//!
//! A window spans `[tstart - before, end + after]`, where `end` is the later
//! of the candidate's `tend` and `tstart + width`. Windows that overlap are
//! merged, so each stretch of data is emitted once.

use std::ops::Range;

use crate::constants::TIME_EPSILON;
use crate::data::{Sample, TimeFrequency, TimeFrequencyMetadata};
use crate::error::{DdtrError, Result};
use crate::sps::candidate::SpCandidate;
use crate::sps::ccl::SpCcl;
use crate::units::Seconds;

/// Data for one or more overlapping candidates
#[derive(Debug, Clone)]
pub struct CandidateWindow<T> {
    /// Indices into the candidate list covered by this window
    pub candidates: Range<usize>,
    pub data: TimeFrequency<T>,
}

impl<T: Sample> CandidateWindow<T> {
    pub fn start_time(&self) -> Seconds {
        self.data.start_time()
    }

    pub fn end_time(&self) -> Seconds {
        self.data.end_time()
    }
}

/// Forward iterator over the merged candidate windows of an [`SpCcl`]
///
/// Call [`SpCcl::data_iter`] again to restart from the first candidate.
pub struct CandidateWindows<'a, T> {
    ccl: &'a SpCcl<T>,
    before: Seconds,
    after: Seconds,
    next: usize,
}

impl<'a, T: Sample> CandidateWindows<'a, T> {
    pub(crate) fn new(ccl: &'a SpCcl<T>, before: Seconds, after: Seconds) -> Self {
        Self {
            ccl,
            before,
            after,
            next: 0,
        }
    }

    fn window_end(&self, candidate: &SpCandidate) -> Seconds {
        candidate.data_end() + self.after
    }

    fn extract(&self, start: Seconds, end: Seconds) -> Result<TimeFrequency<T>> {
        let blocks = self.ccl.blocks();
        let mut data = Vec::new();
        let mut metadata: Option<TimeFrequencyMetadata> = None;

        for block in blocks {
            if block.end_time() <= start || block.start_time() >= end {
                continue;
            }
            let tsamp = block.sample_interval();
            let nspectra = block.number_of_spectra();
            let first = (((start - block.start_time()) / tsamp) + TIME_EPSILON)
                .floor()
                .max(0.0) as usize;
            let last = ((((end - block.start_time()) / tsamp) - TIME_EPSILON).ceil().max(0.0)
                as usize)
                .min(nspectra);
            if first >= last {
                continue;
            }
            let slice_start = block.metadata().time_at(first);
            if let Some(m) = &metadata {
                let nchans = m.number_of_channels().max(1);
                let expected = m.time_at(data.len() / nchans);
                let gap = (slice_start - expected).as_secs();
                if gap.abs() > 0.5 * tsamp.as_secs() {
                    log::warn!(
                        "Window {} .. {} crosses a {:.6}s discontinuity at {}; truncating",
                        start,
                        end,
                        gap,
                        expected
                    );
                    break;
                }
            } else {
                let mut m = block.metadata().clone();
                m.start_time = slice_start;
                metadata = Some(m);
            }
            let nchans = block.number_of_channels();
            data.extend_from_slice(&block.data()[first * nchans..last * nchans]);
        }

        let metadata = match metadata {
            Some(m) => m,
            None => {
                let mut m = blocks
                    .first()
                    .map(|b| b.metadata().clone())
                    .ok_or_else(|| DdtrError::CandidateBeyondData {
                        tstart: start.as_secs(),
                        data_end: 0.0,
                    })?;
                m.start_time = start;
                m
            }
        };
        TimeFrequency::from_vec(metadata, data)
    }
}

impl<T: Sample> Iterator for CandidateWindows<'_, T> {
    type Item = Result<CandidateWindow<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        let candidates = self.ccl.candidates();
        let first = candidates.get(self.next)?;
        let blocks = self.ccl.blocks();

        let (data_start, data_end) = match (blocks.first(), blocks.last()) {
            (Some(head), Some(tail)) => (head.start_time(), tail.end_time()),
            _ => (Seconds::ZERO, Seconds::ZERO),
        };
        if blocks.is_empty() || first.tstart() >= data_end {
            // Sorted by start time, so nothing after this one has data either
            self.next = candidates.len();
            return Some(Err(DdtrError::CandidateBeyondData {
                tstart: first.tstart().as_secs(),
                data_end: data_end.as_secs(),
            }));
        }

        let mut start = first.tstart() - self.before;
        let mut end = self.window_end(first);
        let begin = self.next;
        let mut covered = begin + 1;
        while let Some(c) = candidates.get(covered)
            && c.tstart() - self.before <= end
        {
            end = end.max(self.window_end(c));
            covered += 1;
        }
        self.next = covered;

        if start < data_start {
            log::warn!(
                "Window for candidate {} starts at {}, before the data at {}; clamping",
                first.ident(),
                start,
                data_start
            );
            start = data_start;
        }
        end = end.min(data_end);

        Some(self.extract(start, end).map(|data| CandidateWindow {
            candidates: begin..covered,
            data,
        }))
    }
}
