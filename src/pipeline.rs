use std::collections::VecDeque;
use std::sync::Arc;

use crate::aggregation::{AggregationBuffer, AggregationBufferFiller};
use crate::config::{CandidateWindowConfig, SearchConfig};
use crate::data::{Sample, TimeFrequency};
use crate::ddtr::{ChunkLayout, Ddtr};
use crate::error::Result;
use crate::sps::{SpCcl, Sps};
use crate::units::Seconds;

/// Candidates found in one dedispersion pass
pub struct PassResult<T> {
    /// Time of the first spectrum of the pass
    pub start_time: Seconds,
    /// Spectra dedispersed in the pass, overlap included
    pub spectra: usize,
    pub candidates: SpCcl<T>,
}

/// Streaming search: blocks in, candidate lists out
///
/// Blocks are aggregated into passes sized by the dedispersion plan, each
/// carrying the plan's overlap forward. Every pass is dedispersed, searched,
/// and returned with the raw blocks its candidate windows may need.
pub struct SearchPipeline<T> {
    ddtr: Ddtr,
    sps: Sps,
    filler: Option<AggregationBufferFiller<T>>,
    layout: Option<ChunkLayout>,
    history: VecDeque<Arc<TimeFrequency<T>>>,
    window: CandidateWindowConfig,
    passes: usize,
}

impl<T: Sample> SearchPipeline<T> {
    pub fn new(config: &SearchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            ddtr: Ddtr::new(config)?,
            sps: Sps::new(&config.sps, config.dm_constant()),
            filler: None,
            layout: None,
            history: VecDeque::new(),
            window: config.window.clone(),
            passes: 0,
        })
    }

    pub fn ddtr(&self) -> &Ddtr {
        &self.ddtr
    }

    /// Passes searched so far
    pub fn passes(&self) -> usize {
        self.passes
    }

    /// Blocks still held for candidate windows
    pub fn retained_blocks(&self) -> usize {
        self.history.len()
    }

    /// Feed one block, returning the results of any passes it completed
    pub fn push(&mut self, block: TimeFrequency<T>) -> Result<Vec<PassResult<T>>> {
        let mut results = Vec::new();
        let layout = ChunkLayout::from(block.metadata());

        if self.layout.as_ref() != Some(&layout) {
            if self.layout.is_some() {
                log::warn!(
                    "Input layout changed to {} channels at {}; restarting aggregation",
                    layout.number_of_channels(),
                    layout.sample_interval
                );
                results.extend(self.finish()?);
            }
            self.configure(&layout)?;
        } else if let Some(gap) = self.gap_before(&block) {
            log::warn!(
                "Discontinuity of {:.6}s before block at {}; searching pending data",
                gap,
                block.start_time()
            );
            results.extend(self.finish()?);
        }

        let block = Arc::new(block);
        self.history.push_back(block.clone());

        let buffers = match self.filler.as_mut() {
            Some(filler) => filler.push(&block)?,
            None => Vec::new(),
        };
        for buffer in buffers {
            if let Some(result) = self.run_pass(&buffer)? {
                results.push(result);
            }
            if let Some(filler) = self.filler.as_mut() {
                filler.recycle(buffer);
            }
        }
        Ok(results)
    }

    /// Search whatever is left once the stream ends
    pub fn finish(&mut self) -> Result<Vec<PassResult<T>>> {
        let result = match self.filler.as_mut().and_then(|f| f.flush()) {
            Some(buffer) => self.run_pass(&buffer)?,
            None => None,
        };
        self.history.clear();
        Ok(result.into_iter().collect())
    }

    /// Time between the last retained block and `block`, if they do not join up
    fn gap_before(&self, block: &TimeFrequency<T>) -> Option<f64> {
        let last = self.history.back()?;
        let gap = (block.start_time() - last.end_time()).as_secs();
        (gap.abs() > 0.5 * block.sample_interval().as_secs()).then_some(gap)
    }

    fn configure(&mut self, layout: &ChunkLayout) -> Result<()> {
        self.ddtr.reset(layout)?;
        let plan = self.ddtr.plan();
        let capacity = plan.number_of_spectra();
        let overlap = plan.buffer_overlap();
        match self.filler.as_mut() {
            Some(filler) => filler.resize(capacity, overlap)?,
            None => self.filler = Some(AggregationBufferFiller::new(capacity, overlap)?),
        }

        let (f_low, f_high) = layout.low_high_frequencies();
        self.sps.set_band(f_low, f_high);
        self.layout = Some(layout.clone());
        self.history.clear();
        Ok(())
    }

    fn run_pass(&mut self, buffer: &AggregationBuffer<T>) -> Result<Option<PassResult<T>>> {
        let Some(trials) = self.ddtr.process(buffer)? else {
            self.prune_history(buffer);
            return Ok(None);
        };
        self.passes += 1;

        let mut candidates = self.sps.search::<T>(&trials);
        self.ddtr.recycle(trials);

        let before = self.window.before();
        let after = self.window.after();
        let start = buffer.start_time() - before;
        let end = buffer.end_time() + after;
        candidates.attach_blocks(
            self.history
                .iter()
                .filter(|b| b.end_time() > start && b.start_time() < end)
                .cloned()
                .collect(),
        );

        self.prune_history(buffer);
        let spectra = buffer.number_of_spectra();

        log::debug!(
            "Pass {} at {}: {} candidates, {} blocks retained",
            self.passes,
            buffer.start_time(),
            candidates.len(),
            self.history.len()
        );

        Ok(Some(PassResult {
            start_time: buffer.start_time(),
            spectra,
            candidates,
        }))
    }

    /// Drop blocks no later pass or candidate window can reach
    fn prune_history(&mut self, buffer: &AggregationBuffer<T>) {
        // The next pass starts `overlap` spectra before this one ended
        let overlap = self.ddtr.plan().buffer_overlap();
        let spectra = buffer.number_of_spectra();
        let next_start =
            buffer.start_time_at(spectra.saturating_sub(overlap)) - self.window.before();
        while self
            .history
            .front()
            .is_some_and(|b| b.end_time() <= next_start)
        {
            self.history.pop_front();
        }
    }
}
