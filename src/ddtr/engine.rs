use crate::aggregation::AggregationBuffer;
use crate::config::SearchConfig;
use crate::data::Sample;
use crate::ddtr::plan::DedispersionPlan;
use crate::ddtr::strategy::{ChunkLayout, DedispersionStrategy};
use crate::ddtr::work::WorkingBuffer;
use crate::dm::DmTrials;
use crate::error::Result;

/// Walks the DM ranges of one pass in order
///
/// Each call to [`advance`](Self::advance) computes one range; the working
/// buffer is halved in time before every range after the first. Drive it
/// with `while !processor.finished() { processor.advance()?; }`.
pub struct DdtrProcessor<'a> {
    strategy: &'a mut dyn DedispersionStrategy,
    work: &'a mut WorkingBuffer,
    trials: &'a mut DmTrials,
    current_range: usize,
    number_of_ranges: usize,
}

impl<'a> DdtrProcessor<'a> {
    pub fn new(
        strategy: &'a mut dyn DedispersionStrategy,
        work: &'a mut WorkingBuffer,
        trials: &'a mut DmTrials,
        number_of_ranges: usize,
    ) -> Self {
        Self {
            strategy,
            work,
            trials,
            current_range: 0,
            number_of_ranges,
        }
    }

    pub fn advance(&mut self) -> Result<()> {
        if self.finished() {
            return Ok(());
        }
        if self.current_range > 0 {
            self.work.downsample();
        }
        log::trace!(
            "Range {} of {} at downsampling {}",
            self.current_range + 1,
            self.number_of_ranges,
            self.work.downsampling_factor()
        );
        self.strategy
            .execute_range(self.current_range, self.work, self.trials)?;
        self.current_range += 1;
        Ok(())
    }

    pub fn current_range(&self) -> usize {
        self.current_range
    }

    pub fn finished(&self) -> bool {
        self.current_range >= self.number_of_ranges
    }
}

/// Dedisperses aggregation buffers into DM trials
pub struct Ddtr {
    plan: DedispersionPlan,
    work: WorkingBuffer,
}

impl Ddtr {
    pub fn new(config: &SearchConfig) -> Result<Self> {
        Ok(Self::with_plan(DedispersionPlan::new(config)?))
    }

    pub fn with_plan(plan: DedispersionPlan) -> Self {
        Self {
            plan,
            work: WorkingBuffer::new(),
        }
    }

    pub fn plan(&self) -> &DedispersionPlan {
        &self.plan
    }

    /// Size the plan for `layout` ahead of the first buffer
    pub fn reset(&mut self, layout: &ChunkLayout) -> Result<bool> {
        self.plan.reset(layout)
    }

    /// Dedisperse one buffer
    ///
    /// Returns `None` when the buffer is empty or too short to cover the
    /// overlap, which happens with the last partial buffer of a stream.
    pub fn process<T: Sample>(
        &mut self,
        buffer: &AggregationBuffer<T>,
    ) -> Result<Option<DmTrials>> {
        let Some(metadata) = buffer.metadata() else {
            return Ok(None);
        };
        self.plan.reset(&ChunkLayout::from(metadata))?;

        let overlap = self.plan.buffer_overlap();
        if buffer.data_size() <= overlap * buffer.number_of_channels() {
            log::warn!(
                "Skipping pass: {} spectra do not cover the {} spectra overlap",
                buffer.number_of_spectra(),
                overlap
            );
            return Ok(None);
        }

        if let Err(e) = self.plan.reset_spectra(buffer.number_of_spectra()) {
            if e.is_transient() {
                log::warn!("Skipping pass: {}", e);
                return Ok(None);
            }
            return Err(e);
        }

        let nsamps = self.plan.number_of_spectra();
        self.work.load(buffer, nsamps);
        let mut trials = self.plan.acquire_trials(buffer.start_time())?;
        let number_of_ranges = self.plan.dm_trial_plan().number_of_ranges();

        log::debug!(
            "Dedispersing {} spectra from {} into {} trials",
            nsamps,
            buffer.start_time(),
            trials.size()
        );

        let strategy = self.plan.strategy_mut()?;
        let mut processor =
            DdtrProcessor::new(strategy, &mut self.work, &mut trials, number_of_ranges);
        while !processor.finished() {
            processor.advance()?;
        }
        Ok(Some(trials))
    }

    /// Return searched trials so a later pass can reuse their storage
    pub fn recycle(&self, trials: DmTrials) {
        self.plan.recycle(trials);
    }
}
