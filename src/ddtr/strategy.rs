use crate::data::{TimeFrequencyMetadata, band_edges};
use crate::ddtr::work::WorkingBuffer;
use crate::dm::{DmTrialPlan, DmTrials, delay_samples, dm_factor};
use crate::error::{DdtrError, Result};
use crate::units::{Frequency, Seconds};

/// Input geometry a strategy is sized for
///
/// Two chunks with the same layout can share a strategy; start times do
/// not matter.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkLayout {
    pub sample_interval: Seconds,
    pub channel_frequencies: Vec<Frequency>,
}

impl ChunkLayout {
    pub fn new(sample_interval: Seconds, channel_frequencies: Vec<Frequency>) -> Self {
        Self {
            sample_interval,
            channel_frequencies,
        }
    }

    pub fn number_of_channels(&self) -> usize {
        self.channel_frequencies.len()
    }

    pub fn low_high_frequencies(&self) -> (Frequency, Frequency) {
        band_edges(&self.channel_frequencies)
    }
}

impl From<&TimeFrequencyMetadata> for ChunkLayout {
    fn from(metadata: &TimeFrequencyMetadata) -> Self {
        Self::new(
            metadata.sample_interval,
            metadata.channel_frequencies.clone(),
        )
    }
}

/// One way of computing the DM trials of a pass
///
/// A strategy is built for one chunk layout and trial plan. The engine
/// loads each pass into a [`WorkingBuffer`] and calls `execute_range` once
/// per DM range in order, halving the buffer's time resolution between
/// ranges. Scratch space is reused across passes, so one strategy serves
/// one pass at a time.
pub trait DedispersionStrategy: Send {
    fn name(&self) -> &'static str;

    /// Spectra of history each pass needs: the largest delay, rounded up
    fn max_delay(&self) -> usize;

    /// Spectra consumed per pass, overlap included
    fn number_of_spectra(&self) -> usize;

    /// Output samples per pass at full time resolution
    fn dedispersed_samples(&self) -> usize {
        self.number_of_spectra() - self.max_delay()
    }

    /// Sizes are rounded to multiples of this many spectra
    fn granularity(&self) -> usize;

    /// Delay per channel in samples per unit DM, relative to the top of the band
    fn dm_factors(&self) -> &[f64];

    /// Shorten or restore the pass length without rebuilding
    ///
    /// The length is rounded down to the granularity and capped at the
    /// length the strategy was sized for.
    fn reset_spectra(&mut self, spectra: usize) -> Result<()>;

    /// Compute every trial of DM range `range` from the working buffer,
    /// which must already be at that range's time resolution
    fn execute_range(
        &mut self,
        range: usize,
        input: &WorkingBuffer,
        trials: &mut DmTrials,
    ) -> Result<()>;
}

/// Sizing and per-channel delays shared by every strategy
#[derive(Debug, Clone)]
pub struct StrategyCommon {
    layout: ChunkLayout,
    plan: DmTrialPlan,
    dm_factors: Vec<f64>,
    granularity: usize,
    max_delay: usize,
    full_spectra: usize,
    number_of_spectra: usize,
}

impl StrategyCommon {
    /// Size a strategy whose buffers are multiples of `granularity` spectra,
    /// limiting one pass to `memory_budget` bytes of `f32` input
    pub fn new(
        layout: &ChunkLayout,
        plan: &DmTrialPlan,
        granularity: usize,
        memory_budget: usize,
    ) -> Result<Self> {
        let nchans = layout.number_of_channels();
        if nchans == 0 {
            return Err(DdtrError::InvalidChannelCount {
                channels: 0,
                multiple: 1,
            });
        }
        if plan.number_of_dm_trials() == 0 {
            return Err(DdtrError::EmptyDmPlan);
        }

        let tsamp = layout.sample_interval;
        let k = plan.dm_constant();
        let (f_low, f_high) = layout.low_high_frequencies();
        let dm_factors = layout
            .channel_frequencies
            .iter()
            .map(|&f| dm_factor(f, f_high, k, tsamp))
            .collect();

        let delay = delay_samples(plan.max_dm(), f_low, f_high, k, tsamp).max(0) as usize;
        let mut max_delay = delay.div_ceil(granularity) * granularity;
        if max_delay == 0 {
            max_delay = granularity;
        }

        let budget_spectra = memory_budget / (nchans * std::mem::size_of::<f32>());
        let spectra = budget_spectra.min(plan.dedispersion_samples());
        let number_of_spectra = spectra.div_ceil(granularity).max(1) * granularity;

        if number_of_spectra <= max_delay {
            return Err(DdtrError::OverlapExceedsSamples {
                overlap: max_delay,
                spectra: number_of_spectra,
            });
        }
        if number_of_spectra < 2 * max_delay {
            log::warn!(
                "Pass of {} spectra is less than twice the {} spectra overlap; \
                 most of each pass is spent on delay history",
                number_of_spectra,
                max_delay
            );
        }

        log::debug!(
            "Strategy sizing: {} channels, delay {} -> overlap {}, {} spectra per pass",
            nchans,
            delay,
            max_delay,
            number_of_spectra
        );

        Ok(Self {
            layout: layout.clone(),
            plan: plan.clone(),
            dm_factors,
            granularity,
            max_delay,
            full_spectra: number_of_spectra,
            number_of_spectra,
        })
    }

    pub fn layout(&self) -> &ChunkLayout {
        &self.layout
    }

    pub fn plan(&self) -> &DmTrialPlan {
        &self.plan
    }

    pub fn dm_factors(&self) -> &[f64] {
        &self.dm_factors
    }

    pub fn granularity(&self) -> usize {
        self.granularity
    }

    pub fn max_delay(&self) -> usize {
        self.max_delay
    }

    pub fn number_of_spectra(&self) -> usize {
        self.number_of_spectra
    }

    pub fn dedispersed_samples(&self) -> usize {
        self.number_of_spectra - self.max_delay
    }

    pub fn reset_spectra(&mut self, spectra: usize) -> Result<()> {
        let spectra = (spectra.min(self.full_spectra) / self.granularity) * self.granularity;
        if spectra <= self.max_delay {
            return Err(DdtrError::InsufficientData {
                needed: self.max_delay + self.granularity,
                available: spectra,
            });
        }
        self.number_of_spectra = spectra;
        Ok(())
    }

    /// Output samples per trial in a range with this downsampling factor
    pub fn output_length(&self, downsampling_factor: usize) -> usize {
        self.dedispersed_samples() / downsampling_factor
    }

    /// Largest shift a range with this downsampling factor may apply
    pub fn shift_limit(&self, downsampling_factor: usize) -> usize {
        self.max_delay / downsampling_factor
    }

    /// Exact shift of `channel` at `dm`, in samples of the downsampled series
    pub fn shift(&self, channel: usize, dm: f64, downsampling_factor: usize) -> usize {
        let shift = (self.dm_factors[channel] * dm / downsampling_factor as f64).floor();
        (shift.max(0.0) as usize).min(self.shift_limit(downsampling_factor))
    }

    /// Index of the first trial of every range
    pub fn range_offsets(&self) -> Vec<usize> {
        self.plan
            .ranges()
            .iter()
            .scan(0, |offset, range| {
                let first = *offset;
                *offset += range.len();
                Some(first)
            })
            .collect()
    }

    /// Check that the working buffer matches this range's resolution
    pub fn check_input(&self, input: &WorkingBuffer, downsampling_factor: usize) -> Result<()> {
        let expected = self.number_of_spectra / downsampling_factor;
        if input.number_of_channels() != self.layout.number_of_channels()
            || input.number_of_samples() != expected
        {
            return Err(DdtrError::LayoutMismatch(format!(
                "working buffer holds {} channels x {} samples, expected {} x {}",
                input.number_of_channels(),
                input.number_of_samples(),
                self.layout.number_of_channels(),
                expected
            )));
        }
        Ok(())
    }
}
