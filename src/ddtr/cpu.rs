use crate::ddtr::strategy::{ChunkLayout, DedispersionStrategy, StrategyCommon};
use crate::ddtr::work::WorkingBuffer;
use crate::dm::{DmTrialPlan, DmTrials};
use crate::error::{DdtrError, Result};

/// Direct shift-and-add over every channel for every trial
///
/// Every trial is computed with its exact per-channel shift, so this is
/// the reference the tiled strategies are checked against.
pub struct CpuStrategy {
    common: StrategyCommon,
    range_offsets: Vec<usize>,
}

impl CpuStrategy {
    pub fn new(layout: &ChunkLayout, plan: &DmTrialPlan, memory_budget: usize) -> Result<Self> {
        let granularity = plan.max_downsampling_factor();
        let common = StrategyCommon::new(layout, plan, granularity, memory_budget)?;
        let range_offsets = common.range_offsets();
        log::info!(
            "CPU dedispersion: {} channels, {} trials, overlap {} of {} spectra",
            layout.number_of_channels(),
            plan.number_of_dm_trials(),
            common.max_delay(),
            common.number_of_spectra()
        );
        Ok(Self {
            common,
            range_offsets,
        })
    }
}

impl DedispersionStrategy for CpuStrategy {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn max_delay(&self) -> usize {
        self.common.max_delay()
    }

    fn number_of_spectra(&self) -> usize {
        self.common.number_of_spectra()
    }

    fn granularity(&self) -> usize {
        self.common.granularity()
    }

    fn dm_factors(&self) -> &[f64] {
        self.common.dm_factors()
    }

    fn reset_spectra(&mut self, spectra: usize) -> Result<()> {
        self.common.reset_spectra(spectra)
    }

    fn execute_range(
        &mut self,
        range: usize,
        input: &WorkingBuffer,
        trials: &mut DmTrials,
    ) -> Result<()> {
        let dm_range = self
            .common
            .plan()
            .ranges()
            .get(range)
            .ok_or_else(|| DdtrError::Config(format!("no DM range {}", range)))?;
        let df = dm_range.downsampling_factor();
        self.common.check_input(input, df)?;

        let out_len = self.common.output_length(df);
        let nchans = input.number_of_channels();
        let scale = 1.0 / nchans as f32;
        let first = self.range_offsets[range];

        for (i, descriptor) in dm_range.trials().iter().enumerate() {
            let mut trial = trials
                .get_mut(first + i)
                .ok_or(DdtrError::IncompatibleTrials)?;
            let out = trial.data_mut();
            if out.len() != out_len {
                return Err(DdtrError::IncompatibleTrials);
            }
            out.fill(0.0);

            let dm = descriptor.dm().as_pc_cm3();
            for channel in 0..nchans {
                let shift = self.common.shift(channel, dm, df);
                let row = &input.channel(channel)[shift..shift + out_len];
                for (o, &v) in out.iter_mut().zip(row) {
                    *o += v;
                }
            }
            for o in out.iter_mut() {
                *o *= scale;
            }
        }
        Ok(())
    }
}
