use rolling_stats::Stats;

use crate::config::MsdMethod;
use crate::constants::MAD_TO_SIGMA;
use crate::dm::DmTrials;

/// Samples drawn from the trials for a median estimate; larger sets are
/// strided down to about this many
const MEDIAN_SAMPLE_LIMIT: usize = 1 << 20;

/// Mean and standard deviation of the dedispersed noise at full resolution
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Msd {
    pub mean: f32,
    pub stdev: f32,
}

impl Msd {
    pub fn new(mean: f32, stdev: f32) -> Self {
        Self { mean, stdev }
    }
}

/// Estimates the noise level of a pass of DM trials
///
/// Only the trials at the finest time resolution are measured; the search
/// scales the result to other resolutions and boxcar widths.
pub trait MsdEstimator: Send {
    fn estimate(&mut self, trials: &DmTrials) -> Option<Msd>;
}

pub fn create_estimator(method: MsdMethod) -> Box<dyn MsdEstimator> {
    match method {
        MsdMethod::Median => Box::new(MedianMsd),
        MsdMethod::Running => Box::new(RunningMsd::new()),
    }
}

fn finest_trials(trials: &DmTrials) -> impl Iterator<Item = &[f32]> {
    let finest = trials
        .iter()
        .map(|t| t.downsampling_factor())
        .min()
        .unwrap_or(1);
    trials
        .iter()
        .filter(move |t| t.downsampling_factor() == finest)
        .map(|t| t.data())
}

/// Median and scaled median absolute deviation; insensitive to the pulses
/// and interference being searched for
#[derive(Debug, Clone, Copy, Default)]
pub struct MedianMsd;

impl MsdEstimator for MedianMsd {
    fn estimate(&mut self, trials: &DmTrials) -> Option<Msd> {
        let total: usize = finest_trials(trials).map(<[f32]>::len).sum();
        if total == 0 {
            return None;
        }
        let stride = total.div_ceil(MEDIAN_SAMPLE_LIMIT).max(1);
        let mut values: Vec<f32> = finest_trials(trials)
            .flat_map(|d| d.iter().copied())
            .step_by(stride)
            .filter(|v| v.is_finite())
            .collect();
        if values.is_empty() {
            return None;
        }

        let median = median_in_place(&mut values);
        for v in values.iter_mut() {
            *v = (*v - median).abs();
        }
        let mad = median_in_place(&mut values);
        Some(Msd::new(median, MAD_TO_SIGMA * mad))
    }
}

fn median_in_place(values: &mut [f32]) -> f32 {
    let mid = values.len() / 2;
    let (_, median, _) = values.select_nth_unstable_by(mid, f32::total_cmp);
    *median
}

/// Streaming mean and standard deviation over every pass seen so far
pub struct RunningMsd {
    stats: Stats<f32>,
}

impl RunningMsd {
    pub fn new() -> Self {
        Self {
            stats: Stats::new(),
        }
    }

    pub fn reset(&mut self) {
        self.stats = Stats::new();
    }

    pub fn count(&self) -> usize {
        self.stats.count
    }
}

impl Default for RunningMsd {
    fn default() -> Self {
        Self::new()
    }
}

impl MsdEstimator for RunningMsd {
    fn estimate(&mut self, trials: &DmTrials) -> Option<Msd> {
        for data in finest_trials(trials) {
            for &v in data.iter().filter(|v| v.is_finite()) {
                self.stats.update(v);
            }
        }
        if self.stats.count < 2 {
            return None;
        }
        Some(Msd::new(self.stats.mean, self.stats.std_dev))
    }
}
