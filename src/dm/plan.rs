use std::cell::OnceCell;

use crate::dm::delay::dispersion_delay;
use crate::dm::metadata::DmTrialsMetadata;
use crate::error::{DdtrError, Result};
use crate::units::{Dm, DmConstant, Frequency, Seconds};

/// One DM value to dedisperse at, and the time resolution it is computed at
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DmTrialDescriptor {
    dm: Dm,
    downsampling_factor: usize,
}

impl DmTrialDescriptor {
    pub fn new(dm: Dm, downsampling_factor: usize) -> Self {
        Self {
            dm,
            downsampling_factor,
        }
    }

    pub fn dm(&self) -> Dm {
        self.dm
    }

    pub fn downsampling_factor(&self) -> usize {
        self.downsampling_factor
    }
}

/// Half-open range of DM trials sharing one downsampling factor
#[derive(Debug, Clone)]
pub struct DmRange {
    start: Dm,
    end: Dm,
    step: Dm,
    trials: Vec<DmTrialDescriptor>,
}

impl DmRange {
    pub fn start(&self) -> Dm {
        self.start
    }

    pub fn end(&self) -> Dm {
        self.end
    }

    pub fn step(&self) -> Dm {
        self.step
    }

    pub fn downsampling_factor(&self) -> usize {
        self.trials
            .first()
            .map(|t| t.downsampling_factor())
            .unwrap_or(1)
    }

    pub fn trials(&self) -> &[DmTrialDescriptor] {
        &self.trials
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }
}

/// The grid of DM trials to compute
///
/// Ranges are processed in the order they are added. The n-th range is
/// computed at downsampling factor 2ⁿ⁻¹, so each range works at half the
/// time resolution of the one before it.
#[derive(Debug, Clone)]
pub struct DmTrialPlan {
    ranges: Vec<DmRange>,
    dm_constant: DmConstant,
    dedispersion_samples: usize,
    max_dm: OnceCell<Dm>,
}

impl DmTrialPlan {
    pub fn new(dm_constant: DmConstant, dedispersion_samples: usize) -> Self {
        Self {
            ranges: Vec::new(),
            dm_constant,
            dedispersion_samples,
            max_dm: OnceCell::new(),
        }
    }

    /// Append the trials `start, start + step, ...` below `end`
    pub fn add_dm_range(&mut self, start: Dm, end: Dm, step: Dm) -> Result<()> {
        let (s, e, d) = (start.as_pc_cm3(), end.as_pc_cm3(), step.as_pc_cm3());
        if !(s.is_finite() && e.is_finite() && d.is_finite()) || d <= 0.0 || e <= s || s < 0.0 {
            return Err(DdtrError::InvalidDmRange {
                start: s,
                end: e,
                step: d,
            });
        }

        let downsampling_factor = 1usize << self.ranges.len();
        let mut trials = Vec::new();
        let mut i = 0usize;
        loop {
            let dm = s + i as f64 * d;
            if dm >= e {
                break;
            }
            trials.push(DmTrialDescriptor::new(
                Dm::from_pc_cm3(dm),
                downsampling_factor,
            ));
            i += 1;
        }

        log::debug!(
            "Added DM range [{}, {}) step {}: {} trials at downsampling {}",
            start,
            end,
            step,
            trials.len(),
            downsampling_factor
        );

        self.ranges.push(DmRange {
            start,
            end,
            step,
            trials,
        });
        self.max_dm = OnceCell::new();
        Ok(())
    }

    pub fn ranges(&self) -> &[DmRange] {
        &self.ranges
    }

    pub fn number_of_ranges(&self) -> usize {
        self.ranges.len()
    }

    /// All trials in processing order
    pub fn dm_trials(&self) -> impl Iterator<Item = &DmTrialDescriptor> {
        self.ranges.iter().flat_map(|r| r.trials.iter())
    }

    pub fn number_of_dm_trials(&self) -> usize {
        self.ranges.iter().map(DmRange::len).sum()
    }

    /// Highest trial DM across all ranges
    pub fn max_dm(&self) -> Dm {
        *self.max_dm.get_or_init(|| {
            self.dm_trials()
                .map(|t| t.dm())
                .fold(Dm::from_pc_cm3(0.0), |a, b| if b > a { b } else { a })
        })
    }

    /// Downsampling factor of the last range
    pub fn max_downsampling_factor(&self) -> usize {
        1usize << self.ranges.len().saturating_sub(1)
    }

    /// Dispersion delay across `[f_low, f_high]` at the highest trial DM
    pub fn maximum_delay(&self, f_low: Frequency, f_high: Frequency) -> Seconds {
        dispersion_delay(self.max_dm(), f_low, f_high, self.dm_constant)
    }

    pub fn dm_constant(&self) -> DmConstant {
        self.dm_constant
    }

    pub fn set_dm_constant(&mut self, dm_constant: DmConstant) {
        self.dm_constant = dm_constant;
    }

    /// Upper bound on the spectra a single dedispersion pass processes
    pub fn dedispersion_samples(&self) -> usize {
        self.dedispersion_samples
    }

    pub fn set_dedispersion_samples(&mut self, samples: usize) {
        self.dedispersion_samples = samples;
    }

    /// Describe the trials produced from `nspectra` input spectra of which
    /// the trailing `overlap` only supply delay history.
    pub fn generate_dmtrials_metadata(
        &self,
        sample_interval: Seconds,
        nspectra: usize,
        overlap: usize,
    ) -> Result<DmTrialsMetadata> {
        if overlap > nspectra {
            return Err(DdtrError::OverlapExceedsSamples {
                overlap,
                spectra: nspectra,
            });
        }
        if self.number_of_dm_trials() == 0 {
            return Err(DdtrError::EmptyDmPlan);
        }

        let mut metadata = DmTrialsMetadata::new(sample_interval, nspectra - overlap);
        for trial in self.dm_trials() {
            metadata.push(trial.dm(), trial.downsampling_factor())?;
        }
        Ok(metadata)
    }
}
