//! Single-pulse search over dedispersed trials

pub mod boxcar;
pub mod candidate;
pub mod ccl;
pub mod msd;
pub mod window;

pub use boxcar::{BoxcarHit, BoxcarSearch};
pub use candidate::SpCandidate;
pub use ccl::SpCcl;
pub use msd::{MedianMsd, Msd, MsdEstimator, RunningMsd, create_estimator};
pub use window::{CandidateWindow, CandidateWindows};

use crate::config::SpsConfig;
use crate::data::Sample;
use crate::dm::DmTrials;
use crate::units::{DmConstant, Frequency};

/// Boxcar search of every trial of a pass, producing an ordered candidate list
///
/// The noise level is estimated once per pass and shared by all trials and
/// widths. Candidate identifiers keep counting across passes.
pub struct Sps {
    boxcar: BoxcarSearch,
    estimator: Box<dyn MsdEstimator>,
    dm_constant: DmConstant,
    band: Option<(Frequency, Frequency)>,
    hits: Vec<BoxcarHit>,
    next_ident: usize,
}

impl Sps {
    pub fn new(config: &SpsConfig, dm_constant: DmConstant) -> Self {
        Self {
            boxcar: BoxcarSearch::new(config),
            estimator: create_estimator(config.msd),
            dm_constant,
            band: None,
            hits: Vec::new(),
            next_ident: 0,
        }
    }

    /// Band the trials were dedispersed over; candidates then end at the
    /// dispersion sweep rather than one width after their start
    pub fn set_band(&mut self, f_low: Frequency, f_high: Frequency) {
        self.band = Some((f_low, f_high));
    }

    pub fn threshold(&self) -> f32 {
        self.boxcar.threshold()
    }

    pub fn search<T: Sample>(&mut self, trials: &DmTrials) -> SpCcl<T> {
        match self.estimator.estimate(trials) {
            Some(msd) => self.search_with_msd(trials, msd),
            None => {
                log::warn!(
                    "No noise estimate for the pass at {}; nothing searched",
                    trials.start_time()
                );
                SpCcl::new()
            }
        }
    }

    /// Search with a noise level supplied by the caller
    pub fn search_with_msd<T: Sample>(&mut self, trials: &DmTrials, msd: Msd) -> SpCcl<T> {
        log::debug!(
            "Searching {} trials from {}: mean {:.4}, stdev {:.4}",
            trials.size(),
            trials.start_time(),
            msd.mean,
            msd.stdev
        );

        self.hits.clear();
        for trial in trials.iter() {
            self.boxcar.search_trial(
                trial.index(),
                trial.data(),
                trial.downsampling_factor(),
                msd,
                &mut self.hits,
            );
        }

        let mut ccl = SpCcl::new();
        for hit in &self.hits {
            let Some(trial) = trials.get(hit.trial) else {
                continue;
            };
            let interval = trial.sampling_interval();
            let tstart = trials.start_time() + interval * hit.sample as f64;
            let width = interval * (1usize << hit.width) as f64;
            let ident = self.next_ident;
            self.next_ident += 1;

            let candidate = match self.band {
                Some((f_low, f_high)) => SpCandidate::with_smear(
                    trial.dm(),
                    tstart,
                    width,
                    hit.snr,
                    ident,
                    f_low,
                    f_high,
                    self.dm_constant,
                ),
                None => SpCandidate::new(trial.dm(), tstart, width, hit.snr, ident),
            };
            ccl.push_back(candidate);
        }

        if !ccl.is_empty() {
            log::debug!("{} candidates above {} sigma", ccl.len(), self.threshold());
        }
        ccl
    }
}
