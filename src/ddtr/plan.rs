use std::sync::Arc;

use crate::config::{DdtrConfig, DedispersionAlgorithm, KlotskiConfig, SearchConfig};
use crate::ddtr::cpu::CpuStrategy;
use crate::ddtr::klotski::KlotskiStrategy;
use crate::ddtr::strategy::{ChunkLayout, DedispersionStrategy};
use crate::ddtr::tiling::ShiftPolicy;
use crate::dm::{DmTrialPlan, DmTrials, DmTrialsExchange, DmTrialsMetadata};
use crate::error::{DdtrError, Result};
use crate::units::Seconds;

/// Owns the strategy for the current input layout and the shape of the
/// trials it produces
///
/// The strategy is built on the first `reset` and rebuilt only when the
/// channel layout or sample interval changes.
pub struct DedispersionPlan {
    dm_plan: DmTrialPlan,
    algorithm: DedispersionAlgorithm,
    ddtr: DdtrConfig,
    klotski: KlotskiConfig,
    layout: Option<ChunkLayout>,
    strategy: Option<Box<dyn DedispersionStrategy>>,
    metadata: Option<Arc<DmTrialsMetadata>>,
    exchange: DmTrialsExchange,
}

impl DedispersionPlan {
    pub fn new(config: &SearchConfig) -> Result<Self> {
        Ok(Self::with_dm_plan(
            config.build_dm_plan()?,
            &config.ddtr,
            &config.klotski,
        ))
    }

    pub fn with_dm_plan(dm_plan: DmTrialPlan, ddtr: &DdtrConfig, klotski: &KlotskiConfig) -> Self {
        Self {
            dm_plan,
            algorithm: ddtr.algorithm,
            ddtr: ddtr.clone(),
            klotski: klotski.clone(),
            layout: None,
            strategy: None,
            metadata: None,
            exchange: DmTrialsExchange::new(),
        }
    }

    /// Size the plan for `layout`, rebuilding the strategy if it changed
    ///
    /// Returns whether a rebuild took place.
    pub fn reset(&mut self, layout: &ChunkLayout) -> Result<bool> {
        if self.strategy.is_some() && self.layout.as_ref() == Some(layout) {
            return Ok(false);
        }

        let strategy: Box<dyn DedispersionStrategy> = match self.algorithm {
            DedispersionAlgorithm::Cpu => Box::new(CpuStrategy::new(
                layout,
                &self.dm_plan,
                self.ddtr.memory_budget,
            )?),
            DedispersionAlgorithm::Klotski => Box::new(KlotskiStrategy::new(
                layout,
                &self.dm_plan,
                &self.ddtr,
                &self.klotski,
                ShiftPolicy::Shared,
            )?),
            DedispersionAlgorithm::KlotskiBruteforce => Box::new(KlotskiStrategy::new(
                layout,
                &self.dm_plan,
                &self.ddtr,
                &self.klotski,
                ShiftPolicy::Exact,
            )?),
        };

        log::info!(
            "Dedispersion plan for {} channels at {}: {} strategy, {} trials, overlap {}, {} spectra per pass",
            layout.number_of_channels(),
            layout.sample_interval,
            strategy.name(),
            self.dm_plan.number_of_dm_trials(),
            strategy.max_delay(),
            strategy.number_of_spectra()
        );

        self.layout = Some(layout.clone());
        self.strategy = Some(strategy);
        self.exchange.take();
        self.regenerate_metadata()?;
        Ok(true)
    }

    /// Change the pass length without rebuilding the strategy
    pub fn reset_spectra(&mut self, spectra: usize) -> Result<()> {
        let strategy = self.strategy_mut()?;
        let before = strategy.number_of_spectra();
        strategy.reset_spectra(spectra)?;
        if strategy.number_of_spectra() != before {
            log::debug!(
                "Pass length {} -> {} spectra",
                before,
                strategy.number_of_spectra()
            );
            self.regenerate_metadata()?;
        }
        Ok(())
    }

    fn regenerate_metadata(&mut self) -> Result<()> {
        let (Some(layout), Some(strategy)) = (&self.layout, &self.strategy) else {
            return Ok(());
        };
        let metadata = self.dm_plan.generate_dmtrials_metadata(
            layout.sample_interval,
            strategy.number_of_spectra(),
            strategy.max_delay(),
        )?;
        self.metadata = Some(Arc::new(metadata));
        Ok(())
    }

    /// Spectra each pass must carry over from the previous one
    pub fn buffer_overlap(&self) -> usize {
        self.strategy.as_ref().map_or(0, |s| s.max_delay())
    }

    /// Spectra consumed per pass, overlap included
    pub fn number_of_spectra(&self) -> usize {
        self.strategy.as_ref().map_or(0, |s| s.number_of_spectra())
    }

    pub fn dedispersed_samples(&self) -> usize {
        self.strategy.as_ref().map_or(0, |s| s.dedispersed_samples())
    }

    pub fn dm_trial_plan(&self) -> &DmTrialPlan {
        &self.dm_plan
    }

    pub fn algorithm(&self) -> DedispersionAlgorithm {
        self.algorithm
    }

    pub fn layout(&self) -> Option<&ChunkLayout> {
        self.layout.as_ref()
    }

    pub fn metadata(&self) -> Option<&Arc<DmTrialsMetadata>> {
        self.metadata.as_ref()
    }

    pub fn strategy(&self) -> Option<&dyn DedispersionStrategy> {
        self.strategy.as_deref()
    }

    pub(crate) fn strategy_mut(&mut self) -> Result<&mut dyn DedispersionStrategy> {
        match self.strategy.as_deref_mut() {
            Some(strategy) => Ok(strategy),
            None => Err(DdtrError::Config(
                "dedispersion plan used before reset".to_string(),
            )),
        }
    }

    /// Trials shaped for the current pass, reusing a recycled buffer when
    /// its shape still fits
    pub fn acquire_trials(&self, start_time: Seconds) -> Result<DmTrials> {
        let metadata = self
            .metadata
            .as_ref()
            .ok_or_else(|| DdtrError::Config("dedispersion plan used before reset".to_string()))?;

        if let Some(mut trials) = self.exchange.take()
            && trials.metadata().is_compatible(metadata)
            && trials.metadata().fundamental_sample_count() == metadata.fundamental_sample_count()
        {
            trials.clear();
            trials.set_start_time(start_time);
            return Ok(trials);
        }
        Ok(DmTrials::new(metadata.clone(), start_time))
    }

    /// Return searched trials for reuse by a later pass
    pub fn recycle(&self, trials: DmTrials) {
        self.exchange.swap(trials);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::{Dm, DmConstant, Frequency};

    fn layout(nchans: usize) -> ChunkLayout {
        ChunkLayout::new(
            Seconds::from_micros(128.0),
            (0..nchans)
                .map(|c| Frequency::from_mhz(1400.0 - c as f64))
                .collect(),
        )
    }

    fn dedispersion_plan(algorithm: DedispersionAlgorithm) -> DedispersionPlan {
        let mut dm_plan = DmTrialPlan::new(DmConstant::default(), 1 << 14);
        dm_plan
            .add_dm_range(Dm::from_pc_cm3(0.0), Dm::from_pc_cm3(50.0), Dm::from_pc_cm3(1.0))
            .unwrap();
        dm_plan
            .add_dm_range(Dm::from_pc_cm3(50.0), Dm::from_pc_cm3(100.0), Dm::from_pc_cm3(2.0))
            .unwrap();
        let ddtr = DdtrConfig {
            algorithm,
            ..DdtrConfig::default()
        };
        DedispersionPlan::with_dm_plan(dm_plan, &ddtr, &KlotskiConfig::default())
    }

    #[test]
    fn test_reset_is_idempotent() {
        for algorithm in [
            DedispersionAlgorithm::Cpu,
            DedispersionAlgorithm::Klotski,
            DedispersionAlgorithm::KlotskiBruteforce,
        ] {
            let mut plan = dedispersion_plan(algorithm);
            assert!(plan.reset(&layout(64)).unwrap());
            let overlap = plan.buffer_overlap();
            let spectra = plan.number_of_spectra();
            assert!(!plan.reset(&layout(64)).unwrap());
            assert_eq!(plan.buffer_overlap(), overlap);
            assert_eq!(plan.number_of_spectra(), spectra);
        }
    }

    #[test]
    fn test_layout_change_rebuilds() {
        let mut plan = dedispersion_plan(DedispersionAlgorithm::Cpu);
        plan.reset(&layout(64)).unwrap();
        let narrow = plan.buffer_overlap();
        assert!(plan.reset(&layout(128)).unwrap());
        assert!(plan.buffer_overlap() > narrow);
    }

    #[test]
    fn test_metadata_follows_pass_length() {
        let mut plan = dedispersion_plan(DedispersionAlgorithm::Cpu);
        plan.reset(&layout(64)).unwrap();
        let full = plan.metadata().unwrap().fundamental_sample_count();
        assert_eq!(full, plan.dedispersed_samples());
        assert_eq!(plan.metadata().unwrap().size(), 50 + 25);

        plan.reset_spectra(plan.number_of_spectra() - 1000).unwrap();
        let short = plan.metadata().unwrap().fundamental_sample_count();
        assert!(short < full);
        assert_eq!(short % 2, 0);
    }

    #[test]
    fn test_recycled_trials_reused_when_compatible() {
        let mut plan = dedispersion_plan(DedispersionAlgorithm::Cpu);
        plan.reset(&layout(64)).unwrap();
        let mut trials = plan.acquire_trials(Seconds::ZERO).unwrap();
        trials.data_mut()[0] = 5.0;
        plan.recycle(trials);

        let reused = plan.acquire_trials(Seconds::from_secs(3.0)).unwrap();
        assert_eq!(reused.data()[0], 0.0);
        assert_eq!(reused.start_time(), Seconds::from_secs(3.0));
    }

    #[test]
    fn test_use_before_reset_fails() {
        let plan = dedispersion_plan(DedispersionAlgorithm::Cpu);
        assert_eq!(plan.buffer_overlap(), 0);
        assert!(plan.acquire_trials(Seconds::ZERO).is_err());
    }
}
