use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::constants::DEFAULT_DM_CONSTANT;
use crate::dm::DmTrialPlan;
use crate::error::{DdtrError, Result};
use crate::units::{Dm, DmConstant, Seconds};

/// Dedispersion algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DedispersionAlgorithm {
    /// Per-channel shift-and-add, single threaded
    Cpu,
    /// Cache-tiled with shared partial sums across neighbouring DMs
    Klotski,
    /// Cache-tiled with exact per-DM shifts
    KlotskiBruteforce,
}

/// Noise estimator used to normalise the single-pulse search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum MsdMethod {
    /// Median and median absolute deviation (robust to pulses and RFI)
    Median,
    /// Streaming mean and standard deviation
    Running,
}

/// Complete search configuration
///
/// Every section has defaults, so a TOML file only needs the keys it
/// changes.
///
/// # Example
/// ```
/// use ddtr::config::SearchConfig;
///
/// let config = SearchConfig::from_toml_str(
///     r#"
///     [[ddtr.dm_ranges]]
///     start = 0.0
///     end = 100.0
///     step = 0.5
///
///     [sps]
///     threshold = 7.0
///     "#,
/// )
/// .unwrap();
/// assert_eq!(config.ddtr.dm_ranges.len(), 1);
/// assert_eq!(config.sps.threshold, 7.0);
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Dedispersion plan and algorithm
    pub ddtr: DdtrConfig,
    /// Cache-tiling parameters (klotski algorithms only)
    pub klotski: KlotskiConfig,
    /// Boxcar search parameters
    pub sps: SpsConfig,
    /// Data extracted around each candidate
    pub window: CandidateWindowConfig,
}

/// One half-open DM range, in pc cm⁻³
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct DmRangeConfig {
    pub start: f64,
    pub end: f64,
    pub step: f64,
}

/// Parses `start:end:step`, each a DM in pc cm⁻³
impl FromStr for DmRangeConfig {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        let [start, end, step] = parts.as_slice() else {
            return Err(format!("expected start:end:step, got {}", s));
        };
        let parse = |v: &str| v.parse::<Dm>().map(|dm| dm.as_pc_cm3());
        Ok(Self {
            start: parse(*start)?,
            end: parse(*end)?,
            step: parse(*step)?,
        })
    }
}

/// Dedispersion configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DdtrConfig {
    /// DM ranges in processing order; each halves the time resolution of the last
    pub dm_ranges: Vec<DmRangeConfig>,
    /// Upper bound on spectra per dedispersion pass
    pub dedispersion_samples: usize,
    /// Dispersion constant in MHz² s cm³ pc⁻¹
    pub dm_constant: f64,
    pub algorithm: DedispersionAlgorithm,
    /// Input bytes one pass may hold (sizes the pass length)
    pub memory_budget: usize,
    /// Ceiling on the total footprint of a strategy's buffers
    pub max_memory: usize,
}

/// Cache-tiled dedispersion configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KlotskiConfig {
    /// Channels per band; bands run in parallel
    pub max_channels_per_band: usize,
    /// Channels per tile within a band
    pub max_channels_per_klotski: usize,
    /// Target cache size in bytes for one tile's working set
    pub cache_size: usize,
    /// Output samples computed per tile visit
    pub samples_per_block: usize,
    /// Worker threads for band processing (0 = one per core)
    pub threads: usize,
}

/// Boxcar single-pulse search configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpsConfig {
    /// Detection threshold in units of the noise standard deviation
    pub threshold: f32,
    /// Samples per search block at full resolution; one candidate per block at most
    pub samples_per_iteration: usize,
    /// Boxcar widths searched: 1, 2, 4, ... 2^(n-1) samples
    pub number_of_widths: usize,
    pub msd: MsdMethod,
}

/// Window of data extracted around each candidate
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CandidateWindowConfig {
    /// Milliseconds kept before the candidate start
    pub ms_before: f64,
    /// Milliseconds kept after the candidate end
    pub ms_after: f64,
}

impl CandidateWindowConfig {
    pub fn before(&self) -> Seconds {
        Seconds::from_millis(self.ms_before)
    }

    pub fn after(&self) -> Seconds {
        Seconds::from_millis(self.ms_after)
    }
}

impl SearchConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| DdtrError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Reject settings no strategy or search could run with
    pub fn validate(&self) -> Result<()> {
        if self.ddtr.dedispersion_samples == 0 {
            return Err(DdtrError::Config(
                "dedispersion_samples must be positive".to_string(),
            ));
        }
        if !self.ddtr.dm_constant.is_finite() || self.ddtr.dm_constant <= 0.0 {
            return Err(DdtrError::Config("dm_constant must be positive".to_string()));
        }
        if self.klotski.max_channels_per_band == 0 || self.klotski.max_channels_per_klotski == 0 {
            return Err(DdtrError::Config(
                "klotski channel limits must be positive".to_string(),
            ));
        }
        if self.klotski.samples_per_block == 0 {
            return Err(DdtrError::Config(
                "samples_per_block must be positive".to_string(),
            ));
        }
        if self.sps.number_of_widths == 0 || self.sps.samples_per_iteration == 0 {
            return Err(DdtrError::Config(
                "number_of_widths and samples_per_iteration must be positive".to_string(),
            ));
        }
        if !(self.window.ms_before >= 0.0 && self.window.ms_after >= 0.0) {
            return Err(DdtrError::Config(
                "candidate window margins must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    pub fn dm_constant(&self) -> DmConstant {
        DmConstant::new(self.ddtr.dm_constant)
    }

    /// Build the trial plan from the configured DM ranges
    pub fn build_dm_plan(&self) -> Result<DmTrialPlan> {
        if self.ddtr.dm_ranges.is_empty() {
            return Err(DdtrError::EmptyDmPlan);
        }
        let mut plan = DmTrialPlan::new(self.dm_constant(), self.ddtr.dedispersion_samples);
        for range in &self.ddtr.dm_ranges {
            plan.add_dm_range(
                Dm::from_pc_cm3(range.start),
                Dm::from_pc_cm3(range.end),
                Dm::from_pc_cm3(range.step),
            )?;
        }
        Ok(plan)
    }
}

impl Default for DdtrConfig {
    fn default() -> Self {
        Self {
            dm_ranges: Vec::new(),
            dedispersion_samples: 1 << 17,
            dm_constant: DEFAULT_DM_CONSTANT,
            algorithm: DedispersionAlgorithm::Cpu,
            memory_budget: 1 << 30,
            max_memory: 8 << 30,
        }
    }
}

impl Default for KlotskiConfig {
    fn default() -> Self {
        Self {
            max_channels_per_band: 1024,
            max_channels_per_klotski: 64,
            cache_size: 256 * 1024,
            samples_per_block: 1024,
            threads: 0,
        }
    }
}

impl Default for SpsConfig {
    fn default() -> Self {
        Self {
            threshold: 6.0,
            samples_per_iteration: 4096,
            number_of_widths: 8,
            msd: MsdMethod::Median,
        }
    }
}

impl Default for CandidateWindowConfig {
    fn default() -> Self {
        Self {
            ms_before: 10.0,
            ms_after: 10.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dm_range_from_str() {
        let range: DmRangeConfig = "0:100:0.5".parse().unwrap();
        assert_eq!(range.end, 100.0);
        assert_eq!(range.step, 0.5);
        assert!("0:100".parse::<DmRangeConfig>().is_err());
        assert!("0:abc:1".parse::<DmRangeConfig>().is_err());
        assert!("nan:10:1".parse::<DmRangeConfig>().is_err());
        assert!("0:inf:1".parse::<DmRangeConfig>().is_err());
    }

    #[test]
    fn test_infinite_toml_range_fails_fast() {
        let config = SearchConfig::from_toml_str(
            r#"
            [[ddtr.dm_ranges]]
            start = 0.0
            end = inf
            step = 1.0
            "#,
        )
        .unwrap();
        assert!(matches!(
            config.build_dm_plan(),
            Err(DdtrError::InvalidDmRange { .. })
        ));
    }

    #[test]
    fn test_defaults_validate() {
        assert!(SearchConfig::default().validate().is_ok());
    }

    #[test]
    fn test_toml_overrides_sections() {
        let config = SearchConfig::from_toml_str(
            r#"
            [ddtr]
            algorithm = "klotski-bruteforce"
            dedispersion_samples = 65536

            [[ddtr.dm_ranges]]
            start = 0.0
            end = 50.0
            step = 1.0

            [[ddtr.dm_ranges]]
            start = 50.0
            end = 150.0
            step = 2.0

            [klotski]
            threads = 4

            [sps]
            msd = "running"
            "#,
        )
        .unwrap();

        assert_eq!(config.ddtr.algorithm, DedispersionAlgorithm::KlotskiBruteforce);
        assert_eq!(config.ddtr.dedispersion_samples, 65536);
        assert_eq!(config.klotski.threads, 4);
        assert_eq!(config.klotski.max_channels_per_band, 1024);
        assert_eq!(config.sps.msd, MsdMethod::Running);

        let plan = config.build_dm_plan().unwrap();
        assert_eq!(plan.number_of_dm_trials(), 50 + 50);
        assert_eq!(plan.max_downsampling_factor(), 2);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(SearchConfig::from_toml_str("[sps]\nnumber_of_widths = 0").is_err());
        assert!(SearchConfig::from_toml_str("[ddtr]\ndm_constant = -1.0").is_err());
        assert!(SearchConfig::from_toml_str("[ddtr]\nalgorithm = \"gpu\"").is_err());
    }

    #[test]
    fn test_empty_plan_rejected() {
        assert!(matches!(
            SearchConfig::default().build_dm_plan(),
            Err(DdtrError::EmptyDmPlan)
        ));
    }
}
