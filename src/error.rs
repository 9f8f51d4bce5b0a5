use thiserror::Error;

#[derive(Error, Debug)]
pub enum DdtrError {
    #[error("DM plan contains no trials")]
    EmptyDmPlan,

    #[error("Invalid DM range: start {start}, end {end}, step {step}")]
    InvalidDmRange { start: f64, end: f64, step: f64 },

    #[error("Overlap of {overlap} spectra exceeds the {spectra} spectra available")]
    OverlapExceedsSamples { overlap: usize, spectra: usize },

    #[error("Downsampling factor {factor} does not divide {samples} samples")]
    DownsamplingMismatch { factor: usize, samples: usize },

    #[error(
        "{channels} channels per klotski give a relative shift of {shift} samples (limit {limit})"
    )]
    ChannelsPerKlotskiTooLarge {
        channels: usize,
        shift: usize,
        limit: usize,
    },

    #[error("Invalid channel count {channels}: must be a non-zero multiple of {multiple}")]
    InvalidChannelCount { channels: usize, multiple: usize },

    #[error("Insufficient memory: need {required} bytes, limit is {limit} bytes")]
    InsufficientMemory { required: usize, limit: usize },

    #[error("Insufficient data: need {needed} samples, have {available}")]
    InsufficientData { needed: usize, available: usize },

    #[error("Candidate at {tstart:.6}s starts beyond the available data (ends {data_end:.6}s)")]
    CandidateBeyondData { tstart: f64, data_end: f64 },

    #[error("Cannot transfer {size} spectra into a buffer of capacity {capacity}")]
    TransferTooLarge { size: usize, capacity: usize },

    #[error("Data layout mismatch: {0}")]
    LayoutMismatch(String),

    #[error("DM trials are not compatible")]
    IncompatibleTrials,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DdtrError {
    /// Conditions expected at end-of-stream or on a short buffer; callers log
    /// these and carry on with the next pass.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::InsufficientData { .. })
    }
}

pub type Result<T> = std::result::Result<T, DdtrError>;
