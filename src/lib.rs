pub mod aggregation;
pub mod config;
pub mod constants;
pub mod data;
pub mod ddtr;
pub mod dm;
pub mod error;
pub mod output;
pub mod pipeline;
#[cfg(feature = "simulation")]
pub mod simulation;
pub mod source;
pub mod sps;
pub mod units;

pub use config::SearchConfig;
pub use error::{DdtrError, Result};
pub use pipeline::{PassResult, SearchPipeline};
