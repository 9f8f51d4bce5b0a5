pub mod corner_turn;
pub mod sample;
pub mod time_frequency;

pub use corner_turn::corner_turn;
pub use sample::Sample;
pub use time_frequency::{TimeFrequency, TimeFrequencyMetadata, band_edges};
