//! Synthetic filterbank data: Gaussian noise with dispersed pulses injected

mod noise;
mod pulse;

pub use noise::{NoiseConfig, add_gaussian_noise};
pub use pulse::{DispersedPulse, FilterbankSimulator, quantize_u8};
