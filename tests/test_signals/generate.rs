#![allow(dead_code)]

use ddtr::config::{DedispersionAlgorithm, DmRangeConfig, SearchConfig};
use ddtr::data::{TimeFrequency, TimeFrequencyMetadata};
use ddtr::simulation::{DispersedPulse, FilterbankSimulator, NoiseConfig, quantize_u8};
use ddtr::units::{DmConstant, Frequency, Seconds};

pub const NCHANS: usize = 64;
pub const PULSE_DM: f64 = 20.0;
/// Spectrum 4000 at the top of the band
pub const PULSE_TIME: f64 = 1.024;
/// Per channel; summed over the band this is 24 sigma above the noise
pub const PULSE_AMPLITUDE: f32 = 48.0;

const NOISE_MEAN: f32 = 96.0;
const NOISE_STDEV: f32 = 16.0;

/// 64 channels of 1 MHz from 400 MHz down, 256 us sampling
pub fn test_metadata() -> TimeFrequencyMetadata {
    TimeFrequencyMetadata::with_linear_channels(
        Seconds::ZERO,
        Seconds::from_micros(256.0),
        Frequency::from_mhz(400.0),
        -1.0,
        NCHANS,
    )
}

/// Trials 0, 2, ... 38 in one range, 8192 spectra per pass
pub fn search_config(algorithm: DedispersionAlgorithm) -> SearchConfig {
    let mut config = SearchConfig::default();
    config.ddtr.dm_ranges = vec![DmRangeConfig {
        start: 0.0,
        end: 40.0,
        step: 2.0,
    }];
    config.ddtr.dedispersion_samples = 8192;
    config.ddtr.algorithm = algorithm;
    config.sps.threshold = 6.0;
    config
}

/// Noisy 8-bit blocks with the given pulses injected
pub fn generate_blocks(
    pulses: &[DispersedPulse],
    nblocks: usize,
    spectra_per_block: usize,
    seed: u64,
) -> Vec<TimeFrequency<u8>> {
    let noise = NoiseConfig::default()
        .with_seed(seed)
        .with_level(NOISE_MEAN, NOISE_STDEV);
    let mut sim = FilterbankSimulator::new(test_metadata(), &noise, DmConstant::default())
        .expect("valid noise level");
    for pulse in pulses {
        sim.add_pulse(pulse.clone());
    }
    (0..nblocks)
        .map(|_| {
            let block = sim.next_block(spectra_per_block).expect("block");
            quantize_u8(&block).expect("quantized block")
        })
        .collect()
}

/// The blocks as one headerless file image
pub fn raw_bytes(blocks: &[TimeFrequency<u8>]) -> Vec<u8> {
    blocks.iter().flat_map(|b| b.data().iter().copied()).collect()
}
