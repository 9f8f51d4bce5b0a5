use rand_chacha::ChaCha8Rng;
use rand_distr::Normal;

use crate::constants::TIME_EPSILON;
use crate::data::{TimeFrequency, TimeFrequencyMetadata};
use crate::dm::dispersion_delay;
use crate::error::Result;
use crate::simulation::noise::{NoiseConfig, add_gaussian_noise, create_rng};
use crate::units::{Dm, DmConstant, Seconds};

/// Pulse arriving at the top of the band at `time`, later at lower frequencies
#[derive(Clone, Debug, serde::Deserialize)]
pub struct DispersedPulse {
    /// Dispersion measure in pc cm⁻³
    pub dm: f64,
    /// Arrival time at the highest channel, seconds from the observation start
    pub time: f64,
    /// Added to every sample the pulse covers
    pub amplitude: f32,
    /// Duration in spectra
    #[serde(default = "default_width")]
    pub width: usize,
}

fn default_width() -> usize {
    1
}

impl DispersedPulse {
    pub fn new(dm: f64, time: f64, amplitude: f32) -> Self {
        Self {
            dm,
            time,
            amplitude,
            width: 1,
        }
    }

    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width.max(1);
        self
    }
}

/// Generates consecutive filterbank blocks of a simulated observation
pub struct FilterbankSimulator {
    metadata: TimeFrequencyMetadata,
    dm_constant: DmConstant,
    pulses: Vec<DispersedPulse>,
    mean: f32,
    noise: Option<Normal<f32>>,
    rng: ChaCha8Rng,
    spectra_generated: usize,
}

impl FilterbankSimulator {
    /// `metadata` gives the layout and the start time of the first block
    pub fn new(
        metadata: TimeFrequencyMetadata,
        noise: &NoiseConfig,
        dm_constant: DmConstant,
    ) -> Result<Self> {
        Ok(Self {
            metadata,
            dm_constant,
            pulses: Vec::new(),
            mean: noise.mean,
            noise: noise.distribution()?,
            rng: create_rng(noise.seed),
            spectra_generated: 0,
        })
    }

    pub fn with_pulse(mut self, pulse: DispersedPulse) -> Self {
        self.add_pulse(pulse);
        self
    }

    pub fn add_pulse(&mut self, pulse: DispersedPulse) {
        self.pulses.push(pulse);
    }

    pub fn metadata(&self) -> &TimeFrequencyMetadata {
        &self.metadata
    }

    pub fn spectra_generated(&self) -> usize {
        self.spectra_generated
    }

    /// Spectrum, counted from the observation start, in which `pulse`
    /// reaches `channel`
    pub fn arrival_spectrum(&self, pulse: &DispersedPulse, channel: usize) -> i64 {
        let (_, f_high) = self.metadata.low_high_frequencies();
        let f = self.metadata.channel_frequencies[channel];
        let delay = dispersion_delay(Dm::from_pc_cm3(pulse.dm), f, f_high, self.dm_constant);
        let arrival = Seconds::from_secs(pulse.time) + delay - self.metadata.start_time;
        (arrival / self.metadata.sample_interval + TIME_EPSILON).floor() as i64
    }

    pub fn next_block(&mut self, nspectra: usize) -> Result<TimeFrequency<f32>> {
        let nchans = self.metadata.number_of_channels();
        let first = self.spectra_generated;
        let mut metadata = self.metadata.clone();
        metadata.start_time = self.metadata.time_at(first);

        let mut data = vec![self.mean; nchans * nspectra];
        if let Some(noise) = &self.noise {
            add_gaussian_noise(&mut data, noise, &mut self.rng);
        }

        let block_range = first as i64..(first + nspectra) as i64;
        for pulse in &self.pulses {
            for channel in 0..nchans {
                let arrival = self.arrival_spectrum(pulse, channel);
                for spectrum in arrival..arrival + pulse.width as i64 {
                    if block_range.contains(&spectrum) {
                        let row = (spectrum - block_range.start) as usize;
                        data[row * nchans + channel] += pulse.amplitude;
                    }
                }
            }
        }

        self.spectra_generated += nspectra;
        TimeFrequency::from_vec(metadata, data)
    }
}

/// Round to 8-bit samples, saturating at the ends of the range
pub fn quantize_u8(block: &TimeFrequency<f32>) -> Result<TimeFrequency<u8>> {
    let data = block
        .data()
        .iter()
        .map(|&v| v.round().clamp(0.0, 255.0) as u8)
        .collect();
    TimeFrequency::from_vec(block.metadata().clone(), data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::Frequency;

    fn metadata() -> TimeFrequencyMetadata {
        TimeFrequencyMetadata::with_linear_channels(
            Seconds::ZERO,
            Seconds::from_micros(256.0),
            Frequency::from_mhz(400.0),
            -1.0,
            32,
        )
    }

    #[test]
    fn test_pulse_follows_dispersion_sweep() {
        let mut sim = FilterbankSimulator::new(metadata(), &NoiseConfig::silent(0.0), DmConstant::default())
            .unwrap()
            .with_pulse(DispersedPulse::new(30.0, 0.1, 5.0));
        let pulse = DispersedPulse::new(30.0, 0.1, 5.0);
        let top = sim.arrival_spectrum(&pulse, 0);
        let bottom = sim.arrival_spectrum(&pulse, 31);
        assert_eq!(top, (0.1f64 / 256e-6).floor() as i64);
        assert!(bottom > top);

        let block = sim.next_block(2048).unwrap();
        let channel: Vec<f32> = block.channel(31).collect();
        assert_eq!(channel[bottom as usize], 5.0);
        assert_eq!(channel.iter().filter(|&&v| v != 0.0).count(), 1);
    }

    #[test]
    fn test_blocks_continue_in_time() {
        let mut sim =
            FilterbankSimulator::new(metadata(), &NoiseConfig::default().with_seed(1), DmConstant::default())
                .unwrap();
        let a = sim.next_block(100).unwrap();
        let b = sim.next_block(100).unwrap();
        assert_eq!(b.start_time(), a.end_time());
        assert_eq!(sim.spectra_generated(), 200);
    }

    #[test]
    fn test_pulse_split_across_blocks() {
        let mut sim = FilterbankSimulator::new(metadata(), &NoiseConfig::silent(0.0), DmConstant::default())
            .unwrap()
            .with_pulse(DispersedPulse::new(0.0, 99.0 * 256e-6, 1.0).with_width(4));
        let a = sim.next_block(100).unwrap();
        let b = sim.next_block(100).unwrap();
        assert_eq!(a.spectrum(99)[0], 1.0);
        assert_eq!(&b.spectrum(0)[..2], &[1.0, 1.0]);
        assert_eq!(b.spectrum(3)[0], 0.0);
    }

    #[test]
    fn test_quantize_saturates() {
        let block = TimeFrequency::from_vec(metadata(), (0..32).map(|v| v as f32 * 10.0 - 20.0).collect())
            .unwrap();
        let q = quantize_u8(&block).unwrap();
        assert_eq!(q.data()[0], 0);
        assert_eq!(q.data()[3], 10);
        assert_eq!(q.data()[31], 255);
    }
}
