use std::ops::Range;

use crate::data::{Sample, corner_turn};
use crate::error::{DdtrError, Result};
use crate::units::{Frequency, Seconds};

/// Lowest and highest of `frequencies`; infinities when empty
pub fn band_edges(frequencies: &[Frequency]) -> (Frequency, Frequency) {
    let mut low = Frequency::from_mhz(f64::INFINITY);
    let mut high = Frequency::from_mhz(f64::NEG_INFINITY);
    for &f in frequencies {
        if f < low {
            low = f;
        }
        if f > high {
            high = f;
        }
    }
    (low, high)
}

/// Observation metadata shared by every block of a stream
#[derive(Debug, Clone, PartialEq)]
pub struct TimeFrequencyMetadata {
    /// Time of the first spectrum, relative to the start of the observation
    pub start_time: Seconds,
    /// Interval between consecutive spectra
    pub sample_interval: Seconds,
    /// Centre frequency of each channel, in storage order
    pub channel_frequencies: Vec<Frequency>,
}

impl TimeFrequencyMetadata {
    pub fn new(
        start_time: Seconds,
        sample_interval: Seconds,
        channel_frequencies: Vec<Frequency>,
    ) -> Self {
        Self {
            start_time,
            sample_interval,
            channel_frequencies,
        }
    }

    /// Evenly spaced channels starting at `fch1` with (usually negative) spacing `foff`
    pub fn with_linear_channels(
        start_time: Seconds,
        sample_interval: Seconds,
        fch1: Frequency,
        foff: f64,
        nchans: usize,
    ) -> Self {
        let channel_frequencies = (0..nchans)
            .map(|c| Frequency::from_mhz(fch1.as_mhz() + c as f64 * foff))
            .collect();
        Self::new(start_time, sample_interval, channel_frequencies)
    }

    pub fn number_of_channels(&self) -> usize {
        self.channel_frequencies.len()
    }

    /// Lowest and highest channel frequency
    pub fn low_high_frequencies(&self) -> (Frequency, Frequency) {
        band_edges(&self.channel_frequencies)
    }

    /// Same channels and sample interval; start times may differ
    pub fn same_layout(&self, other: &Self) -> bool {
        self.sample_interval == other.sample_interval
            && self.channel_frequencies == other.channel_frequencies
    }

    /// Start time of the spectrum `offset` samples after the first
    pub fn time_at(&self, offset: usize) -> Seconds {
        self.start_time + self.sample_interval * offset as f64
    }
}

/// Block of spectra stored time-major: `data[spectrum * nchans + channel]`
#[derive(Debug, Clone, PartialEq)]
pub struct TimeFrequency<T> {
    data: Vec<T>,
    number_of_spectra: usize,
    metadata: TimeFrequencyMetadata,
}

impl<T: Sample> TimeFrequency<T> {
    /// Zero-filled block
    pub fn new(metadata: TimeFrequencyMetadata, number_of_spectra: usize) -> Self {
        let nchans = metadata.number_of_channels();
        Self {
            data: vec![T::default(); nchans * number_of_spectra],
            number_of_spectra,
            metadata,
        }
    }

    pub fn from_vec(metadata: TimeFrequencyMetadata, data: Vec<T>) -> Result<Self> {
        let nchans = metadata.number_of_channels();
        if nchans == 0 || data.len() % nchans != 0 {
            return Err(DdtrError::LayoutMismatch(format!(
                "{} samples do not fill whole spectra of {} channels",
                data.len(),
                nchans
            )));
        }
        Ok(Self {
            number_of_spectra: data.len() / nchans,
            data,
            metadata,
        })
    }

    pub fn number_of_channels(&self) -> usize {
        self.metadata.number_of_channels()
    }

    pub fn number_of_spectra(&self) -> usize {
        self.number_of_spectra
    }

    pub fn sample_interval(&self) -> Seconds {
        self.metadata.sample_interval
    }

    pub fn start_time(&self) -> Seconds {
        self.metadata.start_time
    }

    /// Time just past the last spectrum
    pub fn end_time(&self) -> Seconds {
        self.metadata.time_at(self.number_of_spectra)
    }

    pub fn channel_frequencies(&self) -> &[Frequency] {
        &self.metadata.channel_frequencies
    }

    pub fn low_high_frequencies(&self) -> (Frequency, Frequency) {
        self.metadata.low_high_frequencies()
    }

    pub fn metadata(&self) -> &TimeFrequencyMetadata {
        &self.metadata
    }

    pub fn set_start_time(&mut self, start_time: Seconds) {
        self.metadata.start_time = start_time;
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn spectrum(&self, index: usize) -> &[T] {
        let nchans = self.number_of_channels();
        &self.data[index * nchans..(index + 1) * nchans]
    }

    pub fn spectrum_mut(&mut self, index: usize) -> &mut [T] {
        let nchans = self.number_of_channels();
        &mut self.data[index * nchans..(index + 1) * nchans]
    }

    /// Iterate spectra in time order
    pub fn spectra(&self) -> impl Iterator<Item = &[T]> {
        self.data.chunks_exact(self.number_of_channels())
    }

    /// Iterate one channel's samples in time order
    pub fn channel(&self, channel: usize) -> impl Iterator<Item = T> + '_ {
        self.data
            .iter()
            .skip(channel)
            .step_by(self.number_of_channels())
            .copied()
    }

    /// Copy of the spectra in `range`, with the start time moved accordingly
    pub fn slice(&self, range: Range<usize>) -> Self {
        let nchans = self.number_of_channels();
        let mut metadata = self.metadata.clone();
        metadata.start_time = self.metadata.time_at(range.start);
        Self {
            data: self.data[range.start * nchans..range.end * nchans].to_vec(),
            number_of_spectra: range.len(),
            metadata,
        }
    }

    /// Frequency-major copy: `out[channel * nspectra + spectrum]`
    pub fn to_frequency_major(&self) -> Vec<T> {
        let mut out = vec![T::default(); self.data.len()];
        corner_turn(
            &self.data,
            &mut out,
            self.number_of_channels(),
            self.number_of_spectra,
        );
        out
    }
}
