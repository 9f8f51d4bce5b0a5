use crate::aggregation::AggregationBuffer;
use crate::data::Sample;

/// Frequency-major `f32` copy of one pass's input
///
/// Each DM range after the first works on a copy downsampled by two, so
/// the buffer is halved in place as the engine moves through the ranges.
#[derive(Debug, Default)]
pub struct WorkingBuffer {
    data: Vec<f32>,
    nchans: usize,
    stride: usize,
    nsamps: usize,
    downsampling_factor: usize,
}

impl WorkingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy the first `nsamps` spectra of every channel of `buffer`
    pub fn load<T: Sample>(&mut self, buffer: &AggregationBuffer<T>, nsamps: usize) {
        let nchans = buffer.number_of_channels();
        let nsamps = nsamps.min(buffer.number_of_spectra());
        self.reshape(nchans, nsamps);
        for (channel, row) in self.data.chunks_exact_mut(nsamps.max(1)).enumerate() {
            for (out, &value) in row.iter_mut().zip(buffer.channel(channel)) {
                *out = value.to_f32();
            }
        }
    }

    /// Build directly from frequency-major rows
    pub fn from_channels(nchans: usize, nsamps: usize, data: Vec<f32>) -> Self {
        debug_assert_eq!(data.len(), nchans * nsamps);
        Self {
            data,
            nchans,
            stride: nsamps,
            nsamps,
            downsampling_factor: 1,
        }
    }

    fn reshape(&mut self, nchans: usize, nsamps: usize) {
        self.data.resize(nchans * nsamps, 0.0);
        self.nchans = nchans;
        self.stride = nsamps;
        self.nsamps = nsamps;
        self.downsampling_factor = 1;
    }

    /// Average adjacent pairs, halving the samples in every channel
    pub fn downsample(&mut self) {
        let half = self.nsamps / 2;
        for channel in 0..self.nchans {
            let row = &mut self.data[channel * self.stride..channel * self.stride + self.nsamps];
            for i in 0..half {
                row[i] = 0.5 * (row[2 * i] + row[2 * i + 1]);
            }
        }
        self.nsamps = half;
        self.downsampling_factor *= 2;
    }

    pub fn number_of_channels(&self) -> usize {
        self.nchans
    }

    /// Samples per channel at the current resolution
    pub fn number_of_samples(&self) -> usize {
        self.nsamps
    }

    pub fn downsampling_factor(&self) -> usize {
        self.downsampling_factor
    }

    pub fn channel(&self, channel: usize) -> &[f32] {
        let start = channel * self.stride;
        &self.data[start..start + self.nsamps]
    }
}
