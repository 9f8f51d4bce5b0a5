use crate::data::{Sample, TimeFrequency, TimeFrequencyMetadata, corner_turn};
use crate::error::{DdtrError, Result};
use crate::units::{Frequency, Seconds};

/// Fixed-capacity accumulator of spectra, stored frequency-major
///
/// Channel `c` occupies `data[c * capacity..(c + 1) * capacity]`, of which
/// the first `number_of_spectra()` samples are filled. The channel layout
/// and start time are taken from the first block inserted.
#[derive(Debug, Clone)]
pub struct AggregationBuffer<T> {
    data: Vec<T>,
    capacity: usize,
    fill: usize,
    metadata: Option<TimeFrequencyMetadata>,
    scratch: Vec<T>,
}

impl<T: Sample> AggregationBuffer<T> {
    /// Empty buffer holding up to `capacity` spectra
    pub fn new(capacity: usize) -> Self {
        Self {
            data: Vec::new(),
            capacity,
            fill: 0,
            metadata: None,
            scratch: Vec::new(),
        }
    }

    /// Copy as many spectra of `block` as fit
    ///
    /// Returns the number of spectra consumed.
    pub fn insert(&mut self, block: &TimeFrequency<T>) -> Result<usize> {
        self.insert_from(block, 0)
    }

    /// Copy spectra of `block` starting at spectrum `offset`
    ///
    /// Returns the number of spectra consumed.
    pub fn insert_from(&mut self, block: &TimeFrequency<T>, offset: usize) -> Result<usize> {
        let available = block.number_of_spectra().saturating_sub(offset);
        let count = available.min(self.remaining_capacity());
        if count == 0 {
            return Ok(0);
        }

        match &self.metadata {
            Some(metadata) if !metadata.same_layout(block.metadata()) => {
                return Err(DdtrError::LayoutMismatch(format!(
                    "block of {} channels does not match buffer of {} channels",
                    block.number_of_channels(),
                    metadata.number_of_channels()
                )));
            }
            Some(_) => {}
            None => {
                let mut metadata = block.metadata().clone();
                metadata.start_time = block.metadata().time_at(offset);
                self.allocate(metadata.number_of_channels());
                self.metadata = Some(metadata);
            }
        }

        let nchans = block.number_of_channels();
        let source = &block.data()[offset * nchans..(offset + count) * nchans];
        self.scratch.resize(nchans * count, T::default());
        corner_turn(source, &mut self.scratch, nchans, count);

        for (channel, row) in self.scratch.chunks_exact(count).enumerate() {
            let start = channel * self.capacity + self.fill;
            self.data[start..start + count].copy_from_slice(row);
        }
        self.fill += count;
        Ok(count)
    }

    /// Copy the trailing `size` spectra into `dest`, replacing its contents
    ///
    /// `dest` takes this buffer's layout and starts at the time of the
    /// first transferred spectrum.
    pub fn transfer(&self, size: usize, dest: &mut AggregationBuffer<T>) -> Result<()> {
        if size > dest.capacity {
            return Err(DdtrError::TransferTooLarge {
                size,
                capacity: dest.capacity,
            });
        }
        if size > self.fill {
            return Err(DdtrError::InsufficientData {
                needed: size,
                available: self.fill,
            });
        }

        dest.reset();
        let Some(metadata) = &self.metadata else {
            return Ok(());
        };
        let mut dest_metadata = metadata.clone();
        dest_metadata.start_time = self.start_time_at(self.fill - size);
        dest.allocate(metadata.number_of_channels());
        dest.metadata = Some(dest_metadata);

        for channel in 0..metadata.number_of_channels() {
            let src = channel * self.capacity + self.fill - size;
            let dst = channel * dest.capacity;
            dest.data[dst..dst + size].copy_from_slice(&self.data[src..src + size]);
        }
        dest.fill = size;
        Ok(())
    }

    fn allocate(&mut self, nchans: usize) {
        let len = nchans * self.capacity;
        if self.data.len() != len {
            self.data.resize(len, T::default());
        }
    }

    /// Forget the contents and layout, keeping the allocation
    pub fn reset(&mut self) {
        self.fill = 0;
        self.metadata = None;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Spectra still free
    pub fn remaining_capacity(&self) -> usize {
        self.capacity - self.fill
    }

    /// Spectra filled so far
    pub fn number_of_spectra(&self) -> usize {
        self.fill
    }

    /// Samples filled so far, across all channels
    pub fn data_size(&self) -> usize {
        self.fill * self.number_of_channels()
    }

    pub fn is_full(&self) -> bool {
        self.fill == self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.fill == 0
    }

    pub fn number_of_channels(&self) -> usize {
        self.metadata
            .as_ref()
            .map_or(0, TimeFrequencyMetadata::number_of_channels)
    }

    pub fn metadata(&self) -> Option<&TimeFrequencyMetadata> {
        self.metadata.as_ref()
    }

    pub fn start_time(&self) -> Seconds {
        self.start_time_at(0)
    }

    /// Time of the spectrum `offset` samples into the buffer
    pub fn start_time_at(&self, offset: usize) -> Seconds {
        self.metadata
            .as_ref()
            .map_or(Seconds::ZERO, |m| m.time_at(offset))
    }

    /// Time just past the last filled spectrum
    pub fn end_time(&self) -> Seconds {
        self.start_time_at(self.fill)
    }

    pub fn sample_interval(&self) -> Seconds {
        self.metadata
            .as_ref()
            .map_or(Seconds::ZERO, |m| m.sample_interval)
    }

    pub fn channel_frequencies(&self) -> &[Frequency] {
        self.metadata
            .as_ref()
            .map(|m| m.channel_frequencies.as_slice())
            .unwrap_or(&[])
    }

    /// Filled samples of one channel
    pub fn channel(&self, channel: usize) -> &[T] {
        let start = channel * self.capacity;
        &self.data[start..start + self.fill]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(nchans: usize, nspectra: usize, start: f64, first: u16) -> TimeFrequency<u16> {
        let metadata = TimeFrequencyMetadata::with_linear_channels(
            Seconds::from_secs(start),
            Seconds::from_millis(1.0),
            Frequency::from_mhz(400.0),
            -1.0,
            nchans,
        );
        let data = (0..nchans * nspectra).map(|i| first + i as u16).collect();
        TimeFrequency::from_vec(metadata, data).unwrap()
    }

    #[test]
    fn test_insert_transposes_to_frequency_major() {
        let mut buffer = AggregationBuffer::new(8);
        let consumed = buffer.insert(&block(3, 2, 0.0, 0)).unwrap();
        assert_eq!(consumed, 2);
        assert_eq!(buffer.channel(0), &[0, 3]);
        assert_eq!(buffer.channel(2), &[2, 5]);
        assert_eq!(buffer.data_size(), 6);
        assert_eq!(buffer.remaining_capacity(), 6);
    }

    #[test]
    fn test_insert_stops_at_capacity() {
        let mut buffer = AggregationBuffer::new(4);
        assert_eq!(buffer.insert(&block(2, 3, 0.0, 0)).unwrap(), 3);
        assert_eq!(buffer.insert(&block(2, 3, 0.003, 6)).unwrap(), 1);
        assert!(buffer.is_full());
        assert_eq!(buffer.channel(1), &[1, 3, 5, 7]);
        assert_eq!(buffer.insert(&block(2, 3, 0.004, 8)).unwrap(), 0);
    }

    #[test]
    fn test_insert_from_offset_moves_start_time() {
        let mut buffer = AggregationBuffer::new(4);
        buffer.insert_from(&block(2, 6, 1.0, 0), 4).unwrap();
        assert!((buffer.start_time().as_secs() - 1.004).abs() < 1e-12);
        assert_eq!(buffer.channel(0), &[8, 10]);
    }

    #[test]
    fn test_layout_mismatch_rejected() {
        let mut buffer = AggregationBuffer::new(8);
        buffer.insert(&block(2, 2, 0.0, 0)).unwrap();
        assert!(matches!(
            buffer.insert(&block(3, 2, 0.002, 0)),
            Err(DdtrError::LayoutMismatch(_))
        ));
    }

    #[test]
    fn test_transfer_copies_tail_and_start_time() {
        let mut buffer = AggregationBuffer::new(4);
        buffer.insert(&block(2, 4, 2.0, 0)).unwrap();

        let mut next = AggregationBuffer::new(4);
        buffer.transfer(1, &mut next).unwrap();
        assert_eq!(next.number_of_spectra(), 1);
        assert_eq!(next.channel(0), &[6]);
        assert_eq!(next.channel(1), &[7]);
        assert!((next.start_time().as_secs() - 2.003).abs() < 1e-12);
    }

    #[test]
    fn test_transfer_larger_than_destination_fails() {
        let mut buffer = AggregationBuffer::new(4);
        buffer.insert(&block(2, 4, 0.0, 0)).unwrap();
        let mut small = AggregationBuffer::new(2);
        assert!(matches!(
            buffer.transfer(3, &mut small),
            Err(DdtrError::TransferTooLarge {
                size: 3,
                capacity: 2
            })
        ));
    }
}
