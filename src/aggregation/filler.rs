use std::mem;

use crate::aggregation::AggregationBuffer;
use crate::data::{Sample, TimeFrequency};
use crate::error::{DdtrError, Result};

/// Cuts a stream of arbitrarily sized blocks into full aggregation buffers
///
/// Every emitted buffer holds `capacity` spectra. The last `overlap` spectra
/// of each buffer are copied to the front of the next one, so a pass over
/// consecutive buffers sees every dispersion sweep in full.
pub struct AggregationBufferFiller<T> {
    capacity: usize,
    overlap: usize,
    current: AggregationBuffer<T>,
    spare: Vec<AggregationBuffer<T>>,
}

impl<T: Sample> AggregationBufferFiller<T> {
    pub fn new(capacity: usize, overlap: usize) -> Result<Self> {
        check_overlap(capacity, overlap)?;
        Ok(Self {
            capacity,
            overlap,
            current: AggregationBuffer::new(capacity),
            spare: Vec::new(),
        })
    }

    /// Append a block, returning every buffer it completes
    ///
    /// A block whose channel layout differs from the data held, or which
    /// does not follow on in time, flushes the pending data first and starts
    /// a fresh buffer.
    pub fn push(&mut self, block: &TimeFrequency<T>) -> Result<Vec<AggregationBuffer<T>>> {
        let mut full = Vec::new();

        if let Some(metadata) = self.current.metadata() {
            let restart = if !metadata.same_layout(block.metadata()) {
                log::warn!(
                    "Channel layout changed ({} -> {} channels), restarting aggregation",
                    metadata.number_of_channels(),
                    block.number_of_channels()
                );
                true
            } else {
                let gap = (block.start_time() - self.current.end_time()).as_secs();
                if gap.abs() > 0.5 * metadata.sample_interval.as_secs() {
                    log::warn!(
                        "Discontinuity of {:.6}s before block at {}, restarting aggregation",
                        gap,
                        block.start_time()
                    );
                    true
                } else {
                    false
                }
            };
            if restart {
                full.extend(self.flush());
            }
        }

        if self.current.is_full() {
            full.push(self.rotate()?);
        }
        let mut offset = 0;
        while offset < block.number_of_spectra() {
            offset += self.current.insert_from(block, offset)?;
            if self.current.is_full() {
                full.push(self.rotate()?);
            }
        }
        Ok(full)
    }

    fn rotate(&mut self) -> Result<AggregationBuffer<T>> {
        let mut next = self.next_buffer();
        self.current.transfer(self.overlap, &mut next)?;
        Ok(mem::replace(&mut self.current, next))
    }

    fn next_buffer(&mut self) -> AggregationBuffer<T> {
        self.spare
            .pop()
            .unwrap_or_else(|| AggregationBuffer::new(self.capacity))
    }

    /// Hand a processed buffer back for reuse
    pub fn recycle(&mut self, mut buffer: AggregationBuffer<T>) {
        if buffer.capacity() == self.capacity {
            buffer.reset();
            self.spare.push(buffer);
        }
    }

    /// Emit the partially filled buffer, if it holds more than the overlap
    ///
    /// The filler starts from an empty buffer afterwards.
    pub fn flush(&mut self) -> Option<AggregationBuffer<T>> {
        let fresh = self.next_buffer();
        let pending = mem::replace(&mut self.current, fresh);
        if pending.number_of_spectra() > self.overlap {
            log::debug!(
                "Flushing partial buffer of {} spectra",
                pending.number_of_spectra()
            );
            Some(pending)
        } else {
            self.recycle(pending);
            None
        }
    }

    /// Change the buffer geometry, keeping the most recent spectra
    pub fn resize(&mut self, capacity: usize, overlap: usize) -> Result<()> {
        check_overlap(capacity, overlap)?;
        if capacity == self.capacity && overlap == self.overlap {
            return Ok(());
        }

        let mut next = AggregationBuffer::new(capacity);
        let keep = self.current.number_of_spectra().min(capacity);
        if keep > 0 {
            self.current.transfer(keep, &mut next)?;
        }
        log::debug!(
            "Aggregation resized to {} spectra with overlap {} ({} retained)",
            capacity,
            overlap,
            keep
        );

        self.capacity = capacity;
        self.overlap = overlap;
        self.current = next;
        self.spare.clear();
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Spectra waiting in the current buffer, overlap included
    pub fn pending_spectra(&self) -> usize {
        self.current.number_of_spectra()
    }
}

fn check_overlap(capacity: usize, overlap: usize) -> Result<()> {
    if overlap >= capacity {
        return Err(DdtrError::OverlapExceedsSamples {
            overlap,
            spectra: capacity,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::TimeFrequencyMetadata;
    use crate::units::{Frequency, Seconds};

    fn block(nchans: usize, nspectra: usize, first_spectrum: usize) -> TimeFrequency<u16> {
        let metadata = TimeFrequencyMetadata::with_linear_channels(
            Seconds::from_millis(first_spectrum as f64),
            Seconds::from_millis(1.0),
            Frequency::from_mhz(400.0),
            -1.0,
            nchans,
        );
        // Each sample holds the index of its spectrum
        let data = (0..nspectra)
            .flat_map(|s| std::iter::repeat_n((first_spectrum + s) as u16, nchans))
            .collect();
        TimeFrequency::from_vec(metadata, data).unwrap()
    }

    #[test]
    fn test_overlap_must_be_smaller_than_capacity() {
        assert!(AggregationBufferFiller::<u16>::new(8, 8).is_err());
        assert!(AggregationBufferFiller::<u16>::new(8, 7).is_ok());
    }

    #[test]
    fn test_buffers_carry_overlap_forward() {
        let mut filler = AggregationBufferFiller::new(8, 3).unwrap();
        let full = filler.push(&block(2, 20, 0)).unwrap();

        // 8 new, then 5 new per buffer after the first
        assert_eq!(full.len(), 3);
        assert_eq!(full[0].channel(0), &[0, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(full[1].channel(1), &[5, 6, 7, 8, 9, 10, 11, 12]);
        assert_eq!(full[2].channel(0), &[10, 11, 12, 13, 14, 15, 16, 17]);
        assert!((full[1].start_time().as_millis() - 5.0).abs() < 1e-9);
        assert_eq!(filler.pending_spectra(), 3 + 2);
    }

    #[test]
    fn test_small_blocks_accumulate() {
        let mut filler = AggregationBufferFiller::new(6, 2).unwrap();
        let mut emitted = Vec::new();
        for i in 0..5 {
            emitted.extend(filler.push(&block(1, 3, i * 3)).unwrap());
        }
        assert_eq!(emitted.len(), 3);
        assert_eq!(emitted[2].channel(0), &[8, 9, 10, 11, 12, 13]);
    }

    #[test]
    fn test_flush_emits_only_beyond_overlap() {
        let mut filler = AggregationBufferFiller::new(8, 3).unwrap();
        filler.push(&block(1, 8, 0)).unwrap();
        // Only the carried overlap is pending
        assert!(filler.flush().is_none());

        filler.push(&block(1, 5, 8)).unwrap();
        let partial = filler.flush().unwrap();
        assert_eq!(partial.channel(0), &[8, 9, 10, 11, 12]);
        assert_eq!(filler.pending_spectra(), 0);
    }

    #[test]
    fn test_time_gap_restarts() {
        let mut filler = AggregationBufferFiller::new(8, 2).unwrap();
        assert!(filler.push(&block(1, 5, 0)).unwrap().is_empty());
        let full = filler.push(&block(1, 4, 100)).unwrap();
        assert_eq!(full.len(), 1);
        assert_eq!(full[0].channel(0), &[0, 1, 2, 3, 4]);
        assert_eq!(filler.pending_spectra(), 4);
    }

    #[test]
    fn test_layout_change_restarts() {
        let mut filler = AggregationBufferFiller::new(8, 2).unwrap();
        filler.push(&block(2, 4, 0)).unwrap();
        let full = filler.push(&block(3, 4, 4)).unwrap();
        assert_eq!(full.len(), 1);
        assert_eq!(full[0].number_of_channels(), 2);
    }

    #[test]
    fn test_resize_keeps_recent_spectra() {
        let mut filler = AggregationBufferFiller::new(8, 2).unwrap();
        filler.push(&block(1, 6, 0)).unwrap();
        filler.resize(4, 1).unwrap();
        assert_eq!(filler.capacity(), 4);
        assert_eq!(filler.pending_spectra(), 4);
        let full = filler.push(&block(1, 1, 6)).unwrap();
        assert_eq!(full[0].channel(0), &[2, 3, 4, 5]);
    }
}
