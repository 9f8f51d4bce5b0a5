use crate::config::SpsConfig;
use crate::constants::MIN_STDEV;
use crate::sps::msd::Msd;

/// Strongest sample of one iteration block above the threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxcarHit {
    /// Index of the DM trial searched
    pub trial: usize,
    /// First sample of the boxcar, at the trial's own resolution
    pub sample: usize,
    /// Width index; the boxcar spans `1 << width` trial samples
    pub width: usize,
    pub snr: f32,
}

/// Dyadic boxcar matched filter over one DM trial at a time
///
/// Width `w` is searched on the series averaged down by `2^w`, so every
/// width costs one pass over a series half as long as the previous one.
pub struct BoxcarSearch {
    threshold: f32,
    samples_per_iteration: usize,
    number_of_widths: usize,
    scratch: Vec<f32>,
}

impl BoxcarSearch {
    pub fn new(config: &SpsConfig) -> Self {
        Self {
            threshold: config.threshold,
            samples_per_iteration: config.samples_per_iteration.max(1),
            number_of_widths: config.number_of_widths.max(1),
            scratch: Vec::new(),
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn number_of_widths(&self) -> usize {
        self.number_of_widths
    }

    /// Search one trial sampled at `downsampling_factor` times the
    /// fundamental interval, appending hits to `hits`
    pub fn search_trial(
        &mut self,
        trial: usize,
        data: &[f32],
        downsampling_factor: usize,
        msd: Msd,
        hits: &mut Vec<BoxcarHit>,
    ) {
        let df = downsampling_factor.max(1);
        self.scratch.clear();
        self.scratch.extend_from_slice(data);

        let mut len = self.scratch.len();
        let mut block = (self.samples_per_iteration / df).max(1);
        let trial_stdev = msd.stdev / (df as f32).sqrt();

        for width in 0..self.number_of_widths {
            if len == 0 {
                break;
            }
            let stdev = trial_stdev / ((1usize << width) as f32).sqrt();
            if stdev <= MIN_STDEV {
                break;
            }

            for (b, chunk) in self.scratch[..len].chunks(block).enumerate() {
                let Some((i, snr)) = strongest(chunk, msd.mean, stdev) else {
                    continue;
                };
                if snr > self.threshold {
                    hits.push(BoxcarHit {
                        trial,
                        sample: (b * block + i) << width,
                        width,
                        snr,
                    });
                }
            }

            block = (block / 2).max(1);
            len = halve(&mut self.scratch[..len]);
        }
    }
}

fn strongest(chunk: &[f32], mean: f32, stdev: f32) -> Option<(usize, f32)> {
    chunk
        .iter()
        .map(|&v| (v - mean) / stdev)
        .enumerate()
        .filter(|(_, snr)| snr.is_finite())
        .max_by(|a, b| a.1.total_cmp(&b.1))
}

/// Pairwise average in place; returns the new length
fn halve(data: &mut [f32]) -> usize {
    let half = data.len() / 2;
    for i in 0..half {
        data[i] = 0.5 * (data[2 * i] + data[2 * i + 1]);
    }
    half
}

#[cfg(test)]
mod tests {
    use super::*;

    fn search(threshold: f32, widths: usize) -> BoxcarSearch {
        BoxcarSearch::new(&SpsConfig {
            threshold,
            samples_per_iteration: 256,
            number_of_widths: widths,
            ..SpsConfig::default()
        })
    }

    #[test]
    fn test_halve_averages_pairs() {
        let mut data = [1.0, 3.0, 5.0, 7.0, 9.0];
        assert_eq!(halve(&mut data), 2);
        assert_eq!(&data[..2], &[2.0, 6.0]);
    }

    #[test]
    fn test_single_delta_found_once() {
        let mut data = vec![0.0; 2048];
        data[1000] = 7.0;
        let mut hits = Vec::new();
        search(6.0, 4).search_trial(3, &data, 1, Msd::new(0.0, 1.0), &mut hits);
        assert_eq!(hits.len(), 1);
        let hit = hits[0];
        assert_eq!(hit.trial, 3);
        assert_eq!(hit.sample, 1000);
        assert_eq!(hit.width, 0);
        assert!((hit.snr - 7.0).abs() < 1e-6);
    }

    #[test]
    fn test_below_threshold_ignored() {
        let mut data = vec![0.0; 2048];
        data[1000] = 5.5;
        let mut hits = Vec::new();
        search(6.0, 4).search_trial(0, &data, 1, Msd::new(0.0, 1.0), &mut hits);
        assert!(hits.is_empty());
    }

    #[test]
    fn test_wide_pulse_peaks_at_matching_width() {
        // Eight samples at 3 sigma: invisible at width 0, 3·√8 ≈ 8.5 at width 3
        let mut data = vec![0.0; 4096];
        data[2048..2056].fill(3.0);
        let mut hits = Vec::new();
        search(6.0, 6).search_trial(0, &data, 1, Msd::new(0.0, 1.0), &mut hits);
        let best = hits
            .iter()
            .max_by(|a, b| a.snr.total_cmp(&b.snr))
            .unwrap();
        assert_eq!(best.width, 3);
        assert_eq!(best.sample, 2048);
        assert!(hits.iter().all(|h| h.width >= 2));
    }

    #[test]
    fn test_downsampled_trial_noise_scaled() {
        // A df=4 trial has stdev/2; a value of 4 is 8 sigma there
        let mut data = vec![0.0; 512];
        data[100] = 4.0;
        let mut hits = Vec::new();
        search(6.0, 1).search_trial(0, &data, 4, Msd::new(0.0, 1.0), &mut hits);
        assert_eq!(hits.len(), 1);
        assert!((hits[0].snr - 8.0).abs() < 1e-5);
    }

    #[test]
    fn test_one_hit_per_block() {
        let mut data = vec![0.0; 512];
        data[10] = 9.0;
        data[20] = 10.0;
        data[300] = 8.0;
        let mut hits = Vec::new();
        search(6.0, 1).search_trial(0, &data, 1, Msd::new(0.0, 1.0), &mut hits);
        let samples: Vec<usize> = hits.iter().map(|h| h.sample).collect();
        assert_eq!(samples, vec![20, 300]);
    }

    #[test]
    fn test_flat_noise_stops_search() {
        let data = vec![5.0; 256];
        let mut hits = Vec::new();
        search(6.0, 4).search_trial(0, &data, 1, Msd::new(5.0, 0.0), &mut hits);
        assert!(hits.is_empty());
    }
}
