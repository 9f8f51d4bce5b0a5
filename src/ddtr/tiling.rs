//! Band and tile partitioning for the cache-tiled strategies
//!
//! Channels are split into bands that are dedispersed in parallel, and each
//! band into tiles small enough that a tile's rows for one block of output
//! stay in cache. Within a tile every channel is shifted by a common base
//! plus a small relative shift; the relative shifts form a pattern that
//! neighbouring DMs often share, letting them reuse one partial sum.

use std::collections::HashMap;
use std::ops::Range;

use crate::constants::{KLOTSKI_CHANNEL_ALIGNMENT, KLOTSKI_MAX_RELATIVE_SHIFT};
use crate::ddtr::strategy::StrategyCommon;
use crate::error::{DdtrError, Result};

/// How tile shifts are derived from the exact per-channel shifts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftPolicy {
    /// Relative shifts from the tile's own delay curve, with the base
    /// corrected by the mean truncation error; every channel lands within
    /// one sample of its exact shift and consecutive DMs share partial sums
    Shared,
    /// Exact per-channel shifts, every DM summed on its own
    Exact,
}

/// DMs of one tile that share a relative shift pattern
#[derive(Debug, Clone)]
pub struct ShiftGroup {
    /// Index into the tile's pattern table
    pub pattern: usize,
    /// Index of the first DM within its range
    pub first_trial: usize,
    /// Base shift of each DM in the group
    pub bases: Vec<usize>,
    pub min_base: usize,
    pub max_base: usize,
}

#[derive(Debug, Clone)]
pub struct TileShifts {
    pub channels: Range<usize>,
    pub patterns: Vec<Vec<u16>>,
    pub groups: Vec<ShiftGroup>,
}

#[derive(Debug, Clone)]
pub struct BandShifts {
    pub channels: Range<usize>,
    pub tiles: Vec<TileShifts>,
}

/// Shift tables of one DM range
#[derive(Debug, Clone)]
pub struct RangeShifts {
    pub downsampling_factor: usize,
    pub first_trial: usize,
    pub trial_count: usize,
    pub bands: Vec<BandShifts>,
}

impl RangeShifts {
    /// Partial sums computed per output block, summed over tiles
    pub fn number_of_groups(&self) -> usize {
        self.bands
            .iter()
            .flat_map(|b| &b.tiles)
            .map(|t| t.groups.len())
            .sum()
    }

    /// Bytes held by the tables
    pub fn table_bytes(&self) -> usize {
        self.bands
            .iter()
            .flat_map(|b| &b.tiles)
            .map(|t| {
                t.patterns.iter().map(|p| p.len() * 2).sum::<usize>()
                    + t.groups
                        .iter()
                        .map(|g| g.bases.len() * std::mem::size_of::<usize>())
                        .sum::<usize>()
            })
            .sum()
    }
}

/// Split the channels into contiguous bands of at most `max_per_band`,
/// each a multiple of the tile alignment
pub fn partition_bands(nchans: usize, max_per_band: usize) -> Result<Vec<Range<usize>>> {
    if nchans == 0 || nchans % KLOTSKI_CHANNEL_ALIGNMENT != 0 {
        return Err(DdtrError::InvalidChannelCount {
            channels: nchans,
            multiple: KLOTSKI_CHANNEL_ALIGNMENT,
        });
    }
    let max = (max_per_band / KLOTSKI_CHANNEL_ALIGNMENT).max(1) * KLOTSKI_CHANNEL_ALIGNMENT;
    let nbands = nchans.div_ceil(max);
    let size = nchans.div_ceil(nbands).div_ceil(KLOTSKI_CHANNEL_ALIGNMENT) * KLOTSKI_CHANNEL_ALIGNMENT;
    Ok((0..nchans)
        .step_by(size)
        .map(|start| start..(start + size).min(nchans))
        .collect())
}

/// Split a band into tiles of `width` channels (the last may be narrower)
pub fn partition_tiles(band: &Range<usize>, width: usize) -> Vec<Range<usize>> {
    band.clone()
        .step_by(width)
        .map(|start| start..(start + width).min(band.end))
        .collect()
}

/// Largest relative shift any tile of `width` channels needs, at a DM per
/// downsampling factor of `scaled_dm`
pub fn max_relative_shift(
    bands: &[Range<usize>],
    width: usize,
    dm_factors: &[f64],
    scaled_dm: f64,
) -> usize {
    bands
        .iter()
        .flat_map(|band| partition_tiles(band, width))
        .map(|tile| {
            let (low, high) = factor_span(&dm_factors[tile]);
            ((high - low) * scaled_dm).floor() as usize + 1
        })
        .max()
        .unwrap_or(0)
}

fn factor_span(factors: &[f64]) -> (f64, f64) {
    factors
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &f| {
            (lo.min(f), hi.max(f))
        })
}

/// Widest power-of-two tile, at least the alignment and at most
/// `max_per_klotski` channels, whose working set fits `cache_size` bytes
pub fn choose_tile_width(
    bands: &[Range<usize>],
    dm_factors: &[f64],
    scaled_dm: f64,
    max_per_klotski: usize,
    cache_size: usize,
    samples_per_block: usize,
) -> usize {
    let working_set = |width: usize| {
        let span = max_relative_shift(bands, width, dm_factors, scaled_dm);
        (width * (samples_per_block + span) + samples_per_block) * std::mem::size_of::<f32>()
    };
    let widest_band = bands.iter().map(|b| b.len()).max().unwrap_or(0);
    let limit = max_per_klotski
        .min(widest_band)
        .max(KLOTSKI_CHANNEL_ALIGNMENT);

    let mut width = KLOTSKI_CHANNEL_ALIGNMENT;
    while width * 2 <= limit && working_set(width * 2) <= cache_size {
        width *= 2;
    }
    if working_set(width) > cache_size {
        log::warn!(
            "Tile of {} channels needs {} bytes, more than the {} byte cache target",
            width,
            working_set(width),
            cache_size
        );
    }
    width
}

/// Build the shift tables of DM range `range`
pub fn build_range_shifts(
    common: &StrategyCommon,
    range: usize,
    first_trial: usize,
    tiles: &[(Range<usize>, Vec<Range<usize>>)],
    policy: ShiftPolicy,
) -> Result<RangeShifts> {
    let dm_range = &common.plan().ranges()[range];
    let df = dm_range.downsampling_factor();

    let mut bands = Vec::with_capacity(tiles.len());
    for (band, band_tiles) in tiles {
        let mut tile_shifts = Vec::with_capacity(band_tiles.len());
        for tile in band_tiles {
            let mut table = TileShifts {
                channels: tile.clone(),
                patterns: Vec::new(),
                groups: Vec::new(),
            };
            let mut index: HashMap<Vec<u16>, usize> = HashMap::new();

            for (i, descriptor) in dm_range.trials().iter().enumerate() {
                let (base, pattern) =
                    tile_shift(common, tile, descriptor.dm().as_pc_cm3(), df, policy)?;
                let id = match index.get(&pattern) {
                    Some(&id) => id,
                    None => {
                        let id = table.patterns.len();
                        index.insert(pattern.clone(), id);
                        table.patterns.push(pattern);
                        id
                    }
                };

                let extend = policy == ShiftPolicy::Shared
                    && table.groups.last().is_some_and(|g| g.pattern == id);
                if extend && let Some(group) = table.groups.last_mut() {
                    group.bases.push(base);
                    group.min_base = group.min_base.min(base);
                    group.max_base = group.max_base.max(base);
                } else {
                    table.groups.push(ShiftGroup {
                        pattern: id,
                        first_trial: i,
                        bases: vec![base],
                        min_base: base,
                        max_base: base,
                    });
                }
            }
            tile_shifts.push(table);
        }
        bands.push(BandShifts {
            channels: band.clone(),
            tiles: tile_shifts,
        });
    }

    Ok(RangeShifts {
        downsampling_factor: df,
        first_trial,
        trial_count: dm_range.len(),
        bands,
    })
}

/// Base shift and relative shift pattern of one tile at one DM
pub fn tile_shift(
    common: &StrategyCommon,
    tile: &Range<usize>,
    dm: f64,
    df: usize,
    policy: ShiftPolicy,
) -> Result<(usize, Vec<u16>)> {
    let factors = &common.dm_factors()[tile.clone()];
    let limit = common.shift_limit(df);
    let exact: Vec<usize> = tile.clone().map(|c| common.shift(c, dm, df)).collect();

    let (base, relative): (usize, Vec<usize>) = match policy {
        ShiftPolicy::Exact => {
            let base = exact.iter().copied().min().unwrap_or(0);
            (base, exact.iter().map(|s| s - base).collect())
        }
        ShiftPolicy::Shared => {
            let scaled = dm / df as f64;
            let (base_factor, _) = factor_span(factors);
            let floor_base = (base_factor * scaled).floor().max(0.0);
            let relative: Vec<usize> = factors
                .iter()
                .map(|f| (((f - base_factor) * scaled).floor() as usize).min(limit))
                .collect();
            // Truncating base and relative shift separately loses up to one
            // sample per channel; move the base by the mean loss
            let error: f64 = exact
                .iter()
                .zip(&relative)
                .map(|(&s, &r)| s as f64 - (floor_base + r as f64))
                .sum::<f64>()
                / exact.len().max(1) as f64;
            let base = (floor_base + error.round()).max(0.0) as usize;
            (base, relative)
        }
    };

    let max_relative = relative.iter().copied().max().unwrap_or(0);
    if max_relative > KLOTSKI_MAX_RELATIVE_SHIFT {
        return Err(DdtrError::ChannelsPerKlotskiTooLarge {
            channels: tile.len(),
            shift: max_relative,
            limit: KLOTSKI_MAX_RELATIVE_SHIFT,
        });
    }
    let base = base.min(limit.saturating_sub(max_relative));
    Ok((base, relative.into_iter().map(|r| r as u16).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ddtr::strategy::ChunkLayout;
    use crate::dm::DmTrialPlan;
    use crate::units::{Dm, DmConstant, Frequency, Seconds};

    fn common(nchans: usize, end: f64) -> StrategyCommon {
        let freqs = (0..nchans)
            .map(|c| Frequency::from_mhz(1500.0 - c as f64 * 0.5))
            .collect();
        let layout = ChunkLayout::new(Seconds::from_micros(64.0), freqs);
        let mut plan = DmTrialPlan::new(DmConstant::default(), 1 << 16);
        plan.add_dm_range(Dm::from_pc_cm3(0.0), Dm::from_pc_cm3(end), Dm::from_pc_cm3(0.5))
            .unwrap();
        StrategyCommon::new(&layout, &plan, 1024, 1 << 30).unwrap()
    }

    #[test]
    fn test_bands_are_aligned_and_cover_all_channels() {
        let bands = partition_bands(200, 64).unwrap();
        assert_eq!(bands.len(), 4);
        assert!(bands.iter().all(|b| b.len() % 4 == 0 && b.len() <= 64));
        assert_eq!(bands.first().unwrap().start, 0);
        assert_eq!(bands.last().unwrap().end, 200);
        assert_eq!(bands.iter().map(|b| b.len()).sum::<usize>(), 200);
    }

    #[test]
    fn test_unaligned_channel_count_rejected() {
        assert!(matches!(
            partition_bands(30, 16),
            Err(DdtrError::InvalidChannelCount {
                channels: 30,
                multiple: 4
            })
        ));
    }

    #[test]
    fn test_tile_width_shrinks_with_cache() {
        let c = common(256, 200.0);
        let bands = partition_bands(256, 256).unwrap();
        let wide = choose_tile_width(&bands, c.dm_factors(), 200.0, 256, 1 << 20, 256);
        let narrow = choose_tile_width(&bands, c.dm_factors(), 200.0, 256, 8 * 1024, 256);
        assert!(wide.is_power_of_two() && narrow.is_power_of_two());
        assert!(narrow < wide);
        assert!(narrow >= 4);
    }

    #[test]
    fn test_shared_shifts_within_one_sample_of_exact() {
        let c = common(64, 300.0);
        let tile = 16..32;
        for step in 0..600 {
            let dm = step as f64 * 0.5;
            let (base, pattern) = tile_shift(&c, &tile, dm, 1, ShiftPolicy::Shared).unwrap();
            for (k, channel) in tile.clone().enumerate() {
                let approx = (base + pattern[k] as usize) as i64;
                let exact = c.shift(channel, dm, 1) as i64;
                assert!((approx - exact).abs() <= 1, "dm {dm} channel {channel}");
            }
        }
    }

    #[test]
    fn test_exact_shifts_match_channel_shifts() {
        let c = common(32, 100.0);
        let tile = 8..24;
        let (base, pattern) = tile_shift(&c, &tile, 73.5, 1, ShiftPolicy::Exact).unwrap();
        for (k, channel) in tile.enumerate() {
            assert_eq!(base + pattern[k] as usize, c.shift(channel, 73.5, 1));
        }
    }

    #[test]
    fn test_shared_policy_groups_consecutive_dms() {
        let c = common(16, 20.0);
        let tiles = vec![(0..16, partition_tiles(&(0..16), 8))];
        let shared = build_range_shifts(&c, 0, 0, &tiles, ShiftPolicy::Shared).unwrap();
        let exact = build_range_shifts(&c, 0, 0, &tiles, ShiftPolicy::Exact).unwrap();
        assert_eq!(shared.trial_count, 40);
        assert!(shared.number_of_groups() < exact.number_of_groups());
        assert_eq!(exact.number_of_groups(), 40 * 2);
        let covered: usize = shared.bands[0].tiles[0]
            .groups
            .iter()
            .map(|g| g.bases.len())
            .sum();
        assert_eq!(covered, 40);
    }
}
