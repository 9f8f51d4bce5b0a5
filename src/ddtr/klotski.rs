use std::ops::Range;

use rayon::prelude::*;

use crate::config::{DdtrConfig, KlotskiConfig};
use crate::constants::KLOTSKI_MIN_OVERLAP;
use crate::ddtr::strategy::{ChunkLayout, DedispersionStrategy, StrategyCommon};
use crate::ddtr::tiling::{
    BandShifts, RangeShifts, ShiftPolicy, build_range_shifts, choose_tile_width, partition_bands,
    partition_tiles,
};
use crate::ddtr::work::WorkingBuffer;
use crate::dm::{DmTrialPlan, DmTrials};
use crate::error::{DdtrError, Result};

/// Cache-tiled dedispersion
///
/// Bands of channels are dedispersed in parallel into per-band partial
/// trials, which are then summed into the output. Within a band, tiles of
/// channels are visited one output block at a time so their rows stay in
/// cache.
pub struct KlotskiStrategy {
    common: StrategyCommon,
    policy: ShiftPolicy,
    tile_width: usize,
    samples_per_block: usize,
    tables: Vec<RangeShifts>,
    subbands: Vec<Vec<f32>>,
    pool: rayon::ThreadPool,
}

impl KlotskiStrategy {
    pub fn new(
        layout: &ChunkLayout,
        plan: &DmTrialPlan,
        ddtr: &DdtrConfig,
        klotski: &KlotskiConfig,
        policy: ShiftPolicy,
    ) -> Result<Self> {
        let nchans = layout.number_of_channels();
        let bands = partition_bands(nchans, klotski.max_channels_per_band)?;

        let granularity = KLOTSKI_MIN_OVERLAP.max(plan.max_downsampling_factor());
        let common = StrategyCommon::new(layout, plan, granularity, ddtr.memory_budget)?;

        let scaled_dm = plan
            .ranges()
            .iter()
            .filter_map(|r| {
                r.trials()
                    .last()
                    .map(|t| t.dm().as_pc_cm3() / t.downsampling_factor() as f64)
            })
            .fold(0.0, f64::max);
        let tile_width = choose_tile_width(
            &bands,
            common.dm_factors(),
            scaled_dm,
            klotski.max_channels_per_klotski,
            klotski.cache_size,
            klotski.samples_per_block,
        );

        let tiles: Vec<(Range<usize>, Vec<Range<usize>>)> = bands
            .iter()
            .map(|band| (band.clone(), partition_tiles(band, tile_width)))
            .collect();
        let tables = common
            .range_offsets()
            .into_iter()
            .enumerate()
            .map(|(range, first)| build_range_shifts(&common, range, first, &tiles, policy))
            .collect::<Result<Vec<_>>>()?;

        let required = footprint(&common, &tables, bands.len());
        if required > ddtr.max_memory {
            return Err(DdtrError::InsufficientMemory {
                required,
                limit: ddtr.max_memory,
            });
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(klotski.threads)
            .thread_name(|i| format!("klotski-{}", i))
            .build()
            .map_err(|e| DdtrError::Config(format!("cannot start band workers: {}", e)))?;

        log::info!(
            "Klotski dedispersion ({:?}): {} channels in {} bands, tiles of {} channels, \
             {} workers, overlap {} of {} spectra, ~{} MiB",
            policy,
            nchans,
            bands.len(),
            tile_width,
            pool.current_num_threads(),
            common.max_delay(),
            common.number_of_spectra(),
            required >> 20
        );
        for table in &tables {
            log::debug!(
                "Range at downsampling {}: {} trials, {} partial sums per block",
                table.downsampling_factor,
                table.trial_count,
                table.number_of_groups()
            );
        }

        Ok(Self {
            common,
            policy,
            tile_width,
            samples_per_block: klotski.samples_per_block,
            subbands: vec![Vec::new(); bands.len()],
            tables,
            pool,
        })
    }

    pub fn policy(&self) -> ShiftPolicy {
        self.policy
    }

    pub fn tile_width(&self) -> usize {
        self.tile_width
    }

    pub fn number_of_bands(&self) -> usize {
        self.subbands.len()
    }
}

/// Bytes held by input, per-band partial trials, output and shift tables
fn footprint(common: &StrategyCommon, tables: &[RangeShifts], nbands: usize) -> usize {
    let f32_bytes = std::mem::size_of::<f32>();
    let nsamps = common.number_of_spectra();
    let dedispersed = common.dedispersed_samples();
    let input = common.layout().number_of_channels() * nsamps * f32_bytes;
    let widest = tables
        .iter()
        .map(|t| t.trial_count * dedispersed / t.downsampling_factor)
        .max()
        .unwrap_or(0);
    let subbands = nbands * widest * f32_bytes;
    let output: usize = tables
        .iter()
        .map(|t| t.trial_count * dedispersed / t.downsampling_factor * f32_bytes)
        .sum();
    let shifts: usize = tables.iter().map(RangeShifts::table_bytes).sum();
    input + subbands + output + shifts
}

/// Dedisperse one band of one range into `out`, laid out `[trial][sample]`
fn dedisperse_band(
    band: &BandShifts,
    input: &WorkingBuffer,
    out: &mut [f32],
    out_len: usize,
    samples_per_block: usize,
) {
    out.fill(0.0);
    let mut partial: Vec<f32> = Vec::new();

    for tile in &band.tiles {
        for t0 in (0..out_len).step_by(samples_per_block) {
            let block = samples_per_block.min(out_len - t0);
            for group in &tile.groups {
                let pattern = &tile.patterns[group.pattern];
                let segment = block + group.max_base - group.min_base;

                partial.clear();
                partial.resize(segment, 0.0);
                for (channel, &relative) in tile.channels.clone().zip(pattern) {
                    let start = group.min_base + relative as usize + t0;
                    let row = &input.channel(channel)[start..start + segment];
                    for (p, &v) in partial.iter_mut().zip(row) {
                        *p += v;
                    }
                }

                for (j, &base) in group.bases.iter().enumerate() {
                    let trial = group.first_trial + j;
                    let dst = &mut out[trial * out_len + t0..trial * out_len + t0 + block];
                    let offset = base - group.min_base;
                    for (d, &p) in dst.iter_mut().zip(&partial[offset..offset + block]) {
                        *d += p;
                    }
                }
            }
        }
    }
}

impl DedispersionStrategy for KlotskiStrategy {
    fn name(&self) -> &'static str {
        match self.policy {
            ShiftPolicy::Shared => "klotski",
            ShiftPolicy::Exact => "klotski-bruteforce",
        }
    }

    fn max_delay(&self) -> usize {
        self.common.max_delay()
    }

    fn number_of_spectra(&self) -> usize {
        self.common.number_of_spectra()
    }

    fn granularity(&self) -> usize {
        self.common.granularity()
    }

    fn dm_factors(&self) -> &[f64] {
        self.common.dm_factors()
    }

    fn reset_spectra(&mut self, spectra: usize) -> Result<()> {
        self.common.reset_spectra(spectra)
    }

    fn execute_range(
        &mut self,
        range: usize,
        input: &WorkingBuffer,
        trials: &mut DmTrials,
    ) -> Result<()> {
        let table = self
            .tables
            .get(range)
            .ok_or_else(|| DdtrError::Config(format!("no DM range {}", range)))?;
        let df = table.downsampling_factor;
        self.common.check_input(input, df)?;

        let out_len = self.common.output_length(df);
        let size = table.trial_count * out_len;
        let samples_per_block = self.samples_per_block;
        for subband in &mut self.subbands {
            subband.resize(size, 0.0);
        }

        // Fork one task per band; the join is the barrier before integration
        let subbands = &mut self.subbands;
        self.pool.install(|| {
            subbands
                .par_iter_mut()
                .zip(table.bands.par_iter())
                .for_each(|(subband, band)| {
                    dedisperse_band(band, input, &mut subband[..size], out_len, samples_per_block)
                });
        });

        let scale = 1.0 / input.number_of_channels() as f32;
        for i in 0..table.trial_count {
            let mut trial = trials
                .get_mut(table.first_trial + i)
                .ok_or(DdtrError::IncompatibleTrials)?;
            let out = trial.data_mut();
            if out.len() != out_len {
                return Err(DdtrError::IncompatibleTrials);
            }
            out.fill(0.0);
            for subband in &self.subbands {
                for (o, &s) in out.iter_mut().zip(&subband[i * out_len..(i + 1) * out_len]) {
                    *o += s;
                }
            }
            for o in out.iter_mut() {
                *o *= scale;
            }
        }
        Ok(())
    }
}
