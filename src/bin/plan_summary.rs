use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;

use ddtr::config::{DedispersionAlgorithm, DmRangeConfig, SearchConfig};
use ddtr::data::TimeFrequencyMetadata;
use ddtr::ddtr::{ChunkLayout, DedispersionPlan};
use ddtr::units::{Frequency, Seconds};

#[derive(Parser, Debug)]
#[command(name = "plan_summary")]
#[command(about = "Print the dedispersion plan resolved for an input layout", long_about = None)]
struct Args {
    /// TOML search configuration
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Number of frequency channels per spectrum
    #[arg(long)]
    nchans: usize,

    /// Sample interval (e.g. "64us")
    #[arg(long)]
    tsamp: Seconds,

    /// Centre frequency of the first channel (e.g. "1510MHz")
    #[arg(long)]
    fch1: Frequency,

    /// Channel spacing in MHz
    #[arg(long, allow_hyphen_values = true)]
    foff: f64,

    /// DM range as start:end:step; repeat for more ranges
    #[arg(long = "dm")]
    dm_ranges: Vec<DmRangeConfig>,

    /// Dedispersion algorithm
    #[arg(short = 'a', long, value_enum)]
    algorithm: Option<DedispersionAlgorithm>,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,

    /// Increase output verbosity
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Serialize)]
struct RangeSummary {
    start: f64,
    end: f64,
    step: f64,
    trials: usize,
    downsampling_factor: usize,
    samples: usize,
}

#[derive(Serialize)]
struct PlanSummary {
    strategy: &'static str,
    channels: usize,
    f_low_mhz: f64,
    f_high_mhz: f64,
    sample_interval_s: f64,
    max_dm: f64,
    dm_trials: usize,
    max_delay: usize,
    spectra_per_pass: usize,
    dedispersed_samples: usize,
    pass_duration_s: f64,
    output_bytes: usize,
    ranges: Vec<RangeSummary>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let mut config = match &args.config {
        Some(path) => SearchConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => SearchConfig::default(),
    };
    if !args.dm_ranges.is_empty() {
        config.ddtr.dm_ranges = args.dm_ranges.clone();
    }
    if let Some(algorithm) = args.algorithm {
        config.ddtr.algorithm = algorithm;
    }

    let metadata = TimeFrequencyMetadata::with_linear_channels(
        Seconds::ZERO,
        args.tsamp,
        args.fch1,
        args.foff,
        args.nchans,
    );
    let layout = ChunkLayout::from(&metadata);
    let mut plan = DedispersionPlan::new(&config)?;
    plan.reset(&layout)?;

    let summary = summarise(&plan, &layout)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_text(&summary);
    }
    Ok(())
}

fn summarise(plan: &DedispersionPlan, layout: &ChunkLayout) -> anyhow::Result<PlanSummary> {
    let strategy = plan
        .strategy()
        .context("Plan has no strategy after reset")?;
    let metadata = plan.metadata().context("Plan has no trial metadata")?;
    let dm_plan = plan.dm_trial_plan();
    let (f_low, f_high) = layout.low_high_frequencies();

    let ranges = dm_plan
        .ranges()
        .iter()
        .map(|r| RangeSummary {
            start: r.start().as_pc_cm3(),
            end: r.end().as_pc_cm3(),
            step: r.step().as_pc_cm3(),
            trials: r.len(),
            downsampling_factor: r.downsampling_factor(),
            samples: metadata.fundamental_sample_count() / r.downsampling_factor(),
        })
        .collect();

    Ok(PlanSummary {
        strategy: strategy.name(),
        channels: layout.number_of_channels(),
        f_low_mhz: f_low.as_mhz(),
        f_high_mhz: f_high.as_mhz(),
        sample_interval_s: layout.sample_interval.as_secs(),
        max_dm: dm_plan.max_dm().as_pc_cm3(),
        dm_trials: dm_plan.number_of_dm_trials(),
        max_delay: plan.buffer_overlap(),
        spectra_per_pass: plan.number_of_spectra(),
        dedispersed_samples: plan.dedispersed_samples(),
        pass_duration_s: metadata.duration().as_secs(),
        output_bytes: metadata.total_data_size() * std::mem::size_of::<f32>(),
        ranges,
    })
}

fn print_text(summary: &PlanSummary) {
    println!("=== Dedispersion plan ===");
    println!("Strategy: {}", summary.strategy);
    println!(
        "Input: {} channels, {:.3}-{:.3} MHz, {:.3} us",
        summary.channels,
        summary.f_low_mhz,
        summary.f_high_mhz,
        summary.sample_interval_s * 1e6
    );
    println!(
        "Trials: {} up to DM {:.2} pc/cm3",
        summary.dm_trials, summary.max_dm
    );
    println!(
        "Pass: {} spectra, overlap {}, {} new samples ({:.3} s)",
        summary.spectra_per_pass,
        summary.max_delay,
        summary.dedispersed_samples,
        summary.pass_duration_s
    );
    println!(
        "Output: {:.1} MiB per pass",
        summary.output_bytes as f64 / (1024.0 * 1024.0)
    );
    println!();
    println!(
        "{:>10} {:>10} {:>8} {:>7} {:>4} {:>9}",
        "start", "end", "step", "trials", "df", "samples"
    );
    for r in &summary.ranges {
        println!(
            "{:>10.3} {:>10.3} {:>8.3} {:>7} {:>4} {:>9}",
            r.start, r.end, r.step, r.trials, r.downsampling_factor, r.samples
        );
    }
}
