use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;

use ddtr::config::{DedispersionAlgorithm, DmRangeConfig, MsdMethod, SearchConfig};
use ddtr::data::{Sample, TimeFrequencyMetadata};
use ddtr::output::{Formatter, OutputFormat, create_formatter, write_candidates};
use ddtr::source::{BlockSource, RawFileSource, spawn_reader};
use ddtr::units::{Frequency, Seconds};
use ddtr::{DdtrError, PassResult, SearchPipeline};

#[derive(Parser, Debug)]
#[command(name = "ddtr")]
#[command(about = "Dedisperse a filterbank stream and search it for single pulses", long_about = None)]
struct Args {
    /// Headerless time-major sample file
    input: PathBuf,

    /// TOML search configuration
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Number of frequency channels per spectrum
    #[arg(long)]
    nchans: usize,

    /// Sample interval (e.g. "64us", "0.000128")
    #[arg(long)]
    tsamp: Seconds,

    /// Centre frequency of the first channel (e.g. "1510MHz")
    #[arg(long)]
    fch1: Frequency,

    /// Channel spacing in MHz, negative when frequency falls with channel index
    #[arg(long, allow_hyphen_values = true)]
    foff: f64,

    /// Bits per sample: 8, 16 or 32 (float)
    #[arg(long, default_value = "8")]
    nbits: u8,

    /// DM range as start:end:step; repeat for more ranges
    #[arg(long = "dm")]
    dm_ranges: Vec<DmRangeConfig>,

    /// Dedispersion algorithm
    #[arg(short = 'a', long, value_enum)]
    algorithm: Option<DedispersionAlgorithm>,

    /// Detection threshold in sigma
    #[arg(short = 't', long)]
    threshold: Option<f32>,

    /// Noise estimator
    #[arg(long, value_enum)]
    msd: Option<MsdMethod>,

    /// Spectra per block read from the input
    #[arg(long, default_value = "4096")]
    block_spectra: usize,

    /// Blocks buffered between reader and search
    #[arg(long, default_value = "8")]
    queue_depth: usize,

    /// Output format: text, json, csv
    #[arg(short = 'f', long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Report the data window extracted around each candidate group
    #[arg(long)]
    windows: bool,

    /// Increase output verbosity
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
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

    let config = build_config(&args)?;
    let metadata = TimeFrequencyMetadata::with_linear_channels(
        Seconds::ZERO,
        args.tsamp,
        args.fch1,
        args.foff,
        args.nchans,
    );

    match args.nbits {
        8 => run::<u8>(&args, &config, metadata),
        16 => run::<u16>(&args, &config, metadata),
        32 => run::<f32>(&args, &config, metadata),
        n => anyhow::bail!("Unsupported sample size: {} bits", n),
    }
}

fn build_config(args: &Args) -> anyhow::Result<SearchConfig> {
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
    if let Some(threshold) = args.threshold {
        config.sps.threshold = threshold;
    }
    if let Some(msd) = args.msd {
        config.sps.msd = msd;
    }
    config.validate()?;
    if config.ddtr.dm_ranges.is_empty() {
        anyhow::bail!("No DM ranges: pass --dm start:end:step or set [[ddtr.dm_ranges]]");
    }
    Ok(config)
}

fn run<T: Sample>(
    args: &Args,
    config: &SearchConfig,
    metadata: TimeFrequencyMetadata,
) -> anyhow::Result<()> {
    let file = RawFileSource::<T>::open(&args.input, metadata, args.block_spectra)
        .with_context(|| format!("Failed to open {}", args.input.display()))?;
    let (mut blocks, reader) = spawn_reader(file, args.queue_depth)?;

    let mut pipeline = SearchPipeline::<T>::new(config)?;
    let formatter = create_formatter(args.format, args.verbose > 0);
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if let Some(header) = formatter.header() {
        writeln!(out, "{}", header)?;
    }

    let started = Instant::now();
    let mut spectra = 0usize;
    let mut candidates = 0usize;

    while let Some(block) = blocks.next_block()? {
        spectra += block.number_of_spectra();
        let results = pipeline.push(block)?;
        candidates += report(&results, formatter.as_ref(), &mut out, args, config)?;
    }
    let results = pipeline.finish()?;
    candidates += report(&results, formatter.as_ref(), &mut out, args, config)?;

    match reader.join() {
        Ok(result) => result?,
        Err(_) => anyhow::bail!("Reader thread panicked"),
    }

    let elapsed = started.elapsed().as_secs_f64();
    log::info!(
        "{} spectra in {} passes, {} candidates, {:.2}s ({:.1}x real time)",
        spectra,
        pipeline.passes(),
        candidates,
        elapsed,
        spectra as f64 * args.tsamp.as_secs() / elapsed.max(f64::EPSILON)
    );
    Ok(())
}

fn report<T: Sample>(
    results: &[PassResult<T>],
    formatter: &dyn Formatter,
    out: &mut impl Write,
    args: &Args,
    config: &SearchConfig,
) -> anyhow::Result<usize> {
    let mut count = 0;
    for result in results {
        count += write_candidates(out, formatter, &result.candidates)?;

        if !args.windows {
            continue;
        }
        for window in result
            .candidates
            .data_iter(config.window.before(), config.window.after())
        {
            match window {
                Ok(w) => log::info!(
                    "Window {} .. {}: {} candidates, {} spectra",
                    w.start_time(),
                    w.end_time(),
                    w.candidates.len(),
                    w.data.number_of_spectra()
                ),
                Err(e @ DdtrError::CandidateBeyondData { .. }) => log::warn!("{}", e),
                Err(e) => return Err(e.into()),
            }
        }
    }
    Ok(count)
}
