use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;

use ddtr::data::TimeFrequencyMetadata;
use ddtr::simulation::{DispersedPulse, FilterbankSimulator, NoiseConfig, quantize_u8};
use ddtr::units::{DmConstant, Frequency, Seconds};

#[derive(Parser, Debug)]
#[command(name = "simulate")]
#[command(about = "Write a synthetic raw filterbank file with dispersed pulses")]
struct Args {
    /// Output file
    output: PathBuf,

    /// TOML file with [noise] and [[pulses]] sections
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of frequency channels per spectrum
    #[arg(long, default_value_t = 256)]
    nchans: usize,

    /// Sample interval (e.g. "256us")
    #[arg(long, default_value = "256us")]
    tsamp: Seconds,

    /// Centre frequency of the first channel
    #[arg(long, default_value = "400MHz")]
    fch1: Frequency,

    /// Channel spacing in MHz
    #[arg(long, default_value_t = -0.390625, allow_hyphen_values = true)]
    foff: f64,

    /// Total number of spectra
    #[arg(short = 'n', long, default_value_t = 65536)]
    spectra: usize,

    /// Bits per sample: 8 or 32 (float)
    #[arg(long, default_value_t = 8)]
    nbits: u8,

    /// Pulse as dm:time:amplitude[:width]; repeat for more pulses
    #[arg(short, long = "pulse")]
    pulses: Vec<String>,

    /// Seed for reproducible noise (CLI override)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Increase output verbosity
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Deserialize)]
struct TomlConfig {
    #[serde(default = "default_noise")]
    noise: NoiseConfig,
    #[serde(default)]
    pulses: Vec<DispersedPulse>,
}

fn default_noise() -> NoiseConfig {
    NoiseConfig::default().with_level(96.0, 16.0)
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            noise: default_noise(),
            pulses: Vec::new(),
        }
    }
}

fn parse_pulse(s: &str) -> Result<DispersedPulse> {
    let fields: Vec<&str> = s.split(':').collect();
    if !(3..=4).contains(&fields.len()) {
        anyhow::bail!("Expected dm:time:amplitude[:width], got '{}'", s);
    }
    let dm: f64 = fields[0].trim().parse().context("Invalid pulse DM")?;
    let time: f64 = fields[1].trim().parse().context("Invalid pulse time")?;
    let amplitude: f32 = fields[2].trim().parse().context("Invalid pulse amplitude")?;
    let mut pulse = DispersedPulse::new(dm, time, amplitude);
    if let Some(width) = fields.get(3) {
        pulse = pulse.with_width(width.trim().parse().context("Invalid pulse width")?);
    }
    Ok(pulse)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let mut config: TomlConfig = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            toml::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))?
        }
        None => TomlConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.noise.seed = Some(seed);
    }
    for pulse in &args.pulses {
        config.pulses.push(parse_pulse(pulse)?);
    }

    let metadata = TimeFrequencyMetadata::with_linear_channels(
        Seconds::ZERO,
        args.tsamp,
        args.fch1,
        args.foff,
        args.nchans,
    );
    let mut sim = FilterbankSimulator::new(metadata, &config.noise, DmConstant::default())?;
    for pulse in config.pulses {
        log::info!(
            "Pulse at DM {:.2}, t={:.4}s, amplitude {}, width {}",
            pulse.dm,
            pulse.time,
            pulse.amplitude,
            pulse.width
        );
        sim.add_pulse(pulse);
    }

    let file = File::create(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;
    let mut out = BufWriter::new(file);

    const BLOCK: usize = 4096;
    while sim.spectra_generated() < args.spectra {
        let n = BLOCK.min(args.spectra - sim.spectra_generated());
        let block = sim.next_block(n)?;
        match args.nbits {
            8 => out.write_all(quantize_u8(&block)?.data())?,
            32 => {
                for v in block.data() {
                    out.write_all(&v.to_le_bytes())?;
                }
            }
            n => anyhow::bail!("Unsupported sample size: {} bits", n),
        }
    }
    out.flush()?;

    println!(
        "Wrote {} spectra x {} channels ({} bits) to {}",
        args.spectra,
        args.nchans,
        args.nbits,
        args.output.display()
    );
    Ok(())
}
