//! Candidate output, one line per candidate

mod csv;
mod json;
mod text;

use std::io::{self, Write};

use chrono::Utc;

use crate::sps::SpCandidate;

pub use self::csv::CsvFormatter;
pub use self::json::JsonFormatter;
pub use self::text::TextFormatter;

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Csv,
}

pub trait Formatter: Send {
    fn format(&self, candidate: &SpCandidate) -> String;

    /// Line written once before any candidate
    fn header(&self) -> Option<&'static str> {
        None
    }
}

pub fn create_formatter(format: OutputFormat, verbose: bool) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter::new(verbose)),
        OutputFormat::Json => Box::new(JsonFormatter),
        OutputFormat::Csv => Box::new(CsvFormatter),
    }
}

/// Write each candidate on its own line, returning how many were written
pub fn write_candidates<'a>(
    out: &mut impl Write,
    formatter: &dyn Formatter,
    candidates: impl IntoIterator<Item = &'a SpCandidate>,
) -> io::Result<usize> {
    let mut count = 0;
    for candidate in candidates {
        writeln!(out, "{}", formatter.format(candidate))?;
        count += 1;
    }
    Ok(count)
}

/// Wall-clock time a candidate was reported, UTC with milliseconds
pub fn iso8601_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}
