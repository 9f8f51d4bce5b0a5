use super::Formatter;
use crate::sps::SpCandidate;

pub struct TextFormatter {
    verbose: bool,
}

impl TextFormatter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl Formatter for TextFormatter {
    fn format(&self, candidate: &SpCandidate) -> String {
        if self.verbose {
            format!(
                "#{:<6} DM {:>8.2} t {:>12.6}s .. {:>12.6}s width {:>8.3}ms S/N {:>6.2}",
                candidate.ident(),
                candidate.dm().as_pc_cm3(),
                candidate.tstart().as_secs(),
                candidate.tend().as_secs(),
                candidate.width().as_millis(),
                candidate.sigma()
            )
        } else {
            format!(
                "DM {:>8.2} t {:>12.6}s width {:>8.3}ms S/N {:>6.2}",
                candidate.dm().as_pc_cm3(),
                candidate.tstart().as_secs(),
                candidate.width().as_millis(),
                candidate.sigma()
            )
        }
    }
}
